mod application;
mod confirmation;
mod contact;
mod event;
mod news;
mod payment;
mod task;
mod user;

pub use application::*;
pub use confirmation::*;
pub use contact::*;
pub use event::*;
pub use news::*;
pub use payment::*;
pub use task::*;
pub use user::*;
