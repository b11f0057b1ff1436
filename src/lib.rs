pub mod api;
pub mod auth;
pub mod config;
pub mod confirm;
pub mod db;
pub mod notifications;
pub mod swish;

pub use db::DbPool;

use config::Config;
use notifications::email::Mailer;
use std::sync::Arc;
use swish::SwishClient;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub mailer: Arc<Mailer>,
    pub swish: Arc<SwishClient>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> anyhow::Result<Self> {
        let mailer = Arc::new(Mailer::new(config.email.clone()));
        let swish = Arc::new(SwishClient::new(
            config.swish.clone(),
            &config.server.public_url,
        )?);
        Ok(Self {
            config,
            db,
            mailer,
            swish,
        })
    }
}
