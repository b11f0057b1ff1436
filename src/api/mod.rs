mod applications;
pub mod auth;
mod contact;
pub mod error;
mod events;
mod news;
mod payments;
mod tasks;
mod users;
pub mod validation;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::guard::{guard_middleware, GuardState};
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public routes: no session required
    let public_routes = Router::new()
        .route("/events", get(events::list_upcoming))
        .route("/events/:id", get(events::get_event))
        .route("/news", get(news::list_published))
        .route("/contact", post(contact::submit))
        .route("/applications", post(applications::submit));

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/register", post(auth::register))
        // Link click and manual entry redeem the same code
        .route("/verify-email", get(auth::verify_email))
        .route("/verify-email", post(auth::verify_email_form))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    // Event management: Admin or event_manager
    let event_admin_routes = Router::new()
        .route("/events", get(events::list_all))
        .route("/events", post(events::create_event))
        .route("/events/:id", put(events::update_event))
        .route("/events/:id", delete(events::delete_event))
        .layer(middleware::from_fn_with_state(
            GuardState::any_role(state.clone(), &["Admin", "event_manager"]),
            guard_middleware,
        ));

    // Admissions: Admin or applications_manager
    let application_admin_routes = Router::new()
        .route("/applications", get(applications::list))
        .route("/applications/:id", get(applications::get_application))
        .route("/applications/:id/status", put(applications::update_status))
        .layer(middleware::from_fn_with_state(
            GuardState::any_role(state.clone(), &["Admin", "applications_manager"]),
            guard_middleware,
        ));

    // Admin-only: news, contact inbox, accounts, roles, payments
    let admin_routes = Router::new()
        .route("/news", get(news::list_all))
        .route("/news", post(news::create_post))
        .route("/news/:id", put(news::update_post))
        .route("/news/:id", delete(news::delete_post))
        .route("/contact", get(contact::list_messages))
        .route("/contact/:id/read", put(contact::mark_read))
        .route("/users", get(users::list_users))
        .route("/users", post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id", put(users::update_user))
        .route("/users/:id/roles/:role_name", post(users::grant_role))
        .route("/users/:id/roles/:role_name", delete(users::revoke_role))
        .route("/roles", get(users::list_roles))
        .route("/roles", post(users::create_role))
        .route("/roles/:id", delete(users::delete_role))
        .route("/payments", get(payments::list_payments))
        .route("/payments", post(payments::create_payment))
        .route("/payments/:id", get(payments::get_payment))
        .route("/payments/:id/status", get(payments::get_remote_status))
        .route("/payments/:id/cancel", post(payments::cancel_payment))
        .layer(middleware::from_fn_with_state(
            GuardState::role(state.clone(), "Admin"),
            guard_middleware,
        ));

    // Tasks: managers see everything, parents their own assignments
    let task_manage_routes = Router::new()
        .route("/tasks", post(tasks::create_task))
        .route("/tasks/:id", put(tasks::update_task))
        .route("/tasks/:id", delete(tasks::delete_task))
        .layer(middleware::from_fn_with_state(
            GuardState::any_role(state.clone(), &["Admin", "event_manager"]),
            guard_middleware,
        ));
    let task_routes = Router::new()
        .route("/tasks", get(tasks::list))
        .route("/tasks/:id/complete", post(tasks::complete_task))
        .layer(middleware::from_fn_with_state(
            GuardState::any_role(state.clone(), &["Admin", "event_manager", "parent"]),
            guard_middleware,
        ));

    // Gateway callback: authenticated by the per-payment identifier,
    // not by a session
    let webhook_routes = Router::new().route("/swish/:payment_id", post(payments::swish_callback));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", public_routes)
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", event_admin_routes)
        .nest("/api/admin", application_admin_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api", task_manage_routes)
        .nest("/api", task_routes)
        .nest("/webhooks", webhook_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
