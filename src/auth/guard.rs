//! Access guard: role-based authorization decisions and the axum
//! middleware that applies them.
//!
//! The decision itself is a pure function over the principal and the
//! required roles; the middleware only resolves the session, applies the
//! decision, and translates it into an HTTP response.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::auth::{self, Principal, FLASH_COOKIE};
use crate::AppState;

/// What a guarded route requires of the principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRequirement {
    /// Any authenticated, active account
    Authenticated,
    /// A specific role
    Role(String),
    /// At least one of the listed roles
    AnyRole(Vec<String>),
}

impl RoleRequirement {
    pub fn role(name: &str) -> Self {
        RoleRequirement::Role(name.to_string())
    }

    pub fn any(names: &[&str]) -> Self {
        RoleRequirement::AnyRole(names.iter().map(|s| s.to_string()).collect())
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// Not authenticated: recoverable, send to login preserving intent
    Redirect(String),
    /// Authenticated but lacking the required role
    Forbid(String),
}

/// Decide whether a principal may access a route.
///
/// An inactive account is treated the same as no principal: the failure
/// is recoverable by logging in with a valid account.
pub fn authorize(
    principal: Option<&Principal>,
    requirement: &RoleRequirement,
    requested_path: &str,
) -> AccessDecision {
    let principal = match principal {
        Some(p) if p.active => p,
        _ => return AccessDecision::Redirect(login_redirect(requested_path)),
    };

    match requirement {
        RoleRequirement::Authenticated => AccessDecision::Allow,
        RoleRequirement::Role(name) => {
            if principal.has_role(name) {
                AccessDecision::Allow
            } else {
                AccessDecision::Forbid(format!(
                    "Du saknar behörighet för denna sida. Krävs: {}",
                    name
                ))
            }
        }
        RoleRequirement::AnyRole(names) => {
            if principal.has_any_role(names) {
                AccessDecision::Allow
            } else {
                AccessDecision::Forbid(format!(
                    "Du saknar behörighet för denna sida. Krävs en av: {}",
                    names.join(", ")
                ))
            }
        }
    }
}

/// Validate a post-login return target.
///
/// Only same-origin relative paths are allowed; anything that could be
/// interpreted as an absolute or protocol-relative URL is rejected to
/// avoid open redirects.
pub fn validate_next_path(next: &str) -> Option<&str> {
    if !next.starts_with('/') {
        return None;
    }
    if next.starts_with("//") || next.starts_with("/\\") {
        return None;
    }
    if next.contains('\\') || next.contains("://") {
        return None;
    }
    if next.chars().any(|c| c.is_control()) {
        return None;
    }
    Some(next)
}

fn login_redirect(requested_path: &str) -> String {
    match validate_next_path(requested_path) {
        Some(path) => format!("/login?next={}", encode_query_value(path)),
        None => "/login".to_string(),
    }
}

/// Percent-encode a string for use as a query parameter value.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// State handed to the guard middleware: the app plus the requirement
/// for the wrapped route group.
#[derive(Clone)]
pub struct GuardState {
    pub app: Arc<AppState>,
    pub requirement: RoleRequirement,
}

impl GuardState {
    pub fn authenticated(app: Arc<AppState>) -> Self {
        Self {
            app,
            requirement: RoleRequirement::Authenticated,
        }
    }

    pub fn role(app: Arc<AppState>, name: &str) -> Self {
        Self {
            app,
            requirement: RoleRequirement::role(name),
        }
    }

    pub fn any_role(app: Arc<AppState>, names: &[&str]) -> Self {
        Self {
            app,
            requirement: RoleRequirement::any(names),
        }
    }
}

/// Guard middleware. On success the principal is inserted into request
/// extensions for downstream handlers.
pub async fn guard_middleware(
    State(guard): State<GuardState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let principal = match auth::session_token(&jar) {
        Some(token) => match auth::resolve_principal(&guard.app.db, &token).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to resolve session");
                return ApiError::internal("Failed to resolve session").into_response();
            }
        },
        None => None,
    };

    match authorize(principal.as_ref(), &guard.requirement, &path) {
        AccessDecision::Allow => {
            tracing::debug!(path = %path, user = %principal.as_ref().map(|p| p.email.as_str()).unwrap_or("-"), "Access granted");
            if let Some(p) = principal {
                request.extensions_mut().insert(p);
            }
            next.run(request).await
        }
        AccessDecision::Redirect(location) => {
            tracing::info!(path = %path, "Unauthenticated request, redirecting to login");
            let jar = jar.add(flash_cookie("Logga in för att fortsätta"));
            (
                StatusCode::SEE_OTHER,
                jar,
                [(header::LOCATION, location)],
            )
                .into_response()
        }
        AccessDecision::Forbid(message) => {
            tracing::warn!(
                path = %path,
                user = %principal.as_ref().map(|p| p.email.as_str()).unwrap_or("-"),
                "Access forbidden"
            );
            let jar = jar.add(flash_cookie(&message));
            (jar, ApiError::forbidden(message)).into_response()
        }
    }
}

fn flash_cookie(message: &str) -> Cookie<'static> {
    Cookie::build((FLASH_COOKIE, message.to_string()))
        .path("/")
        .same_site(SameSite::Lax)
        .http_only(false)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn principal(roles: &[&str]) -> Principal {
        Principal {
            user_id: "u1".to_string(),
            email: "user@example.se".to_string(),
            name: "Test User".to_string(),
            active: true,
            roles: roles.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
        }
    }

    #[test]
    fn unauthenticated_redirects_preserving_path() {
        let decision = authorize(None, &RoleRequirement::role("Admin"), "/admin/events");
        assert_eq!(
            decision,
            AccessDecision::Redirect("/login?next=/admin/events".to_string())
        );
    }

    #[test]
    fn unauthenticated_redirect_encodes_query() {
        let decision = authorize(
            None,
            &RoleRequirement::role("Admin"),
            "/admin/events?page=2&sort=date",
        );
        assert_eq!(
            decision,
            AccessDecision::Redirect(
                "/login?next=/admin/events%3Fpage%3D2%26sort%3Ddate".to_string()
            )
        );
    }

    #[test]
    fn missing_role_is_forbidden_naming_the_role() {
        let p = principal(&["parent"]);
        let decision = authorize(Some(&p), &RoleRequirement::role("Admin"), "/admin");
        match decision {
            AccessDecision::Forbid(msg) => assert!(msg.contains("Admin")),
            other => panic!("expected Forbid, got {:?}", other),
        }
    }

    #[test]
    fn any_role_accepts_either_and_lists_all_on_failure() {
        let p = principal(&["event_manager"]);
        let req = RoleRequirement::any(&["Admin", "event_manager"]);
        assert_eq!(authorize(Some(&p), &req, "/admin/events"), AccessDecision::Allow);

        let p = principal(&["parent"]);
        match authorize(Some(&p), &req, "/admin/events") {
            AccessDecision::Forbid(msg) => {
                assert!(msg.contains("Admin"));
                assert!(msg.contains("event_manager"));
            }
            other => panic!("expected Forbid, got {:?}", other),
        }
    }

    #[test]
    fn authenticated_requirement_allows_any_role() {
        let p = principal(&[]);
        assert_eq!(
            authorize(Some(&p), &RoleRequirement::Authenticated, "/tasks"),
            AccessDecision::Allow
        );
    }

    #[test]
    fn inactive_principal_is_redirected() {
        let mut p = principal(&["Admin"]);
        p.active = false;
        match authorize(Some(&p), &RoleRequirement::role("Admin"), "/admin") {
            AccessDecision::Redirect(_) => {}
            other => panic!("expected Redirect, got {:?}", other),
        }
    }

    #[test]
    fn next_path_validation_rejects_foreign_urls() {
        assert_eq!(validate_next_path("/admin/events"), Some("/admin/events"));
        assert_eq!(validate_next_path("/a?b=c"), Some("/a?b=c"));
        assert_eq!(validate_next_path("https://evil.example"), None);
        assert_eq!(validate_next_path("//evil.example"), None);
        assert_eq!(validate_next_path("/\\evil.example"), None);
        assert_eq!(validate_next_path("relative/path"), None);
        assert_eq!(validate_next_path("/ok\\not"), None);
        assert_eq!(validate_next_path("/x://y"), None);
    }
}
