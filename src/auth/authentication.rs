use std::convert::Infallible;

use rocket::Request;
use rocket::http::CookieJar;
use rocket::request::{FromRequest, Outcome};

use crate::error::AppError;

pub const ADMIN_COOKIE: &str = "admin-session";
pub const ADMIN_COOKIE_VALUE: &str = "authenticated";

/// Whether the caller carries the shared admin flag. There is no per-user
/// identity behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Authenticated,
    Anonymous,
}

impl AuthState {
    pub fn from_cookie(value: Option<&str>) -> Self {
        match value {
            Some(ADMIN_COOKIE_VALUE) => AuthState::Authenticated,
            _ => AuthState::Anonymous,
        }
    }

    pub fn from_cookies(cookies: &CookieJar<'_>) -> Self {
        Self::from_cookie(cookies.get(ADMIN_COOKIE).map(|c| c.value()))
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_authenticated() {
            Ok(())
        } else {
            tracing::warn!("Rejected admin request without a valid admin cookie");
            Err(AppError::Unauthorized)
        }
    }
}

// Never fails: handlers decide what an anonymous caller may do, so a missing
// cookie still reaches them before the body is looked at.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthState {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("admin_auth_guard");
        let _guard = auth_span.enter();

        let state = AuthState::from_cookies(request.cookies());
        tracing::debug!(authenticated = state.is_authenticated(), "Resolved admin auth state");

        Outcome::Success(state)
    }
}
