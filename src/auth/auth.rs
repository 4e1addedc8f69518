use rocket::State;
use rocket::data::{Data, Limits};
use rocket::http::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::env::AppConfig;
use crate::error::AppError;
use crate::response::{AdminResult, ApiResponse};
use crate::validation::{ValidateExt, parse_json_body, read_body};

use super::{ADMIN_COOKIE, ADMIN_COOKIE_VALUE, AuthState};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminSessionResponse {
    pub authenticated: bool,
}

/// Checks the submitted password against the configured bcrypt hash and, on
/// success, sets the admin cookie.
#[post("/admin/login", data = "<data>")]
pub async fn api_admin_login(
    data: Data<'_>,
    limits: &Limits,
    cookies: &CookieJar<'_>,
    config: &State<AppConfig>,
) -> AdminResult<AdminSessionResponse> {
    let body = read_body(data, limits).await?;
    let login = parse_json_body::<LoginRequest>(&body)?.validate_custom()?;

    let Some(hash) = config.admin_password_hash.as_deref() else {
        warn!("Admin login attempted but no password hash is configured");
        return Err(AppError::Unauthorized);
    };

    if !bcrypt::verify(&login.password, hash)? {
        warn!("Admin login failed");
        return Err(AppError::Unauthorized);
    }

    info!("Admin login succeeded");
    cookies.add(
        Cookie::build((ADMIN_COOKIE, ADMIN_COOKIE_VALUE))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true),
    );

    Ok(ApiResponse::success(AdminSessionResponse {
        authenticated: true,
    }))
}

#[post("/admin/logout")]
pub fn api_admin_logout(
    auth: AuthState,
    cookies: &CookieJar<'_>,
) -> AdminResult<AdminSessionResponse> {
    if auth.is_authenticated() {
        info!("Admin logged out");
    }
    cookies.remove(Cookie::build(ADMIN_COOKIE).path("/"));

    Ok(ApiResponse::success(AdminSessionResponse {
        authenticated: false,
    }))
}
