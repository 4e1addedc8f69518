pub mod auth;
pub mod authentication;

pub use auth::*;
pub use authentication::*;
