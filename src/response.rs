use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// Uniform wrapper returned by every admin endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

pub type AdminResult<T> = Result<Json<ApiResponse<T>>, AppError>;

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

impl ApiResponse<()> {
    pub fn failure(err: &AppError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiErrorBody {
                message: err.public_message(),
                code: err.code().to_string(),
                details: err.details(),
            }),
        }
    }
}
