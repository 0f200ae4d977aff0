use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CaptureStatus, User};

// -- JWT Claims --

/// JWT claims shared by the API middleware and anything else that needs to
/// read a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by both register and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

// -- Captures --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: CaptureStatus,
}

// -- Storage --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub name: String,
    pub url: String,
    pub size: u64,
    pub sha256: String,
}
