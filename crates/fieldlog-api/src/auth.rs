use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tracing::{info, warn};
use uuid::Uuid;

use fieldlog_db::models::{UserRow, format_timestamp};
use fieldlog_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};

use crate::state::{AppState, blocking};

const MIN_PASSWORD_LEN: usize = 8;
const TOKEN_LIFETIME_DAYS: i64 = 30;

/// Loose shape check: one `@`, non-empty local part, a dotted domain and
/// no whitespace.
pub(crate) fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    let lookup = email.clone();
    if blocking(&state, move |db| db.get_user_by_email(&lookup)).await?.is_some() {
        return Err(StatusCode::CONFLICT);
    }

    let password_hash =
        hash_password(&req.password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let display_name = req
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    let row = UserRow {
        id: Uuid::new_v4().to_string(),
        email,
        display_name,
        password: password_hash,
        created_at: format_timestamp(Utc::now()),
    };
    let user = blocking(&state, move |db| {
        if !db.create_user(&row)? {
            return Ok(None);
        }
        row.into_user().map(Some)
    })
    .await?
    .ok_or(StatusCode::CONFLICT)?;

    let token = create_token(&state.jwt_secret, user.id, &user.email)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let email = req.email.trim().to_lowercase();
    let row = blocking(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let parsed_hash =
        PasswordHash::new(&row.password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| {
            warn!(user_id = %row.id, "Failed login attempt");
            StatusCode::UNAUTHORIZED
        })?;

    let user = row.into_user().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let token = create_token(&state.jwt_secret, user.id, &user.email)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(AuthResponse { user, token }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let id = claims.sub.to_string();
    let user = blocking(&state, move |db| db.get_user_by_id(&id)?.map(UserRow::into_user).transpose())
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(user))
}

/// Argon2id PHC string with a fresh salt from the OS RNG.
fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
