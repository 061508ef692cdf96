use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use log::{info, warn};
use serde::Serialize;
use serde_json::{Value, json};

use crate::catalog::Session;
use crate::catalog::entities::{NewUser, User};
use crate::http::validation::Validator;
use crate::http::{ApiError, AppState, json_body};

const TOKEN_NAME: &str = "api-token";
const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    user: User,
    token: String,
}

// Resolves `Authorization: Bearer <token>` for routes that need a user.
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(ApiError::Unauthenticated)?;

        state
            .storage
            .authenticate(bearer)
            .await?
            .ok_or(ApiError::Unauthenticated)
    }
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let mut v = Validator::new(json_body(payload)?);
    let name = v.required_string("name", 255);
    let email = v.required_email("email", 255, true);
    if let Some(email) = &email
        && state.storage.email_taken(email).await?
    {
        v.reject("email", "The email has already been taken.");
    }
    let password = v.required_password("password", 255);
    if let Some(password) = &password
        && v.min_chars("password", password, MIN_PASSWORD_CHARS)
    {
        v.confirmed("password");
    }
    let (Some(name), Some(email), Some(password), true) = (name, email, password, v.is_valid())
    else {
        return Err(v.into_error());
    };

    let user = state
        .storage
        .register_user(&NewUser {
            name,
            email,
            password,
        })
        .await?;
    let token = state.storage.issue_token(&user, TOKEN_NAME).await?;
    info!("Registered user {}", user.id);
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let mut v = Validator::new(json_body(payload)?);
    let email = v.required_email("email", 255, false);
    let password = v.required_password("password", 255);
    let (Some(email), Some(password), true) = (email, password, v.is_valid()) else {
        return Err(v.into_error());
    };

    let Some(user) = state.storage.attempt(&email, &password).await? else {
        warn!("Failed login attempt for {email}");
        return Err(ApiError::InvalidCredentials);
    };
    let token = state.storage.issue_token(&user, TOKEN_NAME).await?;
    Ok(Json(AuthResponse { user, token }))
}

pub async fn logout(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    state.storage.revoke_token(session.token_id).await?;
    info!("User {} logged out", session.user.id);
    Ok(Json(json!({ "message": "Logged out successfully" })))
}
