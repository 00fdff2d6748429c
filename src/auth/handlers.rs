use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::error::ApiError;
use crate::response::{created, ok, Envelope};
use crate::state::AppState;
use crate::users::repo::{Role, User};

use super::dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest};
use super::extractors::Session;
use super::jwt::JwtKeys;
use super::password::{hash_password, verify_password};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_register(payload: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if payload.name.trim().len() < 2 {
        errors.push("Name must be at least 2 characters");
    }
    if !is_valid_email(&payload.email) {
        errors.push("Invalid email");
    }
    if payload.password.len() < 6 {
        errors.push("Password must be at least 6 characters");
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::InvalidInput(errors.join(", ")))
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<AuthResponse>>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if let Err(e) = validate_register(&payload) {
        warn!(email = %payload.email, "register rejected");
        return Err(e);
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let role = payload.role.unwrap_or(Role::Citizen);
    let user = User::create(&state.db, payload.name.trim(), &payload.email, &hash, role).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, user.role)?;

    info!(user_id = %user.id, email = %user.email, ?role, "user registered");
    Ok(created(AuthResponse {
        user: user.into(),
        token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<Envelope<AuthResponse>>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        return Err(ApiError::InvalidInput("Invalid email".into()));
    }

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Unauthenticated("Invalid credentials".into()));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthenticated("Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, user.role)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(ok(AuthResponse {
        user: user.into(),
        token,
    }))
}

#[instrument(skip(state, session))]
pub async fn get_me(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Envelope<PublicUser>>, ApiError> {
    let user = User::find_by_id(&state.db, session.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("User not found".into()))?;

    Ok(ok(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_plain_addresses() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@city.example.org"));
    }

    #[test]
    fn email_regex_rejects_malformed() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@x.com"));
    }

    #[test]
    fn register_validation_aggregates_all_errors() {
        let payload = RegisterRequest {
            name: "A".into(),
            email: "bad".into(),
            password: "123".into(),
            role: None,
        };
        let err = validate_register(&payload).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Name must be at least 2 characters"));
        assert!(msg.contains("Invalid email"));
        assert!(msg.contains("Password must be at least 6 characters"));
    }

    #[test]
    fn register_validation_passes_valid_payload() {
        let payload = RegisterRequest {
            name: "Ada".into(),
            email: "a@x.com".into(),
            password: "secret1".into(),
            role: Some(Role::Admin),
        };
        assert!(validate_register(&payload).is_ok());
    }
}
