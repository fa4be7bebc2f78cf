use axum::{extract::State, http::StatusCode, Json};

use crate::auth::{AuthenticatedPrincipal, CurrentPrincipal};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::types::{RegisterUserRequest, UserDto};
use crate::users::NewUser;

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 64;
const MIN_PASSWORD_LEN: usize = 8;

fn validate_registration(req: &RegisterUserRequest) -> AppResult<()> {
    let username = req.username.trim();
    if username.len() < MIN_USERNAME_LEN || username.len() > MAX_USERNAME_LEN {
        return Err(AppError::ValidationError {
            field: "username".into(),
            message: format!("must be {}-{} characters", MIN_USERNAME_LEN, MAX_USERNAME_LEN),
        });
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')) {
        return Err(AppError::ValidationError {
            field: "username".into(),
            message: "may only contain letters, digits, '_', '-' and '.'".into(),
        });
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::ValidationError {
            field: "password".into(),
            message: format!("must be at least {} characters", MIN_PASSWORD_LEN),
        });
    }
    if req.full_name.trim().is_empty() {
        return Err(AppError::ValidationError { field: "fullName".into(), message: "must not be empty".into() });
    }
    Ok(())
}

// POST /api/users
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> AppResult<(StatusCode, Json<UserDto>)> {
    validate_registration(&req)?;
    let username = req.username.trim().to_string();

    if state.users.find_user_by_username(&username).await?.is_some() {
        return Err(AppError::Conflict("Username is already taken".into()));
    }

    let password_hash = state.users.encode_password(&req.password).await?;
    let user = state
        .users
        .create_user(NewUser {
            username,
            password_hash,
            full_name: req.full_name.trim().to_string(),
            email: req.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
            role: None,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserDto::from(user))))
}

// GET /api/users/me
pub async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> Json<AuthenticatedPrincipal> {
    Json(principal)
}
