use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use pitchside_core::credentials::{check_reset_code, clear_reset_code, hash_secret, verify_secret, ResetCode};
use pitchside_core::identity::{normalize_email, validate_password};
use pitchside_core::mailer::OutgoingMail;
use pitchside_core::{NewUser, Role, User, UserProfile};
use pitchside_shared::Masked;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{decode_refresh, issue_tokens, TokenPair};
use crate::middleware::{auth_middleware, Claims};
use crate::state::AppState;

const RESET_SENT: &str = "If the email exists, a reset code has been sent";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AuthResponse {
    user: UserProfile,
    #[serde(flatten)]
    tokens: TokenPair,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

#[derive(Debug, Deserialize)]
struct ForgotPasswordRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest {
    email: String,
    reset_code: String,
    new_password: String,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
        .route("/auth/change-password", post(change_password))
        .route_layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .merge(protected)
}

/// Signs the user in and stores the hash of the new refresh token.
async fn start_session(state: &AppState, user: &mut User) -> AppResult<TokenPair> {
    let tokens = issue_tokens(&state.auth, user)?;
    user.refresh_token_hash = Some(hash_secret(&tokens.refresh_token)?);
    state.repos.users.save_user(user).await?;
    Ok(tokens)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
async fn register(State(state): State<AppState>, Json(req): Json<NewUser>) -> AppResult<(StatusCode, Json<Value>)> {
    req.validate()?;
    let email = normalize_email(&req.email);
    if state.repos.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::ConflictError("User with this email already exists".into()));
    }

    let password_hash = hash_secret(&req.password)?;
    let mut user = req.into_user(password_hash);
    state.repos.users.create_user(&user).await?;
    info!(user_id = %user.id, email = %Masked(&user.email), role = %user.role, "User registered");

    if user.role == Role::Owner {
        return Ok((
            StatusCode::CREATED,
            Json(json!({
                "message": "Account created successfully. Please wait for an admin to activate your account.",
                "user": user.profile(),
            })),
        ));
    }

    let tokens = start_session(&state, &mut user).await?;
    let body = serde_json::to_value(AuthResponse { user: user.profile(), tokens })
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok((StatusCode::CREATED, Json(body)))
}

/// POST /auth/login
async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> AppResult<Json<AuthResponse>> {
    let email = normalize_email(&req.email);
    let found = state.repos.users.find_by_email(&email).await?;
    let verified = match &found {
        Some(user) => verify_secret(&req.password, &user.password_hash)?,
        None => false,
    };
    let mut user = match found {
        Some(user) if verified => user,
        _ => {
            state.metrics.login("invalid_credentials");
            tracing::warn!(email = %Masked(&email), "Login refused");
            return Err(AppError::AuthenticationError("Invalid credentials".into()));
        }
    };
    if !user.is_active {
        state.metrics.login("inactive");
        return Err(AppError::AuthenticationError("Account inactive".into()));
    }

    let tokens = start_session(&state, &mut user).await?;
    state.metrics.login("success");
    Ok(Json(AuthResponse { user: user.profile(), tokens }))
}

/// GET /auth/me
async fn me(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> AppResult<Json<UserProfile>> {
    let user = state
        .repos
        .users
        .get_user(claims.user_id())
        .await?
        .ok_or_else(|| AppError::NotFoundError("User not found".into()))?;
    Ok(Json(user.profile()))
}

/// POST /auth/refresh
/// Rotates the refresh token; the old one stops working.
async fn refresh(State(state): State<AppState>, Json(req): Json<RefreshRequest>) -> AppResult<Json<TokenPair>> {
    let denied = || AppError::AuthenticationError("Access Denied".into());

    let claims = decode_refresh(&state.auth, &req.refresh_token).ok_or_else(denied)?;
    let mut user = state.repos.users.get_user(claims.user_id()).await?.ok_or_else(denied)?;
    let stored = user.refresh_token_hash.clone().ok_or_else(denied)?;
    if !user.is_active || !verify_secret(&req.refresh_token, &stored)? {
        return Err(denied());
    }

    let tokens = start_session(&state, &mut user).await?;
    Ok(Json(tokens))
}

/// POST /auth/logout
async fn logout(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> AppResult<Json<Value>> {
    if let Some(mut user) = state.repos.users.get_user(claims.user_id()).await? {
        user.refresh_token_hash = None;
        state.repos.users.save_user(&user).await?;
    }
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

/// POST /auth/change-password
async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<Value>> {
    let mut user = state
        .repos
        .users
        .get_user(claims.user_id())
        .await?
        .ok_or_else(|| AppError::NotFoundError("User not found".into()))?;

    if !verify_secret(&req.current_password, &user.password_hash)? {
        return Err(AppError::ValidationError("Current password is incorrect".into()));
    }
    if req.current_password == req.new_password {
        return Err(AppError::ValidationError(
            "New password must be different from current password".into(),
        ));
    }
    validate_password(&req.new_password)?;

    user.password_hash = hash_secret(&req.new_password)?;
    user.updated_at = Utc::now();
    state.repos.users.save_user(&user).await?;
    Ok(Json(json!({ "message": "Password changed successfully" })))
}

/// POST /auth/forgot-password
/// Answers the same way whether or not the account exists.
async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AppResult<Json<Value>> {
    let email = normalize_email(&req.email);
    if let Some(mut user) = state.repos.users.find_by_email(&email).await? {
        let minutes = state.auth.reset_code_minutes;
        let code = ResetCode::issue(Utc::now(), minutes)?;
        code.attach(&mut user);
        state.repos.users.save_user(&user).await?;

        let mail = OutgoingMail::reset_code(&user.email, &user.first_name, &code.code, minutes);
        if let Err(e) = state.mailer.send(mail).await {
            tracing::warn!(email = %Masked(&user.email), error = %e, "Reset code mail failed");
        }
    }
    Ok(Json(json!({ "message": RESET_SENT })))
}

/// POST /auth/reset-password
async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> AppResult<Json<Value>> {
    let email = normalize_email(&req.email);
    let mut user = state
        .repos
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::ValidationError("Invalid or expired reset code".into()))?;

    if let Err(e) = check_reset_code(&mut user, req.reset_code.trim(), Utc::now()) {
        state.repos.users.save_user(&user).await?;
        return Err(e.into());
    }
    validate_password(&req.new_password)?;

    user.password_hash = hash_secret(&req.new_password)?;
    clear_reset_code(&mut user);
    user.refresh_token_hash = None;
    user.updated_at = Utc::now();
    state.repos.users.save_user(&user).await?;
    info!(user_id = %user.id, "Password reset");
    Ok(Json(json!({ "message": "Password has been reset successfully" })))
}
