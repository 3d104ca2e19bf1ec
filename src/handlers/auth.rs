use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::{
    error::{AppError, Result},
    services::session::SessionContext,
    state::AppState,
    validation::auth::{validate_email, validate_registration},
};

/// The request payload for user registration.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(alias = "confirm-password")]
    pub confirm_password: String,
}

/// The request payload for user login.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The response payload for authentication-related requests.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

impl AuthResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Greets the caller by name when logged in.
#[axum::debug_handler(state = AppState)]
pub async fn index(session: SessionContext) -> Json<AuthResponse> {
    let message = match session.username() {
        Some(username) => format!("Hello {}!", username),
        None => "Hey visitor!".to_string(),
    };
    Json(AuthResponse::ok(message))
}

/// Handles user registration.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response> {
    tracing::info!("📝 Register attempt for: {}", payload.username);
    validate_registration(
        &payload.username,
        &payload.email,
        &payload.password,
        &payload.confirm_password,
    )?;

    tracing::info!("✅ Validations passed for: {}", payload.username);

    match state
        .users
        .register(&payload.username, &payload.email, &payload.password)
        .await
    {
        Ok(user) => {
            tracing::info!("✅ User registered: {}", user.id);
            let response = AuthResponse::ok("Your account has been created!");
            Ok((StatusCode::CREATED, Json(response)).into_response())
        }
        Err(e) => {
            if e.is_unavailable() {
                tracing::error!("❌ Registration failed, store unavailable: {}", e);
            } else {
                tracing::warn!("❌ Registration failed: {}", e);
            }
            Err(AppError::field("account", "Unable to create account"))
        }
    }
}

/// Handles user login.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    mut session: SessionContext,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt for: {}", payload.email);

    if !validate_email(&payload.email) {
        return Err(AppError::field("email", "Invalid email format!"));
    }

    let user = match state.users.authenticate(&payload.email, &payload.password).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(invalid_credentials()),
        Err(e) => {
            tracing::error!("❌ Login lookup failed: {}", e);
            return Err(invalid_credentials());
        }
    };

    let cookie = session.start(user.id, &user.email, &user.username).await?;
    cookies.add(cookie);

    tracing::info!("✅ User logged in: {}", user.id);

    let message = format!("Hello {}!", session.username().unwrap_or_default());
    Ok((StatusCode::OK, Json(AuthResponse::ok(message))).into_response())
}

fn invalid_credentials() -> AppError {
    AppError::Authentication("Invalid email or password!".to_string())
}

/// Handles user logout.
#[axum::debug_handler(state = AppState)]
pub async fn logout(mut session: SessionContext, cookies: Cookies) -> Result<Response> {
    tracing::info!("👋 Logout for: {}", session.email().unwrap_or_default());
    let username = session.username().unwrap_or_default();
    let expired = session.end().await?;
    cookies.add(expired);

    let response = AuthResponse::ok(format!("Bye {}!", username));
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// The landing page for logged-in users.
#[axum::debug_handler(state = AppState)]
pub async fn home(session: SessionContext) -> Result<Json<AuthResponse>> {
    session.require_authenticated()?;
    let username = session.username().unwrap_or_default();
    Ok(Json(AuthResponse::ok(format!("Hey, still there {}?", username))))
}
