use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::{
    error::{AppError, Result},
    models::user::User,
    repositories::user::avatar_url,
    services::session::SessionContext,
    state::AppState,
    validation::auth::validate_profile,
};

#[derive(Deserialize)]
pub struct ExistsQuery {
    pub email: String,
}

/// `{"response": bool}`, the shape the registration form polls for.
#[derive(Serialize)]
pub struct ExistsResponse {
    pub response: bool,
}

/// The request payload for editing the logged-in user's profile.
#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn current_user_id(session: &SessionContext) -> Result<i64> {
    session.user_id().ok_or(AppError::Unauthenticated)
}

/// Whether an account already uses the given email.
pub async fn exists(
    State(state): State<AppState>,
    Query(query): Query<ExistsQuery>,
) -> Result<Json<ExistsResponse>> {
    let response = state.users.exists(&query.email).await?;
    Ok(Json(ExistsResponse { response }))
}

/// The logged-in user's own record.
#[axum::debug_handler]
pub async fn me(State(state): State<AppState>, session: SessionContext) -> Result<Json<User>> {
    let id = current_user_id(&session)?;
    let user = state.users.get(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(user))
}

/// Changes the logged-in user's username and email.
///
/// The avatar follows the new username, and the session is reissued so it
/// carries the new identity.
#[axum::debug_handler]
pub async fn update_me(
    State(state): State<AppState>,
    mut session: SessionContext,
    cookies: Cookies,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    let id = current_user_id(&session)?;
    validate_profile(&payload.username, &payload.email)?;

    let mut user = state.users.get(id).await?.ok_or(AppError::NotFound)?;
    user.avatar = avatar_url(&payload.username)?;
    user.username = payload.username;
    user.email = payload.email;

    if !state.users.update(&user).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!("✏️ Profile updated for user: {}", id);

    let cookie = session.start(user.id, &user.email, &user.username).await?;
    cookies.add(cookie);
    Ok(Json(user))
}

/// Deletes the logged-in user's account and ends the session.
#[axum::debug_handler]
pub async fn delete_me(
    State(state): State<AppState>,
    mut session: SessionContext,
    cookies: Cookies,
) -> Result<Json<SuccessResponse>> {
    let id = current_user_id(&session)?;
    let deleted = state.users.delete(id).await?;
    cookies.add(session.end().await?);

    if !deleted {
        return Err(AppError::NotFound);
    }
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    Ok(Json(state.users.get_all().await?))
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<User>> {
    let user = state.users.get(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(user))
}

/// Tags the logged-in user with an interest.
#[axum::debug_handler]
pub async fn add_interest(
    State(state): State<AppState>,
    session: SessionContext,
    Path(interest_id): Path<i64>,
) -> Result<(StatusCode, Json<SuccessResponse>)> {
    let user_id = current_user_id(&session)?;
    let success = state.users.add_interest(user_id, interest_id).await?;
    tracing::info!("🏷️ User {} tagged with interest {}", user_id, interest_id);
    Ok((StatusCode::CREATED, Json(SuccessResponse { success })))
}

#[axum::debug_handler]
pub async fn remove_interest(
    State(state): State<AppState>,
    session: SessionContext,
    Path(interest_id): Path<i64>,
) -> Result<Json<SuccessResponse>> {
    let user_id = current_user_id(&session)?;
    if !state.users.remove_interest(user_id, interest_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(SuccessResponse { success: true }))
}
