use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    handlers::users::ExistsResponse,
    models::interest::Interest,
    state::AppState,
};

/// The request payload for creating or renaming an interest.
#[derive(Deserialize)]
pub struct InterestRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct InterestResponse {
    pub success: bool,
}

#[derive(Deserialize)]
pub struct NameQuery {
    pub name: String,
}

/// Whether an interest with the given name already exists.
pub async fn exists(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Result<Json<ExistsResponse>> {
    let response = state.interests.exists(&query.name).await?;
    Ok(Json(ExistsResponse { response }))
}

pub async fn list_interests(State(state): State<AppState>) -> Result<Json<Vec<Interest>>> {
    Ok(Json(state.interests.get_all_interests().await?))
}

pub async fn get_interest(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Interest>> {
    let interest = state.interests.get_by_id(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(interest))
}

pub async fn create_interest(
    State(state): State<AppState>,
    Json(payload): Json<InterestRequest>,
) -> Result<(StatusCode, Json<InterestResponse>)> {
    let success = state.interests.create(&payload.name).await?;
    Ok((StatusCode::CREATED, Json(InterestResponse { success })))
}

pub async fn update_interest(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<InterestRequest>,
) -> Result<Json<InterestResponse>> {
    if !state.interests.update(id, &payload.name).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(InterestResponse { success: true }))
}

pub async fn delete_interest(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<InterestResponse>> {
    if !state.interests.delete(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!("🗑️ Interest {} deleted", id);
    Ok(Json(InterestResponse { success: true }))
}
