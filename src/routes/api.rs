// Handlers for backend API endpoints

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use serde_json::json;
use std::collections::HashMap;

use crate::{auth::OptionalActor, error::AppError, filters::EntityRef, AppState};

// --- API Handlers ---

pub async fn search_listings(
    State(app_state): State<AppState>,
    OptionalActor(actor): OptionalActor,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        "API call: search_listings with {} params (user: {:?})",
        params.len(),
        actor.as_ref().map(|a| a.id.as_str())
    );
    let response = app_state.engine.search(&params, actor.as_ref()).await?;
    Ok(Json(response))
}

pub async fn get_facets(
    State(app_state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("API call: get_facets with {} params", params.len());
    let facets = app_state.engine.facets(&params).await?;
    Ok(Json(facets))
}

pub async fn get_brands(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    tracing::info!("API call: get_brands");
    let brands = app_state.engine.brands().await?;
    Ok(Json(brands))
}

pub async fn get_active_brands(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("API call: get_active_brands");
    let brands = app_state.engine.active_brands().await?;
    Ok(Json(brands))
}

pub async fn get_models(
    State(app_state): State<AppState>,
    Path(brand): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("API call: get_models for brand: {}", brand);
    let not_found = || AppError::NotFound(format!("Brand '{}' not found", brand));

    let reference = EntityRef::from_param(&brand).ok_or_else(not_found)?;
    let models = app_state
        .engine
        .models_for_brand(&reference)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(models))
}

pub async fn get_stats(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let stats = app_state.engine.stats().await?;
    Ok(Json(stats))
}

pub async fn get_options(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(app_state.engine.options())
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
