use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::db;
use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::check_admin;
use crate::handlers::bookings::ListQuery;
use crate::handlers::extract::{OptionalValidatedJson, ValidatedJson};
use crate::models::{Booking, Provider};
use crate::state::AppState;

const DEFAULT_ADMIN_LIMIT: i64 = 50;

fn provider_not_found() -> AppError {
    AppError::NotFound("provider not found".to_string())
}

// POST /api/v1/admin/providers
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProviderRequest {
    #[validate(length(min = 1, message = "userId is required"))]
    pub user_id: String,
    #[validate(length(min = 1, message = "category is required"))]
    pub category: String,
    #[serde(default)]
    pub description: String,
}

pub async fn create_provider(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<CreateProviderRequest>,
) -> Result<(StatusCode, Json<Provider>), AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let provider = Provider::new(
        Uuid::new_v4().to_string(),
        body.user_id,
        body.category,
        body.description,
        Utc::now().naive_utc(),
    );

    {
        let conn = db::lock(&state.db)?;
        if queries::get_provider_by_user(&conn, &provider.user_id)?.is_some() {
            return Err(AppError::Conflict(
                "user already has a provider profile".to_string(),
            ));
        }
        queries::insert_provider(&conn, &provider)?;
    }

    tracing::info!(provider_id = %provider.id, user_id = %provider.user_id, "provider profile created");
    Ok((StatusCode::CREATED, Json(provider)))
}

// GET /api/v1/admin/providers/:id
pub async fn get_provider(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Provider>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let conn = db::lock(&state.db)?;
    let provider = queries::get_provider(&conn, &id)?.ok_or_else(provider_not_found)?;
    Ok(Json(provider))
}

// POST /api/v1/admin/providers/:id/verify
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    #[serde(default = "default_true")]
    pub verified: bool,
}

impl Default for VerifyRequest {
    fn default() -> Self {
        VerifyRequest { verified: true }
    }
}

fn default_true() -> bool {
    true
}

pub async fn verify_provider(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    OptionalValidatedJson(body): OptionalValidatedJson<VerifyRequest>,
) -> Result<Json<Provider>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;
    let verified = body.verified;

    let conn = db::lock(&state.db)?;
    if !queries::set_provider_verified(&conn, &id, verified)? {
        return Err(provider_not_found());
    }
    tracing::info!(provider_id = %id, verified = verified, "provider verification changed");

    let provider = queries::get_provider(&conn, &id)?.ok_or_else(provider_not_found)?;
    Ok(Json(provider))
}

// POST /api/v1/admin/providers/:id/availability
#[derive(Debug, Deserialize, Validate)]
pub struct AvailabilityRequest {
    pub available: bool,
}

pub async fn set_availability(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<AvailabilityRequest>,
) -> Result<Json<Provider>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let conn = db::lock(&state.db)?;
    if !queries::set_provider_available(&conn, &id, body.available)? {
        return Err(provider_not_found());
    }
    tracing::info!(provider_id = %id, available = body.available, "provider availability changed");

    let provider = queries::get_provider(&conn, &id)?.ok_or_else(provider_not_found)?;
    Ok(Json(provider))
}

// GET /api/v1/admin/bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let (status, limit) = query.parse(DEFAULT_ADMIN_LIMIT)?;
    Ok(Json(state.bookings().list_all(status, limit)?))
}
