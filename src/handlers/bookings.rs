use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::AppError;
use crate::handlers::extract::{OptionalValidatedJson, ValidatedJson};
use crate::models::{
    Actor, Booking, BookingStatus, Coordinates, NewBooking, RequestedUrgency, Urgency,
};
use crate::services::bookings::Acceptance;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 100;

// POST /api/v1/bookings/create
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[validate(length(min = 1, message = "workerId is required"))]
    pub worker_id: String,
    #[validate(length(min = 1, message = "serviceType is required"))]
    pub service_type: String,
    #[validate(length(min = 1, message = "serviceCategory is required"))]
    pub service_category: String,
    #[validate(length(min = 1, message = "duration is required"))]
    pub duration: String,
    #[validate(range(min = 1.0, message = "durationValue must be at least 1"))]
    pub duration_value: f64,
    #[validate(length(min = 1, message = "location is required"))]
    pub location: String,
    pub coordinates: Coordinates,
    #[validate(length(min = 1, message = "timeSlot is required"))]
    pub time_slot: String,
    #[validate(length(min = 1, message = "date is required"))]
    pub date: String,
    #[serde(default)]
    pub urgency: RequestedUrgency,
    #[serde(default)]
    pub skill_tags: Vec<String>,
    pub special_requirements: Option<String>,
    #[serde(default)]
    pub insurance_required: bool,
    #[serde(default)]
    pub background_check_required: bool,
    #[validate(range(min = 0.0, message = "totalPrice cannot be negative"))]
    pub total_price: f64,
    #[validate(range(min = 0.0, message = "basePrice cannot be negative"))]
    pub base_price: f64,
    #[validate(range(min = 1.0, message = "surgeMultiplier must be at least 1"))]
    pub surge_multiplier: f64,
    #[validate(range(min = 0.0, message = "insuranceCost cannot be negative"))]
    pub insurance_cost: f64,
}

impl CreateBookingRequest {
    fn into_new_booking(self) -> Result<NewBooking, AppError> {
        let preferred_date = parse_date(&self.date).ok_or_else(|| AppError::field("date", "invalid date"))?;
        let description = self
            .special_requirements
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("{} service", self.service_category));

        Ok(NewBooking {
            provider_id: self.worker_id,
            service_type: self.service_type,
            description,
            preferred_date,
            preferred_time: self.time_slot,
            urgency: self.urgency.to_stored(),
            budget: None,
            address: self.location,
            contact_phone: None,
            service_category: Some(self.service_category),
            duration: Some(self.duration),
            duration_value: Some(self.duration_value),
            coordinates: Some(self.coordinates),
            skill_tags: self.skill_tags,
            insurance_required: self.insurance_required,
            background_check_required: self.background_check_required,
            base_price: Some(to_minor_units(self.base_price)),
            surge_multiplier: self.surge_multiplier,
            insurance_cost: to_minor_units(self.insurance_cost),
            amount: to_minor_units(self.total_price),
            currency: "inr".to_string(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingResponse {
    booking_id: String,
    message: &'static str,
    booking: Booking,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(body): ValidatedJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreateBookingResponse>), AppError> {
    let booking = state.bookings().create(&actor, body.into_new_booking()?).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            booking_id: booking.id.clone(),
            message: "Booking created successfully",
            booking,
        }),
    ))
}

// POST /api/v1/bookings
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCreateBookingRequest {
    #[validate(length(min = 1, message = "providerId is required"))]
    pub provider_id: String,
    #[validate(length(min = 1, message = "serviceType is required"))]
    pub service_type: String,
    #[validate(length(min = 10, message = "description must be at least 10 characters"))]
    pub description: String,
    #[validate(length(min = 1, message = "preferredDate is required"))]
    pub preferred_date: String,
    #[validate(length(min = 1, message = "preferredTime is required"))]
    pub preferred_time: String,
    #[serde(default)]
    pub urgency: Urgency,
    pub budget: Option<f64>,
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "contactPhone is required"))]
    pub contact_phone: String,
    #[serde(default = "default_legacy_amount")]
    pub amount: i64,
    #[serde(default = "default_legacy_currency")]
    pub currency: String,
}

fn default_legacy_amount() -> i64 {
    5000
}

fn default_legacy_currency() -> String {
    "usd".to_string()
}

impl LegacyCreateBookingRequest {
    fn into_new_booking(self) -> Result<NewBooking, AppError> {
        let preferred_date = parse_date(&self.preferred_date)
            .ok_or_else(|| AppError::field("preferredDate", "invalid date"))?;

        Ok(NewBooking {
            provider_id: self.provider_id,
            service_type: self.service_type,
            description: self.description,
            preferred_date,
            preferred_time: self.preferred_time,
            urgency: self.urgency,
            budget: self.budget,
            address: self.address,
            contact_phone: Some(self.contact_phone),
            service_category: None,
            duration: None,
            duration_value: None,
            coordinates: None,
            skill_tags: vec![],
            insurance_required: false,
            background_check_required: false,
            base_price: None,
            surge_multiplier: 1.0,
            insurance_cost: 0,
            amount: self.amount,
            currency: self.currency,
        })
    }
}

pub async fn create_booking_legacy(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(body): ValidatedJson<LegacyCreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.bookings().create(&actor, body.into_new_booking()?).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/v1/bookings/me and /api/v1/bookings/provider/me
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

impl ListQuery {
    /// Status filter and limit. An unknown status is a validation error
    /// rather than an empty result.
    pub fn parse(&self, default_limit: i64) -> Result<(Option<BookingStatus>, i64), AppError> {
        let status = match self.status.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(
                BookingStatus::parse(s)
                    .ok_or_else(|| AppError::field("status", format!("unknown status: {s}")))?,
            ),
            None => None,
        };
        let limit = self.limit.filter(|l| *l > 0).unwrap_or(default_limit);
        Ok((status, limit))
    }
}

pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let (status, limit) = query.parse(DEFAULT_LIST_LIMIT)?;
    Ok(Json(state.bookings().list_for_customer(&actor, status, limit)?))
}

pub async fn provider_bookings(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let (status, limit) = query.parse(DEFAULT_LIST_LIMIT)?;
    Ok(Json(state.bookings().list_for_provider(&actor, status, limit)?))
}

// GET /api/v1/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings().get(&actor, &id)?))
}

// PATCH /api/v1/bookings/:id/accept
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRequest {
    pub provider_notes: Option<String>,
    pub estimated_duration: Option<String>,
    #[validate(range(min = 0, message = "finalAmount cannot be negative"))]
    pub final_amount: Option<i64>,
}

pub async fn accept_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    OptionalValidatedJson(body): OptionalValidatedJson<AcceptRequest>,
) -> Result<Json<Booking>, AppError> {
    let acceptance = Acceptance {
        provider_notes: body.provider_notes,
        estimated_duration: body.estimated_duration,
        final_amount: body.final_amount,
    };
    Ok(Json(state.bookings().accept(&actor, &id, acceptance).await?))
}

// PATCH /api/v1/bookings/:id/reject
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "rejection reason is required"))]
    pub rejection_reason: String,
}

pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<RejectRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(
        state
            .bookings()
            .reject(&actor, &id, body.rejection_reason)
            .await?,
    ))
}

// PATCH /api/v1/bookings/:id/start
pub async fn start_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings().start(&actor, &id).await?))
}

// PATCH /api/v1/bookings/:id/complete
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    #[validate(range(min = 0, message = "finalAmount cannot be negative"))]
    pub final_amount: Option<i64>,
}

pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    OptionalValidatedJson(body): OptionalValidatedJson<CompleteRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(
        state
            .bookings()
            .complete(&actor, &id, body.final_amount)
            .await?,
    ))
}

// PATCH /api/v1/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings().cancel(&actor, &id)?))
}

// PATCH /api/v1/bookings/:id/review
#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i64,
    #[validate(length(min = 1, max = 500, message = "review must be between 1 and 500 characters"))]
    pub review: String,
}

pub async fn review_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<ReviewRequest>,
) -> Result<Json<Booking>, AppError> {
    let rating = u8::try_from(body.rating).unwrap_or_default();
    Ok(Json(state.bookings().review(&actor, &id, rating, &body.review)?))
}

/// Accepts a bare `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request(urgency: &str) -> CreateBookingRequest {
        serde_json::from_value(serde_json::json!({
            "workerId": "prov-1",
            "serviceType": "Plumbing",
            "serviceCategory": "plumbing",
            "duration": "hours",
            "durationValue": 2,
            "location": "12 MG Road",
            "coordinates": {"lat": 12.97, "lng": 77.59},
            "timeSlot": "10:00",
            "date": "2025-06-20",
            "urgency": urgency,
            "totalPrice": 499.99,
            "basePrice": 400,
            "surgeMultiplier": 1.2,
            "insuranceCost": 20
        }))
        .unwrap()
    }

    #[test]
    fn test_prices_stored_in_minor_units() {
        let new = create_request("normal").into_new_booking().unwrap();
        assert_eq!(new.amount, 49999);
        assert_eq!(new.base_price, Some(40000));
        assert_eq!(new.insurance_cost, 2000);
        assert_eq!(new.currency, "inr");
    }

    #[test]
    fn test_description_falls_back_to_category() {
        let new = create_request("normal").into_new_booking().unwrap();
        assert_eq!(new.description, "plumbing service");
    }

    #[test]
    fn test_requested_urgency_is_mapped() {
        let new = create_request("emergency").into_new_booking().unwrap();
        assert_eq!(new.urgency, Urgency::High);
        let new = create_request("urgent").into_new_booking().unwrap();
        assert_eq!(new.urgency, Urgency::Normal);
        let new = create_request("normal").into_new_booking().unwrap();
        assert_eq!(new.urgency, Urgency::Low);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 6, 20);
        assert_eq!(parse_date("2025-06-20"), expected);
        assert_eq!(parse_date("2025-06-20T09:30:00Z"), expected);
        assert_eq!(parse_date("20/06/2025"), None);
    }

    #[test]
    fn test_validation_reports_bad_fields() {
        let mut request = create_request("normal");
        request.duration_value = 0.0;
        request.surge_multiplier = 0.5;
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("duration_value"));
        assert!(fields.contains_key("surge_multiplier"));
    }

    #[test]
    fn test_list_query_rejects_unknown_status() {
        let query = ListQuery {
            status: Some("archived".to_string()),
            limit: None,
        };
        assert!(query.parse(100).is_err());

        let query = ListQuery {
            status: Some("in_progress".to_string()),
            limit: Some(0),
        };
        assert_eq!(query.parse(100).unwrap(), (Some(BookingStatus::InProgress), 100));
    }
}
