use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::AppError;
use crate::handlers::extract::ValidatedJson;
use crate::models::{Actor, PaymentMethod};
use crate::services::commission::{self, CommissionBreakdown};
use crate::services::payments::{
    EarningsSummary, PaymentMethodUpdate, PaymentMethods, PaymentReceipt, WithdrawalReceipt,
};
use crate::state::AppState;

// POST /api/v1/payments/payment-method
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub account_number: Option<String>,
    pub ifsc_code: Option<String>,
    pub account_holder_name: Option<String>,
    pub bank_name: Option<String>,
    pub upi_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetPaymentMethodRequest {
    #[validate(length(min = 1, message = "payment method is required"))]
    pub method: String,
    #[serde(default)]
    pub details: PaymentDetails,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPaymentMethodResponse {
    message: &'static str,
    payment_method: PaymentMethod,
}

pub async fn set_payment_method(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(body): ValidatedJson<SetPaymentMethodRequest>,
) -> Result<Json<SetPaymentMethodResponse>, AppError> {
    let details = body.details;
    let update = match PaymentMethod::parse(&body.method) {
        Some(PaymentMethod::Bank) => PaymentMethodUpdate::Bank {
            account_number: details.account_number,
            ifsc_code: details.ifsc_code,
            account_holder_name: details.account_holder_name,
            bank_name: details.bank_name,
        },
        Some(PaymentMethod::Upi) => PaymentMethodUpdate::Upi {
            upi_id: details.upi_id,
        },
        None => return Err(AppError::field("method", "invalid payment method")),
    };

    let payment_method = state.payments().set_payment_method(&actor, update)?;
    Ok(Json(SetPaymentMethodResponse {
        message: "Payment method updated successfully",
        payment_method,
    }))
}

// GET /api/v1/payments/payment-methods
pub async fn get_payment_methods(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<PaymentMethods>, AppError> {
    Ok(Json(state.payments().payment_methods(&actor)?))
}

// POST /api/v1/payments/calculate-commission
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRequest {
    pub booking_amount: f64,
}

pub async fn calculate_commission(
    _actor: Actor,
    ValidatedJson(body): ValidatedJson<CommissionRequest>,
) -> Result<Json<CommissionBreakdown>, AppError> {
    if body.booking_amount.is_nan() || body.booking_amount <= 0.0 {
        return Err(AppError::field("bookingAmount", "invalid booking amount"));
    }
    Ok(Json(commission::breakdown(body.booking_amount)))
}

// POST /api/v1/payments/process-payment
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    #[validate(length(min = 1, message = "bookingId is required"))]
    pub booking_id: String,
    pub booking_amount: f64,
    #[serde(default)]
    pub work_completed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentResponse {
    message: &'static str,
    payment_details: PaymentReceipt,
}

pub async fn process_payment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(body): ValidatedJson<ProcessPaymentRequest>,
) -> Result<Json<ProcessPaymentResponse>, AppError> {
    let payment_details = state.payments().process_payment(
        &actor,
        &body.booking_id,
        body.booking_amount,
        body.work_completed,
    )?;

    Ok(Json(ProcessPaymentResponse {
        message: "Payment processed successfully",
        payment_details,
    }))
}

// POST /api/v1/payments/request-withdrawal
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub amount: f64,
    pub payment_method: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalResponse {
    message: &'static str,
    withdrawal_request: WithdrawalReceipt,
}

pub async fn request_withdrawal(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    ValidatedJson(body): ValidatedJson<WithdrawalRequest>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let method = PaymentMethod::parse(&body.payment_method)
        .ok_or_else(|| AppError::field("paymentMethod", "invalid payment method"))?;

    let withdrawal_request = state
        .payments()
        .request_withdrawal(&actor, body.amount, method)?;

    Ok(Json(WithdrawalResponse {
        message: "Withdrawal request submitted successfully",
        withdrawal_request,
    }))
}

// GET /api/v1/payments/earnings-summary
pub async fn earnings_summary(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<EarningsSummary>, AppError> {
    Ok(Json(state.payments().earnings_summary(&actor)?))
}
