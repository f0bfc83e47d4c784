use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::queries::{self, Owner};
use crate::db;
use crate::errors::AppError;
use crate::models::{
    Actor, BankDetails, BookingStatus, Role, PaymentMethod, Provider, WithdrawalEntry,
    WithdrawalStatus,
};
use crate::services::commission;

pub const MINIMUM_WITHDRAWAL: f64 = 50.0;
pub const WITHDRAWAL_PROCESSING_TIME: &str = "2-3 business days";
const RECENT_TRANSACTIONS: usize = 10;

/// Payout configuration submitted by a provider.
#[derive(Debug, Clone)]
pub enum PaymentMethodUpdate {
    Bank {
        account_number: Option<String>,
        ifsc_code: Option<String>,
        account_holder_name: Option<String>,
        bank_name: Option<String>,
    },
    Upi {
        upi_id: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedBankDetails {
    pub account_number: String,
    pub ifsc_code: String,
    pub account_holder_name: String,
    pub bank_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentMethods {
    pub bank: Option<MaskedBankDetails>,
    pub upi: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub booking_id: String,
    pub total_amount: f64,
    pub commission: f64,
    pub provider_earnings: f64,
    pub transaction_id: String,
    pub status: WithdrawalStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalReceipt {
    pub transaction_id: String,
    pub amount: f64,
    pub status: WithdrawalStatus,
    pub estimated_processing_time: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfiguredMethods {
    pub bank: bool,
    pub upi: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsSummary {
    pub total_earnings: f64,
    pub platform_fees: f64,
    pub net_earnings: f64,
    pub this_month_earnings: f64,
    pub completed_bookings: i64,
    pub average_earnings_per_booking: f64,
    pub recent_transactions: Vec<WithdrawalEntry>,
    pub payment_methods: ConfiguredMethods,
}

/// Provider-side money operations. Nothing here talks to a payment rail;
/// it only keeps the provider's ledger.
pub struct PaymentService {
    db: Arc<Mutex<Connection>>,
}

impl PaymentService {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn provider_for(conn: &Connection, actor: &Actor) -> Result<Provider, AppError> {
        actor.require_role(Role::Provider)?;
        queries::get_provider_by_user(conn, &actor.user_id)?
            .ok_or_else(|| AppError::NotFound("provider profile not found".to_string()))
    }

    pub fn set_payment_method(
        &self,
        actor: &Actor,
        update: PaymentMethodUpdate,
    ) -> Result<PaymentMethod, AppError> {
        let conn = db::lock(&self.db)?;
        let provider = Self::provider_for(&conn, actor)?;

        let method = match update {
            PaymentMethodUpdate::Bank {
                account_number,
                ifsc_code,
                account_holder_name,
                bank_name,
            } => {
                let (Some(account_number), Some(ifsc_code), Some(account_holder_name)) = (
                    non_empty(account_number),
                    non_empty(ifsc_code),
                    non_empty(account_holder_name),
                ) else {
                    return Err(AppError::field("details", "bank details incomplete"));
                };
                let bank = BankDetails {
                    account_number,
                    ifsc_code,
                    account_holder_name,
                    bank_name: bank_name.unwrap_or_default(),
                };
                queries::save_bank_details(&conn, &provider.id, &bank)?;
                PaymentMethod::Bank
            }
            PaymentMethodUpdate::Upi { upi_id } => {
                let Some(upi_id) = non_empty(upi_id) else {
                    return Err(AppError::field("details", "UPI ID is required"));
                };
                if !upi_id.contains('@') {
                    return Err(AppError::field("details", "invalid UPI ID format"));
                }
                queries::save_upi_id(&conn, &provider.id, &upi_id)?;
                PaymentMethod::Upi
            }
        };

        tracing::info!(provider_id = %provider.id, method = %method, "payment method updated");
        Ok(method)
    }

    pub fn payment_methods(&self, actor: &Actor) -> Result<PaymentMethods, AppError> {
        let conn = db::lock(&self.db)?;
        let provider = Self::provider_for(&conn, actor)?;

        Ok(PaymentMethods {
            bank: provider.bank_details.as_ref().map(|b| MaskedBankDetails {
                account_number: b.masked_account_number(),
                ifsc_code: b.ifsc_code.clone(),
                account_holder_name: b.account_holder_name.clone(),
                bank_name: b.bank_name.clone(),
            }),
            upi: provider.upi_id,
        })
    }

    /// Credits a completed booking's earnings to the provider. Each booking
    /// can be paid out once, and only for its settled total.
    pub fn process_payment(
        &self,
        actor: &Actor,
        booking_id: &str,
        booking_amount: f64,
        work_completed: bool,
    ) -> Result<PaymentReceipt, AppError> {
        if !(booking_amount > 0.0) {
            return Err(AppError::field("bookingAmount", "invalid booking amount"));
        }
        if !work_completed {
            return Err(AppError::field("workCompleted", "work must be completed before payment"));
        }

        let mut conn = db::lock(&self.db)?;
        let provider = Self::provider_for(&conn, actor)?;

        let booking = queries::find_booking(&conn, booking_id, Owner::Provider(&provider.id))?
            .ok_or_else(AppError::booking_not_found)?;
        if booking.status != BookingStatus::Completed || booking.paid_at.is_some() {
            return Err(already_paid_or_unfinished(booking.status));
        }
        let settled = booking.final_amount.unwrap_or(booking.amount) as f64 / 100.0;
        if (booking_amount - settled).abs() >= 0.01 {
            return Err(AppError::field(
                "bookingAmount",
                format!("bookingAmount does not match the booking total of {settled:.2}"),
            ));
        }

        let quote = commission::breakdown(booking_amount);
        let (commission, earnings) = (quote.commission, quote.provider_earnings);
        let now = Utc::now().naive_utc();
        let entry = WithdrawalEntry {
            amount: earnings,
            date: now,
            status: WithdrawalStatus::Completed,
            transaction_id: transaction_id("TXN", &now),
            payment_method: None,
        };

        let tx = conn.transaction()?;
        if !queries::mark_booking_paid(&tx, booking_id, &provider.id, &now)? {
            return Err(already_paid_or_unfinished(booking.status));
        }
        queries::credit_provider_earnings(&tx, &provider.id, earnings, commission)?;
        queries::insert_withdrawal(&tx, &provider.id, &entry)?;
        tx.commit()?;

        tracing::info!(
            booking_id,
            provider_id = %provider.id,
            amount = booking_amount,
            commission,
            earnings,
            transaction_id = %entry.transaction_id,
            "payment processed"
        );

        Ok(PaymentReceipt {
            booking_id: booking_id.to_string(),
            total_amount: booking_amount,
            commission,
            provider_earnings: earnings,
            transaction_id: entry.transaction_id,
            status: entry.status,
        })
    }

    pub fn request_withdrawal(
        &self,
        actor: &Actor,
        amount: f64,
        method: PaymentMethod,
    ) -> Result<WithdrawalReceipt, AppError> {
        let conn = db::lock(&self.db)?;
        let provider = Self::provider_for(&conn, actor)?;

        validate_withdrawal(&provider, amount, method)?;

        let now = Utc::now().naive_utc();
        let entry = WithdrawalEntry {
            amount,
            date: now,
            status: WithdrawalStatus::Pending,
            transaction_id: transaction_id("WD", &now),
            payment_method: Some(method),
        };
        queries::insert_withdrawal(&conn, &provider.id, &entry)?;

        tracing::info!(
            provider_id = %provider.id,
            amount,
            method = %method,
            transaction_id = %entry.transaction_id,
            "withdrawal requested"
        );

        Ok(WithdrawalReceipt {
            transaction_id: entry.transaction_id,
            amount,
            status: WithdrawalStatus::Pending,
            estimated_processing_time: WITHDRAWAL_PROCESSING_TIME,
        })
    }

    pub fn earnings_summary(&self, actor: &Actor) -> Result<EarningsSummary, AppError> {
        let conn = db::lock(&self.db)?;
        let provider = Self::provider_for(&conn, actor)?;
        let history = queries::get_withdrawal_history(&conn, &provider.id)?;
        Ok(summarize(&provider, history, Utc::now().naive_utc()))
    }
}

/// Checks run in order: positive amount, minimum, balance, payout method.
pub fn validate_withdrawal(
    provider: &Provider,
    amount: f64,
    method: PaymentMethod,
) -> Result<(), AppError> {
    if !(amount > 0.0) {
        return Err(AppError::field("amount", "invalid withdrawal amount"));
    }
    if amount < MINIMUM_WITHDRAWAL {
        return Err(AppError::field(
            "amount",
            format!("minimum withdrawal amount is {MINIMUM_WITHDRAWAL}"),
        ));
    }

    let available = provider.available_balance();
    if amount > available {
        return Err(AppError::InsufficientBalance {
            available,
            requested: amount,
        });
    }

    if !provider.has_method_configured(method) {
        let message = match method {
            PaymentMethod::Bank => "bank details not configured",
            PaymentMethod::Upi => "UPI ID not configured",
        };
        return Err(AppError::field("paymentMethod", message));
    }

    Ok(())
}

pub fn summarize(provider: &Provider, mut history: Vec<WithdrawalEntry>, now: NaiveDateTime) -> EarningsSummary {
    let net_earnings = provider.total_earnings - provider.platform_fees;

    let month_start = now
        .date()
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(now);
    let this_month_earnings = history
        .iter()
        .filter(|w| w.status == WithdrawalStatus::Completed && w.date >= month_start)
        .map(|w| w.amount)
        .sum();

    let average_earnings_per_booking = if provider.completed_bookings > 0 {
        (net_earnings / provider.completed_bookings as f64 * 100.0).round() / 100.0
    } else {
        0.0
    };

    // Newest first; on equal timestamps the later ledger entry wins.
    history.reverse();
    history.sort_by(|a, b| b.date.cmp(&a.date));
    history.truncate(RECENT_TRANSACTIONS);

    EarningsSummary {
        total_earnings: provider.total_earnings,
        platform_fees: provider.platform_fees,
        net_earnings,
        this_month_earnings,
        completed_bookings: provider.completed_bookings,
        average_earnings_per_booking,
        recent_transactions: history,
        payment_methods: ConfiguredMethods {
            bank: provider.has_method_configured(PaymentMethod::Bank),
            upi: provider.has_method_configured(PaymentMethod::Upi),
        },
    }
}

fn already_paid_or_unfinished(current: BookingStatus) -> AppError {
    AppError::InvalidTransition {
        action: "process payment for",
        current,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn transaction_id(prefix: &str, now: &NaiveDateTime) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!("{prefix}-{}-{suffix}", now.and_utc().timestamp_millis())
}
