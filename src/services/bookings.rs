use std::sync::{Arc, Mutex};

use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries::{self, Owner, TransitionUpdate};
use crate::db;
use crate::errors::AppError;
use crate::models::{
    Actor, Booking, BookingEvent, BookingStatus, BookingSummary, NewBooking, Role,
};
use crate::services::notifications::Notifier;
use crate::services::rating;

pub const MAX_REVIEW_CHARS: usize = 500;

/// Optional details a provider may attach when accepting.
#[derive(Debug, Clone, Default)]
pub struct Acceptance {
    pub provider_notes: Option<String>,
    pub estimated_duration: Option<String>,
    pub final_amount: Option<i64>,
}

/// A provider-side step through the lifecycle.
#[derive(Debug, Clone)]
enum ProviderAction {
    Accept(Acceptance),
    Reject { reason: String },
    Start,
    Complete { final_amount: Option<i64> },
}

impl ProviderAction {
    fn name(&self) -> &'static str {
        match self {
            ProviderAction::Accept(_) => "accept",
            ProviderAction::Reject { .. } => "reject",
            ProviderAction::Start => "start",
            ProviderAction::Complete { .. } => "complete",
        }
    }

    fn required_status(&self) -> BookingStatus {
        match self {
            ProviderAction::Accept(_) | ProviderAction::Reject { .. } => BookingStatus::Pending,
            ProviderAction::Start => BookingStatus::Accepted,
            ProviderAction::Complete { .. } => BookingStatus::InProgress,
        }
    }

    fn target_status(&self) -> BookingStatus {
        match self {
            ProviderAction::Accept(_) => BookingStatus::Accepted,
            ProviderAction::Reject { .. } => BookingStatus::Rejected,
            ProviderAction::Start => BookingStatus::InProgress,
            ProviderAction::Complete { .. } => BookingStatus::Completed,
        }
    }

    fn event(&self) -> BookingEvent {
        match self {
            ProviderAction::Accept(_) => BookingEvent::Accepted,
            ProviderAction::Reject { .. } => BookingEvent::Rejected,
            ProviderAction::Start => BookingEvent::Started,
            ProviderAction::Complete { .. } => BookingEvent::Completed,
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        match self {
            ProviderAction::Reject { reason } if reason.trim().is_empty() => Err(
                AppError::field("rejectionReason", "rejection reason is required"),
            ),
            ProviderAction::Accept(Acceptance {
                final_amount: Some(amount),
                ..
            })
            | ProviderAction::Complete {
                final_amount: Some(amount),
            } if *amount < 0 => Err(AppError::field(
                "finalAmount",
                "final amount must not be negative",
            )),
            _ => Ok(()),
        }
    }

    /// The conditional write for this action against `current`.
    fn update_for<'a>(
        &'a self,
        current: &'a Booking,
        provider_id: &'a str,
        now: NaiveDateTime,
    ) -> TransitionUpdate<'a> {
        let mut update = TransitionUpdate::new(
            &current.id,
            Owner::Provider(provider_id),
            self.required_status(),
            self.target_status(),
            current.version,
            now,
        );

        match self {
            ProviderAction::Accept(acceptance) => {
                update.provider_notes = acceptance.provider_notes.as_deref();
                update.estimated_duration = acceptance.estimated_duration.as_deref();
                update.final_amount = acceptance.final_amount;
            }
            ProviderAction::Reject { reason } => {
                update.rejection_reason = Some(reason.as_str());
            }
            ProviderAction::Start => {}
            ProviderAction::Complete { final_amount } => {
                // An omitted final amount settles at the originally quoted price.
                update.final_amount = Some(final_amount.unwrap_or(current.amount));
            }
        }

        update
    }
}

/// Booking lifecycle operations. Every mutation is one conditional write;
/// notifications go out afterwards and never undo it.
pub struct BookingService {
    db: Arc<Mutex<Connection>>,
    notifier: Arc<dyn Notifier>,
}

impl BookingService {
    pub fn new(db: Arc<Mutex<Connection>>, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    pub async fn create(&self, actor: &Actor, new: NewBooking) -> Result<Booking, AppError> {
        actor.require_role(Role::User)?;

        let (booking, provider_user_id) = {
            let conn = db::lock(&self.db)?;

            let provider = queries::get_provider(&conn, &new.provider_id)?
                .ok_or_else(|| AppError::NotFound("provider not found".to_string()))?;
            if !provider.verified {
                return Err(AppError::DependencyUnavailable(
                    "provider is not verified yet".to_string(),
                ));
            }
            if !provider.available {
                return Err(AppError::DependencyUnavailable(
                    "provider is currently unavailable".to_string(),
                ));
            }

            let booking = Booking::new(
                Uuid::new_v4().to_string(),
                actor.user_id.clone(),
                new,
                Utc::now().naive_utc(),
            );
            queries::insert_booking(&conn, &booking)?;
            (booking, provider.user_id)
        };

        tracing::info!(
            booking_id = %booking.id,
            user_id = %booking.user_id,
            provider_id = %booking.provider_id,
            urgency = booking.urgency.as_str(),
            "booking created"
        );

        let summary = BookingSummary::for_new_booking(&booking);
        if let Err(e) = self
            .notifier
            .notify_new_booking(&provider_user_id, &summary)
            .await
        {
            tracing::warn!(error = %e, booking_id = %booking.id, "new booking notification failed");
        }

        Ok(booking)
    }

    pub async fn accept(
        &self,
        actor: &Actor,
        booking_id: &str,
        acceptance: Acceptance,
    ) -> Result<Booking, AppError> {
        self.provider_step(actor, booking_id, ProviderAction::Accept(acceptance))
            .await
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        booking_id: &str,
        reason: String,
    ) -> Result<Booking, AppError> {
        self.provider_step(actor, booking_id, ProviderAction::Reject { reason })
            .await
    }

    pub async fn start(&self, actor: &Actor, booking_id: &str) -> Result<Booking, AppError> {
        self.provider_step(actor, booking_id, ProviderAction::Start).await
    }

    pub async fn complete(
        &self,
        actor: &Actor,
        booking_id: &str,
        final_amount: Option<i64>,
    ) -> Result<Booking, AppError> {
        self.provider_step(actor, booking_id, ProviderAction::Complete { final_amount })
            .await
    }

    async fn provider_step(
        &self,
        actor: &Actor,
        booking_id: &str,
        action: ProviderAction,
    ) -> Result<Booking, AppError> {
        actor.require_role(Role::Provider)?;
        action.validate()?;

        let (booking, provider_user_id) = {
            let conn = db::lock(&self.db)?;

            // No provider profile reads the same as a booking that isn't theirs.
            let provider = queries::get_provider_by_user(&conn, &actor.user_id)?
                .ok_or_else(AppError::booking_not_found)?;
            let owner = Owner::Provider(&provider.id);

            let current = queries::find_booking(&conn, booking_id, owner)?
                .ok_or_else(AppError::booking_not_found)?;
            if current.status != action.required_status() {
                return Err(AppError::InvalidTransition {
                    action: action.name(),
                    current: current.status,
                });
            }

            let update = action.update_for(&current, &provider.id, Utc::now().naive_utc());
            if !queries::apply_transition(&conn, &update)? {
                let latest = queries::find_booking(&conn, booking_id, owner)?
                    .ok_or_else(AppError::booking_not_found)?;
                tracing::warn!(
                    booking_id,
                    action = action.name(),
                    status = %latest.status,
                    "booking changed concurrently"
                );
                return Err(AppError::InvalidTransition {
                    action: action.name(),
                    current: latest.status,
                });
            }

            let updated = queries::find_booking(&conn, booking_id, owner)?
                .ok_or_else(AppError::booking_not_found)?;
            (updated, provider.user_id)
        };

        let event = action.event();
        tracing::info!(
            booking_id = %booking.id,
            status = %booking.status,
            version = booking.version,
            "booking {}",
            event
        );

        let summary = BookingSummary::for_event(&booking, event);
        if let Err(e) = self
            .notifier
            .notify_booking_status_change(&booking.user_id, &provider_user_id, &summary, event)
            .await
        {
            tracing::warn!(
                error = %e,
                booking_id = %booking.id,
                event = %event,
                "status change notification failed"
            );
        }

        Ok(booking)
    }

    /// Customer withdraws a request the provider has not answered yet.
    pub fn cancel(&self, actor: &Actor, booking_id: &str) -> Result<Booking, AppError> {
        actor.require_role(Role::User)?;

        let conn = db::lock(&self.db)?;
        let owner = Owner::Customer(&actor.user_id);

        let current = queries::find_booking(&conn, booking_id, owner)?
            .ok_or_else(AppError::booking_not_found)?;
        if current.status != BookingStatus::Pending {
            return Err(AppError::InvalidTransition {
                action: "cancel",
                current: current.status,
            });
        }

        let update = TransitionUpdate::new(
            booking_id,
            owner,
            BookingStatus::Pending,
            BookingStatus::Cancelled,
            current.version,
            Utc::now().naive_utc(),
        );
        if !queries::apply_transition(&conn, &update)? {
            let latest = queries::find_booking(&conn, booking_id, owner)?
                .ok_or_else(AppError::booking_not_found)?;
            return Err(AppError::InvalidTransition {
                action: "cancel",
                current: latest.status,
            });
        }

        let booking = queries::find_booking(&conn, booking_id, owner)?
            .ok_or_else(AppError::booking_not_found)?;
        tracing::info!(booking_id, "booking cancelled");
        Ok(booking)
    }

    /// Records the customer's one review and refreshes the provider's rating
    /// in the same transaction.
    pub fn review(
        &self,
        actor: &Actor,
        booking_id: &str,
        rating_value: u8,
        review: &str,
    ) -> Result<Booking, AppError> {
        actor.require_role(Role::User)?;
        validate_review(rating_value, review)?;

        let mut conn = db::lock(&self.db)?;
        let owner = Owner::Customer(&actor.user_id);

        let current = queries::find_booking(&conn, booking_id, owner)?
            .ok_or_else(AppError::booking_not_found)?;
        check_reviewable(&current)?;

        let tx = conn.transaction()?;
        if !queries::record_review(
            &tx,
            booking_id,
            &actor.user_id,
            rating_value,
            review,
            &Utc::now().naive_utc(),
        )? {
            let latest = queries::find_booking(&tx, booking_id, owner)?
                .ok_or_else(AppError::booking_not_found)?;
            check_reviewable(&latest)?;
            return Err(AppError::Conflict("booking changed while reviewing".to_string()));
        }
        let average = rating::recompute_provider_rating(&tx, &current.provider_id)?;
        let booking = queries::find_booking(&tx, booking_id, owner)?
            .ok_or_else(AppError::booking_not_found)?;
        tx.commit()?;

        tracing::info!(
            booking_id,
            provider_id = %booking.provider_id,
            rating = rating_value,
            provider_rating = ?average,
            "booking reviewed"
        );
        Ok(booking)
    }

    /// A single booking as the caller is allowed to see it.
    pub fn get(&self, actor: &Actor, booking_id: &str) -> Result<Booking, AppError> {
        let conn = db::lock(&self.db)?;

        let booking = match actor.role {
            Role::User => queries::find_booking(&conn, booking_id, Owner::Customer(&actor.user_id))?,
            Role::Provider => {
                let provider = queries::get_provider_by_user(&conn, &actor.user_id)?
                    .ok_or_else(AppError::booking_not_found)?;
                queries::find_booking(&conn, booking_id, Owner::Provider(&provider.id))?
            }
            Role::Admin => queries::get_booking_by_id(&conn, booking_id)?,
        };

        booking.ok_or_else(AppError::booking_not_found)
    }

    pub fn list_for_customer(
        &self,
        actor: &Actor,
        status: Option<BookingStatus>,
        limit: i64,
    ) -> Result<Vec<Booking>, AppError> {
        actor.require_role(Role::User)?;
        let conn = db::lock(&self.db)?;
        Ok(queries::list_bookings(
            &conn,
            Owner::Customer(&actor.user_id),
            status,
            limit,
        )?)
    }

    /// Bookings assigned to the caller's provider profile; empty when the
    /// caller has no profile yet.
    pub fn list_for_provider(
        &self,
        actor: &Actor,
        status: Option<BookingStatus>,
        limit: i64,
    ) -> Result<Vec<Booking>, AppError> {
        actor.require_role(Role::Provider)?;
        let conn = db::lock(&self.db)?;
        let Some(provider) = queries::get_provider_by_user(&conn, &actor.user_id)? else {
            return Ok(vec![]);
        };
        Ok(queries::list_bookings(
            &conn,
            Owner::Provider(&provider.id),
            status,
            limit,
        )?)
    }

    pub fn list_all(&self, status: Option<BookingStatus>, limit: i64) -> Result<Vec<Booking>, AppError> {
        let conn = db::lock(&self.db)?;
        Ok(queries::list_bookings(&conn, Owner::Anyone, status, limit)?)
    }
}

fn validate_review(rating: u8, review: &str) -> Result<(), AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::field("rating", "rating must be between 1 and 5"));
    }
    let chars = review.chars().count();
    if chars == 0 || chars > MAX_REVIEW_CHARS {
        return Err(AppError::field(
            "review",
            format!("review must be between 1 and {MAX_REVIEW_CHARS} characters"),
        ));
    }
    Ok(())
}

fn check_reviewable(booking: &Booking) -> Result<(), AppError> {
    if booking.status != BookingStatus::Completed {
        return Err(AppError::InvalidTransition {
            action: "review",
            current: booking.status,
        });
    }
    if booking.rating.is_some() {
        return Err(AppError::Conflict(
            "booking has already been reviewed".to_string(),
        ));
    }
    Ok(())
}
