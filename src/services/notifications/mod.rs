pub mod log;
pub mod webhook;

use async_trait::async_trait;

use crate::models::{BookingEvent, BookingSummary};

/// Delivery side of booking notifications. Callers only promise to invoke
/// these after the booking write has succeeded.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_new_booking(
        &self,
        recipient_user_id: &str,
        booking: &BookingSummary,
    ) -> anyhow::Result<()>;

    async fn notify_booking_status_change(
        &self,
        customer_user_id: &str,
        provider_user_id: &str,
        booking: &BookingSummary,
        event: BookingEvent,
    ) -> anyhow::Result<()>;
}
