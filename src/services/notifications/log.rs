use async_trait::async_trait;

use super::Notifier;
use crate::models::{BookingEvent, BookingSummary};

/// Writes notifications to the log only. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_new_booking(
        &self,
        recipient_user_id: &str,
        booking: &BookingSummary,
    ) -> anyhow::Result<()> {
        tracing::info!(
            recipient = recipient_user_id,
            booking_id = %booking.id,
            service_type = %booking.service_type,
            "new booking notification"
        );
        Ok(())
    }

    async fn notify_booking_status_change(
        &self,
        customer_user_id: &str,
        provider_user_id: &str,
        booking: &BookingSummary,
        event: BookingEvent,
    ) -> anyhow::Result<()> {
        tracing::info!(
            customer = customer_user_id,
            provider = provider_user_id,
            booking_id = %booking.id,
            event = %event,
            "booking status notification"
        );
        Ok(())
    }
}
