use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha1::Sha1;

use super::Notifier;
use crate::models::{BookingEvent, BookingSummary};

pub const SIGNATURE_HEADER: &str = "x-servicehub-signature";

/// Posts each notification as JSON to a single endpoint that fans it out
/// to push, socket or email delivery.
pub struct WebhookNotifier {
    url: String,
    secret: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
enum WebhookPayload<'a> {
    NewBooking {
        recipients: [&'a str; 1],
        booking: &'a BookingSummary,
    },
    BookingStatusChange {
        recipients: [&'a str; 2],
        event: BookingEvent,
        booking: &'a BookingSummary,
    },
}

impl WebhookNotifier {
    pub fn new(url: String, secret: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook client")?;
        Ok(Self {
            url,
            secret,
            client,
        })
    }

    async fn post(&self, payload: &WebhookPayload<'_>) -> anyhow::Result<()> {
        let body = serde_json::to_vec(payload).context("failed to encode notification")?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if !self.secret.is_empty() {
            request = request.header(SIGNATURE_HEADER, sign_payload(&self.secret, &body)?);
        }

        request
            .body(body)
            .send()
            .await
            .context("failed to deliver notification webhook")?
            .error_for_status()
            .context("notification webhook returned error")?;

        Ok(())
    }
}

/// Base64 HMAC-SHA1 of the raw request body, keyed by the shared secret.
pub fn sign_payload(secret: &str, body: &[u8]) -> anyhow::Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid webhook secret: {e}"))?;
    mac.update(body);
    let result = mac.finalize().into_bytes();
    Ok(base64::engine::general_purpose::STANDARD.encode(result))
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_new_booking(
        &self,
        recipient_user_id: &str,
        booking: &BookingSummary,
    ) -> anyhow::Result<()> {
        self.post(&WebhookPayload::NewBooking {
            recipients: [recipient_user_id],
            booking,
        })
        .await
    }

    async fn notify_booking_status_change(
        &self,
        customer_user_id: &str,
        provider_user_id: &str,
        booking: &BookingSummary,
        event: BookingEvent,
    ) -> anyhow::Result<()> {
        self.post(&WebhookPayload::BookingStatusChange {
            recipients: [customer_user_id, provider_user_id],
            event,
            booking,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_verifies_with_same_secret() {
        let body = br#"{"type":"newBooking"}"#;
        let signature = sign_payload("s3cret", body).unwrap();

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(signature)
            .unwrap();
        let mut mac = Hmac::<Sha1>::new_from_slice(b"s3cret").unwrap();
        mac.update(body);
        assert!(mac.verify_slice(&decoded).is_ok());
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let body = b"payload";
        assert_ne!(
            sign_payload("one", body).unwrap(),
            sign_payload("two", body).unwrap()
        );
    }

    #[test]
    fn test_status_change_payload_shape() {
        let summary = BookingSummary {
            id: "bk-1".to_string(),
            service_type: "cooking".to_string(),
            ..Default::default()
        };
        let payload = WebhookPayload::BookingStatusChange {
            recipients: ["user-1", "puser-1"],
            event: BookingEvent::Started,
            booking: &summary,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "bookingStatusChange");
        assert_eq!(json["event"], "started");
        assert_eq!(json["recipients"][1], "puser-1");
        assert_eq!(json["booking"]["serviceType"], "cooking");
    }

    #[tokio::test]
    async fn test_unresponsive_endpoint_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer.
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let notifier = WebhookNotifier::new(
            format!("http://{addr}/notify"),
            String::new(),
            Duration::from_millis(200),
        )
        .unwrap();
        let summary = BookingSummary::default();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            notifier.notify_new_booking("puser-1", &summary),
        )
        .await
        .expect("delivery should give up on its own");
        assert!(result.is_err());
    }
}
