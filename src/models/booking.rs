use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub provider_id: String,

    pub service_type: String,
    pub description: String,
    pub preferred_date: NaiveDate,
    pub preferred_time: String,
    pub urgency: Urgency,
    pub budget: Option<f64>,
    pub address: String,
    pub contact_phone: Option<String>,

    pub service_category: Option<String>,
    pub duration: Option<String>,
    pub duration_value: Option<f64>,
    pub coordinates: Option<Coordinates>,
    pub skill_tags: Vec<String>,
    pub insurance_required: bool,
    pub background_check_required: bool,
    pub base_price: Option<i64>,
    pub surge_multiplier: f64,
    pub insurance_cost: i64,

    pub status: BookingStatus,
    pub accepted_at: Option<NaiveDateTime>,
    pub rejected_at: Option<NaiveDateTime>,
    pub rejection_reason: Option<String>,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,

    pub provider_notes: Option<String>,
    pub estimated_duration: Option<String>,
    pub final_amount: Option<i64>,

    /// Quoted price in the smallest currency unit.
    pub amount: i64,
    pub currency: String,

    pub rating: Option<u8>,
    pub review: Option<String>,
    pub reviewed_at: Option<NaiveDateTime>,

    pub paid_at: Option<NaiveDateTime>,
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    /// Builds a fresh `pending` booking owned by `user_id`.
    pub fn new(id: String, user_id: String, new: NewBooking, now: NaiveDateTime) -> Self {
        Self {
            id,
            user_id,
            provider_id: new.provider_id,
            service_type: new.service_type,
            description: new.description,
            preferred_date: new.preferred_date,
            preferred_time: new.preferred_time,
            urgency: new.urgency,
            budget: new.budget,
            address: new.address,
            contact_phone: new.contact_phone,
            service_category: new.service_category,
            duration: new.duration,
            duration_value: new.duration_value,
            coordinates: new.coordinates,
            skill_tags: new.skill_tags,
            insurance_required: new.insurance_required,
            background_check_required: new.background_check_required,
            base_price: new.base_price,
            surge_multiplier: new.surge_multiplier,
            insurance_cost: new.insurance_cost,
            status: BookingStatus::Pending,
            accepted_at: None,
            rejected_at: None,
            rejection_reason: None,
            started_at: None,
            completed_at: None,
            provider_notes: None,
            estimated_duration: None,
            final_amount: None,
            amount: new.amount,
            currency: new.currency,
            rating: None,
            review: None,
            reviewed_at: None,
            paid_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Everything a customer supplies when requesting a booking.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub provider_id: String,
    pub service_type: String,
    pub description: String,
    pub preferred_date: NaiveDate,
    pub preferred_time: String,
    pub urgency: Urgency,
    pub budget: Option<f64>,
    pub address: String,
    pub contact_phone: Option<String>,
    pub service_category: Option<String>,
    pub duration: Option<String>,
    pub duration_value: Option<f64>,
    pub coordinates: Option<Coordinates>,
    pub skill_tags: Vec<String>,
    pub insurance_required: bool,
    pub background_check_required: bool,
    pub base_price: Option<i64>,
    pub surge_multiplier: f64,
    pub insurance_cost: i64,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Rejected => "rejected",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "accepted" => Some(BookingStatus::Accepted),
            "rejected" => Some(BookingStatus::Rejected),
            "in_progress" => Some(BookingStatus::InProgress),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Rejected
        )
    }

    /// The full transition table. Anything not listed here is illegal.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Accepted, InProgress)
                | (InProgress, Completed)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency as stored on a booking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Urgency::Low),
            "normal" => Some(Urgency::Normal),
            "high" => Some(Urgency::High),
            _ => None,
        }
    }
}

/// Urgency as a customer picks it in the booking panel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestedUrgency {
    #[default]
    Normal,
    Urgent,
    Emergency,
}

impl RequestedUrgency {
    /// Maps the booking-panel vocabulary onto the stored one. The mapping
    /// shifts every level down by one: a "normal" request is stored as `Low`.
    pub fn to_stored(self) -> Urgency {
        match self {
            RequestedUrgency::Emergency => Urgency::High,
            RequestedUrgency::Urgent => Urgency::Normal,
            RequestedUrgency::Normal => Urgency::Low,
        }
    }
}

/// Status changes the notifier is told about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingEvent {
    Accepted,
    Rejected,
    Started,
    Completed,
}

impl BookingEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingEvent::Accepted => "accepted",
            BookingEvent::Rejected => "rejected",
            BookingEvent::Started => "started",
            BookingEvent::Completed => "completed",
        }
    }
}

impl fmt::Display for BookingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification payload: id and service type plus the fields relevant to
/// the event being announced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub id: String,
    pub service_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDateTime>,
}

impl BookingSummary {
    pub fn for_new_booking(booking: &Booking) -> Self {
        Self {
            id: booking.id.clone(),
            service_type: booking.service_type.clone(),
            description: Some(booking.description.clone()),
            preferred_date: Some(booking.preferred_date),
            preferred_time: Some(booking.preferred_time.clone()),
            urgency: Some(booking.urgency),
            address: Some(booking.address.clone()),
            ..Default::default()
        }
    }

    pub fn for_event(booking: &Booking, event: BookingEvent) -> Self {
        let base = Self {
            id: booking.id.clone(),
            service_type: booking.service_type.clone(),
            ..Default::default()
        };

        match event {
            BookingEvent::Accepted => Self {
                provider_notes: booking.provider_notes.clone(),
                estimated_duration: booking.estimated_duration.clone(),
                final_amount: booking.final_amount,
                ..base
            },
            BookingEvent::Rejected => Self {
                rejection_reason: booking.rejection_reason.clone(),
                ..base
            },
            BookingEvent::Started => Self {
                started_at: booking.started_at,
                ..base
            },
            BookingEvent::Completed => Self {
                completed_at: booking.completed_at,
                final_amount: booking.final_amount,
                ..base
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Accepted,
        BookingStatus::Rejected,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    #[test]
    fn test_requested_urgency_shifts_down() {
        assert_eq!(RequestedUrgency::Emergency.to_stored(), Urgency::High);
        assert_eq!(RequestedUrgency::Urgent.to_stored(), Urgency::Normal);
        assert_eq!(RequestedUrgency::Normal.to_stored(), Urgency::Low);
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be illegal");
            }
        }
    }

    #[test]
    fn test_every_status_reachable_from_pending() {
        let mut reached = vec![BookingStatus::Pending];
        let mut frontier = vec![BookingStatus::Pending];
        while let Some(current) = frontier.pop() {
            for next in ALL {
                if current.can_transition_to(next) && !reached.contains(&next) {
                    reached.push(next);
                    frontier.push(next);
                }
            }
        }
        assert_eq!(reached.len(), ALL.len());
    }

    #[test]
    fn test_no_backwards_transitions() {
        assert!(!BookingStatus::Accepted.can_transition_to(BookingStatus::Pending));
        assert!(!BookingStatus::InProgress.can_transition_to(BookingStatus::Accepted));
        assert!(!BookingStatus::Accepted.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::InProgress));
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in ALL {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("confirmed"), None);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&BookingStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_rejected_summary_carries_reason_only() {
        let now = chrono::Utc::now().naive_utc();
        let mut booking = Booking::new(
            "bk-1".to_string(),
            "user-1".to_string(),
            NewBooking {
                provider_id: "prov-1".to_string(),
                service_type: "plumbing".to_string(),
                description: "leaking kitchen tap".to_string(),
                preferred_date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
                preferred_time: "10:00".to_string(),
                urgency: Urgency::Normal,
                budget: None,
                address: "12 Main St".to_string(),
                contact_phone: None,
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
                amount: 5000,
                currency: "usd".to_string(),
            },
            now,
        );
        booking.rejection_reason = Some("fully booked".to_string());

        let summary = BookingSummary::for_event(&booking, BookingEvent::Rejected);
        assert_eq!(summary.rejection_reason.as_deref(), Some("fully booked"));
        assert!(summary.address.is_none());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["serviceType"], "plumbing");
        assert!(json.get("finalAmount").is_none());
    }
}
