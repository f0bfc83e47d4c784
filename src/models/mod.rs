pub mod actor;
pub mod booking;
pub mod provider;

pub use actor::{Actor, Role};
pub use booking::{
    Booking, BookingEvent, BookingStatus, BookingSummary, Coordinates, NewBooking,
    RequestedUrgency, Urgency,
};
pub use provider::{BankDetails, PaymentMethod, Provider, WithdrawalEntry, WithdrawalStatus};
