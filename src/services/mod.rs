pub mod bookings;
pub mod commission;
pub mod notifications;
pub mod payments;
pub mod rating;
