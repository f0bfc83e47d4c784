use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

fn booking_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::bookings::create_booking_legacy))
        .route("/create", post(handlers::bookings::create_booking))
        .route("/me", get(handlers::bookings::my_bookings))
        .route("/provider/me", get(handlers::bookings::provider_bookings))
        .route("/:id", get(handlers::bookings::get_booking))
        .route("/:id/accept", patch(handlers::bookings::accept_booking))
        .route("/:id/reject", patch(handlers::bookings::reject_booking))
        .route("/:id/start", patch(handlers::bookings::start_booking))
        .route("/:id/complete", patch(handlers::bookings::complete_booking))
        .route("/:id/cancel", patch(handlers::bookings::cancel_booking))
        .route("/:id/review", patch(handlers::bookings::review_booking))
}

fn payment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payment-method", post(handlers::payments::set_payment_method))
        .route("/payment-methods", get(handlers::payments::get_payment_methods))
        .route(
            "/calculate-commission",
            post(handlers::payments::calculate_commission),
        )
        .route("/process-payment", post(handlers::payments::process_payment))
        .route(
            "/request-withdrawal",
            post(handlers::payments::request_withdrawal),
        )
        .route("/earnings-summary", get(handlers::payments::earnings_summary))
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/providers", post(handlers::admin::create_provider))
        .route("/providers/:id", get(handlers::admin::get_provider))
        .route("/providers/:id/verify", post(handlers::admin::verify_provider))
        .route(
            "/providers/:id/availability",
            post(handlers::admin::set_availability),
        )
        .route("/bookings", get(handlers::admin::list_bookings))
}

/// The full HTTP surface. CORS is layered on by the binary since it depends
/// on deployment config.
pub fn app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/bookings", booking_routes())
        .nest("/payments", payment_routes())
        .nest("/admin", admin_routes());

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
