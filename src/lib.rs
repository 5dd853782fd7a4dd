pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/services", get(handlers::booking::list_services))
        .route("/api/schedule", get(handlers::booking::get_schedule))
        .route("/api/bookings", post(handlers::booking::create_booking))
        .route("/api/checkout", post(handlers::payment::checkout))
        .route("/payment/return", get(handlers::payment::payment_return))
        .route("/webhook/stripe", post(handlers::payment::stripe_webhook))
        .route("/api/auth/sign-up", post(handlers::auth::sign_up))
        .route("/api/auth/sign-in", post(handlers::auth::sign_in))
        .route("/api/auth/sign-out", post(handlers::auth::sign_out))
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/console/dashboard", get(handlers::console::get_dashboard))
        .route("/api/console/bookings", get(handlers::console::get_bookings))
        .route(
            "/api/console/bookings/:id/complete",
            post(handlers::console::complete_booking),
        )
        .route(
            "/api/console/bookings/:id/cancel",
            post(handlers::console::cancel_booking),
        )
        .route("/api/console/events", get(handlers::console::events_stream))
        .with_state(state)
}
