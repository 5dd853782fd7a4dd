use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Booking, Service};
use crate::services::events::publish_booking_change;
use crate::services::lifecycle::{self, NewBooking};
use crate::services::{catalog, scheduling};
use crate::state::AppState;

// GET /api/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Service>>, AppError> {
    let db = state.conn()?;
    Ok(Json(catalog::list_services(&db)?))
}

// GET /api/schedule
#[derive(Serialize)]
pub struct ScheduleResponse {
    dates: Vec<NaiveDate>,
    time_labels: Vec<&'static str>,
    deposit_required: bool,
    deposit_amount: Decimal,
    deposit_currency: String,
}

pub async fn get_schedule(State(state): State<Arc<AppState>>) -> Json<ScheduleResponse> {
    let config = &state.config;
    Json(ScheduleResponse {
        dates: scheduling::offered_dates(config.shop_today(), config.booking_window_days),
        time_labels: scheduling::offered_time_labels().to_vec(),
        deposit_required: config.deposit_required,
        deposit_amount: config.deposit_amount,
        deposit_currency: config.deposit_currency.clone(),
    })
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub service_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub date: NaiveDate,
    pub time: String,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct CreateBookingResponse {
    booking: Booking,
    deposit_required: bool,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreateBookingResponse>), AppError> {
    let today = state.config.shop_today();
    let booking_time = scheduling::resolve_slot(body.date, &body.time, today)?;

    let window = scheduling::offered_dates(today, state.config.booking_window_days);
    if !window.contains(&body.date) {
        return Err(AppError::Validation(format!(
            "{} is outside the booking window",
            body.date
        )));
    }

    let deposit_required = state.config.deposit_required;
    let booking = {
        let db = state.conn()?;
        lifecycle::create(
            &db,
            NewBooking {
                service_id: body.service_id,
                customer_name: body.customer_name,
                customer_phone: body.customer_phone,
                booking_time,
                notes: body.notes,
            },
            deposit_required,
        )?
    };
    publish_booking_change(&state, &booking);

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            booking,
            deposit_required,
        }),
    ))
}
