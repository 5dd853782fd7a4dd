use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::db::queries::BookingFilter;
use crate::errors::AppError;
use crate::handlers::auth::require_operator;
use crate::models::{Booking, BookingDetails, BookingStatus};
use crate::services::console::{self, DashboardMetrics};
use crate::services::events::publish_booking_change;
use crate::services::{auth, messaging};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;

/// A booking as the console shows it, with a link to message the customer.
#[derive(Serialize)]
pub struct ConsoleBooking {
    #[serde(flatten)]
    details: BookingDetails,
    contact_link: Option<String>,
}

impl From<BookingDetails> for ConsoleBooking {
    fn from(details: BookingDetails) -> Self {
        let booking = &details.booking;
        let service = details
            .service
            .as_ref()
            .map(|s| s.name.as_str())
            .unwrap_or("appointment");
        let text = format!(
            "Hi {}, about your {} on {}",
            booking.customer_name,
            service,
            booking.booking_time.format("%a %-d %b at %-I:%M %p"),
        );
        let contact_link = messaging::whatsapp_link(&booking.customer_phone, &text);
        Self {
            details,
            contact_link,
        }
    }
}

fn console_view(list: Vec<BookingDetails>) -> Vec<ConsoleBooking> {
    list.into_iter().map(ConsoleBooking::from).collect()
}

// GET /api/console/dashboard
#[derive(Serialize)]
pub struct DashboardResponse {
    reference: NaiveDateTime,
    metrics: DashboardMetrics,
    today: Vec<ConsoleBooking>,
    upcoming: Vec<ConsoleBooking>,
    completed: Vec<ConsoleBooking>,
}

pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardResponse>, AppError> {
    let session = require_operator(&state, &headers)?;
    let view = {
        let db = state.conn()?;
        console::dashboard(&db, &session, state.config.shop_now())?
    };

    Ok(Json(DashboardResponse {
        reference: view.reference,
        metrics: view.metrics,
        today: console_view(view.queues.today),
        upcoming: console_view(view.queues.upcoming),
        completed: console_view(view.queues.completed),
    }))
}

// GET /api/console/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    /// First day to include.
    pub from: Option<NaiveDate>,
    /// Last day to include.
    pub until: Option<NaiveDate>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<ConsoleBooking>>, AppError> {
    let session = require_operator(&state, &headers)?;

    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            BookingStatus::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("unknown status {raw:?}")))?,
        ),
        None => None,
    };
    let until = match query.until {
        Some(day) => Some(
            day.succ_opt()
                .ok_or_else(|| AppError::Validation(format!("{day} is out of range")))?
                .and_time(NaiveTime::MIN),
        ),
        None => None,
    };
    let filter = BookingFilter {
        status,
        from: query.from.map(|day| day.and_time(NaiveTime::MIN)),
        until,
        limit: Some(query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 500)),
        ..Default::default()
    };

    let bookings = {
        let db = state.conn()?;
        console::list_bookings(&db, &session, &filter)?
    };
    Ok(Json(console_view(bookings)))
}

// POST /api/console/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    apply_transition(&state, &headers, &id, BookingStatus::Completed)
}

// POST /api/console/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    apply_transition(&state, &headers, &id, BookingStatus::Cancelled)
}

fn apply_transition(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    target: BookingStatus,
) -> Result<Json<Booking>, AppError> {
    let session = require_operator(state, headers)?;
    let booking = {
        let db = state.conn()?;
        console::transition(&db, &session, id, target)?
    };
    publish_booking_change(state, &booking);
    Ok(Json(booking))
}

// GET /api/console/events
#[derive(Deserialize)]
pub struct EventsQuery {
    pub token: Option<String>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Auth via query param (EventSource can't set headers)
    let session = {
        let db = state.conn()?;
        auth::current_operator(&db, query.token.as_deref().unwrap_or(""))?
    };
    tracing::debug!(operator = %session.email, "console subscribed to booking changes");

    let live = BroadcastStream::new(state.booking_tx.subscribe()).filter_map(|result| match result {
        Ok(change) => {
            let data = serde_json::to_string(&change).unwrap_or_default();
            Some(Ok::<_, Infallible>(
                Event::default().data(data).event("booking_changed"),
            ))
        }
        // A lagging console re-queries anyway
        Err(BroadcastStreamRecvError::Lagged(_)) => None,
    });

    let keepalive = IntervalStream::new(tokio::time::interval(Duration::from_secs(30)))
        .map(|_| Ok::<_, Infallible>(Event::default().comment("keepalive")));

    Ok(Sse::new(live.merge(keepalive)))
}
