//! Operator console views. Everything here takes the caller's
//! [`OperatorSession`] explicitly; the session is used for audit logging and
//! proves the request was authenticated upstream.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::queries::{self, BookingFilter, BookingOrder};
use crate::errors::AppError;
use crate::models::{Booking, BookingDetails, BookingStatus, OperatorSession};
use crate::services::lifecycle;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BookingQueues {
    pub today: Vec<BookingDetails>,
    pub upcoming: Vec<BookingDetails>,
    pub completed: Vec<BookingDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub today_revenue: Decimal,
    pub pending_count: usize,
    pub total_earned: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub reference: NaiveDateTime,
    pub queues: BookingQueues,
    pub metrics: DashboardMetrics,
}

/// Splits bookings into the console queues.
///
/// `today` and `upcoming` hold pending bookings on the reference day and on
/// later days. `completed` holds every completed booking. Bookings awaiting
/// payment, cancelled bookings and pending bookings from earlier days land in
/// no queue.
pub fn partition(bookings: &[BookingDetails], reference: NaiveDateTime) -> BookingQueues {
    let today = reference.date();
    let mut queues = BookingQueues::default();

    for details in bookings {
        let booking = &details.booking;
        let day = booking.booking_time.date();
        match booking.status {
            BookingStatus::Pending if day == today => queues.today.push(details.clone()),
            BookingStatus::Pending if day > today => queues.upcoming.push(details.clone()),
            BookingStatus::Completed => queues.completed.push(details.clone()),
            _ => {}
        }
    }

    queues
}

/// Revenue figures for the dashboard header. A booking whose service no
/// longer resolves contributes zero.
pub fn aggregate(bookings: &[BookingDetails], reference: NaiveDateTime) -> DashboardMetrics {
    let today = reference.date();
    let mut metrics = DashboardMetrics::default();

    for details in bookings {
        let price = details
            .service
            .as_ref()
            .map(|s| s.price)
            .unwrap_or(Decimal::ZERO);
        let is_today = details.booking.booking_time.date() == today;

        match details.booking.status {
            BookingStatus::Completed => {
                metrics.total_earned += price;
                if is_today {
                    metrics.today_revenue += price;
                }
            }
            BookingStatus::Pending if is_today => metrics.pending_count += 1,
            _ => {}
        }
    }

    metrics
}

pub fn dashboard(
    conn: &Connection,
    session: &OperatorSession,
    reference: NaiveDateTime,
) -> Result<Dashboard, AppError> {
    let bookings = queries::query_bookings(conn, &BookingFilter::default(), BookingOrder::TimeAscending)?;
    tracing::debug!(
        operator = %session.email,
        bookings = bookings.len(),
        "dashboard loaded"
    );

    Ok(Dashboard {
        reference,
        queues: partition(&bookings, reference),
        metrics: aggregate(&bookings, reference),
    })
}

/// Newest-first booking list for the console's history view.
pub fn list_bookings(
    conn: &Connection,
    session: &OperatorSession,
    filter: &BookingFilter,
) -> Result<Vec<BookingDetails>, AppError> {
    let bookings = queries::query_bookings(conn, filter, BookingOrder::TimeDescending)?;
    tracing::debug!(operator = %session.email, count = bookings.len(), "bookings listed");
    Ok(bookings)
}

/// Applies an operator-initiated status change. Only `completed` and
/// `cancelled` are valid targets; the lifecycle engine enforces the rest.
pub fn transition(
    conn: &Connection,
    session: &OperatorSession,
    booking_id: &str,
    target: BookingStatus,
) -> Result<Booking, AppError> {
    let booking = match target {
        BookingStatus::Completed => lifecycle::mark_completed(conn, booking_id)?,
        BookingStatus::Cancelled => lifecycle::cancel(conn, booking_id)?,
        BookingStatus::Pending | BookingStatus::AwaitingPayment => {
            return Err(AppError::Validation(format!(
                "{target} is not an operator target, use completed or cancelled"
            )));
        }
    };

    tracing::info!(
        operator = %session.email,
        booking_id,
        status = booking.status.as_str(),
        "operator updated booking"
    );
    Ok(booking)
}
