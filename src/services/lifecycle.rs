//! Booking lifecycle engine: the only writer of booking status.
//!
//! ```text
//! awaiting_payment --(payment confirmed)--> pending
//! pending          --(complete)-----------> completed
//! pending          --(cancel)-------------> cancelled
//! ```
//!
//! Every status write is a conditional update against the status the engine
//! read, so two racing transitions on the same booking cannot both succeed.

use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, StatusChange};
use crate::services::catalog;

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub service_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub booking_time: NaiveDateTime,
    pub notes: Option<String>,
}

pub fn create(
    conn: &Connection,
    request: NewBooking,
    requires_deposit: bool,
) -> Result<Booking, AppError> {
    let customer_name = request.customer_name.trim();
    let customer_phone = request.customer_phone.trim();
    if customer_name.is_empty() {
        return Err(AppError::Validation("customer name is required".to_string()));
    }
    if customer_phone.is_empty() {
        return Err(AppError::Validation("customer phone is required".to_string()));
    }

    catalog::get_service(conn, &request.service_id)?;

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        service_id: request.service_id,
        customer_name: customer_name.to_string(),
        customer_phone: customer_phone.to_string(),
        booking_time: request.booking_time,
        status: BookingStatus::initial(requires_deposit),
        notes: request
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        created_at: now,
        updated_at: now,
    };

    queries::create_booking(conn, &booking)?;

    tracing::info!(
        booking_id = %booking.id,
        service_id = %booking.service_id,
        status = booking.status.as_str(),
        booking_time = %booking.booking_time,
        "booking created"
    );

    Ok(booking)
}

/// Result of [`confirm_payment`]. `changed` is true only for the call that
/// moved the booking out of `awaiting_payment`.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub booking: Booking,
    pub changed: bool,
}

/// Marks the deposit as paid. Bookings already past `awaiting_payment` are
/// returned unchanged, so replayed payment callbacks are harmless.
pub fn confirm_payment(
    conn: &Connection,
    booking_id: &str,
) -> Result<PaymentConfirmation, AppError> {
    let booking = load(conn, booking_id)?;
    if booking.status != BookingStatus::AwaitingPayment {
        tracing::debug!(
            booking_id,
            status = booking.status.as_str(),
            "payment already settled, ignoring confirmation"
        );
        return Ok(PaymentConfirmation {
            booking,
            changed: false,
        });
    }

    let changed = queries::compare_and_set_status(
        conn,
        booking_id,
        BookingStatus::AwaitingPayment,
        BookingStatus::Pending,
    )?;
    if changed {
        tracing::info!(booking_id, "deposit confirmed, booking pending");
    } else {
        tracing::debug!(booking_id, "payment confirmed concurrently");
    }

    Ok(PaymentConfirmation {
        booking: load(conn, booking_id)?,
        changed,
    })
}

pub fn mark_completed(conn: &Connection, booking_id: &str) -> Result<Booking, AppError> {
    apply_operator_change(conn, booking_id, StatusChange::Complete)
}

pub fn cancel(conn: &Connection, booking_id: &str) -> Result<Booking, AppError> {
    apply_operator_change(conn, booking_id, StatusChange::Cancel)
}

fn apply_operator_change(
    conn: &Connection,
    booking_id: &str,
    change: StatusChange,
) -> Result<Booking, AppError> {
    let booking = load(conn, booking_id)?;
    let next = booking
        .status
        .apply(change)
        .ok_or(AppError::InvalidTransition {
            from: booking.status,
            action: change,
        })?;

    if !queries::compare_and_set_status(conn, booking_id, booking.status, next)? {
        // Someone else moved the booking between our read and write.
        let current = load(conn, booking_id)?;
        return Err(AppError::InvalidTransition {
            from: current.status,
            action: change,
        });
    }

    tracing::info!(
        booking_id,
        from = booking.status.as_str(),
        to = next.as_str(),
        "booking status changed"
    );

    load(conn, booking_id)
}

pub fn load(conn: &Connection, booking_id: &str) -> Result<Booking, AppError> {
    queries::get_booking_by_id(conn, booking_id)?
        .map(|details| details.booking)
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn request() -> NewBooking {
        NewBooking {
            service_id: "classic-cut".to_string(),
            customer_name: "Amir".to_string(),
            customer_phone: "+60 12-345 6789".to_string(),
            booking_time: NaiveDateTime::parse_from_str("2025-06-16 14:30", "%Y-%m-%d %H:%M")
                .unwrap(),
            notes: None,
        }
    }

    fn status_of(conn: &Connection, id: &str) -> BookingStatus {
        load(conn, id).unwrap().status
    }

    #[test]
    fn test_create_with_deposit_awaits_payment() {
        let conn = setup_db();
        let booking = create(&conn, request(), true).unwrap();
        assert_eq!(booking.status, BookingStatus::AwaitingPayment);
        assert_eq!(status_of(&conn, &booking.id), BookingStatus::AwaitingPayment);
    }

    #[test]
    fn test_create_without_deposit_is_pending() {
        let conn = setup_db();
        let booking = create(&conn, request(), false).unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[test]
    fn test_create_trims_input_and_drops_blank_notes() {
        let conn = setup_db();
        let booking = create(
            &conn,
            NewBooking {
                customer_name: "  Amir ".to_string(),
                notes: Some("   ".to_string()),
                ..request()
            },
            false,
        )
        .unwrap();
        assert_eq!(booking.customer_name, "Amir");
        assert_eq!(booking.notes, None);
    }

    #[test]
    fn test_create_rejects_blank_name_and_phone() {
        let conn = setup_db();
        let blank_name = create(
            &conn,
            NewBooking {
                customer_name: "   ".to_string(),
                ..request()
            },
            true,
        );
        assert!(matches!(blank_name, Err(AppError::Validation(_))));

        let blank_phone = create(
            &conn,
            NewBooking {
                customer_phone: String::new(),
                ..request()
            },
            true,
        );
        assert!(matches!(blank_phone, Err(AppError::Validation(_))));

        let count = queries::query_bookings(
            &conn,
            &queries::BookingFilter::default(),
            queries::BookingOrder::TimeAscending,
        )
        .unwrap()
        .len();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_create_rejects_unknown_service() {
        let conn = setup_db();
        let result = create(
            &conn,
            NewBooking {
                service_id: "perm".to_string(),
                ..request()
            },
            true,
        );
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_double_booking_is_not_prevented() {
        let conn = setup_db();
        let first = create(&conn, request(), false).unwrap();
        let second = create(&conn, request(), false).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(first.booking_time, second.booking_time);
    }

    #[test]
    fn test_confirm_payment_is_idempotent() {
        let conn = setup_db();
        let booking = create(&conn, request(), true).unwrap();

        let first = confirm_payment(&conn, &booking.id).unwrap();
        assert_eq!(first.booking.status, BookingStatus::Pending);
        assert!(first.changed);
        let second = confirm_payment(&conn, &booking.id).unwrap();
        assert_eq!(second.booking.status, BookingStatus::Pending);
        assert!(!second.changed);
    }

    #[test]
    fn test_confirm_payment_never_reopens_terminal_bookings() {
        let conn = setup_db();
        let booking = create(&conn, request(), true).unwrap();
        confirm_payment(&conn, &booking.id).unwrap();
        mark_completed(&conn, &booking.id).unwrap();

        let replayed = confirm_payment(&conn, &booking.id).unwrap();
        assert_eq!(replayed.booking.status, BookingStatus::Completed);
        assert!(!replayed.changed);
    }

    #[test]
    fn test_confirm_payment_unknown_booking() {
        let conn = setup_db();
        assert!(matches!(
            confirm_payment(&conn, "nope"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_complete_pending_booking() {
        let conn = setup_db();
        let booking = create(&conn, request(), false).unwrap();
        let done = mark_completed(&conn, &booking.id).unwrap();
        assert_eq!(done.status, BookingStatus::Completed);
    }

    #[test]
    fn test_cancel_succeeds_exactly_once() {
        let conn = setup_db();
        let booking = create(&conn, request(), false).unwrap();

        let cancelled = cancel(&conn, &booking.id).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let again = cancel(&conn, &booking.id);
        assert!(matches!(
            again,
            Err(AppError::InvalidTransition {
                from: BookingStatus::Cancelled,
                action: StatusChange::Cancel
            })
        ));
    }

    #[test]
    fn test_operator_changes_rejected_outside_pending() {
        let conn = setup_db();

        let unpaid = create(&conn, request(), true).unwrap();
        let completed = create(&conn, request(), false).unwrap();
        mark_completed(&conn, &completed.id).unwrap();
        let cancelled = create(&conn, request(), false).unwrap();
        cancel(&conn, &cancelled.id).unwrap();

        for booking in [&unpaid, &completed, &cancelled] {
            let before = status_of(&conn, &booking.id);
            assert!(matches!(
                mark_completed(&conn, &booking.id),
                Err(AppError::InvalidTransition { .. })
            ));
            assert!(matches!(
                cancel(&conn, &booking.id),
                Err(AppError::InvalidTransition { .. })
            ));
            assert_eq!(status_of(&conn, &booking.id), before);
        }
    }

    #[test]
    fn test_full_deposit_path() {
        let conn = setup_db();
        let booking = create(&conn, request(), true).unwrap();
        assert_eq!(booking.status, BookingStatus::AwaitingPayment);
        assert_eq!(
            confirm_payment(&conn, &booking.id).unwrap().booking.status,
            BookingStatus::Pending
        );
        assert_eq!(
            mark_completed(&conn, &booking.id).unwrap().status,
            BookingStatus::Completed
        );
        assert!(matches!(
            cancel(&conn, &booking.id),
            Err(AppError::InvalidTransition { .. })
        ));
    }
}
