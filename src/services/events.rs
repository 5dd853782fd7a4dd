use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Booking, BookingStatus};
use crate::state::AppState;

/// Tells console subscribers that a booking changed and views should be
/// re-queried. Carries no booking data beyond the new status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookingChange {
    pub booking_id: String,
    pub status: BookingStatus,
    pub changed_at: NaiveDateTime,
}

pub fn publish_booking_change(state: &AppState, booking: &Booking) {
    let change = BookingChange {
        booking_id: booking.id.clone(),
        status: booking.status,
        changed_at: Utc::now().naive_utc(),
    };
    // No subscribers is fine: consoles re-query on connect
    let _ = state.booking_tx.send(change);
}
