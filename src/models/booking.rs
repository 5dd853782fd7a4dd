use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ServiceSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub service_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub booking_time: NaiveDateTime,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A booking together with its service, resolved through the foreign key at
/// read time. `service` is `None` when the referenced row no longer resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub service: Option<ServiceSummary>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    AwaitingPayment,
    Pending,
    Completed,
    Cancelled,
}

/// The edges of the booking state graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    PaymentConfirmed,
    Complete,
    Cancel,
}

impl StatusChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusChange::PaymentConfirmed => "confirm payment",
            StatusChange::Complete => "complete",
            StatusChange::Cancel => "cancel",
        }
    }
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::AwaitingPayment => "awaiting_payment",
            BookingStatus::Pending => "pending",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "awaiting_payment" => Some(BookingStatus::AwaitingPayment),
            "pending" => Some(BookingStatus::Pending),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Initial status for a freshly created booking.
    pub fn initial(requires_deposit: bool) -> Self {
        if requires_deposit {
            BookingStatus::AwaitingPayment
        } else {
            BookingStatus::Pending
        }
    }

    /// Follows `change` from this status, or `None` if the graph has no such edge.
    pub fn apply(self, change: StatusChange) -> Option<BookingStatus> {
        match (self, change) {
            (BookingStatus::AwaitingPayment, StatusChange::PaymentConfirmed) => {
                Some(BookingStatus::Pending)
            }
            (BookingStatus::Pending, StatusChange::Complete) => Some(BookingStatus::Completed),
            (BookingStatus::Pending, StatusChange::Cancel) => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for StatusChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BookingStatus; 4] = [
        BookingStatus::AwaitingPayment,
        BookingStatus::Pending,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    const CHANGES: [StatusChange; 3] = [
        StatusChange::PaymentConfirmed,
        StatusChange::Complete,
        StatusChange::Cancel,
    ];

    #[test]
    fn test_only_drawn_edges_exist() {
        let mut edges = vec![];
        for status in ALL {
            for change in CHANGES {
                if let Some(next) = status.apply(change) {
                    edges.push((status, next));
                }
            }
        }
        assert_eq!(
            edges,
            vec![
                (BookingStatus::AwaitingPayment, BookingStatus::Pending),
                (BookingStatus::Pending, BookingStatus::Completed),
                (BookingStatus::Pending, BookingStatus::Cancelled),
            ]
        );
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for status in [BookingStatus::Completed, BookingStatus::Cancelled] {
            for change in CHANGES {
                assert_eq!(status.apply(change), None);
            }
        }
    }

    #[test]
    fn test_initial_status_follows_deposit_setting() {
        assert_eq!(BookingStatus::initial(true), BookingStatus::AwaitingPayment);
        assert_eq!(BookingStatus::initial(false), BookingStatus::Pending);
    }

    #[test]
    fn test_parse_rejects_unknown_status() {
        for status in ALL {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("confirmed"), None);
        assert_eq!(BookingStatus::parse(""), None);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&BookingStatus::AwaitingPayment).unwrap();
        assert_eq!(json, "\"awaiting_payment\"");
        let parsed: BookingStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, BookingStatus::Cancelled);
    }
}
