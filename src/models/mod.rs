pub mod booking;
pub mod operator;
pub mod service;

pub use booking::{Booking, BookingDetails, BookingStatus, StatusChange};
pub use operator::{Operator, OperatorSession};
pub use service::{Service, ServiceSummary};
