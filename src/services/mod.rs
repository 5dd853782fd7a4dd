pub mod auth;
pub mod catalog;
pub mod console;
pub mod deposit;
pub mod events;
pub mod lifecycle;
pub mod messaging;
pub mod payments;
pub mod scheduling;
