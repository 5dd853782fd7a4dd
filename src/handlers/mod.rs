pub mod auth;
pub mod booking;
pub mod console;
pub mod health;
pub mod payment;
