use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub description: String,
    pub duration_minutes: i32,
    pub price: Decimal,
}

/// The slice of a service embedded in booking reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSummary {
    pub name: String,
    pub price: Decimal,
    pub duration_minutes: i32,
}

impl From<&Service> for ServiceSummary {
    fn from(service: &Service) -> Self {
        Self {
            name: service.name.clone(),
            price: service.price,
            duration_minutes: service.duration_minutes,
        }
    }
}
