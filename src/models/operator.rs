use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub email: String,
    pub created_at: NaiveDateTime,
}

/// Signed-in operator context. Console operations take this explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorSession {
    pub token: String,
    pub operator_id: String,
    pub email: String,
    pub expires_at: NaiveDateTime,
}
