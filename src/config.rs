use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use rust_decimal::Decimal;

pub const DEFAULT_SESSION_TTL_HOURS: i64 = 12;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub public_url: String,
    pub deposit_required: bool,
    pub deposit_amount: Decimal,
    pub deposit_currency: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    pub shop_utc_offset_minutes: i32,
    pub booking_window_days: u32,
    pub session_ttl_hours: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "trimflow.db".to_string()),
            public_url: env::var("PUBLIC_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            deposit_required: env::var("DEPOSIT_REQUIRED")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(true),
            deposit_amount: env::var("DEPOSIT_AMOUNT")
                .ok()
                .and_then(|v| Decimal::from_str(v.trim()).ok())
                .unwrap_or(Decimal::TEN),
            deposit_currency: env::var("DEPOSIT_CURRENCY")
                .map(|v| v.to_lowercase())
                .unwrap_or_else(|_| "myr".to_string()),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            shop_utc_offset_minutes: env::var("SHOP_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            booking_window_days: env::var("BOOKING_WINDOW_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(14),
            session_ttl_hours: env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SESSION_TTL_HOURS),
        }
    }

    /// The shop's offset from UTC. Out-of-range values fall back to UTC.
    pub fn shop_offset(&self) -> FixedOffset {
        self.shop_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }

    /// Current wall-clock time at the shop.
    pub fn shop_now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.shop_offset()).naive_local()
    }

    pub fn shop_today(&self) -> NaiveDate {
        self.shop_now().date()
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
