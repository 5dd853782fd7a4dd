//! Customer contact links for the console. Only builds links; nothing here
//! sends a message.

use reqwest::Url;

const MIN_PHONE_DIGITS: usize = 7;

/// Reduces a free-text phone number to the digits wa.me expects.
/// A `+` or `00` international prefix is dropped, keeping the country code.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = match digits.strip_prefix("00") {
        Some(rest) if raw.trim_start().starts_with("00") => rest.to_string(),
        _ => digits,
    };

    if digits.len() < MIN_PHONE_DIGITS {
        return None;
    }
    Some(digits)
}

pub fn whatsapp_link(phone: &str, text: &str) -> Option<String> {
    let digits = normalize_phone(phone)?;
    let base = format!("https://wa.me/{digits}");
    let url = if text.is_empty() {
        Url::parse(&base)
    } else {
        Url::parse_with_params(&base, &[("text", text)])
    };
    url.ok().map(String::from)
}
