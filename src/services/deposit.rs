//! Deposit collection. A booking awaiting payment gets a hosted checkout
//! session tagged with its id; the processor's return (redirect or webhook)
//! is handled by [`on_return`], which is safe to call any number of times.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, StatusChange};
use crate::services::events::publish_booking_change;
use crate::services::lifecycle;
use crate::services::payments::DepositRequest;
use crate::state::AppState;

/// Converts a currency amount to the processor's minor unit (× 100).
pub fn to_minor_units(amount: Decimal) -> Result<i64, AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "deposit amount must be positive".to_string(),
        ));
    }
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| AppError::Validation(format!("deposit amount {amount} is out of range")))
}

pub fn return_urls(public_url: &str, booking_id: &str) -> (String, String) {
    (
        format!("{public_url}/payment/return?success=true&booking_id={booking_id}"),
        format!("{public_url}/payment/return?canceled=true&booking_id={booking_id}"),
    )
}

/// Opens a payment session for `amount` and returns the processor's redirect
/// URL. On failure the booking is left awaiting payment so the customer can
/// retry.
pub async fn begin_deposit(
    state: &AppState,
    booking_id: &str,
    service_name: &str,
    customer_name: &str,
    amount: Decimal,
) -> Result<String, AppError> {
    {
        let db = state.conn()?;
        let details = queries::get_booking_by_id(&db, booking_id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
        if details.booking.status != BookingStatus::AwaitingPayment {
            return Err(AppError::InvalidTransition {
                from: details.booking.status,
                action: StatusChange::PaymentConfirmed,
            });
        }
    }

    let (success_url, cancel_url) = return_urls(&state.config.public_url, booking_id);
    let request = DepositRequest {
        booking_id: booking_id.to_string(),
        service_name: service_name.to_string(),
        customer_name: customer_name.to_string(),
        amount_minor: to_minor_units(amount)?,
        currency: state.config.deposit_currency.clone(),
        success_url,
        cancel_url,
    };

    match state.payments.create_session(&request).await {
        Ok(session) => {
            tracing::info!(
                booking_id,
                session_id = %session.id,
                amount_minor = request.amount_minor,
                "deposit session created"
            );
            Ok(session.redirect_url)
        }
        Err(e) => {
            tracing::warn!(booking_id, error = %e, "deposit session creation failed");
            Err(AppError::PaymentInit(format!("{e:#}")))
        }
    }
}

/// Starts the configured deposit for a stored booking, resolving the service
/// and customer names from the record.
pub async fn begin_configured_deposit(
    state: &AppState,
    booking_id: &str,
) -> Result<String, AppError> {
    let details = {
        let db = state.conn()?;
        queries::get_booking_by_id(&db, booking_id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?
    };
    let service_name = details
        .service
        .map(|s| s.name)
        .unwrap_or_else(|| "appointment".to_string());

    begin_deposit(
        state,
        booking_id,
        &service_name,
        &details.booking.customer_name,
        state.config.deposit_amount,
    )
    .await
}

/// Handles the processor's verdict for a booking. Success confirms the
/// payment (idempotently); failure leaves the booking untouched.
pub fn on_return(
    state: &AppState,
    booking_id: &str,
    succeeded: bool,
) -> Result<Option<Booking>, AppError> {
    if !succeeded {
        tracing::info!(booking_id, "deposit not completed, booking left awaiting payment");
        return Ok(None);
    }

    let confirmation = {
        let db = state.conn()?;
        lifecycle::confirm_payment(&db, booking_id)?
    };
    // Replayed returns leave consoles alone
    if confirmation.changed {
        publish_booking_change(state, &confirmation.booking);
    }

    Ok(Some(confirmation.booking))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(Decimal::TEN).unwrap(), 1000);
        assert_eq!(to_minor_units(Decimal::new(1999, 2)).unwrap(), 1999);
        assert_eq!(to_minor_units(Decimal::new(12345, 3)).unwrap(), 1234);
    }

    #[test]
    fn test_minor_units_rejects_non_positive() {
        assert!(matches!(
            to_minor_units(Decimal::ZERO),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            to_minor_units(Decimal::NEGATIVE_ONE),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_return_urls() {
        let (success, cancel) = return_urls("https://shop.example", "bk-9");
        assert_eq!(
            success,
            "https://shop.example/payment/return?success=true&booking_id=bk-9"
        );
        assert_eq!(
            cancel,
            "https://shop.example/payment/return?canceled=true&booking_id=bk-9"
        );
    }
}
