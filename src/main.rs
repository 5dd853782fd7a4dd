use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use trimflow::config::AppConfig;
use trimflow::db;
use trimflow::services::payments::stripe::StripeCheckoutProvider;
use trimflow::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if config.deposit_required {
        anyhow::ensure!(
            !config.stripe_secret_key.is_empty(),
            "STRIPE_SECRET_KEY must be set when DEPOSIT_REQUIRED=true"
        );
        if config.stripe_webhook_secret.is_empty() {
            tracing::warn!("STRIPE_WEBHOOK_SECRET not set, webhook signatures will not be checked");
        }
        tracing::info!(
            amount = %config.deposit_amount,
            currency = %config.deposit_currency,
            "deposits enabled"
        );
    } else {
        tracing::info!("deposits disabled, bookings start pending");
    }

    let payments = StripeCheckoutProvider::new(
        config.stripe_secret_key.clone(),
        config.stripe_api_base.clone(),
    );

    let (booking_tx, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        payments: Box::new(payments),
        booking_tx,
    });

    let app = trimflow::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
