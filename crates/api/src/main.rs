use anyhow::Context;

use forgeledger_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    forgeledger_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        lock_timeout_ms = config.ledger.lock_timeout.as_millis() as u64,
        closed_through = ?config.ledger.periods.closed_through_date(),
        "ledger configured"
    );

    let app = forgeledger_api::app::build_default_app(config.ledger);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
