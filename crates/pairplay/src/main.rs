use pairplay::prelude::*;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), PairplayError> {
    init_tracing();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        max_seats = config.room.default_max_seats,
        repair_policy = %config.room.repair_policy,
        idle_timeout_secs = config.idle_timeout.as_secs(),
        ping_interval_secs = config.ping_interval.as_secs(),
        "starting pairplay"
    );

    let server = PairplayServer::builder().config(config).build().await?;
    match server.local_addr() {
        Ok(addr) => tracing::info!(%addr, "listening"),
        Err(e) => tracing::warn!(error = %e, "could not read bound address"),
    }

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    }
}

/// Log to stdout, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
