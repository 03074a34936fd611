//! # Habitrack API Server
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/habitrack JWT_SECRET=... cargo run -p habitrack-api
//! ```
//!
//! Set `LOG_FORMAT=json` for structured logs and `RUST_LOG` to override the
//! default filter.

use anyhow::Context;
use habitrack_api::{
    app::{build_router, AppState},
    config::Config,
    middleware::rate_limit::{RateLimit, RateLimiter},
};
use habitrack_shared::db::{
    migrations::run_migrations,
    pool::{create_pool, DatabaseConfig},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(
        "Habitrack API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let pool = create_pool(
        DatabaseConfig::new(config.database.url.clone())
            .with_max_connections(config.database.max_connections),
    )
    .await
    .context("Failed to connect to database")?;

    run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let rate_limiter = match &config.rate_limit.redis_url {
        Some(url) => {
            let limit = RateLimit::per_minute(config.rate_limit.per_minute);
            match RateLimiter::connect(url, limit).await {
                Ok(limiter) => {
                    tracing::info!(per_minute = config.rate_limit.per_minute, "Rate limiting enabled");
                    Some(limiter)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Redis unavailable, rate limiting disabled");
                    None
                }
            }
        }
        None => {
            tracing::info!("REDIS_URL not set, rate limiting disabled");
            None
        }
    };

    let address = config.bind_address();
    let app = build_router(AppState::new(pool, config, rate_limiter));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "habitrack_api=debug,habitrack_shared=debug,tower_http=debug".into()
    });

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
