use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use mq::{MqConfig, init_mq};
use server::config::{AppConfig, CorsConfig};
use server::database;
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = database::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;

    let mq = if config.mq.enabled {
        match init_mq(MqConfig {
            url: config.mq.url.clone(),
            pool_size: config.mq.pool_size,
        })
        .await
        {
            Ok(queue) => Some(Arc::new(queue)),
            Err(e) => {
                warn!(error = %e, "MQ unavailable; submissions will stay Pending");
                None
            }
        }
    } else {
        None
    };

    let events = if config.mq.enabled {
        mq::pubsub::client(&config.mq.url).ok()
    } else {
        None
    };

    let cors = cors_layer(&config.server.cors);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState {
        db,
        mq,
        events,
        config: Arc::new(config),
    };

    let app = server::build_router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(config.max_age));

    if config.allow_origins.is_empty() || config.allow_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allow_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}
