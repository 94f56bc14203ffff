use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ats_sim::config::{load_normalization_map, load_scoring_config, Config};
use ats_sim::matching::pipeline::Session;
use ats_sim::routes::build_router;
use ats_sim::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ATS match simulator v{}", env!("CARGO_PKG_VERSION"));

    let scoring = load_scoring_config(config.scoring_config_path.as_deref())?;
    let map = load_normalization_map(config.normalization_map_path.as_deref())?;
    info!(
        "Loaded normalization map ({} terms), n-gram length {}",
        map.len(),
        scoring.max_ngram_length
    );
    let mut session = Session::new(map, scoring)?;
    if let Some(path) = &config.normalization_map_path {
        session = session.with_map_file(path);
    }
    let session = Arc::new(session);

    let state = AppState {
        config: config.clone(),
        session,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
