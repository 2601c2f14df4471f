use portico::{into_router, Config};
use portico_server::{build_application, prepare_database};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portico=debug,portico_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load_default().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load portico.toml, using defaults");
        Config::default()
    });
    config.apply_env_overrides();

    tracing::info!(
        name = %config.project.name,
        debug = config.app.debug,
        base_url = %config.server.base_url,
        "Configuration loaded"
    );

    let app = build_application(config)?;
    prepare_database(&app).await?;

    // Sessions are also swept when new ones start; this covers quiet periods
    let sessions = app.sessions().clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(sessions.lifetime().max(Duration::from_secs(1)));
        loop {
            tick.tick().await;
            sessions.purge_expired().await;
        }
    });

    let address = app.config().bind_address();
    let router = into_router(Arc::new(app)).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    axum::serve(listener, router).await?;
    Ok(())
}
