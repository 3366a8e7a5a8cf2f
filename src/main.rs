use std::net::SocketAddr;
use std::sync::Arc;

use contract_comparator::api;
use contract_comparator::config::Config;
use contract_comparator::handlers::AppState;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Upload and extraction folders.
/// - The Gemini client, when an API key is configured.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
///
/// # Returns
///
/// * `anyhow::Result<()>` - Ok if the server runs successfully, or an error if initialization fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contract_comparator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    tokio::fs::create_dir_all(&config.extractions_dir).await?;

    let port = config.port;
    let model = config.gemini_model.clone();

    // Build application state
    let app_state = match AppState::from_config(config.clone()) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to initialize Gemini client: {}", e);
            AppState::from_config(Config {
                google_api_key: None,
                ..config
            })?
        }
    };
    if app_state.gemini.is_some() {
        tracing::info!("✓ Gemini client initialized: {}", model);
    }
    tracing::info!("Contract collection: {}", app_state.store.path().display());

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let app = api::router(Arc::new(app_state))
        .layer(ServiceBuilder::new().layer(GovernorLayer {
            config: governor_conf,
        }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
