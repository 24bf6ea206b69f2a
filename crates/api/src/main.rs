use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use formcraft_api::background;
use formcraft_api::config::ServerConfig;
use formcraft_api::editor::EditorSessionManager;
use formcraft_api::router::build_app_router;
use formcraft_api::state::AppState;
use formcraft_assistant::{AssistantConfig, MistralClient};
use formcraft_builder::{BuildTracker, BuilderApi, BuilderConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formcraft_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = formcraft_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    formcraft_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    formcraft_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // --- External services ---
    let assistant_config = AssistantConfig::from_env();
    let builder_config = BuilderConfig::from_env();
    for (var, secs) in [
        ("ASSISTANT_TIMEOUT_SECS", assistant_config.timeout_secs),
        ("BUILDER_TIMEOUT_SECS", builder_config.timeout_secs),
    ] {
        if let Err(message) = config.check_upstream_timeout(var, secs) {
            panic!("{message}");
        }
    }

    let assistant = MistralClient::new(assistant_config)
        .expect("Failed to build the assistant HTTP client");
    let builder = Arc::new(
        BuilderApi::new(builder_config).expect("Failed to build the build-service HTTP client"),
    );
    let builds = Arc::new(BuildTracker::new(builder.clone()));

    // --- Editor sessions ---
    let editor = Arc::new(EditorSessionManager::new(Duration::from_secs(
        config.editor_idle_mins as u64 * 60,
    )));

    // --- Background tasks ---
    let background_cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(background::editor_sweep::run(
        Arc::clone(&editor),
        background_cancel.clone(),
    ));
    let cleanup_handle = tokio::spawn(background::token_cleanup::run(
        pool.clone(),
        background_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        assistant: Arc::new(assistant),
        deployer: builder,
        builds: Arc::clone(&builds),
        editor,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    builds.shutdown_all().await;
    tracing::info!("Build polling cancelled");

    background_cancel.cancel();
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    let _ = tokio::time::timeout(drain, sweep_handle).await;
    let _ = tokio::time::timeout(drain, cleanup_handle).await;
    tracing::info!("Background tasks stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
