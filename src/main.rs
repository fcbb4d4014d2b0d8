use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use users_api::config::StoreKind;
use users_api::{
    build_app, telemetry, AppConfig, AuthService, MemoryUserStore, PgUserStore, UserStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration errors are fatal before anything else starts
    let config = AppConfig::from_env().context("Invalid configuration")?;

    telemetry::init(&config.log_level, config.environment.is_production());

    tracing::info!(
        environment = %config.environment,
        version = %config.version,
        "Starting {}",
        config.app_name
    );

    let store: Arc<dyn UserStore> = match config.store {
        StoreKind::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;

            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(database_url)
                .await
                .context("Failed to connect to database")?;

            let store = PgUserStore::new(pool);
            store.migrate().await.context("Failed to run migrations")?;
            Arc::new(store)
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory user store; data is lost on restart");
            Arc::new(MemoryUserStore::new())
        }
    };

    let auth = Arc::new(
        AuthService::new(store, config.auth.clone())
            .context("Failed to initialize auth service")?,
    );

    if let Some(initial) = &config.initial_superuser {
        auth.ensure_superuser(&initial.email, &initial.username, &initial.password)
            .await
            .context("Failed to create initial superuser")?;
    }

    let addr = format!("{}:{}", config.host, config.port);
    let app = build_app(auth, config);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
