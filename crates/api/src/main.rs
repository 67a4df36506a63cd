use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hserp_api::config::ServerConfig;
use hserp_api::middleware::panic::install_panic_hook;
use hserp_api::router::build_app_router;
use hserp_api::routes::permission_points;
use hserp_api::state::AppState;
use hserp_db::repositories::RbacRepo;
use hserp_db::PoolConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hserp_api=debug,hserp_db=info,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
    install_panic_hook();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        mode = ?config.app_mode,
        "Loaded server configuration"
    );

    // --- Database ---
    let pool_config = PoolConfig::from_env().context("Invalid database configuration")?;
    let pool = hserp_db::create_pool(&pool_config)
        .await
        .context("Failed to connect to database")?;
    tracing::info!(max_connections = pool_config.max_connections, "Database connection pool created");

    hserp_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    if config.rbac.auto_migrate {
        hserp_db::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
        tracing::info!("Database migrations applied");
    }

    // --- App state and router ---
    let state = AppState::new(pool.clone(), config.clone());
    let app = build_app_router(state.clone(), &config);

    if config.rbac.auto_permission_sync {
        RbacRepo::sync_permissions(&pool, &permission_points(&state))
            .await
            .context("Failed to sync permission points")?;
    }

    // --- Cache janitors ---
    let cancel = CancellationToken::new();
    let janitors = state.spawn_janitors(&cancel);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().context("Invalid HOST address")?,
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!(%addr, "Starting server");

    let stop = CancellationToken::new();
    let mut server = tokio::spawn({
        let stop = stop.clone();
        async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .await
        }
    });

    tokio::select! {
        () = shutdown_signal() => {}
        result = &mut server => {
            result.context("Server task failed")?.context("Server error")?;
            return Ok(());
        }
    }

    // --- Post-shutdown cleanup ---
    stop.cancel();
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    match tokio::time::timeout(drain, &mut server).await {
        Ok(result) => result.context("Server task failed")?.context("Server error")?,
        Err(_) => {
            tracing::warn!(timeout_secs = drain.as_secs(), "In-flight requests did not finish, aborting");
            server.abort();
        }
    }
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    for janitor in janitors {
        let _ = tokio::time::timeout(Duration::from_secs(5), janitor).await;
    }
    tracing::info!("Cache janitors stopped");

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
