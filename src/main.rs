use std::{net::SocketAddr, sync::Arc};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};

use bengkel_inventory as api;

#[derive(Debug, Parser)]
#[command(name = "bengkel-inventory", version, about = "Repair shop inventory API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            api::db::run_migrations(&db_pool)
                .await
                .context("failed running migrations")?;
            info!("migrations applied");
            api::db::close_pool(db_pool).await?;
            Ok(())
        }
        Command::Serve => serve(cfg, db_pool).await,
    }
}

async fn serve(cfg: api::config::AppConfig, db_pool: api::db::DbPool) -> anyhow::Result<()> {
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    let cors_layer = api::cors_layer(&cfg).ok_or_else(|| {
        anyhow!("Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true")
    })?;

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;

    let db_arc = Arc::new(db_pool);
    let state = Arc::new(api::AppState::new(db_arc.clone(), cfg));

    if let Some((email, password)) = state.config.bootstrap_admin() {
        let created = state
            .services
            .users
            .ensure_admin(email, password, &state.config.bootstrap_admin_name)
            .await
            .context("failed to bootstrap admin account")?;
        if created {
            info!(email, "bootstrap admin account created");
        }
    }

    api::handlers::health::init_start_time();
    let app = api::build_router(state).layer(cors_layer);

    info!("bengkel-inventory listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped, closing database pool");
    if let Some(pool) = Arc::into_inner(db_arc) {
        api::db::close_pool(pool).await?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
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
}
