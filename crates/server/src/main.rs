use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use codenews_core::{
    create_authenticator, load_config, seed_demo_data, validate_config, Authenticator, Config,
    DatabaseBackend, FaultInjector, InMemoryTicketStore, LogFormat, NoFaults, RandomFaults,
    SqliteTicketStore, TicketFilter, TicketQueue, TicketStore,
};
use codenews_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn TicketStore>> {
    let store: Arc<dyn TicketStore> = match config.database.backend {
        DatabaseBackend::Memory => {
            info!("Using in-memory ticket store (state is lost on restart)");
            Arc::new(InMemoryTicketStore::new())
        }
        DatabaseBackend::Sqlite => {
            info!("Using SQLite ticket store at {:?}", config.database.path);
            Arc::new(
                SqliteTicketStore::new(&config.database.path)
                    .context("Failed to create ticket store")?,
            )
        }
    };

    if config.queue.seed_demo_data {
        let existing = store
            .count(&TicketFilter::new())
            .context("Failed to count stored tickets")?;
        if existing == 0 {
            let seeded = seed_demo_data(store.as_ref()).context("Failed to seed demo data")?;
            info!("Seeded {} demo tickets", seeded);
        } else {
            info!("Store already holds {} tickets, skipping demo data", existing);
        }
    }

    Ok(store)
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("CODENEWS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    init_logging(config.logging.format);
    info!("CodeNews {} starting", VERSION);
    info!("Configuration loaded from {:?}", config_path);
    info!("Auth method: {}", config.auth.method.as_str());

    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    let store = open_store(&config)?;

    let faults: Arc<dyn FaultInjector> = if config.faults.enabled() {
        warn!(
            "Fault injection enabled: queue operations fail with probability {}",
            config.faults.probability
        );
        Arc::new(RandomFaults::new(
            config.faults.probability,
            config.faults.seed,
        ))
    } else {
        Arc::new(NoFaults)
    };

    let queue = Arc::new(
        TicketQueue::new(store)
            .with_faults(faults)
            .with_policy(config.queue.policy())
            .with_profiles(config.queue.profile_policy()),
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, authenticator, queue));
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
