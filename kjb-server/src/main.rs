//! Kodi Jukebox server - main entry point

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kjb_common::config::{load_config, JukeboxConfig};
use kjb_server::player::{DetectionPoller, KodiClient, KodiEventFeed, PlayerGateway};
use kjb_server::{
    create_router, AppContext, BroadcastHub, JsonFileStore, LibraryIndex, Reconciler,
    ReconcilerSettings, StateStore, VoteEngine,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Snapshots buffered per SSE observer before it is dropped
const OBSERVER_CAPACITY: usize = 64;

/// Player events buffered ahead of the reconciler
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Command-line arguments; each overrides the config file
#[derive(Parser, Debug)]
#[command(name = "kjb-server")]
#[command(about = "Vote-driven jukebox for Kodi")]
#[command(version)]
struct Args {
    /// Configuration file (default: <config dir>/kodi-jukebox/config.toml)
    #[arg(short, long, env = "KJB_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "KJB_PORT")]
    port: Option<u16>,

    /// Snapshot file
    #[arg(long, env = "KJB_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Kodi host name or address
    #[arg(long, env = "KJB_KODI_HOST")]
    kodi_host: Option<String>,

    /// Directory on the Kodi host to build the library from
    #[arg(long, env = "KJB_KODI_DIRECTORY")]
    kodi_directory: Option<String>,

    /// Log level or filter directives (RUST_LOG takes precedence)
    #[arg(long, env = "KJB_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut JukeboxConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(state_file) = &self.state_file {
            config.state_file = state_file.clone();
        }
        if let Some(host) = &self.kodi_host {
            config.kodi.host = host.clone();
        }
        if let Some(directory) = &self.kodi_directory {
            config.kodi.directory = directory.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

/// A bare level applies to this service and the HTTP layer; anything with
/// directives is used as written
fn log_filter(level: &str) -> EnvFilter {
    let directives = if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("kjb_server={level},kjb_common={level},tower_http={level}")
    };
    EnvFilter::try_new(&directives)
        .unwrap_or_else(|_| EnvFilter::new("kjb_server=info,kjb_common=info,tower_http=info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is not loaded yet; start at the default level and tighten or
    // loosen once it is, unless RUST_LOG pins it
    let env_filter = EnvFilter::try_from_default_env().ok();
    let pinned = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| log_filter("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Kodi Jukebox (kjb-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);

    if !pinned {
        if let Err(e) = filter_handle.reload(log_filter(&config.logging.level)) {
            warn!("Failed to apply configured log level: {}", e);
        }
    }

    info!("State file: {}", config.state_file.display());
    info!("Kodi JSON-RPC: {}", config.kodi.rpc_url());

    let kodi = KodiClient::new(&config.kodi).context("Failed to create Kodi client")?;
    let gateway: Arc<dyn PlayerGateway> = Arc::new(kodi);

    let persistence = Arc::new(JsonFileStore::new(config.state_file.clone()));
    let store = Arc::new(StateStore::open(persistence, BroadcastHub::new(OBSERVER_CAPACITY)).await);

    let library = Arc::new(LibraryIndex::new());
    if let Err(e) = library
        .refresh(gateway.as_ref(), &config.kodi.directory)
        .await
    {
        warn!("Starting with an empty library, use /api/library/refresh to retry: {}", e);
    }

    let reconciler = Reconciler::new(
        Arc::clone(&store),
        Arc::clone(&library),
        Arc::clone(&gateway),
        ReconcilerSettings::from(&config.playback),
    )
    .await;
    let phase = reconciler.watch_phase();

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(reconciler.run(event_rx));

    KodiEventFeed::new(
        config.kodi.ws_url(),
        Arc::clone(&gateway),
        config.playback.reconnect_delay(),
        config.playback.event_settle(),
    )
    .spawn(event_tx.clone());

    DetectionPoller::new(
        Arc::clone(&gateway),
        config.playback.initial_detect_delay(),
        config.playback.poll_interval(),
    )
    .spawn(event_tx);

    let shutdown = CancellationToken::new();
    let ctx = AppContext {
        store: Arc::clone(&store),
        library: Arc::clone(&library),
        votes: VoteEngine::new(Arc::clone(&store), Arc::clone(&library)),
        gateway,
        phase,
        library_directory: config.kodi.directory.clone(),
        shutdown: shutdown.clone(),
    };
    let app = create_router(ctx, config.static_dir.clone());

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address))?;
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    match store.flush().await {
        Ok(()) => info!("Final state saved"),
        Err(e) => error!("Failed to save final state: {}", e),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
///
/// Cancels `shutdown` once a signal arrives so long-lived SSE streams close
/// and `axum::serve` can finish draining.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }

    shutdown.cancel();
}
