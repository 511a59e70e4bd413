//! appshare-server: WebSocket front end for the application session engine.
//!
//! Clients connect, introduce themselves with a hello, then launch and stop
//! applications, watch their windows as JPEG frame streams, send input and
//! share instances through collaborative sessions.

mod connection;
mod dispatch;
mod error;
mod protocol;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use appshare_common::ScreenSize;
use appshare_config::{config_to_json, toml_loader, AppShareConfig, ReloadManager};
use appshare_display::{
    DisplayAdapter, NativeProcessHost, ProcessHost, ProgramBehavior, VirtualDisplay,
    VirtualProcessHost, X11Display,
};
use appshare_engine::{Engine, OwnerPolicy};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio_tungstenite::accept_async;
use tracing_subscriber::EnvFilter;

use crate::connection::{handle_connection, ConnectionSettings};

const HEADLESS_SCREEN: ScreenSize = ScreenSize::new(1920, 1080);

#[derive(Parser, Debug)]
#[command(name = "appshare-server", version, about = "Share desktop applications with browser clients")]
struct Args {
    /// Config file path override.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding `server.port`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Use the in-memory display and process host instead of X11.
    #[arg(long)]
    headless: bool,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        eprintln!("\n--- appshare-server crashed ---");
        eprintln!("Running applications were not stopped cleanly.");
        eprintln!("-------------------------------\n");
        default_hook(info);
    }));
}

/// `RUST_LOG` wins, then `--log-level`, then `logging` from the config file.
fn init_logging(args: &Args, config_path: &std::path::Path) {
    let fallback = match &args.log_level {
        Some(level) => format!("appshare={level}"),
        None => toml_loader::load_from_path(config_path)
            .map(|c| c.logging.filter_directive())
            .unwrap_or_else(|_| "appshare=info".into()),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}

async fn backends(
    config: &AppShareConfig,
    headless: bool,
) -> (Arc<dyn DisplayAdapter>, Arc<dyn ProcessHost>) {
    if headless {
        let display = Arc::new(VirtualDisplay::new(HEADLESS_SCREEN));
        let host = Arc::new(VirtualProcessHost::new(Some(display.clone())));
        for app in &config.apps.allowed {
            host.install(app.trim(), ProgramBehavior::Normal).await;
        }
        tracing::info!("running headless on a virtual display");
        (display, host)
    } else {
        (
            Arc::new(X11Display::new(config.apps.display.clone())),
            Arc::new(NativeProcessHost::new()),
        )
    }
}

/// Push every new config revision into the engine.
fn spawn_reload(engine: Arc<Engine>, mut config_rx: watch::Receiver<AppShareConfig>, port: Option<u16>) {
    tokio::spawn(async move {
        while config_rx.changed().await.is_ok() {
            let mut config = config_rx.borrow_and_update().clone();
            if let Some(port) = port {
                config.server.port = u32::from(port);
            }
            engine.reconfigure(config).await;
            tracing::info!("config change applied; server section takes effect on restart");
        }
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    install_panic_hook();
    let args = Args::parse();

    let config_path = match args.config.clone() {
        Some(path) => path,
        None => match toml_loader::default_config_path() {
            Ok(path) => path,
            Err(e) => {
                eprintln!("appshare-server: {e}");
                return ExitCode::FAILURE;
            }
        },
    };
    init_logging(&args, &config_path);

    let (mut config, config_rx) = ReloadManager::start(config_path).await;
    if let Some(port) = args.port {
        config.server.port = u32::from(port);
    }
    if args.print_config {
        println!("{}", config_to_json(&config));
        return ExitCode::SUCCESS;
    }

    let (display, host) = backends(&config, args.headless).await;
    let engine = match Engine::new(config.clone(), display, host, Arc::new(OwnerPolicy)).await {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            tracing::error!(code = e.code(), error = %e, "engine failed to start");
            return ExitCode::FAILURE;
        }
    };
    spawn_reload(engine.clone(), config_rx, args.port);

    let addr = config.server.listen_addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind TCP listener");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%addr, "appshare-server listening");

    let slots = Arc::new(Semaphore::new(config.server.max_connections as usize));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let Ok(permit) = slots.clone().try_acquire_owned() else {
                        tracing::warn!(%peer, "connection limit reached, refusing client");
                        continue;
                    };
                    let engine = engine.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        let settings = ConnectionSettings::from_config(&engine.config().await);
                        match accept_async(stream).await {
                            Ok(ws) => handle_connection(ws, peer, engine, settings).await,
                            Err(e) => {
                                tracing::warn!(%peer, error = %e, "WS handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            },
            _ = &mut shutdown => {
                tracing::info!("interrupt received, shutting down");
                break;
            }
        }
    }

    engine.shutdown().await;
    ExitCode::SUCCESS
}
