// recorder: supervises live-stream recording tasks for one or more rooms.

use clap::Parser;
use recorder::cli::Cli;
use recorder::config::{self, GlobalConfig};
use recorder::fleet::Fleet;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "recorder starting");

    let cli = Cli::parse();
    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("FATAL: failed to load config: {e}");
            std::process::exit(1);
        }
    };
    info!(tasks = cfg.tasks.len(), "config loaded");

    let mut fleet = Fleet::new(cfg.tasks);
    fleet.spawn_all();

    let status_handle = if !cfg.api_server.is_empty() {
        match cfg.api_server.parse() {
            Ok(bind) => {
                let fleet_handle = fleet.handle();
                let cancel = fleet.root_cancel();
                Some(tokio::spawn(async move {
                    if let Err(e) = recorder::status_http::serve(bind, fleet_handle, cancel).await {
                        error!(error = %e, "status_http: server error");
                    }
                }))
            }
            Err(e) => {
                error!(api_server = %cfg.api_server, error = %e, "invalid api_server address, introspection disabled");
                None
            }
        }
    } else {
        None
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping tasks");

    fleet.shutdown_and_wait().await;
    if let Some(handle) = status_handle {
        let _ = handle.await;
    }

    info!("recorder stopped");
}

fn load_config(cli: &Cli) -> Result<GlobalConfig, config::ConfigError> {
    if let Some(path) = &cli.config {
        config::load_config_from_path(path)
    } else {
        Ok(config::config_from_cli(&cli.room, &cli.save_to, cli.disk_write_buffer))
    }
}

/// SIGHUP/SIGINT/SIGTERM trigger graceful shutdown; SIGQUIT aborts
/// immediately without waiting for any task to unwind.
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let graceful = async {
        let mut hangup = signal::unix::signal(signal::unix::SignalKind::hangup())
            .expect("failed to install SIGHUP handler");
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = hangup.recv() => {}
            _ = terminate.recv() => {}
        }
    };
    #[cfg(not(unix))]
    let graceful = std::future::pending::<()>();

    #[cfg(unix)]
    let quit = async {
        signal::unix::signal(signal::unix::SignalKind::quit())
            .expect("failed to install SIGQUIT handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let quit = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = graceful => {}
        _ = quit => {
            error!("SIGQUIT received, aborting immediately");
            std::process::exit(130);
        }
    }
}
