//! periscope: socket bridge for automating webview windows.

use std::path::PathBuf;

use clap::Parser;
use periscope_common::{ConfigError, PeriscopeError};
use periscope_config::{toml_loader, validation, PeriscopeConfig, TransportKind};
use periscope_server::{Endpoint, Host, Listener};
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "periscope", about = "Socket bridge for automating webview windows")]
struct Args {
    /// Config file; defaults to the platform config directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen on TCP at host:port instead of the configured transport.
    #[arg(long, conflicts_with = "socket")]
    tcp: Option<String>,

    /// Listen on this Unix socket path.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Log filter, e.g. `periscope=debug`.
    #[arg(long)]
    log_level: Option<String>,

    /// Show the default window as a native webview instead of an
    /// in-process page.
    #[cfg(feature = "desktop")]
    #[arg(long)]
    desktop: bool,

    /// Page the native window loads.
    #[cfg(feature = "desktop")]
    #[arg(long, requires = "desktop")]
    url: Option<String>,
}

fn main() {
    let args = Args::parse();
    let config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("periscope: {e}");
            std::process::exit(2);
        }
    };

    let filter = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    #[cfg(feature = "desktop")]
    let result = if args.desktop {
        run_desktop(&runtime, config, args.url.clone())
    } else {
        runtime.block_on(run(config))
    };
    #[cfg(not(feature = "desktop"))]
    let result = runtime.block_on(run(config));

    if let Err(e) = result {
        error!("periscope stopped: {e}");
        std::process::exit(1);
    }
}

fn load(args: &Args) -> Result<PeriscopeConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => toml_loader::load_from_path(path)?,
        None => periscope_config::load_config()?,
    };
    if let Some(addr) = &args.tcp {
        let (host, port) = parse_tcp(addr)?;
        config.transport.kind = TransportKind::Tcp;
        config.transport.host = host;
        config.transport.port = port;
    }
    if let Some(path) = &args.socket {
        config.transport.kind = TransportKind::Unix;
        config.transport.socket_path = path.clone();
    }
    validation::validate(&config)?;
    Ok(config)
}

fn parse_tcp(addr: &str) -> Result<(String, u16), ConfigError> {
    let invalid = || ConfigError::ValidationError(format!("--tcp expects host:port, got '{addr}'"));
    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    if host.is_empty() {
        return Err(invalid());
    }
    Ok((host.to_string(), port))
}

async fn run(config: PeriscopeConfig) -> Result<(), PeriscopeError> {
    let endpoint = Endpoint::from_config(&config.transport);
    let host = Host::new(config);
    host.open_default_window();

    let listener = Listener::bind(&endpoint).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            let _ = shutdown_tx.send(true);
        }
    });

    listener.run(host.context(), shutdown_rx).await;
    Ok(())
}

/// Serve the socket on the runtime while the native window owns the main
/// thread. Closing the window stops the server.
#[cfg(feature = "desktop")]
fn run_desktop(
    runtime: &tokio::runtime::Runtime,
    config: PeriscopeConfig,
    url: Option<String>,
) -> Result<(), PeriscopeError> {
    use periscope_server::desktop::{self, DesktopOptions};
    use periscope_server::DEFAULT_VIEWPORT;

    let endpoint = Endpoint::from_config(&config.transport);
    let label = config.windows.default_label.clone();
    let host = Host::new(config);

    let listener = runtime.block_on(Listener::bind(&endpoint))?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = runtime.spawn(listener.run(host.context(), shutdown_rx));

    let options = DesktopOptions {
        title: format!("periscope: {label}"),
        label,
        url,
        size: DEFAULT_VIEWPORT,
    };
    let result = desktop::run(&host, runtime.handle().clone(), options);

    info!("native window closed, stopping server");
    let _ = shutdown_tx.send(true);
    if let Err(e) = runtime.block_on(server) {
        error!("server task failed: {e}");
    }
    result
}
