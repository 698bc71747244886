//! Socket listeners: a Unix domain socket or a TCP port.

use std::path::PathBuf;

use periscope_config::{TransportConfig, TransportKind};
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::connection::{handle_connection, ServerContext};

/// Where the server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl Endpoint {
    pub fn from_config(transport: &TransportConfig) -> Self {
        match transport.kind {
            TransportKind::Unix => Self::Unix(transport.socket_path.clone()),
            TransportKind::Tcp => Self::Tcp(transport.tcp_addr()),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

pub enum Listener {
    #[cfg(unix)]
    Unix { listener: UnixListener, path: PathBuf },
    Tcp(TcpListener),
}

impl Listener {
    /// Bind `endpoint`. A stale Unix socket file is replaced.
    pub async fn bind(endpoint: &Endpoint) -> std::io::Result<Self> {
        match endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                match std::fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
                let listener = UnixListener::bind(path)?;
                Ok(Self::Unix {
                    listener,
                    path: path.clone(),
                })
            }
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unix sockets are not available on this platform",
            )),
            Endpoint::Tcp(addr) => Ok(Self::Tcp(TcpListener::bind(addr).await?)),
        }
    }

    /// The bound address, e.g. to learn the port after binding port 0.
    pub fn local_endpoint(&self) -> std::io::Result<Endpoint> {
        match self {
            #[cfg(unix)]
            Self::Unix { path, .. } => Ok(Endpoint::Unix(path.clone())),
            Self::Tcp(listener) => Ok(Endpoint::Tcp(listener.local_addr()?.to_string())),
        }
    }

    /// Accept connections until `shutdown` turns true. Each connection runs
    /// on its own task.
    pub async fn run(self, ctx: ServerContext, mut shutdown: watch::Receiver<bool>) {
        match self.local_endpoint() {
            Ok(endpoint) => info!(%endpoint, "periscope listening"),
            Err(e) => warn!(error = %e, "listening on an unknown address"),
        }
        loop {
            tokio::select! {
                accepted = self.accept() => {
                    match accepted {
                        Ok(conn) => {
                            let ctx = ctx.clone();
                            tokio::spawn(conn.serve(ctx));
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
                _ = shutdown.wait_for(|&stop| stop) => {
                    info!("listener shutting down");
                    break;
                }
            }
        }
        #[cfg(unix)]
        {
            if let Self::Unix { path, .. } = &self {
                let _ = std::fs::remove_file(path);
            }
        }
    }

    async fn accept(&self) -> std::io::Result<Accepted> {
        match self {
            #[cfg(unix)]
            Self::Unix { listener, path } => {
                let (stream, _) = listener.accept().await?;
                Ok(Accepted::Unix(stream, path.display().to_string()))
            }
            Self::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                Ok(Accepted::Tcp(stream, addr.to_string()))
            }
        }
    }
}

enum Accepted {
    #[cfg(unix)]
    Unix(tokio::net::UnixStream, String),
    Tcp(tokio::net::TcpStream, String),
}

impl Accepted {
    async fn serve(self, ctx: ServerContext) {
        match self {
            #[cfg(unix)]
            Self::Unix(stream, peer) => handle_connection(stream, peer, ctx).await,
            Self::Tcp(stream, peer) => {
                let _ = stream.set_nodelay(true);
                handle_connection(stream, peer, ctx).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_from_config() {
        let mut transport = TransportConfig::default();
        transport.kind = TransportKind::Tcp;
        transport.port = 4000;
        assert_eq!(
            Endpoint::from_config(&transport),
            Endpoint::Tcp("127.0.0.1:4000".into())
        );
        assert_eq!(Endpoint::Tcp("127.0.0.1:4000".into()).to_string(), "tcp:127.0.0.1:4000");
    }

    #[tokio::test]
    async fn tcp_port_zero_reports_real_port() {
        let listener = Listener::bind(&Endpoint::Tcp("127.0.0.1:0".into())).await.unwrap();
        let Endpoint::Tcp(addr) = listener.local_endpoint().unwrap() else {
            panic!("expected tcp endpoint");
        };
        assert!(!addr.ends_with(":0"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stale_unix_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("periscope.sock");
        std::fs::write(&path, b"stale").unwrap();
        let listener = Listener::bind(&Endpoint::Unix(path.clone())).await.unwrap();
        assert_eq!(listener.local_endpoint().unwrap(), Endpoint::Unix(path));
    }
}
