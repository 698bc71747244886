use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which kind of listener the transport binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Unix,
    Tcp,
}

/// Listener configuration for external clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
    /// Path of the Unix domain socket.
    pub socket_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Largest accepted request line, in bytes.
    pub max_frame_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: if cfg!(unix) {
                TransportKind::Unix
            } else {
                TransportKind::Tcp
            },
            socket_path: std::env::temp_dir().join("periscope.sock"),
            host: "127.0.0.1".into(),
            port: 9229,
            max_frame_bytes: 1024 * 1024,
        }
    }
}

impl TransportConfig {
    /// `host:port` for the TCP listener.
    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
