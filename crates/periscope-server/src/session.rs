//! Per-connection request state.

use std::sync::Arc;

use periscope_bridge::Bridge;
use periscope_common::{new_id, EventBus};
use tracing::info;

/// Everything one client connection owns: its id and its bridge, whose
/// pending table holds only this connection's requests.
pub struct Session {
    id: String,
    bridge: Arc<Bridge>,
}

impl Session {
    pub fn open(bus: EventBus) -> Self {
        Self {
            id: new_id(),
            bridge: Arc::new(Bridge::new(bus)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bridge(&self) -> Arc<Bridge> {
        self.bridge.clone()
    }

    /// Cancel this connection's in-flight requests. Other sessions and the
    /// handlers already running in webviews are unaffected.
    pub fn close(&self) -> usize {
        let cancelled = self.bridge.shutdown();
        info!(session = %self.id, cancelled, "session closed");
        cancelled
    }
}
