//! Open webview windows, keyed by label.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use periscope_common::{EventBus, WindowRegistry};
use periscope_dom::Document;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::handlers::HandlerSettings;
use crate::runtime::Webview;

/// Spawns one [`Webview`] task per window and tracks which labels exist.
#[derive(Clone)]
pub struct WebviewRegistry {
    bus: EventBus,
    settings: HandlerSettings,
    windows: Arc<RwLock<HashMap<String, JoinHandle<()>>>>,
}

impl WebviewRegistry {
    pub fn new(bus: EventBus, settings: HandlerSettings) -> Self {
        Self {
            bus,
            settings,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Open a window showing `doc`. An existing window with the same label
    /// is closed first.
    pub fn open(&self, label: &str, doc: Document) {
        let task = Webview::new(label, doc, self.bus.clone())
            .with_settings(self.settings.clone())
            .spawn();
        let Ok(mut windows) = self.windows.write() else {
            warn!(label, "window registry poisoned, not opening");
            task.abort();
            return;
        };
        if let Some(old) = windows.insert(label.to_string(), task) {
            old.abort();
            info!(label, "replaced webview window");
        } else {
            info!(label, "opened webview window");
        }
    }

    /// Track a window whose page is served elsewhere (a native webview).
    /// `task` must be the task draining that window's inbox.
    pub fn track(&self, label: &str, task: JoinHandle<()>) {
        let Ok(mut windows) = self.windows.write() else {
            warn!(label, "window registry poisoned, not tracking");
            task.abort();
            return;
        };
        if let Some(old) = windows.insert(label.to_string(), task) {
            old.abort();
        }
        info!(label, "tracking native webview window");
    }

    /// Close a window. Returns false when no window had that label.
    pub fn close(&self, label: &str) -> bool {
        self.bus.detach(label);
        let removed = self
            .windows
            .write()
            .ok()
            .and_then(|mut windows| windows.remove(label));
        match removed {
            Some(task) => {
                task.abort();
                info!(label, "closed webview window");
                true
            }
            None => false,
        }
    }
}

impl WindowRegistry for WebviewRegistry {
    fn contains(&self, label: &str) -> bool {
        self.windows
            .read()
            .map(|windows| windows.get(label).is_some_and(|t| !t.is_finished()))
            .unwrap_or(false)
            && self.bus.is_attached(label)
    }

    fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .windows
            .read()
            .map(|windows| windows.keys().cloned().collect())
            .unwrap_or_default();
        labels.sort();
        labels
    }
}
