//! Window lookup shared by the host dispatcher and the webview registry.

/// The set of webview windows that currently exist on the host.
pub trait WindowRegistry: Send + Sync {
    fn contains(&self, label: &str) -> bool;

    /// Labels of every open window, sorted.
    fn labels(&self) -> Vec<String>;
}
