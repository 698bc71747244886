//! Cross-frame message types understood by frame agents.

/// Parent -> frame: render yourself and reply with a JPEG data URL.
pub const CAPTURE_PREVIEW: &str = "capture-preview";
/// Frame -> parent: `{id, success, data | error}`.
pub const CAPTURE_PREVIEW_RESULT: &str = "capture-preview-result";
/// Parent -> frame: invoke an exposed method with `args`.
pub const CALL: &str = "call";
/// Frame -> parent: `{id, result, error}`.
pub const CALL_RESULT: &str = "call-result";
