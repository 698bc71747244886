//! Page model for a webview's execution context.
//!
//! Provides the pieces the in-webview handlers operate on:
//! - An element tree with attributes, form values, bounding rects and
//!   computed style
//! - Event dispatch with listeners, focus and an end-collapsed selection
//! - Per-origin local storage and a JavaScript evaluator (boa)
//! - Frame windows with `postMessage`-style correlated listeners
//! - A 2D canvas and the image loader used for SVG snapshots

pub mod canvas;
pub mod document;
pub mod events;
pub mod frame;
pub mod geometry;
pub mod painter;
pub mod script;
pub mod serialize;
pub mod storage;
pub mod style;

pub use canvas::{Canvas, DrawError};
pub use document::{Document, ElementData, NodeId, NodeKind, Viewport};
pub use events::DomEvent;
pub use frame::{FramePost, FrameWindow, MessageHub, MessageListener};
pub use geometry::{Color, Rect};
pub use painter::{ImageLoadError, MarkupPainter, SvgLoader};
pub use script::{BoaEngine, ScriptEngine};
pub use storage::LocalStorage;
pub use style::ComputedStyle;
