//! Permission-free viewport capture.
//!
//! The base layer comes from the first strategy that succeeds:
//! 1. [`clone`]: styled clone rasterized through an SVG `foreignObject`
//! 2. [`walk`]: images, text and canvases painted from the live tree
//!
//! [`compose`] then draws nested frames on top, whichever layer won.

pub mod clone;
pub mod compose;
pub mod walk;

use std::time::Duration;

use periscope_config::ScreenshotConfig;
use periscope_dom::{Canvas, Document, MessageHub};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use self::compose::{FrameReport, FrameTarget};

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    /// JPEG quality, 1-100.
    pub quality: u8,
    pub max_width: u32,
    pub frame_timeout: Duration,
    pub max_children: usize,
}

impl CaptureOptions {
    pub fn from_config(config: &ScreenshotConfig) -> Self {
        Self {
            quality: config.quality,
            max_width: config.max_width,
            frame_timeout: Duration::from_millis(config.frame_timeout_ms),
            max_children: config.max_children,
        }
    }

    pub fn with_output(mut self, quality: u8, max_width: u32) -> Self {
        self.quality = quality.clamp(1, 100);
        self.max_width = max_width;
        self
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::from_config(&ScreenshotConfig::default())
    }
}

/// Which strategy produced the base layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Clone,
    Walk,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
    pub strategy: Strategy,
    pub frames: FrameReport,
}

impl Capture {
    pub fn to_value(&self) -> Value {
        json!({
            "data": self.data_url,
            "width": self.width,
            "height": self.height,
            "strategy": self.strategy,
            "compositedFrames": self.frames.composited,
            "omittedFrames": self.frames.omitted,
        })
    }
}

/// A rendered base layer plus what is needed to finish compositing without
/// holding on to the document.
pub struct BaseLayer {
    canvas: Canvas,
    strategy: Strategy,
    frames: Vec<FrameTarget>,
    hub: MessageHub,
}

impl BaseLayer {
    pub fn render(doc: &Document, opts: &CaptureOptions) -> Self {
        let viewport = doc.viewport();
        let mut canvas = Canvas::new(viewport.width, viewport.height, opts.max_width);
        let strategy = match clone::render(doc, &mut canvas, opts.max_children) {
            Ok(()) => Strategy::Clone,
            Err(e) => {
                debug!(error = %e, "clone capture failed, walking the DOM");
                let report = walk::render(doc, &mut canvas);
                debug!(?report, "DOM walk finished");
                Strategy::Walk
            }
        };
        Self {
            canvas,
            strategy,
            frames: compose::frame_targets(doc),
            hub: doc.message_hub().clone(),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Composite nested frames and encode.
    pub async fn finish(mut self, opts: &CaptureOptions) -> Result<Capture, String> {
        let frames = compose::composite(
            &self.frames,
            &self.hub,
            &mut self.canvas,
            opts.quality,
            opts.frame_timeout,
        )
        .await;
        let data_url = self
            .canvas
            .to_jpeg_data_url(opts.quality)
            .map_err(|e| e.to_string())?;
        Ok(Capture {
            data_url,
            width: self.canvas.width(),
            height: self.canvas.height(),
            strategy: self.strategy,
            frames,
        })
    }
}

/// Capture the viewport of `doc` as a JPEG data URL.
pub async fn capture_viewport(doc: &mut Document, opts: &CaptureOptions) -> Result<Capture, String> {
    let base = BaseLayer::render(doc, opts);
    let capture = base.finish(opts).await?;
    info!(
        width = capture.width,
        height = capture.height,
        strategy = ?capture.strategy,
        omitted_frames = capture.frames.omitted,
        "viewport captured"
    );
    Ok(capture)
}
