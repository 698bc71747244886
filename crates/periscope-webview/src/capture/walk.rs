//! Best-effort base layer painted straight from the live tree.
//!
//! Draws loaded images, text of common text-bearing tags, and canvases at
//! their bounding rects. Gradients, shadows and transforms are ignored.

use periscope_dom::{Canvas, Color, Document, NodeId, NodeKind};
use tracing::debug;

const TEXT_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "span", "a", "li", "td", "th", "label", "button",
    "div", "strong", "em", "b", "i", "code", "pre",
];

/// Longest run of text painted per element.
const MAX_TEXT_CHARS: usize = 200;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkReport {
    pub images: usize,
    pub texts: usize,
    pub canvases: usize,
    /// Images that failed to draw (e.g. cross-origin).
    pub skipped: usize,
}

/// Paint the DOM-walk layer. Never fails; per-element draw errors are
/// counted and skipped.
pub fn render(doc: &Document, canvas: &mut Canvas) -> WalkReport {
    let mut report = WalkReport::default();

    if let Some(bg) = doc.computed_style(doc.body()).color("background-color") {
        canvas.fill_rect(doc.rect(doc.body()), bg);
    }

    for img in doc.get_elements_by_tag_name("img") {
        let Some(el) = doc.element(img) else { continue };
        let Some(bitmap) = el.bitmap.as_ref().filter(|_| el.loaded) else {
            continue;
        };
        let cross_origin = el
            .attribute("src")
            .map(|src| doc.is_cross_origin(src))
            .unwrap_or(false);
        match canvas.draw_image_from(bitmap, el.rect, cross_origin) {
            Ok(()) => report.images += 1,
            Err(e) => {
                debug!(node = img.0, error = %e, "skipping image in DOM walk");
                report.skipped += 1;
            }
        }
    }

    for node in doc.all_elements() {
        let Some(tag) = doc.tag_name(node) else { continue };
        if !TEXT_TAGS.contains(&tag) {
            continue;
        }
        let text = bounded_text(doc, node);
        let rect = doc.rect(node);
        if text.is_empty() || rect.is_empty() {
            continue;
        }
        let style = doc.computed_style(node);
        let color = style.color("color").unwrap_or(Color::BLACK);
        canvas.fill_text(&text, rect.x, rect.y, style.font_size(), color);
        report.texts += 1;
    }

    for node in doc.get_elements_by_tag_name("canvas") {
        let Some(el) = doc.element(node) else { continue };
        if let Some(bitmap) = &el.bitmap {
            if canvas.draw_image(bitmap, el.rect).is_ok() {
                report.canvases += 1;
            }
        }
    }

    report
}

/// The element's own text, trimmed and cut to `MAX_TEXT_CHARS`.
fn bounded_text(doc: &Document, node: NodeId) -> String {
    let mut text = String::new();
    for child in doc.children(node) {
        if let NodeKind::Text(t) = doc.kind(*child) {
            text.push_str(t);
        }
    }
    text.trim().chars().take(MAX_TEXT_CHARS).collect()
}
