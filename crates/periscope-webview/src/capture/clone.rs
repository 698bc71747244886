//! Base layer from a styled clone of the page rendered through SVG.

use periscope_dom::serialize::to_xml;
use periscope_dom::{Canvas, Document, DrawError, ImageLoadError, NodeId, NodeKind, Rect};
use thiserror::Error;

/// Computed properties copied onto every cloned element.
pub const INLINED_PROPERTIES: &[&str] = &[
    "background-color",
    "background-image",
    "color",
    "font-family",
    "font-size",
    "font-weight",
    "font-style",
    "line-height",
    "text-align",
    "text-decoration",
    "padding",
    "margin",
    "border",
    "border-radius",
    "display",
    "position",
    "left",
    "top",
    "width",
    "height",
    "overflow",
    "opacity",
    "transform",
    "box-shadow",
];

/// Elements never carried into the clone.
const STRIPPED_TAGS: &[&str] = &["script", "iframe"];

#[derive(Debug, Error)]
pub enum CloneError {
    #[error(transparent)]
    Load(#[from] ImageLoadError),

    #[error(transparent)]
    Draw(#[from] DrawError),
}

/// Render the clone-and-rasterize layer onto `canvas`.
///
/// The canvas is only touched once the snapshot image has loaded, so a
/// failure leaves it as it was.
pub fn render(doc: &Document, canvas: &mut Canvas, max_children: usize) -> Result<(), CloneError> {
    let svg = snapshot_svg(doc, max_children);
    let image = doc.load_svg_image(&svg)?;
    let viewport = doc.viewport();
    canvas.draw_image(&image, Rect::new(0.0, 0.0, viewport.width, viewport.height))?;
    Ok(())
}

/// The page body as an SVG document with a full-viewport `foreignObject`.
pub fn snapshot_svg(doc: &Document, max_children: usize) -> String {
    let viewport = doc.viewport();
    let markup = snapshot_markup(doc, max_children);
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\">\
         <foreignObject x=\"0\" y=\"0\" width=\"100%\" height=\"100%\">{markup}</foreignObject></svg>",
        w = viewport.width,
        h = viewport.height,
    )
}

/// Deep-clone the body into a detached document with computed styles
/// inlined, then serialize it as XHTML.
pub fn snapshot_markup(doc: &Document, max_children: usize) -> String {
    let viewport = doc.viewport();
    let mut clone = Document::new(viewport.width, viewport.height);
    let clone_body = clone.body();
    inline_styles(doc, doc.body(), &mut clone, clone_body);
    copy_children(doc, doc.body(), &mut clone, clone_body, max_children, true);
    to_xml(&clone, clone_body)
}

fn copy_children(
    src: &Document,
    from: NodeId,
    dst: &mut Document,
    to: NodeId,
    max_children: usize,
    styled: bool,
) {
    for (index, child) in src.children(from).iter().enumerate() {
        // Only the first `max_children` per level (and their subtrees) get
        // styles; the rest are cloned bare.
        let style_child = styled && index < max_children;
        match src.kind(*child) {
            NodeKind::Text(text) => {
                dst.append_text(to, text);
            }
            NodeKind::Element(el) => {
                if STRIPPED_TAGS.contains(&el.tag.as_str()) {
                    continue;
                }
                let copy = dst.create_element(&el.tag);
                for (k, v) in &el.attrs {
                    if k != "style" {
                        dst.set_attribute(copy, k, v);
                    }
                }
                if let Some(value) = &el.value {
                    dst.set_attribute(copy, "value", value);
                }
                dst.append_child(to, copy);
                if style_child {
                    inline_styles(src, *child, dst, copy);
                }
                copy_children(src, *child, dst, copy, max_children, style_child);
            }
        }
    }
}

fn inline_styles(src: &Document, from: NodeId, dst: &mut Document, to: NodeId) {
    let computed = src.computed_style(from);
    let declarations: Vec<String> = INLINED_PROPERTIES
        .iter()
        .filter_map(|prop| {
            let value = computed.property_value(prop);
            (!value.is_empty()).then(|| format!("{prop}: {value};"))
        })
        .collect();
    if !declarations.is_empty() {
        dst.set_attribute(to, "style", &declarations.join(" "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Document {
        let mut doc = Document::new(200.0, 100.0);
        let body = doc.body();
        let card = doc.append_element(body, "div", &[("class", "card")]);
        doc.set_rect(card, Rect::new(10.0, 10.0, 50.0, 40.0));
        doc.set_style(card, "background-color", "rgb(255, 0, 0)");
        doc.set_style(card, "cursor", "pointer");
        doc.append_element(body, "script", &[]);
        let frame = doc.append_element(body, "iframe", &[("src", "https://other.test/")]);
        doc.set_rect(frame, Rect::new(100.0, 0.0, 100.0, 100.0));
        doc
    }

    #[test]
    fn clone_strips_scripts_and_frames() {
        let markup = snapshot_markup(&page(), 500);
        assert!(!markup.contains("<script"));
        assert!(!markup.contains("<iframe"));
        assert!(markup.starts_with("<body xmlns=\"http://www.w3.org/1999/xhtml\""));
    }

    #[test]
    fn clone_inlines_allow_listed_properties_only() {
        let markup = snapshot_markup(&page(), 500);
        assert!(markup.contains("background-color: rgb(255, 0, 0);"));
        assert!(markup.contains("left: 10px;"));
        assert!(!markup.contains("cursor"));
    }

    #[test]
    fn styles_stop_after_child_limit() {
        let mut doc = Document::new(100.0, 100.0);
        let body = doc.body();
        for i in 0..3 {
            let id = format!("p{i}");
            let el = doc.append_element(body, "p", &[("id", id.as_str())]);
            doc.set_style(el, "color", "red");
        }
        let markup = snapshot_markup(&doc, 2);
        assert!(markup.contains("<p id=\"p1\" style="));
        assert!(markup.contains("<p id=\"p2\"></p>"));
    }

    #[test]
    fn render_paints_onto_canvas() {
        let doc = page();
        let mut canvas = Canvas::new(200.0, 100.0, 1920);
        render(&doc, &mut canvas, 500).unwrap();
        let red = periscope_dom::Color::from_rgba(255, 0, 0, 255);
        assert_eq!(canvas.pixel(20, 20), Some(red));
    }

    #[test]
    fn cross_origin_image_fails_the_layer() {
        let mut doc = Document::new(100.0, 100.0).with_location("https://app.test/");
        let body = doc.body();
        let img = doc.append_element(body, "img", &[("src", "https://cdn.test/logo.png")]);
        doc.set_rect(img, Rect::new(0.0, 0.0, 10.0, 10.0));
        let mut canvas = Canvas::new(100.0, 100.0, 1920);
        let err = render(&doc, &mut canvas, 500).unwrap_err();
        assert!(matches!(err, CloneError::Load(ImageLoadError::Security(_))));
        assert_eq!(canvas.pixel(5, 5), Some(periscope_dom::Color::WHITE));
    }
}
