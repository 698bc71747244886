//! Rasterizing SVG `foreignObject` snapshots.
//!
//! The webview's image loader is a seam ([`SvgLoader`]); [`MarkupPainter`]
//! paints the inline-styled XHTML that capture snapshots contain:
//! backgrounds, text and `data:` images, each at the absolute box its
//! inline style declares.

use image::RgbaImage;
use thiserror::Error;
use tracing::debug;

use crate::canvas::{decode_data_url, Canvas};
use crate::document::origin_of;
use crate::geometry::{Color, Rect};
use crate::serialize::unescape;
use crate::style::{parse_px, ComputedStyle};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ImageLoadError {
    /// Loading would pull cross-origin content into the image.
    #[error("SecurityError: {0}")]
    Security(String),

    #[error("image failed to load: {0}")]
    Decode(String),

    #[error("malformed SVG: {0}")]
    Malformed(String),
}

/// Loads an SVG document as a bitmap, the way an `Image` element would.
pub trait SvgLoader {
    fn load(&self, svg: &str) -> Result<RgbaImage, ImageLoadError>;
}

/// Paints inline-styled XHTML embedded in an SVG `foreignObject`.
#[derive(Debug, Clone)]
pub struct MarkupPainter {
    origin: String,
}

impl MarkupPainter {
    /// `origin` is the loading page's origin; images from any other origin
    /// make the load fail with a security error.
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
        }
    }
}

impl SvgLoader for MarkupPainter {
    fn load(&self, svg: &str) -> Result<RgbaImage, ImageLoadError> {
        let tokens = tokenize(svg)?;
        let Some(Token::Open { attrs, .. }) = tokens
            .iter()
            .find(|t| matches!(t, Token::Open { name, .. } if name == "svg"))
        else {
            return Err(ImageLoadError::Malformed("no <svg> root".into()));
        };
        let width = svg_length(attrs, "width")?;
        let height = svg_length(attrs, "height")?;

        let mut canvas = Canvas::new(width, height, width.ceil() as u32);
        let mut stack: Vec<Frame> = Vec::new();

        for token in &tokens {
            match token {
                Token::Open {
                    name,
                    attrs,
                    self_closing,
                } => {
                    let style = attr(attrs, "style")
                        .map(ComputedStyle::parse_inline)
                        .unwrap_or_default();
                    let rect = style_rect(&style);
                    if let (Some(rect), Some(bg)) = (rect, style.color("background-color")) {
                        canvas.fill_rect(rect, bg.with_opacity(style.opacity()));
                    }
                    if name == "img" {
                        if let (Some(rect), Some(src)) = (rect, attr(attrs, "src")) {
                            self.paint_image(&mut canvas, src, rect)?;
                        }
                    }
                    if !self_closing {
                        stack.push(Frame {
                            name: name.clone(),
                            style,
                            rect,
                            pen_x: 0.0,
                        });
                    }
                }
                Token::Close(name) => {
                    if let Some(pos) = stack.iter().rposition(|f| &f.name == name) {
                        stack.truncate(pos);
                    }
                }
                Token::Text(text) => {
                    let Some(frame) = stack.last_mut() else {
                        continue;
                    };
                    if matches!(frame.name.as_str(), "style" | "script" | "svg" | "foreignObject") {
                        continue;
                    }
                    let text = text.trim();
                    let Some(rect) = frame.rect.filter(|_| !text.is_empty()) else {
                        continue;
                    };
                    let font_size = frame.style.font_size();
                    let color = frame.style.color("color").unwrap_or(Color::BLACK);
                    canvas.fill_text(text, rect.x + frame.pen_x, rect.y, font_size, color);
                    frame.pen_x += (text.chars().count() as f64 + 1.0) * font_size * 0.6;
                }
            }
        }

        Ok(canvas.pixels().clone())
    }
}

impl MarkupPainter {
    fn paint_image(&self, canvas: &mut Canvas, src: &str, rect: Rect) -> Result<(), ImageLoadError> {
        if src.starts_with("data:") {
            let image = decode_data_url(src).map_err(|e| ImageLoadError::Decode(e.to_string()))?;
            canvas
                .draw_image(&image, rect)
                .map_err(|e| ImageLoadError::Decode(e.to_string()))?;
            return Ok(());
        }
        match origin_of(src) {
            Some(origin) if origin != self.origin => Err(ImageLoadError::Security(format!(
                "cross-origin image {src} in snapshot"
            ))),
            _ => {
                // Same-origin URLs are not fetched; the box stays as painted.
                debug!(src = %src, "skipping non-inline snapshot image");
                Ok(())
            }
        }
    }
}

struct Frame {
    name: String,
    style: ComputedStyle,
    rect: Option<Rect>,
    pen_x: f64,
}

fn style_rect(style: &ComputedStyle) -> Option<Rect> {
    Some(Rect::new(
        style.px("left")?,
        style.px("top")?,
        style.px("width").unwrap_or(0.0),
        style.px("height").unwrap_or(0.0),
    ))
}

fn svg_length(attrs: &[(String, String)], name: &str) -> Result<f64, ImageLoadError> {
    attr(attrs, name)
        .and_then(parse_px)
        .filter(|v| *v > 0.0)
        .ok_or_else(|| ImageLoadError::Malformed(format!("<svg> needs a positive {name}")))
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

// =============================================================================
// Tokenizer
// =============================================================================

#[derive(Debug, PartialEq)]
enum Token {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close(String),
    Text(String),
}

fn tokenize(src: &str) -> Result<Vec<Token>, ImageLoadError> {
    let mut tokens = Vec::new();
    let mut rest = src;
    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            tokens.push(Token::Text(unescape(rest)));
            break;
        };
        if lt > 0 {
            tokens.push(Token::Text(unescape(&rest[..lt])));
        }
        rest = &rest[lt..];
        if let Some(after) = rest.strip_prefix("<!--") {
            let end = after
                .find("-->")
                .ok_or_else(|| ImageLoadError::Malformed("unterminated comment".into()))?;
            rest = &after[end + 3..];
            continue;
        }
        let gt = find_tag_end(rest)
            .ok_or_else(|| ImageLoadError::Malformed("unterminated tag".into()))?;
        let inner = &rest[1..gt];
        rest = &rest[gt + 1..];
        if inner.starts_with('?') || inner.starts_with('!') {
            continue;
        }
        if let Some(name) = inner.strip_prefix('/') {
            tokens.push(Token::Close(name.trim().to_string()));
            continue;
        }
        let self_closing = inner.ends_with('/');
        let inner = inner.trim_end_matches('/');
        let name_end = inner
            .find(|c: char| c.is_whitespace())
            .unwrap_or(inner.len());
        tokens.push(Token::Open {
            name: inner[..name_end].to_string(),
            attrs: parse_attrs(&inner[name_end..])?,
            self_closing,
        });
    }
    Ok(tokens)
}

/// Index of the `>` closing the tag at the start of `s`, skipping quotes.
fn find_tag_end(s: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_attrs(s: &str) -> Result<Vec<(String, String)>, ImageLoadError> {
    let mut attrs = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_string();
        rest = rest[name_end..].trim_start();
        let Some(after_eq) = rest.strip_prefix('=') else {
            attrs.push((name, String::new()));
            continue;
        };
        let after_eq = after_eq.trim_start();
        let quote = after_eq
            .chars()
            .next()
            .filter(|c| matches!(c, '"' | '\''))
            .ok_or_else(|| ImageLoadError::Malformed(format!("unquoted attribute {name}")))?;
        let body = &after_eq[1..];
        let end = body
            .find(quote)
            .ok_or_else(|| ImageLoadError::Malformed(format!("unterminated attribute {name}")))?;
        attrs.push((name, unescape(&body[..end])));
        rest = body[end + 1..].trim_start();
    }
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn svg(body: &str) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"100\" height=\"50\">\
             <foreignObject x=\"0\" y=\"0\" width=\"100%\" height=\"100%\">{body}</foreignObject></svg>"
        )
    }

    #[test]
    fn paints_backgrounds_at_inline_boxes() {
        let painter = MarkupPainter::new("https://app.test");
        let image = painter
            .load(&svg(
                "<div xmlns=\"http://www.w3.org/1999/xhtml\" style=\"background-color: rgb(255, 0, 0); left: 10px; top: 10px; width: 20px; height: 20px;\"></div>",
            ))
            .unwrap();
        assert_eq!(image.dimensions(), (100, 50));
        assert_eq!(*image.get_pixel(15, 15), Rgba([255, 0, 0, 255]));
        assert_eq!(*image.get_pixel(50, 15), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn paints_text_in_element_color() {
        let painter = MarkupPainter::new("null");
        let image = painter
            .load(&svg(
                "<p style=\"color: rgb(0, 0, 255); left: 0px; top: 0px; width: 100px; height: 20px; font-size: 20px;\">M &amp; M</p>",
            ))
            .unwrap();
        assert_eq!(*image.get_pixel(3, 10), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn cross_origin_image_is_a_security_error() {
        let painter = MarkupPainter::new("https://app.test");
        let err = painter
            .load(&svg(
                "<img src=\"https://cdn.test/a.png\" style=\"left: 0px; top: 0px; width: 10px; height: 10px;\" />",
            ))
            .unwrap_err();
        assert!(matches!(err, ImageLoadError::Security(_)));
    }

    #[test]
    fn rejects_malformed_documents() {
        let painter = MarkupPainter::new("null");
        assert!(matches!(painter.load("<div>"), Err(ImageLoadError::Malformed(_))));
        assert!(matches!(
            painter.load("<svg width=\"10\" height=\"10\"><p"),
            Err(ImageLoadError::Malformed(_))
        ));
    }

    #[test]
    fn tokenizer_handles_quotes_and_self_closing() {
        let tokens = tokenize("<a title='x > y' href=\"#\"/>t").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Open {
                    name: "a".into(),
                    attrs: vec![("title".into(), "x > y".into()), ("href".into(), "#".into())],
                    self_closing: true,
                },
                Token::Text("t".into()),
            ]
        );
    }
}
