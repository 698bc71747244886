//! 2D raster surface used to compose captures.
//!
//! Draw calls take viewport CSS pixels; the canvas applies its scale factor
//! so a wide viewport rasterizes at reduced resolution.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use thiserror::Error;

use crate::geometry::{Color, Rect};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DrawError {
    /// The source would taint the canvas (cross-origin pixels).
    #[error("SecurityError: the canvas has been tainted by cross-origin data")]
    Tainted,

    #[error("image has no pixels")]
    EmptyImage,

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),
}

pub struct Canvas {
    pixels: RgbaImage,
    scale: f64,
}

impl Canvas {
    /// A canvas for a `viewport_width` x `viewport_height` page, scaled down
    /// to `max_width` pixels wide when the viewport is wider. Never upscales.
    pub fn new(viewport_width: f64, viewport_height: f64, max_width: u32) -> Self {
        let scale = scale_for(viewport_width, max_width);
        let width = ((viewport_width * scale).round() as u32).max(1);
        let height = ((viewport_height * scale).round() as u32).max(1);
        Self {
            pixels: RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])),
            scale,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        (x < self.width() && y < self.height()).then(|| {
            let Rgba([r, g, b, a]) = *self.pixels.get_pixel(x, y);
            Color::from_rgba(r, g, b, a)
        })
    }

    /// Device-pixel bounds of a viewport rect, clipped to the canvas.
    fn device_box(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let r = rect.scaled(self.scale);
        let x0 = r.x.max(0.0).round() as u32;
        let y0 = r.y.max(0.0).round() as u32;
        let x1 = ((r.x + r.width).round().max(0.0) as u32).min(self.width());
        let y1 = ((r.y + r.height).round().max(0.0) as u32).min(self.height());
        (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
    }

    /// Fill a rect, alpha-blending over existing pixels.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        if color.a == 0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.device_box(rect) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                blend(self.pixels.get_pixel_mut(x, y), color);
            }
        }
    }

    /// Draw `image` stretched over `dest`.
    pub fn draw_image(&mut self, image: &RgbaImage, dest: Rect) -> Result<(), DrawError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DrawError::EmptyImage);
        }
        let Some((x0, y0, x1, y1)) = self.device_box(dest) else {
            return Ok(());
        };
        let full = dest.scaled(self.scale);
        let target_w = (full.width.round() as u32).max(1);
        let target_h = (full.height.round() as u32).max(1);
        let resized = if (target_w, target_h) == image.dimensions() {
            image.clone()
        } else {
            imageops::resize(image, target_w, target_h, FilterType::Nearest)
        };
        let off_x = full.x.round() as i64;
        let off_y = full.y.round() as i64;
        for y in y0..y1 {
            for x in x0..x1 {
                let sx = x as i64 - off_x;
                let sy = y as i64 - off_y;
                if sx < 0 || sy < 0 || sx >= target_w as i64 || sy >= target_h as i64 {
                    continue;
                }
                let Rgba([r, g, b, a]) = *resized.get_pixel(sx as u32, sy as u32);
                blend(self.pixels.get_pixel_mut(x, y), Color::from_rgba(r, g, b, a));
            }
        }
        Ok(())
    }

    /// Draw an image loaded from `src`, refusing cross-origin sources.
    pub fn draw_image_from(
        &mut self,
        image: &RgbaImage,
        dest: Rect,
        cross_origin: bool,
    ) -> Result<(), DrawError> {
        if cross_origin {
            return Err(DrawError::Tainted);
        }
        self.draw_image(image, dest)
    }

    /// Decode a `data:image/...;base64,` URL and draw it over `dest`.
    pub fn draw_data_url(&mut self, data_url: &str, dest: Rect) -> Result<(), DrawError> {
        let image = decode_data_url(data_url)?;
        self.draw_image(&image, dest)
    }

    /// Paint `text` starting at `(x, y)` (the top-left of the line box),
    /// one solid block per visible glyph.
    pub fn fill_text(&mut self, text: &str, x: f64, y: f64, font_size: f64, color: Color) {
        let advance = font_size * 0.6;
        let glyph_w = font_size * 0.5;
        let glyph_h = font_size * 0.7;
        let top = y + font_size * 0.2;
        for (i, c) in text.chars().enumerate() {
            if c.is_whitespace() {
                continue;
            }
            self.fill_rect(
                Rect::new(x + i as f64 * advance, top, glyph_w, glyph_h),
                color,
            );
        }
    }

    /// JPEG-encode the canvas as a `data:image/jpeg;base64,` URL.
    /// `quality` is clamped to 1..=100.
    pub fn to_jpeg_data_url(&self, quality: u8) -> Result<String, DrawError> {
        let bytes = self.to_jpeg(quality)?;
        Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)))
    }

    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, DrawError> {
        let rgb = image::DynamicImage::ImageRgba8(self.pixels.clone()).to_rgb8();
        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality.clamp(1, 100));
        encoder
            .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
            .map_err(|e| DrawError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

/// `max_width / viewport_width` when the viewport is wider, else 1.
pub fn scale_for(viewport_width: f64, max_width: u32) -> f64 {
    if max_width > 0 && viewport_width > max_width as f64 {
        max_width as f64 / viewport_width
    } else {
        1.0
    }
}

pub fn decode_data_url(data_url: &str) -> Result<RgbaImage, DrawError> {
    let (header, payload) = data_url
        .split_once(',')
        .ok_or_else(|| DrawError::Decode("not a data URL".into()))?;
    if !header.starts_with("data:image/") || !header.ends_with(";base64") {
        return Err(DrawError::Decode(format!("unsupported data URL header `{header}`")));
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| DrawError::Decode(e.to_string()))?;
    let image = image::load_from_memory(&bytes).map_err(|e| DrawError::Decode(e.to_string()))?;
    Ok(image.to_rgba8())
}

fn blend(dst: &mut Rgba<u8>, src: Color) {
    let a = src.a as u32;
    let inv = 255 - a;
    let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * inv + 127) / 255) as u8;
    let Rgba([r, g, b, da]) = *dst;
    *dst = Rgba([
        mix(src.r, r),
        mix(src.g, g),
        mix(src.b, b),
        (a + da as u32 * inv / 255).min(255) as u8,
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_viewport_scales_to_max_width() {
        let canvas = Canvas::new(2560.0, 1440.0, 1920);
        assert_eq!(canvas.width(), 1920);
        assert_eq!(canvas.height(), 1080);
        assert!((canvas.scale() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn narrow_viewport_is_not_upscaled() {
        let canvas = Canvas::new(800.0, 600.0, 1920);
        assert_eq!((canvas.width(), canvas.height()), (800, 600));
        assert_eq!(canvas.scale(), 1.0);
    }

    #[test]
    fn fill_rect_uses_viewport_coordinates() {
        let mut canvas = Canvas::new(200.0, 100.0, 100);
        canvas.fill_rect(Rect::new(100.0, 0.0, 100.0, 100.0), Color::BLACK);
        assert_eq!(canvas.pixel(10, 10), Some(Color::WHITE));
        assert_eq!(canvas.pixel(60, 10), Some(Color::BLACK));
    }

    #[test]
    fn draw_image_stretches_to_dest() {
        let mut canvas = Canvas::new(100.0, 100.0, 1920);
        let red = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        canvas.draw_image(&red, Rect::new(10.0, 10.0, 20.0, 20.0)).unwrap();
        assert_eq!(canvas.pixel(15, 25), Some(Color::from_rgba(255, 0, 0, 255)));
        assert_eq!(canvas.pixel(35, 15), Some(Color::WHITE));
    }

    #[test]
    fn cross_origin_image_is_refused() {
        let mut canvas = Canvas::new(10.0, 10.0, 1920);
        let img = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        assert_eq!(
            canvas.draw_image_from(&img, Rect::new(0.0, 0.0, 5.0, 5.0), true),
            Err(DrawError::Tainted)
        );
        assert_eq!(canvas.pixel(1, 1), Some(Color::WHITE));
    }

    #[test]
    fn jpeg_round_trips_through_data_url() {
        let mut canvas = Canvas::new(64.0, 32.0, 1920);
        canvas.fill_rect(Rect::new(0.0, 0.0, 32.0, 32.0), Color::BLACK);
        let url = canvas.to_jpeg_data_url(90).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let decoded = decode_data_url(&url).unwrap();
        assert_eq!(decoded.dimensions(), (64, 32));
    }

    #[test]
    fn higher_quality_is_not_smaller() {
        let mut canvas = Canvas::new(128.0, 128.0, 1920);
        for i in 0..16 {
            let c = Color::from_rgba((i * 16) as u8, (255 - i * 16) as u8, (i * 7) as u8, 255);
            canvas.fill_rect(Rect::new(i as f64 * 8.0, 0.0, 8.0, 128.0), c);
        }
        canvas.fill_text("quality", 4.0, 40.0, 16.0, Color::BLACK);
        let low = canvas.to_jpeg(10).unwrap();
        let high = canvas.to_jpeg(100).unwrap();
        assert!(high.len() >= low.len());
    }

    #[test]
    fn malformed_data_url_is_a_decode_error() {
        assert!(matches!(decode_data_url("hello"), Err(DrawError::Decode(_))));
        assert!(matches!(
            decode_data_url("data:image/jpeg;base64,!!!"),
            Err(DrawError::Decode(_))
        ));
    }
}
