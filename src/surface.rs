// Owned RGBA drawing surface with the few 2D primitives composition needs

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use rusttype::{point, Font, Scale};
use std::io::Cursor;

use crate::composite::{Composite, OutputFormat};
use crate::errors::CompositionError;
use crate::layout::PhotoLayout;
use crate::loader::Raster;

/// Largest edge we are willing to allocate a surface for.
pub const MAX_SURFACE_DIMENSION: u32 = 16_384;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

pub struct Surface {
    pixels: RgbaImage,
}

/// Slot edges rounded to whole pixels. Kept in f64 so far-off-canvas or
/// oversized slots cannot overflow.
struct SlotBounds {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl SlotBounds {
    fn from_layout(rect: &PhotoLayout) -> Option<Self> {
        let left = f64::from(rect.x).round();
        let top = f64::from(rect.y).round();
        let right = (f64::from(rect.x) + f64::from(rect.width)).round();
        let bottom = (f64::from(rect.y) + f64::from(rect.height)).round();
        if ![left, top, right, bottom].iter().all(|v| v.is_finite()) {
            return None;
        }

        let (width, height) = (right - left, bottom - top);
        if width < 1.0 || height < 1.0 {
            return None;
        }
        Some(SlotBounds {
            left,
            top,
            width,
            height,
        })
    }

    /// Pixel range `(x0, y0, x1, y1)` of the slot that lands on a
    /// `canvas_width` x `canvas_height` canvas.
    fn visible(&self, canvas_width: u32, canvas_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.left.max(0.0);
        let y0 = self.top.max(0.0);
        let x1 = (self.left + self.width).min(f64::from(canvas_width));
        let y1 = (self.top + self.height).min(f64::from(canvas_height));
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

impl Surface {
    /// Acquire a transparent surface of the given size.
    pub fn new(width: u32, height: u32) -> Result<Self, CompositionError> {
        if width == 0
            || height == 0
            || width > MAX_SURFACE_DIMENSION
            || height > MAX_SURFACE_DIMENSION
        {
            return Err(CompositionError::ContextUnavailable { width, height });
        }
        Ok(Surface {
            pixels: RgbaImage::new(width, height),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn fill(&mut self, color: Rgba<u8>) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = color;
        }
    }

    /// Fill the pixels whose centers fall inside `rect`.
    pub fn fill_rect(&mut self, rect: &PhotoLayout, color: Rgba<u8>) {
        self.paint_where(rect.x, rect.y, rect.width, rect.height, color, |_, _| true);
    }

    /// Stroke a rectangle outline centered on its edges, `line_width` pixels wide.
    pub fn stroke_rect(&mut self, rect: &PhotoLayout, line_width: f32, color: Rgba<u8>) {
        let half = line_width / 2.0;
        let outer = (
            rect.x - half,
            rect.y - half,
            rect.width + line_width,
            rect.height + line_width,
        );
        let inner = (
            rect.x + half,
            rect.y + half,
            rect.width - line_width,
            rect.height - line_width,
        );

        self.paint_where(outer.0, outer.1, outer.2, outer.3, color, |cx, cy| {
            inner.2 <= 0.0
                || inner.3 <= 0.0
                || cx < inner.0
                || cy < inner.1
                || cx >= inner.0 + inner.2
                || cy >= inner.1 + inner.3
        });
    }

    /// Stretch `raster` to exactly fill `rect` and draw it clipped to a
    /// rounded rectangle. Aspect ratio is not preserved.
    ///
    /// Returns `false` when the slot rounds to nothing and was skipped.
    pub fn draw_clipped_stretched(
        &mut self,
        raster: &Raster,
        rect: &PhotoLayout,
        corner_radius: f32,
    ) -> bool {
        let Some(bounds) = SlotBounds::from_layout(rect) else {
            return false;
        };
        if raster.pixel_width() == 0 || raster.pixel_height() == 0 {
            return false;
        }
        let Some((x0, y0, x1, y1)) = bounds.visible(self.width(), self.height()) else {
            return true;
        };

        let radius = f64::from(corner_radius)
            .min(bounds.width / 2.0)
            .min(bounds.height / 2.0)
            .max(0.0);
        let fully_visible = x1 - x0 == bounds.width as u32 && y1 - y0 == bounds.height as u32;

        if fully_visible {
            // Bounded by the canvas size, so a full resample is affordable
            let stretched = imageops::resize(
                raster.pixels(),
                x1 - x0,
                y1 - y0,
                FilterType::Lanczos3,
            );
            for (sx, sy, src) in stretched.enumerate_pixels() {
                let (dx, dy) = (x0 + sx, y0 + sy);
                self.blend_slot_pixel(&bounds, radius, dx, dy, *src);
            }
        } else {
            // Only the on-canvas part is sampled
            for dy in y0..y1 {
                for dx in x0..x1 {
                    let u = (f64::from(dx) + 0.5 - bounds.left) / bounds.width;
                    let v = (f64::from(dy) + 0.5 - bounds.top) / bounds.height;
                    let src = sample_bilinear(raster.pixels(), u, v);
                    self.blend_slot_pixel(&bounds, radius, dx, dy, src);
                }
            }
        }
        true
    }

    fn blend_slot_pixel(
        &mut self,
        bounds: &SlotBounds,
        radius: f64,
        dx: u32,
        dy: u32,
        src: Rgba<u8>,
    ) {
        let coverage = rounded_rect_coverage(
            f64::from(dx) + 0.5 - bounds.left,
            f64::from(dy) + 0.5 - bounds.top,
            bounds.width,
            bounds.height,
            radius,
        );
        if coverage > 0.0 {
            let dst = self.pixels.get_pixel_mut(dx, dy);
            *dst = blend_over(*dst, src, coverage);
        }
    }

    /// Source-over composite `raster` across the whole surface, scaled to fit it.
    pub fn composite_over(&mut self, raster: &Raster) {
        let (width, height) = (self.width(), self.height());
        let scaled;
        let top = if raster.pixel_width() == width && raster.pixel_height() == height {
            raster.pixels()
        } else {
            scaled = imageops::resize(raster.pixels(), width, height, FilterType::Lanczos3);
            &scaled
        };

        for (dst, src) in self.pixels.pixels_mut().zip(top.pixels()) {
            *dst = blend_over(*dst, *src, 1.0);
        }
    }

    /// Draw `text` horizontally centered with its baseline at `baseline_y`.
    pub fn draw_text_centered(
        &mut self,
        font: &Font<'_>,
        text: &str,
        size: f32,
        color: Rgba<u8>,
        baseline_y: f32,
    ) {
        let scale = Scale::uniform(size);
        let ascent = font.v_metrics(scale).ascent;
        let text_width = measure_text_width(font, text, scale);
        let x = (self.width() as f32 - text_width) / 2.0;
        let y = baseline_y - ascent;
        draw_text_mut(
            &mut self.pixels,
            color,
            x.round() as i32,
            y.round() as i32,
            scale,
            font,
            text,
        );
    }

    pub fn encode(self, format: OutputFormat) -> Result<Composite, CompositionError> {
        let (width, height) = (self.width(), self.height());
        let image = match format {
            // JPEG has no alpha channel
            OutputFormat::Jpeg => {
                DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(self.pixels).to_rgb8())
            }
            OutputFormat::Png => DynamicImage::ImageRgba8(self.pixels),
        };
        let output = match format {
            OutputFormat::Jpeg => ImageOutputFormat::Jpeg(OutputFormat::JPEG_QUALITY),
            OutputFormat::Png => ImageOutputFormat::Png,
        };

        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), output)
            .map_err(|e| CompositionError::Encode(e.to_string()))?;

        Ok(Composite::new(bytes.into(), format, width, height))
    }

    fn paint_where(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgba<u8>,
        include: impl Fn(f32, f32) -> bool,
    ) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }

        // Pixel (px, py) is painted when its center lies in [x, x + width)
        let x0 = (x - 0.5).ceil().max(0.0) as u32;
        let y0 = (y - 0.5).ceil().max(0.0) as u32;
        let x1 = ((x + width - 0.5).ceil().max(0.0) as u32).min(self.width());
        let y1 = ((y + height - 0.5).ceil().max(0.0) as u32).min(self.height());

        for py in y0..y1 {
            for px in x0..x1 {
                if include(px as f32 + 0.5, py as f32 + 0.5) {
                    let dst = self.pixels.get_pixel_mut(px, py);
                    *dst = blend_over(*dst, color, 1.0);
                }
            }
        }
    }
}

fn measure_text_width(font: &Font<'_>, text: &str, scale: Scale) -> f32 {
    font.layout(text, scale, point(0.0, 0.0))
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}

/// Fraction of the pixel centered at (`px`, `py`) covered by a rounded
/// rectangle spanning `0..width` x `0..height`.
fn rounded_rect_coverage(px: f64, py: f64, width: f64, height: f64, radius: f64) -> f32 {
    if radius <= 0.0 {
        return 1.0;
    }

    let cx = px.clamp(radius, width - radius);
    let cy = py.clamp(radius, height - radius);
    let (dx, dy) = (px - cx, py - cy);
    if dx == 0.0 && dy == 0.0 {
        return 1.0;
    }

    // One-pixel antialiasing band along the corner arc
    let distance = (dx * dx + dy * dy).sqrt();
    (radius + 0.5 - distance).clamp(0.0, 1.0) as f32
}

/// Bilinear sample at normalized coordinates `u`, `v` in `0..1`.
fn sample_bilinear(image: &RgbaImage, u: f64, v: f64) -> Rgba<u8> {
    let (width, height) = (image.width(), image.height());
    let fx = (u * f64::from(width) - 0.5).clamp(0.0, f64::from(width - 1));
    let fy = (v * f64::from(height) - 0.5).clamp(0.0, f64::from(height - 1));
    let (x0, y0) = (fx.floor() as u32, fy.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(width - 1), (y0 + 1).min(height - 1));
    let (tx, ty) = (fx - f64::from(x0), fy - f64::from(y0));

    let mut out = [0u8; 4];
    for (c, channel) in out.iter_mut().enumerate() {
        let at = |x: u32, y: u32| f64::from(image.get_pixel(x, y)[c]);
        let top = at(x0, y0) * (1.0 - tx) + at(x1, y0) * tx;
        let bottom = at(x0, y1) * (1.0 - tx) + at(x1, y1) * tx;
        *channel = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Straight-alpha source-over: `src` scaled by `coverage` on top of `dst`.
fn blend_over(dst: Rgba<u8>, src: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let sa = f32::from(src[3]) / 255.0 * coverage.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return dst;
    }
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for i in 0..3 {
        let s = f32::from(src[i]);
        let d = f32::from(dst[i]);
        out[i] = ((s * sa + d * da * (1.0 - sa)) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn white_surface(width: u32, height: u32) -> Surface {
        let mut surface = Surface::new(width, height).unwrap();
        surface.fill(WHITE);
        surface
    }

    #[test]
    fn test_surface_rejects_unusable_sizes() {
        assert!(matches!(
            Surface::new(0, 10),
            Err(CompositionError::ContextUnavailable { width: 0, height: 10 })
        ));
        assert!(Surface::new(MAX_SURFACE_DIMENSION + 1, 10).is_err());
        assert!(Surface::new(600, 1800).is_ok());
    }

    #[test]
    fn test_fill_rect_covers_pixel_centers() {
        let mut surface = white_surface(20, 20);
        surface.fill_rect(&PhotoLayout::new(5.0, 5.0, 4.0, 3.0), RED);
        assert_eq!(surface.pixels().get_pixel(5, 5), &RED);
        assert_eq!(surface.pixels().get_pixel(8, 7), &RED);
        assert_eq!(surface.pixels().get_pixel(9, 7), &WHITE);
        assert_eq!(surface.pixels().get_pixel(8, 8), &WHITE);
    }

    #[test]
    fn test_stroke_rect_straddles_edge() {
        let mut surface = white_surface(40, 40);
        surface.stroke_rect(&PhotoLayout::new(10.0, 10.0, 20.0, 20.0), 4.0, RED);

        // 4px stroke covers 8..12 along the left edge
        assert_eq!(surface.pixels().get_pixel(8, 20), &RED);
        assert_eq!(surface.pixels().get_pixel(11, 20), &RED);
        assert_eq!(surface.pixels().get_pixel(7, 20), &WHITE);
        assert_eq!(surface.pixels().get_pixel(12, 20), &WHITE);
        // Interior untouched
        assert_eq!(surface.pixels().get_pixel(20, 20), &WHITE);
    }

    #[test]
    fn test_clipped_draw_rounds_corners() {
        let mut surface = white_surface(60, 60);
        let photo = Raster::new(RgbaImage::from_pixel(3, 7, BLUE));
        let drawn =
            surface.draw_clipped_stretched(&photo, &PhotoLayout::new(10.0, 10.0, 40.0, 30.0), 10.0);

        assert!(drawn);
        assert_eq!(surface.pixels().get_pixel(30, 25), &BLUE);
        assert_eq!(surface.pixels().get_pixel(10, 25), &BLUE);
        // Corner pixel lies outside the arc
        assert_eq!(surface.pixels().get_pixel(10, 10), &WHITE);
        assert_eq!(surface.pixels().get_pixel(49, 39), &WHITE);
        // Nothing drawn outside the slot
        assert_eq!(surface.pixels().get_pixel(50, 25), &WHITE);
    }

    #[test]
    fn test_clipped_draw_skips_empty_slot_and_clips_offscreen() {
        let mut surface = white_surface(20, 20);
        let photo = Raster::new(RgbaImage::from_pixel(2, 2, BLUE));

        let sliver = PhotoLayout::new(5.0, 5.0, 0.2, 10.0);
        let corner = PhotoLayout::new(-10.0, -10.0, 20.0, 20.0);
        assert!(!surface.draw_clipped_stretched(&photo, &sliver, 0.0));
        assert!(surface.draw_clipped_stretched(&photo, &corner, 0.0));
        assert_eq!(surface.pixels().get_pixel(0, 0), &BLUE);
        assert_eq!(surface.pixels().get_pixel(10, 10), &WHITE);
    }

    #[test]
    fn test_clipped_draw_survives_extreme_slot_coordinates() {
        let mut surface = white_surface(100, 100);
        let photo = Raster::new(RgbaImage::from_pixel(4, 4, BLUE));

        let far = PhotoLayout::new(-6e18, 0.0, 1.2e19, 10.0);
        assert!(surface.draw_clipped_stretched(&photo, &far, 10.0));
        assert_eq!(surface.pixels().get_pixel(50, 5), &BLUE);

        let beyond = PhotoLayout::new(1e30, 1e30, 1e30, 1e30);
        assert!(surface.draw_clipped_stretched(&photo, &beyond, 10.0));
        assert_eq!(surface.pixels().get_pixel(99, 99), &WHITE);

        let unbounded = PhotoLayout::new(f32::NEG_INFINITY, 0.0, f32::INFINITY, 10.0);
        assert!(!surface.draw_clipped_stretched(&photo, &unbounded, 10.0));
    }

    #[test]
    fn test_oversized_slot_samples_only_visible_pixels() {
        let mut surface = white_surface(100, 100);
        let mut photo = RgbaImage::from_pixel(2, 2, BLUE);
        photo.put_pixel(1, 1, RED);

        // A full resample of this slot would need terabytes
        let huge = PhotoLayout::new(0.0, 0.0, 1e7, 1e7);
        assert!(surface.draw_clipped_stretched(&Raster::new(photo), &huge, 10.0));

        assert_eq!(surface.pixels().get_pixel(50, 50), &BLUE);
        assert_eq!(surface.pixels().get_pixel(99, 99), &BLUE);
        // Top-left corner still rounded
        assert_eq!(surface.pixels().get_pixel(0, 0), &WHITE);
    }

    #[test]
    fn test_sample_bilinear_interpolates_between_texels() {
        let mut image = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        image.put_pixel(1, 0, Rgba([200, 0, 0, 255]));
        assert_eq!(sample_bilinear(&image, 0.5, 0.5)[0], 100);
        assert_eq!(sample_bilinear(&image, 0.0, 0.5)[0], 0);
        assert_eq!(sample_bilinear(&image, 1.0, 0.5)[0], 200);
    }

    #[test]
    fn test_composite_over_respects_alpha() {
        let mut surface = white_surface(2, 1);
        surface.fill_rect(&PhotoLayout::new(0.0, 0.0, 2.0, 1.0), BLUE);

        let mut overlay = RgbaImage::new(2, 1);
        overlay.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        overlay.put_pixel(1, 0, RED);
        surface.composite_over(&Raster::new(overlay));

        assert_eq!(surface.pixels().get_pixel(0, 0), &BLUE);
        assert_eq!(surface.pixels().get_pixel(1, 0), &RED);
    }

    #[test]
    fn test_blend_over_half_alpha() {
        let out = blend_over(WHITE, Rgba([0, 0, 0, 128]), 1.0);
        assert_eq!(out[3], 255);
        assert!((126..=128).contains(&out[0]));
    }

    #[test]
    fn test_encode_formats() {
        let surface = white_surface(8, 4);
        let png = surface.encode(OutputFormat::Png).unwrap();
        assert_eq!(&png.bytes()[..4], b"\x89PNG");
        assert_eq!((png.width(), png.height()), (8, 4));

        let jpeg = white_surface(8, 4).encode(OutputFormat::Jpeg).unwrap();
        assert_eq!(&jpeg.bytes()[..2], &[0xFF, 0xD8]);
    }
}
