//! Glyph masks and the collaborator contracts the layout engine consumes.

use crate::ir::FontSpec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Binary occupancy bitmap of one rasterized word.
///
/// `origin_left`/`origin_top` locate the mask's top-left pixel relative to
/// the center of the word's unrotated text box, which is also the rotation
/// center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphMask {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<bool>,
    pub origin_left: f64,
    pub origin_top: f64,
    pub text_width: f64,
}

impl GlyphMask {
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
            origin_left: 0.0,
            origin_top: 0.0,
            text_width: 0.0,
        }
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.pixels[y * self.width + x]
    }

    /// Offsets of set pixels, row-major.
    pub fn occupied(&self) -> Vec<(i32, i32)> {
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.pixels[y * self.width + x] {
                    out.push((x as i32, y as i32));
                }
            }
        }
        out
    }

    pub fn is_blank(&self) -> bool {
        !self.pixels.iter().any(|pixel| *pixel)
    }
}

#[derive(Debug, Clone)]
pub struct GlyphRequest<'a> {
    pub text: &'a str,
    pub font: &'a FontSpec,
    pub font_size: f64,
    /// Clockwise rotation in radians.
    pub rotation: f64,
    /// Position of the text box center inside its grid pixel, each axis in
    /// `[0, 1)`. The mask is drawn so that its top-left lands on a whole pixel.
    pub subpixel: (f64, f64),
}

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("invalid font size {0}")]
    InvalidFontSize(f64),
    #[error("mask of {width}x{height} pixels is too large")]
    TooLarge { width: f64, height: f64 },
    #[error("failed to allocate a {width}x{height} pixmap")]
    Allocation { width: u32, height: u32 },
}

#[derive(Debug, Error)]
pub enum FontLoadError {
    #[error("no face matches font family {0:?}")]
    NotFound(String),
    #[error("font database unavailable")]
    Unavailable,
}

pub trait Rasterizer: Send + Sync {
    /// Unrotated advance width of `text` at `font_size` pixels.
    fn measure(&self, text: &str, font: &FontSpec, font_size: f64) -> Result<f64, RasterError>;

    fn rasterize(&self, request: &GlyphRequest<'_>) -> Result<GlyphMask, RasterError>;
}

pub trait FontProber: Send + Sync {
    fn ensure_loaded(&self, font: &FontSpec, sample: &str) -> Result<(), FontLoadError>;
}

// Masks larger than this on either side are rejected instead of allocated.
pub(crate) const MAX_MASK_SIDE: f64 = 16384.0;

pub(crate) fn rotated_extent(width: f64, height: f64, rotation: f64) -> (f64, f64) {
    let (sin, cos) = rotation.sin_cos();
    (
        width * cos.abs() + height * sin.abs(),
        width * sin.abs() + height * cos.abs(),
    )
}

/// Text measurement without font files: widths come from per-character
/// factors and the mask is the rotated text box.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatingRasterizer;

// Line box height relative to the font size.
const LINE_HEIGHT: f64 = 1.0;

impl Rasterizer for EstimatingRasterizer {
    fn measure(&self, text: &str, _font: &FontSpec, font_size: f64) -> Result<f64, RasterError> {
        if !(font_size.is_finite() && font_size > 0.0) {
            return Err(RasterError::InvalidFontSize(font_size));
        }
        Ok(estimate_text_width(text, font_size))
    }

    fn rasterize(&self, request: &GlyphRequest<'_>) -> Result<GlyphMask, RasterError> {
        let text_width = self.measure(request.text, request.font, request.font_size)?;
        if text_width <= 0.0 {
            return Ok(GlyphMask::empty());
        }
        let text_height = request.font_size * LINE_HEIGHT;
        fill_rotated_box(text_width, text_height, request.rotation, request.subpixel)
    }
}

// Ceiling that ignores trigonometric noise.
fn snap_ceil(value: f64) -> f64 {
    (value - 1e-6).ceil()
}

/// Lays out one mask axis around a center that sits at `subpixel` inside its
/// pixel, with ink spanning `low..high` relative to that center. Returns the
/// mask side in pixels and the center's offset from the mask edge.
pub(crate) fn aligned_span(low: f64, high: f64, subpixel: f64) -> (usize, f64) {
    let lead = snap_ceil(-low - subpixel).max(0.0);
    let center = lead + subpixel;
    (snap_ceil(center + high).max(1.0) as usize, center)
}

pub(crate) fn estimate_text_width(text: &str, font_size: f64) -> f64 {
    text.chars()
        .filter(|ch| !ch.is_control())
        .map(char_width_factor)
        .sum::<f64>()
        * font_size
}

fn fill_rotated_box(
    width: f64,
    height: f64,
    rotation: f64,
    subpixel: (f64, f64),
) -> Result<GlyphMask, RasterError> {
    let (extent_w, extent_h) = rotated_extent(width, height, rotation);
    if extent_w > MAX_MASK_SIDE || extent_h > MAX_MASK_SIDE {
        return Err(RasterError::TooLarge {
            width: extent_w,
            height: extent_h,
        });
    }
    let (half_ext_w, half_ext_h) = (extent_w / 2.0, extent_h / 2.0);
    let (mask_w, center_x) = aligned_span(-half_ext_w, half_ext_w, subpixel.0);
    let (mask_h, center_y) = aligned_span(-half_ext_h, half_ext_h, subpixel.1);
    let (sin, cos) = rotation.sin_cos();
    let half_w = width / 2.0;
    let half_h = height / 2.0;
    // Half the width of a pixel square projected onto the box axes.
    let reach = 0.5 * (sin.abs() + cos.abs());
    let mut pixels = vec![false; mask_w * mask_h];
    for y in 0..mask_h {
        for x in 0..mask_w {
            // A pixel is set when its square touches the rotated box: no
            // separating axis among the grid axes and the box axes.
            let dx = x as f64 + 0.5 - center_x;
            let dy = y as f64 + 0.5 - center_y;
            let u = dx * cos + dy * sin;
            let v = -dx * sin + dy * cos;
            if dx.abs() <= half_ext_w + 0.5
                && dy.abs() <= half_ext_h + 0.5
                && u.abs() <= half_w + reach
                && v.abs() <= half_h + reach
            {
                pixels[y * mask_w + x] = true;
            }
        }
    }
    Ok(GlyphMask {
        width: mask_w,
        height: mask_h,
        pixels,
        origin_left: -center_x,
        origin_top: -center_y,
        text_width: width,
    })
}

pub(crate) fn char_width_factor(ch: char) -> f64 {
    // Average advance widths of a common sans-serif face, relative to the
    // font size.
    match ch {
        ' ' => 0.306,
        '\\' | '.' | ',' | ':' | ';' | '|' | '!' | '(' | ')' | '[' | ']' | '{' | '}' => 0.321,
        'A' => 0.652,
        'B' => 0.648,
        'C' => 0.734,
        'D' => 0.723,
        'E' => 0.594,
        'F' => 0.575,
        'G' | 'H' => 0.742,
        'I' => 0.272,
        'J' => 0.557,
        'K' => 0.648,
        'L' => 0.559,
        'M' => 0.903,
        'N' => 0.763,
        'O' => 0.754,
        'P' => 0.623,
        'Q' => 0.755,
        'R' => 0.637,
        'S' => 0.633,
        'T' => 0.599,
        'U' => 0.746,
        'V' => 0.661,
        'W' => 0.958,
        'X' | 'Y' => 0.622,
        'Z' => 0.632,
        'f' | 't' => 0.333,
        'i' | 'j' | 'l' => 0.24,
        'm' => 0.87,
        'r' => 0.39,
        'w' => 0.78,
        'a'..='z' => 0.56,
        '0'..='9' => 0.56,
        '-' | '_' => 0.4,
        ch if ch.is_whitespace() => 0.306,
        ch if ch.is_ascii() => 0.5,
        // CJK and other wide scripts.
        _ => 1.0,
    }
}
