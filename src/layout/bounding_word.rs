use super::error::LayoutError;
use super::font_size::RenderingSize;
use crate::ir::Word;
use crate::raster::{GlyphMask, GlyphRequest, Rasterizer};

/// Per-pass placement state of one word.
///
/// `left`/`top` hold the text box center in grid pixels at the current
/// `font_size`; a tier rescale scales both together.
#[derive(Debug, Clone)]
pub(crate) struct BoundingWord {
    pub word: Word,
    pub font_size: f64,
    pub factor: f64,
    pub left: f64,
    pub top: f64,
    /// Clearance in pixels applied only while searching for this word's spot.
    pub padding: u32,
    mask: Option<(MaskKey, GlyphMask)>,
}

#[derive(Debug, Clone, Copy)]
struct MaskKey {
    font_size: f64,
    subpixel: (f64, f64),
}

impl MaskKey {
    fn matches(&self, other: &MaskKey) -> bool {
        self.font_size == other.font_size
            && (self.subpixel.0 - other.subpixel.0).abs() < 1e-9
            && (self.subpixel.1 - other.subpixel.1).abs() < 1e-9
    }
}

impl BoundingWord {
    pub fn new(word: Word, size: RenderingSize) -> Self {
        Self {
            word,
            font_size: size.font_size,
            factor: size.factor,
            left: 0.0,
            top: 0.0,
            padding: 0,
            mask: None,
        }
    }

    fn subpixel(&self) -> (f64, f64) {
        (self.left - self.left.floor(), self.top - self.top.floor())
    }

    /// Mask at the current font size, aligned to the current center's
    /// position inside its pixel. Rasterized at most once per key.
    pub fn mask(&mut self, rasterizer: &dyn Rasterizer) -> Result<&GlyphMask, LayoutError> {
        let key = MaskKey {
            font_size: self.font_size,
            subpixel: self.subpixel(),
        };
        let mask = match self.mask.take() {
            Some((cached, mask)) if cached.matches(&key) => mask,
            _ => {
                let request = GlyphRequest {
                    text: &self.word.text,
                    font: &self.word.font,
                    font_size: self.font_size,
                    rotation: self.word.rotation,
                    subpixel: key.subpixel,
                };
                rasterizer
                    .rasterize(&request)
                    .map_err(|source| LayoutError::Rasterizer {
                        text: self.word.text.clone(),
                        source,
                    })?
            }
        };
        Ok(&self.mask.insert((key, mask)).1)
    }

    pub fn center(&self) -> (f64, f64) {
        (self.left, self.top)
    }

    /// Grid pixel where the top-left of `mask` lands for the current center.
    pub fn stamp_origin(&self, mask: &GlyphMask) -> (i32, i32) {
        (
            (self.left + mask.origin_left).round() as i32,
            (self.top + mask.origin_top).round() as i32,
        )
    }

    /// Records a fit returned by the grid for `mask`. The center keeps its
    /// position inside the pixel, so the cached mask stays valid.
    pub fn place_at(&mut self, mask_left: i32, mask_top: i32, mask: &GlyphMask) {
        self.left = f64::from(mask_left) - mask.origin_left;
        self.top = f64::from(mask_top) - mask.origin_top;
    }

    pub fn rescale(&mut self, ratio: f64) {
        self.font_size *= ratio;
        self.left *= ratio;
        self.top *= ratio;
    }
}
