use crate::ir::FontSpec;
use crate::raster::{
    EstimatingRasterizer, FontLoadError, FontProber, GlyphMask, GlyphRequest, MAX_MASK_SIDE,
    RasterError, Rasterizer, aligned_span, estimate_text_width, rotated_extent,
};
use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use resvg::tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use ttf_parser::{Face, OutlineBuilder};

// Half the width of the outline stroked around every glyph, so that slivers
// whose coverage rounds to zero alpha still mark their pixel.
const OUTLINE_HALF_WIDTH: f64 = 0.25;

static FONT_LIBRARY: Lazy<Mutex<FontLibrary>> = Lazy::new(|| Mutex::new(FontLibrary::new()));

/// Rasterizes words from system fonts. Families that resolve to no face are
/// measured and masked by [`EstimatingRasterizer`] instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct FontRasterizer;

impl Rasterizer for FontRasterizer {
    fn measure(&self, text: &str, font: &FontSpec, font_size: f64) -> Result<f64, RasterError> {
        if !(font_size.is_finite() && font_size > 0.0) {
            return Err(RasterError::InvalidFontSize(font_size));
        }
        match resolve_face(font) {
            Some(face) => Ok(face.advance_width(text, font_size)),
            None => Ok(estimate_text_width(text, font_size)),
        }
    }

    fn rasterize(&self, request: &GlyphRequest<'_>) -> Result<GlyphMask, RasterError> {
        match resolve_face(request.font) {
            Some(face) => face.rasterize(request),
            None => EstimatingRasterizer.rasterize(request),
        }
    }
}

/// Checks the requested family against the system font database.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFontProber;

impl FontProber for SystemFontProber {
    fn ensure_loaded(&self, font: &FontSpec, _sample: &str) -> Result<(), FontLoadError> {
        let mut guard = FONT_LIBRARY.lock().map_err(|_| FontLoadError::Unavailable)?;
        guard
            .face(font)
            .map(|_| ())
            .ok_or_else(|| FontLoadError::NotFound(font.family.clone()))
    }
}

fn resolve_face(font: &FontSpec) -> Option<Arc<FontFace>> {
    let mut guard = FONT_LIBRARY.lock().ok()?;
    guard.face(font)
}

struct FontLibrary {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<FaceKey, Option<Arc<FontFace>>>,
    missing_reported: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FaceKey {
    family: String,
    weight: u16,
    italic: bool,
}

impl FontLibrary {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
            missing_reported: HashSet::new(),
        }
    }

    fn face(&mut self, font: &FontSpec) -> Option<Arc<FontFace>> {
        let key = FaceKey {
            family: normalize_family_key(&font.family),
            weight: parse_font_weight(&font.weight),
            italic: is_italic(&font.style),
        };
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        let face = self.load_face(&key).map(Arc::new);
        if face.is_none() && self.missing_reported.insert(key.family.clone()) {
            tracing::warn!(family = %key.family, "no font face found, using estimated metrics");
        }
        self.cache.insert(key, face.clone());
        face
    }

    fn load_face(&mut self, key: &FaceKey) -> Option<FontFace> {
        #[derive(Clone, Copy)]
        enum FamilyToken {
            Generic(fontdb::Family<'static>),
            Name(usize),
        }

        let mut names: Vec<String> = Vec::new();
        let mut order: Vec<FamilyToken> = Vec::new();
        for part in key.family.split(',') {
            let raw = part.trim().trim_matches('"').trim_matches('\'');
            if raw.is_empty() {
                continue;
            }
            let lower = raw.to_ascii_lowercase();
            match lower.as_str() {
                "serif" => order.push(FamilyToken::Generic(Family::Serif)),
                "sans-serif" => order.push(FamilyToken::Generic(Family::SansSerif)),
                "monospace" => order.push(FamilyToken::Generic(Family::Monospace)),
                "cursive" => order.push(FamilyToken::Generic(Family::Cursive)),
                "fantasy" => order.push(FamilyToken::Generic(Family::Fantasy)),
                "system-ui" | "-apple-system" | "ui-sans-serif" => {
                    order.push(FamilyToken::Generic(Family::SansSerif))
                }
                "ui-monospace" => order.push(FamilyToken::Generic(Family::Monospace)),
                _ => {
                    let idx = names.len();
                    names.push(raw.to_string());
                    order.push(FamilyToken::Name(idx));
                }
            }
        }
        if order.is_empty() {
            order.push(FamilyToken::Generic(Family::SansSerif));
        }

        let mut families: Vec<Family<'_>> = Vec::with_capacity(order.len());
        for token in order {
            match token {
                FamilyToken::Generic(family) => families.push(family),
                FamilyToken::Name(idx) => families.push(Family::Name(names[idx].as_str())),
            }
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
            tracing::debug!(faces = self.db.len(), "loaded system fonts");
        }

        let query = Query {
            families: &families,
            weight: Weight(key.weight),
            stretch: Stretch::Normal,
            style: if key.italic { Style::Italic } else { Style::Normal },
        };
        let id = self.db.query(&query)?;
        let mut loaded: Option<FontFace> = None;
        self.db.with_face_data(id, |data, index| {
            if let Ok(face) = Face::parse(data, index) {
                let units_per_em = face.units_per_em().max(1);
                loaded = Some(FontFace {
                    data: data.to_vec(),
                    index,
                    units_per_em,
                });
            }
        });
        loaded
    }
}

struct FontFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
}

impl FontFace {
    fn parse(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.index).ok()
    }

    fn advance_width(&self, text: &str, font_size: f64) -> f64 {
        let Some(face) = self.parse() else {
            return estimate_text_width(text, font_size);
        };
        let scale = font_size / self.units_per_em as f64;
        let mut width = 0.0f64;
        for ch in text.chars().filter(|ch| !ch.is_control()) {
            width += glyph_advance(&face, ch, scale, font_size);
        }
        width.max(0.0)
    }

    fn rasterize(&self, request: &GlyphRequest<'_>) -> Result<GlyphMask, RasterError> {
        if !(request.font_size.is_finite() && request.font_size > 0.0) {
            return Err(RasterError::InvalidFontSize(request.font_size));
        }
        let Some(face) = self.parse() else {
            return EstimatingRasterizer.rasterize(request);
        };
        let scale = request.font_size / self.units_per_em as f64;
        let ascender = face.ascender() as f64 * scale;
        let descender = face.descender() as f64 * scale;
        let text_height = (ascender - descender).max(request.font_size * 0.5);

        let mut outline = PathOutline {
            builder: PathBuilder::new(),
            pen_x: 0.0,
            baseline: ascender,
            scale,
        };
        let mut text_width = 0.0f64;
        for ch in request.text.chars().filter(|ch| !ch.is_control()) {
            outline.pen_x = text_width;
            if let Some(glyph) = face.glyph_index(ch) {
                face.outline_glyph(glyph, &mut outline);
            }
            text_width += glyph_advance(&face, ch, scale, request.font_size);
        }
        if text_width <= 0.0 {
            return Ok(GlyphMask::empty());
        }

        // Rotate around the text box center, which lands on the origin.
        let (sin, cos) = request.rotation.sin_cos();
        let (cx, cy) = (text_width / 2.0, text_height / 2.0);
        let around_center = Transform::from_row(
            cos as f32,
            sin as f32,
            -sin as f32,
            cos as f32,
            (-cos * cx + sin * cy) as f32,
            (-sin * cx - cos * cy) as f32,
        );
        let path = outline.builder.finish();
        let ink = path
            .as_ref()
            .and_then(|path| path.clone().transform(around_center))
            .map(|path| path.bounds());
        let frame = mask_frame(
            rotated_extent(text_width, text_height, request.rotation),
            ink,
            request.subpixel,
        )?;
        let (mask_w, mask_h) = (frame.width, frame.height);
        let Some(path) = path else {
            // Only blank glyphs: the text still takes up space.
            return Ok(GlyphMask {
                width: mask_w,
                height: mask_h,
                pixels: vec![false; mask_w * mask_h],
                origin_left: -frame.center_x,
                origin_top: -frame.center_y,
                text_width,
            });
        };
        let mut pixmap = Pixmap::new(mask_w as u32, mask_h as u32).ok_or(RasterError::Allocation {
            width: mask_w as u32,
            height: mask_h as u32,
        })?;

        let transform = around_center.post_translate(frame.center_x as f32, frame.center_y as f32);
        let mut paint = Paint::default();
        paint.set_color_rgba8(0, 0, 0, 255);
        paint.anti_alias = true;
        pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
        let stroke = Stroke {
            width: (OUTLINE_HALF_WIDTH * 2.0) as f32,
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &paint, &stroke, transform, None);

        let pixels = pixmap.pixels().iter().map(|pixel| pixel.alpha() > 0).collect();
        Ok(GlyphMask {
            width: mask_w,
            height: mask_h,
            pixels,
            origin_left: -frame.center_x,
            origin_top: -frame.center_y,
            text_width,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MaskFrame {
    width: usize,
    height: usize,
    center_x: f64,
    center_y: f64,
}

/// Pixmap size covering both the rotated text box and the glyph ink, whose
/// bounds are relative to the box center. Ink may reach past the advance box
/// through overhangs and tall marks.
fn mask_frame(
    (extent_w, extent_h): (f64, f64),
    ink: Option<Rect>,
    subpixel: (f64, f64),
) -> Result<MaskFrame, RasterError> {
    let (mut low_x, mut high_x) = (-extent_w / 2.0, extent_w / 2.0);
    let (mut low_y, mut high_y) = (-extent_h / 2.0, extent_h / 2.0);
    if let Some(ink) = ink {
        low_x = low_x.min(f64::from(ink.left()) - OUTLINE_HALF_WIDTH);
        high_x = high_x.max(f64::from(ink.right()) + OUTLINE_HALF_WIDTH);
        low_y = low_y.min(f64::from(ink.top()) - OUTLINE_HALF_WIDTH);
        high_y = high_y.max(f64::from(ink.bottom()) + OUTLINE_HALF_WIDTH);
    }
    let (span_w, span_h) = (high_x - low_x, high_y - low_y);
    if span_w > MAX_MASK_SIDE || span_h > MAX_MASK_SIDE {
        return Err(RasterError::TooLarge {
            width: span_w,
            height: span_h,
        });
    }
    let (width, center_x) = aligned_span(low_x, high_x, subpixel.0);
    let (height, center_y) = aligned_span(low_y, high_y, subpixel.1);
    Ok(MaskFrame {
        width,
        height,
        center_x,
        center_y,
    })
}

fn glyph_advance(face: &Face<'_>, ch: char, scale: f64, font_size: f64) -> f64 {
    let fallback = font_size * 0.56;
    match face.glyph_index(ch) {
        Some(glyph) => match face.glyph_hor_advance(glyph) {
            Some(advance) if advance > 0 => advance as f64 * scale,
            _ => fallback,
        },
        None => fallback,
    }
}

struct PathOutline {
    builder: PathBuilder,
    pen_x: f64,
    baseline: f64,
    scale: f64,
}

impl PathOutline {
    fn point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (self.pen_x + x as f64 * self.scale) as f32,
            (self.baseline - y as f64 * self.scale) as f32,
        )
    }
}

impl OutlineBuilder for PathOutline {
    fn move_to(&mut self, x: f32, y: f32) {
        let (px, py) = self.point(x, y);
        self.builder.move_to(px, py);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (px, py) = self.point(x, y);
        self.builder.line_to(px, py);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (p1x, p1y) = self.point(x1, y1);
        let (px, py) = self.point(x, y);
        self.builder.quad_to(p1x, p1y, px, py);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (p1x, p1y) = self.point(x1, y1);
        let (p2x, p2y) = self.point(x2, y2);
        let (px, py) = self.point(x, y);
        self.builder.cubic_to(p1x, p1y, p2x, p2y, px, py);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

/// First entry of a CSS family list, unquoted.
#[cfg_attr(not(feature = "png"), allow(dead_code))]
pub(crate) fn primary_family(font_family: &str) -> String {
    font_family
        .split(',')
        .map(|part| part.trim().trim_matches('"').trim_matches('\''))
        .find(|part| !part.is_empty())
        .unwrap_or("sans-serif")
        .to_string()
}

pub(crate) fn parse_font_weight(weight: &str) -> u16 {
    match weight.trim().to_ascii_lowercase().as_str() {
        "" | "normal" => 400,
        "bold" => 700,
        "lighter" => 300,
        "bolder" => 800,
        other => other
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(1.0, 1000.0) as u16)
            .unwrap_or(400),
    }
}

fn is_italic(style: &str) -> bool {
    let lower = style.trim().to_ascii_lowercase();
    lower.starts_with("italic") || lower.starts_with("oblique")
}
