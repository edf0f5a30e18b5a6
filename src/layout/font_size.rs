// Weight → font size derivation and the rendering-size tiers used to keep
// glyph masks at a bounded resolution.

/// A word may grow to this multiple of its tier factor before it opens a new
/// tier.
pub(crate) const RENDERING_FONT_SIZE_INTERVAL: f64 = 2.0;
/// Pixel size a tier-relative font size of 1 is rasterized at.
pub(crate) const RENDERING_FONT_SIZE_BASE: f64 = 4.0;

/// Font size and the tier factor it is expressed relative to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RenderingSize {
    pub font_size: f64,
    pub factor: f64,
}

/// Returns a ratio in `(0, 1]`, or 0 for "derive from weights".
pub fn normalize_font_size_ratio(ratio: f64) -> f64 {
    if !ratio.is_finite() || ratio <= 0.0 {
        return 0.0;
    }
    if ratio > 1.0 { 1.0 / ratio } else { ratio }
}

pub(crate) fn font_size_range(font_size_ratio: f64, min_weight: f64, max_weight: f64) -> f64 {
    if font_size_ratio > 0.0 {
        return 1.0 / font_size_ratio;
    }
    if min_weight > 0.0 {
        return max_weight / min_weight;
    }
    if max_weight < 0.0 {
        return min_weight / max_weight;
    }
    1.0 + max_weight - min_weight
}

fn map_range(value: f64, from_min: f64, from_max: f64, to_min: f64, to_max: f64) -> f64 {
    to_min + (value - from_min) * (to_max - to_min) / (from_max - from_min)
}

/// Font sizes for weights sorted in descending order. Every size lies in
/// `[1, range]`; a single distinct weight gives every word size 1.
pub(crate) fn derive_font_sizes(weights: &[f64], font_size_ratio: f64) -> Vec<f64> {
    let (Some(&max_weight), Some(&min_weight)) = (weights.first(), weights.last()) else {
        return Vec::new();
    };
    if !(min_weight < max_weight) {
        return vec![1.0; weights.len()];
    }
    let range = font_size_range(font_size_ratio, min_weight, max_weight);
    weights
        .iter()
        .map(|weight| map_range(*weight, min_weight, max_weight, 1.0, range))
        .collect()
}

/// Buckets descending font sizes into doubling-bounded tiers, walking from
/// the smallest word up, and scales the result to rasterization pixels.
pub(crate) fn rendering_sizes(font_sizes: &[f64]) -> Vec<RenderingSize> {
    let mut out = vec![
        RenderingSize {
            font_size: 0.0,
            factor: 1.0,
        };
        font_sizes.len()
    ];
    let mut factor = 1.0;
    for (size, slot) in font_sizes.iter().zip(out.iter_mut()).rev() {
        let relative = if *size < RENDERING_FONT_SIZE_INTERVAL * factor {
            size / factor
        } else {
            factor = *size;
            1.0
        };
        *slot = RenderingSize {
            font_size: relative * RENDERING_FONT_SIZE_BASE,
            factor,
        };
    }
    out
}
