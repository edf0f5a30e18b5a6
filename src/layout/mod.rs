mod bounding_word;
mod error;
mod font_size;
pub(crate) mod grid;
pub(crate) mod types;
mod worker;
pub use error::{CancellationToken, LayoutError};
pub use font_size::normalize_font_size_ratio;
pub use grid::PixelGrid;
pub use types::*;
pub use worker::{
    GridIsolate, GridRequest, GridResponse, InlineIsolate, InlineIsolateFactory, IsolateFactory,
    ThreadIsolate, ThreadIsolateFactory, serve,
};

use bounding_word::BoundingWord;
use font_size::{
    RENDERING_FONT_SIZE_BASE, RENDERING_FONT_SIZE_INTERVAL, derive_font_sizes, rendering_sizes,
};

use crate::config::{Config, LayoutConfig};
use crate::ir::{FontSpec, RawWord, Word, WordDefaults, normalize_words};
use crate::raster::{EstimatingRasterizer, FontProber, Rasterizer};
use crate::text_metrics::{FontRasterizer, SystemFontProber};
use std::collections::HashSet;
use std::sync::Arc;

// Characters of each font's words handed to the prober as a sample.
const FONT_PROBE_SAMPLE_CHARS: usize = 64;
/// Largest mask side a tier rescale may grow a placed word to. Finer tiers
/// past this point are laid out at a coarser resolution instead.
const MAX_GRID_MASK_SIDE: f64 = 4096.0;
/// Largest accepted `spacing`, relative to the font size.
pub const MAX_SPACING: f64 = 4.0;
// One free pixel always separates placed masks. A tier rescale scales the
// words apart by at least the same ratio, so their re-rasterized masks never
// meet.
const MIN_PADDING: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassState {
    Idle,
    Initializing,
    Placing(usize),
    Finalizing,
    Done,
    Cancelled,
    Failed,
}

/// Lays out weighted words with pluggable rasterization, grid isolation and
/// progress reporting.
#[derive(Clone)]
pub struct LayoutEngine {
    rasterizer: Arc<dyn Rasterizer>,
    prober: Option<Arc<dyn FontProber>>,
    isolates: Arc<dyn IsolateFactory>,
    progress: Arc<dyn ProgressSink>,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self {
            rasterizer: Arc::new(FontRasterizer),
            prober: Some(Arc::new(SystemFontProber)),
            isolates: Arc::new(ThreadIsolateFactory),
            progress: Arc::new(TracingProgress),
        }
    }
}

impl LayoutEngine {
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            rasterizer,
            prober: None,
            isolates: Arc::new(ThreadIsolateFactory),
            progress: Arc::new(NoProgress),
        }
    }

    /// Font-free engine: estimated metrics, no probing.
    pub fn fast_text() -> Self {
        Self::new(Arc::new(EstimatingRasterizer)).with_progress(Arc::new(TracingProgress))
    }

    pub fn with_prober(mut self, prober: Arc<dyn FontProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn with_isolates(mut self, isolates: Arc<dyn IsolateFactory>) -> Self {
        self.isolates = isolates;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs one layout pass. Positions are word centers inside a
    /// `width` x `height` container; an invalid container or a list without
    /// renderable words yields an empty result.
    pub fn compute(
        &self,
        words: &[RawWord],
        defaults: &WordDefaults,
        config: &LayoutConfig,
        width: f64,
        height: f64,
        cancel: &CancellationToken,
    ) -> Result<Vec<PlacedWord>, LayoutError> {
        if !(width > 0.0 && height > 0.0) {
            tracing::debug!(width, height, "container has no area; nothing to place");
            return Ok(Vec::new());
        }
        if config.spacing > MAX_SPACING {
            return Err(LayoutError::Spacing {
                spacing: config.spacing,
                limit: MAX_SPACING,
            });
        }
        let aspect = Aspect::from_container(width, height);

        let normalized = normalize_words(words, defaults);
        if config.load_fonts {
            self.probe_fonts(&normalized);
        }
        let mut bounding = self.prepare(normalized, config)?;
        if bounding.is_empty() {
            tracing::debug!("no renderable words");
            return Ok(Vec::new());
        }

        let isolate = self.isolates.spawn()?;
        let mut pass = Pass {
            state: PassState::Idle,
            isolate,
            progress: self.progress.as_ref(),
            cancel,
        };
        let result = pass.run(
            &mut bounding,
            self.rasterizer.as_ref(),
            config.spacing,
            aspect,
            width,
            height,
        );
        match &result {
            Ok(placed) => {
                pass.transition(PassState::Done);
                tracing::info!(words = placed.len(), width, height, "word cloud laid out");
            }
            Err(err) if err.is_cancelled() => pass.transition(PassState::Cancelled),
            Err(err) => {
                pass.transition(PassState::Failed);
                tracing::debug!(error = %err, "layout pass failed");
            }
        }
        result
    }

    fn probe_fonts(&self, words: &[Word]) {
        let Some(prober) = self.prober.as_ref() else {
            return;
        };
        let mut samples: Vec<(&FontSpec, String)> = Vec::new();
        for word in words {
            let slot = match samples.iter().position(|(font, _)| *font == &word.font) {
                Some(idx) => idx,
                None => {
                    samples.push((&word.font, String::new()));
                    samples.len() - 1
                }
            };
            let sample = &mut samples[slot].1;
            let room = FONT_PROBE_SAMPLE_CHARS.saturating_sub(sample.chars().count());
            sample.extend(word.text.chars().take(room));
        }
        for (font, sample) in samples {
            if let Err(err) = prober.ensure_loaded(font, &sample) {
                tracing::warn!(family = %font.family, error = %err, "font probe failed; using fallback metrics");
            }
        }
    }

    fn prepare(
        &self,
        words: Vec<Word>,
        config: &LayoutConfig,
    ) -> Result<Vec<BoundingWord>, LayoutError> {
        let mut kept = Vec::with_capacity(words.len());
        for word in words {
            if !word.weight.is_finite() {
                tracing::warn!(text = %word.text, weight = word.weight, "dropping word with non-finite weight");
                continue;
            }
            let width = self
                .rasterizer
                .measure(&word.text, &word.font, RENDERING_FONT_SIZE_BASE)
                .map_err(|source| LayoutError::Rasterizer {
                    text: word.text.clone(),
                    source,
                })?;
            if width > 0.0 {
                kept.push(word);
            }
        }
        kept.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let weights: Vec<f64> = kept.iter().map(|word| word.weight).collect();
        let ratio = normalize_font_size_ratio(config.font_size_ratio);
        let sizes = rendering_sizes(&derive_font_sizes(&weights, ratio));
        Ok(kept
            .into_iter()
            .zip(sizes)
            .map(|(word, size)| BoundingWord::new(word, size))
            .collect())
    }
}

/// One pass's hold on its grid. Dropping it releases the grid and clears
/// progress whatever the exit path.
struct Pass<'a> {
    state: PassState,
    isolate: Box<dyn GridIsolate>,
    progress: &'a dyn ProgressSink,
    cancel: &'a CancellationToken,
}

impl Pass<'_> {
    fn transition(&mut self, next: PassState) {
        tracing::debug!(from = ?self.state, to = ?next, "layout pass state");
        self.state = next;
    }

    fn send(&mut self, request: GridRequest) -> Result<GridResponse, LayoutError> {
        let response = self.isolate.send(request)?;
        self.cancel.check()?;
        Ok(response)
    }

    fn stamp(
        &mut self,
        word: &mut BoundingWord,
        rasterizer: &dyn Rasterizer,
    ) -> Result<(), LayoutError> {
        let mask = word.mask(rasterizer)?.clone();
        let (left, top) = word.stamp_origin(&mask);
        match self.send(GridRequest::Put { mask, left, top })? {
            GridResponse::Done => Ok(()),
            _ => Err(LayoutError::Protocol { request: "put" }),
        }
    }

    fn run(
        &mut self,
        words: &mut [BoundingWord],
        rasterizer: &dyn Rasterizer,
        spacing: f64,
        aspect: Aspect,
        width: f64,
        height: f64,
    ) -> Result<Vec<PlacedWord>, LayoutError> {
        self.cancel.check()?;
        self.transition(PassState::Initializing);
        let total_words = words.len();
        let mut progress = Progress {
            completed_words: 0,
            total_words,
        };
        self.progress.report(Some(progress));
        match self.send(GridRequest::Init(aspect))? {
            GridResponse::Done => {}
            _ => return Err(LayoutError::Protocol { request: "init" }),
        }
        // The first word sits at the grid center without a search.
        progress.completed_words = 1;
        self.progress.report(Some(progress));

        // Grid pixels per unit of derived font size.
        let mut resolution = words
            .first()
            .map_or(RENDERING_FONT_SIZE_BASE, |word| RENDERING_FONT_SIZE_BASE / word.factor);
        for idx in 1..total_words {
            self.transition(PassState::Placing(idx));
            let (placed, rest) = words.split_at_mut(idx);
            let current = &mut rest[0];
            let natural = RENDERING_FONT_SIZE_BASE / current.factor;
            let wanted = natural / resolution;
            let ratio = if current.factor < placed[idx - 1].factor {
                bounded_rescale(placed, rasterizer, wanted)?
            } else {
                1.0
            };
            // A capped rescale that gains less than one tier is skipped.
            if ratio > 1.0 && ratio >= wanted.min(RENDERING_FONT_SIZE_INTERVAL) {
                tracing::trace!(ratio, "rescaling grid to a finer tier");
                match self.send(GridRequest::Clear)? {
                    GridResponse::Done => {}
                    _ => return Err(LayoutError::Protocol { request: "clear" }),
                }
                for word in placed.iter_mut() {
                    word.rescale(ratio);
                    self.stamp(word, rasterizer)?;
                }
                resolution = if ratio < wanted {
                    resolution * ratio
                } else {
                    natural
                };
            } else {
                self.stamp(&mut placed[idx - 1], rasterizer)?;
            }
            if resolution < natural {
                current.font_size *= resolution / natural;
            }

            current.padding = padding_pixels(spacing, current.font_size);
            let mask = current.mask(rasterizer)?.clone();
            let (left, top) = current.stamp_origin(&mask);
            let request = GridRequest::FindFit {
                mask: mask.clone(),
                left,
                top,
                padding: current.padding,
            };
            let GridResponse::Fit { left, top } = self.send(request)? else {
                return Err(LayoutError::Protocol { request: "findFit" });
            };
            current.place_at(left, top, &mask);
            current.padding = 0;
            progress.completed_words += 1;
            self.progress.report(Some(progress));
        }
        if let Some(last) = words.last_mut() {
            self.stamp(last, rasterizer)?;
        }

        self.transition(PassState::Finalizing);
        let GridResponse::Bounds(bounds) = self.send(GridRequest::GetBounds)? else {
            return Err(LayoutError::Protocol {
                request: "getBounds",
            });
        };
        let placed = finalize(words, bounds, width, height);
        self.cancel.check()?;
        Ok(placed)
    }
}

impl Drop for Pass<'_> {
    fn drop(&mut self) {
        self.isolate.terminate();
        self.progress.report(None);
    }
}

// Ratio to rescale the grid by on a tier drop: `wanted`, unless that would
// grow a placed mask past MAX_GRID_MASK_SIDE.
fn bounded_rescale(
    placed: &mut [BoundingWord],
    rasterizer: &dyn Rasterizer,
    wanted: f64,
) -> Result<f64, LayoutError> {
    let mut largest = 1usize;
    for word in placed.iter_mut() {
        let mask = word.mask(rasterizer)?;
        largest = largest.max(mask.width).max(mask.height);
    }
    let limit = MAX_GRID_MASK_SIDE / largest as f64;
    if limit < wanted {
        tracing::debug!(wanted, limit, "capping tier rescale");
    }
    Ok(wanted.min(limit))
}

// Font sizes seen here stay below twice the base size and spacing is capped
// at MAX_SPACING, so the cast cannot overflow.
fn padding_pixels(spacing: f64, font_size: f64) -> u32 {
    let padding = (spacing * font_size).round();
    if padding.is_finite() && padding > f64::from(MIN_PADDING) {
        padding as u32
    } else {
        MIN_PADDING
    }
}

fn finalize(words: &[BoundingWord], bounds: GridBounds, width: f64, height: f64) -> Vec<PlacedWord> {
    let (scale, origin_left, origin_top) = if bounds.is_empty() {
        (1.0, 0.0, 0.0)
    } else {
        let scale = (width / f64::from(bounds.width)).min(height / f64::from(bounds.height));
        (scale, f64::from(bounds.left), f64::from(bounds.top))
    };

    let mut keys = HashSet::with_capacity(words.len());
    words
        .iter()
        .map(|bw| {
            let (left, top) = bw.center();
            let word = &bw.word;
            PlacedWord {
                key: unique_key(word, &mut keys),
                word: word.source.clone(),
                index: word.index,
                text: word.text.clone(),
                weight: word.weight,
                rotation: word.rotation,
                font: word.font.clone(),
                font_size: bw.font_size * scale,
                left: (left - origin_left) * scale,
                top: (top - origin_top) * scale,
                color: word.color.clone(),
            }
        })
        .collect()
}

fn unique_key(word: &Word, taken: &mut HashSet<String>) -> String {
    let font = &word.font;
    let mut key = serde_json::to_string(&(
        &word.text,
        &font.family,
        &font.weight,
        &font.variant,
        &font.style,
    ))
    .unwrap_or_else(|_| word.text.clone());
    while taken.contains(&key) {
        key.push('!');
    }
    taken.insert(key.clone());
    key
}

/// Lays out `words` into the configured container using the theme's word
/// defaults. `fast_text` swaps font rasterization for estimated metrics.
pub fn compute_layout(
    words: &[RawWord],
    config: &Config,
    fast_text: bool,
) -> Result<CloudLayout, LayoutError> {
    let engine = if fast_text {
        LayoutEngine::fast_text()
    } else {
        LayoutEngine::default()
    };
    let mut defaults = config.theme.word_defaults();
    defaults.rotation = config.layout.rotation.into();
    defaults.rotation_unit = config.layout.rotation_unit.into();
    let width = f64::from(config.render.width);
    let height = f64::from(config.render.height);
    let words = engine.compute(
        words,
        &defaults,
        &config.layout,
        width,
        height,
        &CancellationToken::new(),
    )?;
    Ok(CloudLayout {
        width,
        height,
        words,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{FontLoadError, GlyphMask, GlyphRequest, RasterError};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recording {
        requests: Vec<GridRequest>,
        terminations: usize,
        sends_after_cancel: usize,
    }

    /// Inline grid that records traffic and optionally cancels the pass
    /// after a fixed number of round-trips.
    struct RecordingFactory {
        log: Arc<Mutex<Recording>>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl RecordingFactory {
        fn new() -> Self {
            Self {
                log: Arc::new(Mutex::new(Recording::default())),
                cancel_after: None,
            }
        }

        fn cancelling(after: usize, token: CancellationToken) -> Self {
            Self {
                cancel_after: Some((after, token)),
                ..Self::new()
            }
        }
    }

    impl IsolateFactory for RecordingFactory {
        fn spawn(&self) -> Result<Box<dyn GridIsolate>, LayoutError> {
            Ok(Box::new(RecordingIsolate {
                inner: InlineIsolate::default(),
                log: self.log.clone(),
                cancel_after: self.cancel_after.clone(),
            }))
        }
    }

    struct RecordingIsolate {
        inner: InlineIsolate,
        log: Arc<Mutex<Recording>>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl GridIsolate for RecordingIsolate {
        fn send(&mut self, request: GridRequest) -> Result<GridResponse, LayoutError> {
            let mut log = self.log.lock().unwrap();
            if let Some((_, token)) = &self.cancel_after {
                if token.is_cancelled() {
                    log.sends_after_cancel += 1;
                }
            }
            log.requests.push(request.clone());
            if let Some((after, token)) = &self.cancel_after {
                if log.requests.len() == *after {
                    token.cancel();
                }
            }
            drop(log);
            self.inner.send(request)
        }

        fn terminate(&mut self) {
            self.log.lock().unwrap().terminations += 1;
            self.inner.terminate();
        }
    }

    struct FailingRasterizer;

    impl Rasterizer for FailingRasterizer {
        fn measure(&self, text: &str, font: &FontSpec, font_size: f64) -> Result<f64, RasterError> {
            EstimatingRasterizer.measure(text, font, font_size)
        }

        fn rasterize(&self, _request: &GlyphRequest<'_>) -> Result<GlyphMask, RasterError> {
            Err(RasterError::Allocation {
                width: 1,
                height: 1,
            })
        }
    }

    struct RefusingProber;

    impl FontProber for RefusingProber {
        fn ensure_loaded(&self, font: &FontSpec, _sample: &str) -> Result<(), FontLoadError> {
            Err(FontLoadError::NotFound(font.family.clone()))
        }
    }

    fn engine(factory: RecordingFactory) -> (LayoutEngine, Arc<Mutex<Recording>>) {
        let log = factory.log.clone();
        let engine =
            LayoutEngine::new(Arc::new(EstimatingRasterizer)).with_isolates(Arc::new(factory));
        (engine, log)
    }

    fn run(words: &[RawWord], width: f64, height: f64) -> Vec<PlacedWord> {
        let (engine, _) = engine(RecordingFactory::new());
        engine
            .compute(
                words,
                &WordDefaults::default(),
                &LayoutConfig::default(),
                width,
                height,
                &CancellationToken::new(),
            )
            .unwrap()
    }

    /// Fails if two masks stamped between clears share a pixel.
    fn assert_no_overlap(requests: &[GridRequest]) {
        let mut grid = PixelGrid::new(Aspect::SQUARE);
        for req in requests {
            match req {
                GridRequest::Clear => grid.clear(),
                GridRequest::Put { mask, left, top } => {
                    for (x, y) in mask.occupied() {
                        let pixel = (left + x, top + y);
                        assert!(!grid.is_occupied(pixel.0, pixel.1), "pixel {pixel:?} stamped twice");
                    }
                    grid.put(mask, *left, *top);
                }
                _ => {}
            }
        }
    }

    /// Fails if two unrotated text boxes of the final layout overlap.
    fn assert_boxes_apart(placed: &[PlacedWord]) {
        let boxes: Vec<(f64, f64, f64, f64)> = placed
            .iter()
            .map(|word| {
                let width = EstimatingRasterizer
                    .measure(&word.text, &word.font, word.font_size)
                    .unwrap();
                let (half_w, half_h) = (width / 2.0, word.font_size / 2.0);
                (word.left - half_w, word.top - half_h, word.left + half_w, word.top + half_h)
            })
            .collect();
        for (i, a) in boxes.iter().enumerate() {
            for (j, b) in boxes.iter().enumerate().skip(i + 1) {
                let overlap_x = a.2.min(b.2) - a.0.max(b.0);
                let overlap_y = a.3.min(b.3) - a.1.max(b.1);
                assert!(
                    overlap_x <= 1e-9 || overlap_y <= 1e-9,
                    "{} and {} overlap by {overlap_x}x{overlap_y}",
                    placed[i].text,
                    placed[j].text
                );
            }
        }
    }

    #[test]
    fn equal_weights_give_equal_sizes() {
        let words: Vec<RawWord> = ["one", "two", "three", "four", "five"]
            .iter()
            .map(|text| RawWord::weighted(text, 3.0))
            .collect();
        let placed = run(&words, 600.0, 300.0);
        assert_eq!(placed.len(), 5);
        let first = placed[0].font_size;
        assert!(placed.iter().all(|word| word.font_size == first));
    }

    #[test]
    fn sizes_are_monotone_in_weight() {
        let words: Vec<RawWord> = [
            ("huge", 10000.0),
            ("large", 300.0),
            ("medium", 40.0),
            ("small", 3.0),
            ("tiny", 1.5),
            ("dust", 1.0),
        ]
        .iter()
        .map(|(text, weight)| RawWord::weighted(text, *weight))
        .collect();
        let mut config = LayoutConfig::default();
        config.font_size_ratio = 0.05;
        let (engine, _) = engine(RecordingFactory::new());
        let placed = engine
            .compute(
                &words,
                &WordDefaults::default(),
                &config,
                800.0,
                400.0,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(placed.len(), 6);
        for pair in placed.windows(2) {
            assert!(pair[0].weight > pair[1].weight);
            assert!(
                pair[0].font_size >= pair[1].font_size,
                "{} smaller than {}",
                pair[0].text,
                pair[1].text
            );
        }
    }

    #[test]
    fn stamped_masks_never_overlap() {
        let words: Vec<RawWord> = (0..24)
            .map(|idx| RawWord::weighted(&format!("word{idx}"), 1.0 + f64::from(idx) * 0.03))
            .collect();
        let (engine, log) = engine(RecordingFactory::new());
        let placed = engine
            .compute(
                &words,
                &WordDefaults::default(),
                &LayoutConfig::default(),
                800.0,
                400.0,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(placed.len(), 24);
        let log = log.lock().unwrap();
        assert!(!log.requests.iter().any(|req| matches!(req, GridRequest::Clear)));
        assert_no_overlap(&log.requests);
        assert_eq!(log.terminations, 1);
    }

    #[test]
    fn tier_change_clears_and_restamps_grid() {
        let words = vec![RawWord::weighted("alpha", 10.0), RawWord::weighted("beta", 1.0)];
        let (engine, log) = engine(RecordingFactory::new());
        engine
            .compute(
                &words,
                &WordDefaults::default(),
                &LayoutConfig::default(),
                800.0,
                400.0,
                &CancellationToken::new(),
            )
            .unwrap();
        let log = log.lock().unwrap();
        let names: Vec<&str> = log.requests.iter().map(GridRequest::name).collect();
        assert_eq!(names, vec!["init", "clear", "put", "findFit", "put", "getBounds"]);
        assert_no_overlap(&log.requests);
    }

    #[test]
    fn words_stay_apart_across_many_tiers() {
        let words: Vec<RawWord> = (0..16)
            .map(|idx| RawWord::weighted(&format!("w{idx}x"), 1.0 + f64::from(idx).powf(1.6)))
            .collect();
        let (engine, log) = engine(RecordingFactory::new());
        let placed = engine
            .compute(
                &words,
                &WordDefaults::default(),
                &LayoutConfig::default(),
                800.0,
                400.0,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(placed.len(), 16);
        let log = log.lock().unwrap();
        let clears = log
            .requests
            .iter()
            .filter(|req| matches!(req, GridRequest::Clear))
            .count();
        assert!(clears >= 3, "expected several tier changes, saw {clears}");
        assert_no_overlap(&log.requests);
        assert_boxes_apart(&placed);
    }

    #[test]
    fn extreme_weight_spread_is_laid_out() {
        let words = vec![RawWord::weighted("alpha", 10000.0), RawWord::weighted("beta", 1.0)];
        let (engine, log) = engine(RecordingFactory::new());
        let placed = engine
            .compute(
                &words,
                &WordDefaults::default(),
                &LayoutConfig::default(),
                800.0,
                400.0,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(placed.len(), 2);
        let ratio = placed[0].font_size / placed[1].font_size;
        assert!((ratio - 10000.0).abs() < 1e-6, "size ratio {ratio}");
        for word in &placed {
            assert!((0.0..=800.0).contains(&word.left), "{word:?}");
            assert!((0.0..=400.0).contains(&word.top), "{word:?}");
        }
        assert_boxes_apart(&placed);
        let log = log.lock().unwrap();
        let largest = log
            .requests
            .iter()
            .filter_map(|req| match req {
                GridRequest::Put { mask, .. } => Some(mask.width.max(mask.height)),
                _ => None,
            })
            .max()
            .unwrap();
        assert!(largest as f64 <= MAX_GRID_MASK_SIDE + 2.0, "mask side {largest}");
    }

    #[test]
    fn oversized_spacing_is_rejected() {
        let mut config = LayoutConfig::default();
        config.spacing = 1e4;
        let (engine, log) = engine(RecordingFactory::new());
        let err = engine
            .compute(
                &[RawWord::from("a"), RawWord::from("b")],
                &WordDefaults::default(),
                &config,
                400.0,
                400.0,
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, LayoutError::Spacing { .. }));
        let log = log.lock().unwrap();
        assert!(log.requests.is_empty());
        assert_eq!(log.terminations, 0);
    }

    #[test]
    fn searches_always_keep_one_free_pixel() {
        let words: Vec<RawWord> = (0..4).map(|idx| RawWord::from(format!("p{idx}").as_str())).collect();
        let (engine, log) = engine(RecordingFactory::new());
        engine
            .compute(
                &words,
                &WordDefaults::default(),
                &LayoutConfig::default(),
                400.0,
                400.0,
                &CancellationToken::new(),
            )
            .unwrap();
        let log = log.lock().unwrap();
        assert!(log.requests.iter().all(|req| match req {
            GridRequest::FindFit { padding, .. } => *padding == MIN_PADDING,
            _ => true,
        }));
    }

    #[test]
    fn duplicate_words_get_unique_keys() {
        let words = vec![
            RawWord::weighted("echo", 2.0),
            RawWord::weighted("echo", 2.0),
            RawWord::weighted("echo", 1.0),
        ];
        let placed = run(&words, 400.0, 400.0);
        let keys: HashSet<&str> = placed.iter().map(|word| word.key.as_str()).collect();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(r#"["echo","serif","normal","normal","normal"]"#));
        assert!(keys.contains(r#"["echo","serif","normal","normal","normal"]!!"#));
    }

    #[test]
    fn invalid_container_is_empty() {
        let words = vec![RawWord::weighted("word", 1.0)];
        assert!(run(&words, 0.0, 400.0).is_empty());
        assert!(run(&words, 400.0, -1.0).is_empty());
        assert!(run(&words, f64::NAN, 400.0).is_empty());
    }

    #[test]
    fn empty_texts_are_empty() {
        let words = vec![RawWord::Empty, RawWord::weighted("", 4.0), RawWord::Text(String::new())];
        let (engine, log) = engine(RecordingFactory::new());
        let placed = engine
            .compute(
                &words,
                &WordDefaults::default(),
                &LayoutConfig::default(),
                800.0,
                400.0,
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(placed.is_empty());
        assert!(log.lock().unwrap().requests.is_empty());
    }

    #[test]
    fn alpha_beta_fit_the_container() {
        let words = vec![RawWord::weighted("alpha", 10.0), RawWord::weighted("beta", 1.0)];
        let placed = run(&words, 800.0, 400.0);
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].text, "alpha");
        assert!(placed[0].font_size > placed[1].font_size);
        for word in &placed {
            assert!((0.0..=800.0).contains(&word.left), "{word:?}");
            assert!((0.0..=400.0).contains(&word.top), "{word:?}");
        }
    }

    #[test]
    fn single_word_scales_to_fill() {
        let placed = run(&[RawWord::weighted("solo", 5.0)], 800.0, 400.0);
        assert_eq!(placed.len(), 1);
        let solo = &placed[0];
        // "solo" rasterizes to an 8x4 box at the base size.
        assert!((solo.font_size - 400.0).abs() < 1e-9);
        assert!((solo.left - 400.0).abs() < 1e-9);
        assert!((solo.top - 200.0).abs() < 1e-9);
        let width = EstimatingRasterizer
            .measure(&solo.text, &solo.font, solo.font_size)
            .unwrap();
        assert!(width > 0.9 * 800.0 && width <= 800.0);
    }

    #[test]
    fn cancellation_stops_the_pass_and_terminates_once() {
        let words: Vec<RawWord> = (0..6)
            .map(|idx| RawWord::weighted(&format!("w{idx}"), 1.0 + f64::from(idx) * 0.1))
            .collect();
        let cancel = CancellationToken::new();
        let slot = ProgressSlot::new();
        let (engine, log) = engine(RecordingFactory::cancelling(3, cancel.clone()));
        let engine = engine.with_progress(Arc::new(slot.clone()));
        let err = engine
            .compute(
                &words,
                &WordDefaults::default(),
                &LayoutConfig::default(),
                800.0,
                400.0,
                &cancel,
            )
            .unwrap_err();
        assert!(err.is_cancelled());
        let log = log.lock().unwrap();
        assert_eq!(log.requests.len(), 3);
        assert_eq!(log.sends_after_cancel, 0);
        assert_eq!(log.terminations, 1);
        assert_eq!(slot.get(), None);
    }

    #[test]
    fn cancelled_before_start_sends_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (engine, log) = engine(RecordingFactory::new());
        let err = engine
            .compute(
                &[RawWord::weighted("word", 1.0)],
                &WordDefaults::default(),
                &LayoutConfig::default(),
                800.0,
                400.0,
                &cancel,
            )
            .unwrap_err();
        assert!(err.is_cancelled());
        let log = log.lock().unwrap();
        assert!(log.requests.is_empty());
        assert_eq!(log.terminations, 1);
    }

    #[test]
    fn progress_counts_words_and_clears() {
        #[derive(Default)]
        struct History(Mutex<Vec<Option<Progress>>>);
        impl ProgressSink for History {
            fn report(&self, progress: Option<Progress>) {
                self.0.lock().unwrap().push(progress);
            }
        }
        let history = Arc::new(History::default());
        let (engine, _) = engine(RecordingFactory::new());
        let engine = engine.with_progress(history.clone());
        let words: Vec<RawWord> = ["a", "b", "c"].iter().map(|t| RawWord::from(*t)).collect();
        engine
            .compute(
                &words,
                &WordDefaults::default(),
                &LayoutConfig::default(),
                300.0,
                300.0,
                &CancellationToken::new(),
            )
            .unwrap();
        let completed: Vec<Option<usize>> = history
            .0
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.map(|p| p.completed_words))
            .collect();
        assert_eq!(completed, vec![Some(0), Some(1), Some(2), Some(3), None]);
    }

    #[test]
    fn rasterizer_failure_fails_the_pass() {
        let factory = RecordingFactory::new();
        let log = factory.log.clone();
        let engine =
            LayoutEngine::new(Arc::new(FailingRasterizer)).with_isolates(Arc::new(factory));
        let err = engine
            .compute(
                &[RawWord::from("a"), RawWord::from("b")],
                &WordDefaults::default(),
                &LayoutConfig::default(),
                300.0,
                300.0,
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, LayoutError::Rasterizer { .. }));
        assert_eq!(log.lock().unwrap().terminations, 1);
    }

    #[test]
    fn font_probe_failure_is_swallowed() {
        let (engine, _) = engine(RecordingFactory::new());
        let engine = engine.with_prober(Arc::new(RefusingProber));
        let placed = engine
            .compute(
                &[RawWord::from("still")],
                &WordDefaults::default(),
                &LayoutConfig::default(),
                300.0,
                300.0,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(placed.len(), 1);
    }

    #[test]
    fn spacing_keeps_words_apart() {
        let words: Vec<RawWord> = (0..8).map(|idx| RawWord::from(format!("w{idx}").as_str())).collect();
        let mut config = LayoutConfig::default();
        config.spacing = 0.5;
        let (engine, log) = engine(RecordingFactory::new());
        engine
            .compute(
                &words,
                &WordDefaults::default(),
                &config,
                400.0,
                400.0,
                &CancellationToken::new(),
            )
            .unwrap();
        let log = log.lock().unwrap();
        let paddings: Vec<u32> = log
            .requests
            .iter()
            .filter_map(|req| match req {
                GridRequest::FindFit { padding, .. } => Some(*padding),
                _ => None,
            })
            .collect();
        assert_eq!(paddings, vec![2; 7]);
    }

    #[test]
    fn threaded_isolate_matches_inline_result() {
        let words: Vec<RawWord> = (0..10)
            .map(|idx| RawWord::weighted(&format!("item{idx}"), f64::from(idx + 1)))
            .collect();
        let inline = run(&words, 640.0, 480.0);
        let threaded = LayoutEngine::new(Arc::new(EstimatingRasterizer))
            .compute(
                &words,
                &WordDefaults::default(),
                &LayoutConfig::default(),
                640.0,
                480.0,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(inline, threaded);
    }
}
