#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod parser;
pub mod raster;
pub mod render;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, RenderConfig, load_config, merge_init_config};
pub use ir::{FontSpec, RawWord, RotationUnit, Word, WordDefault, WordDefaults, WordFields};
pub use layout::{
    CancellationToken, CloudLayout, LayoutEngine, LayoutError, PlacedWord, Progress,
    ProgressSink, ProgressSlot, compute_layout,
};
pub use parser::{ParseError, ParsedWords, parse_words};
pub use raster::{EstimatingRasterizer, FontProber, GlyphMask, GlyphRequest, Rasterizer};
pub use render::render_svg;
pub use text_metrics::{FontRasterizer, SystemFontProber};
pub use theme::Theme;

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub config: Config,
    /// Estimated text metrics instead of system fonts.
    pub fast_text: bool,
}

impl RenderOptions {
    pub fn modern() -> Self {
        let mut config = Config::default();
        config.theme = Theme::modern();
        config.render.background = config.theme.background.clone();
        Self {
            config,
            fast_text: false,
        }
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.config.render.width = width;
        self.config.render.height = height;
        self
    }

    pub fn with_fast_text(mut self, fast_text: bool) -> Self {
        self.fast_text = fast_text;
        self
    }
}

/// Parses a word list, lays it out and renders it to SVG.
pub fn render_with_options(input: &str, options: RenderOptions) -> anyhow::Result<String> {
    let parsed = parse_words(input)?;
    let mut config = options.config;
    if let Some(init) = parsed.init_config {
        config = merge_init_config(config, init)?;
    }
    let layout = compute_layout(&parsed.words, &config, options.fast_text)?;
    Ok(render_svg(&layout, &config.theme))
}

pub fn render(input: &str) -> anyhow::Result<String> {
    render_with_options(input, RenderOptions::default())
}
