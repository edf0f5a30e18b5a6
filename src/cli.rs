use crate::config::{Config, load_config, merge_init_config};
use crate::layout::compute_layout;
use crate::layout_dump::write_layout_dump;
use crate::parser::parse_words;
use crate::render::{render_svg, write_output_png, write_output_svg};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "wordcloud_rs=warn";

#[derive(Parser, Debug)]
#[command(name = "wcloud", version, about = "Word cloud layout and rendering in Rust")]
pub struct Args {
    /// Word list (JSON5 or `text weight` lines), or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. SVG and JSON default to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (theme, themeVariables, layout options)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Container width
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// Container height
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,

    /// Smallest to largest font size ratio; 0 derives it from the weights
    #[arg(long = "font-size-ratio")]
    pub font_size_ratio: Option<f64>,

    /// Clearance around each word, relative to its font size
    #[arg(long = "spacing")]
    pub spacing: Option<f64>,

    /// Use estimated text metrics instead of system fonts
    #[arg(long = "fast-text")]
    pub fast_text: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let base_config = load_config(args.config.as_deref())?;

    let input = read_input(args.input.as_deref())?;
    let parsed = parse_words(&input)?;
    let mut config = match parsed.init_config {
        Some(init_cfg) => merge_init_config(base_config, init_cfg)?,
        None => base_config,
    };
    apply_overrides(&mut config, &args);

    let layout = compute_layout(&parsed.words, &config, args.fast_text)?;
    match args.output_format {
        OutputFormat::Svg => {
            let svg = render_svg(&layout, &config.theme);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = render_svg(&layout, &config.theme);
            write_output_png(&svg, &output, &config.render, &config.theme)?;
        }
        OutputFormat::Json => {
            write_layout_dump(args.output.as_deref(), &layout)?;
        }
    }
    Ok(())
}

fn init_tracing() {
    // A subscriber installed by an embedding process wins.
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

// Command-line flags override both the config file and inline directives.
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }
    if let Some(ratio) = args.font_size_ratio {
        config.layout.font_size_ratio = ratio;
    }
    if let Some(spacing) = args.spacing {
        config.layout.spacing = spacing;
    }
    if args.fast_text {
        config.layout.load_fonts = false;
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!(
        "Output path required for {} output",
        ext
    ))
}
