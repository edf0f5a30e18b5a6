use std::collections::HashSet;
use std::path::Path;

use wordcloud_rs::{
    CloudLayout, Config, RenderOptions, compute_layout, merge_init_config, parse_words,
    render_svg, render_with_options,
};

fn assert_valid_svg(svg: &str, fixture: &str) {
    assert!(svg.contains("<svg"), "{fixture}: missing <svg tag");
    assert!(svg.contains("</svg>"), "{fixture}: missing </svg tag");
}

fn layout_fixture(path: &Path) -> (CloudLayout, Config) {
    let input = std::fs::read_to_string(path).expect("fixture read failed");
    let parsed = parse_words(&input).expect("parse failed");
    let mut config = Config::default();
    if let Some(init) = parsed.init_config {
        config = merge_init_config(config, init).expect("init config rejected");
    }
    let layout = compute_layout(&parsed.words, &config, true).expect("layout failed");
    (layout, config)
}

fn fixture_path(rel: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(rel)
}

#[test]
fn render_all_fixtures() {
    // Keep this list explicit so new fixtures must be added intentionally.
    let candidates = [
        ("fruit.txt", 16),
        ("languages.json5", 10),
        ("wide_range.txt", 8),
        ("duplicates.txt", 5),
    ];

    for (rel, expected_words) in candidates {
        let path = fixture_path(rel);
        assert!(path.exists(), "fixture missing: {}", rel);
        let (layout, config) = layout_fixture(&path);
        assert_eq!(layout.words.len(), expected_words, "{rel}: word count");
        for word in &layout.words {
            assert!(
                (0.0..=layout.width).contains(&word.left) && (0.0..=layout.height).contains(&word.top),
                "{rel}: {} placed outside the container at ({}, {})",
                word.text,
                word.left,
                word.top
            );
            assert!(word.font_size > 0.0, "{rel}: {} has no size", word.text);
        }
        let svg = render_svg(&layout, &config.theme);
        assert_valid_svg(&svg, rel);
        assert_eq!(svg.matches("<text").count(), expected_words, "{rel}: text elements");
    }
}

#[test]
fn font_sizes_follow_weights_across_tiers() {
    let (layout, _) = layout_fixture(&fixture_path("wide_range.txt"));
    for pair in layout.words.windows(2) {
        assert!(pair[0].weight >= pair[1].weight);
        assert!(
            pair[0].font_size >= pair[1].font_size,
            "{} ({}) smaller than {} ({})",
            pair[0].text,
            pair[0].font_size,
            pair[1].text,
            pair[1].font_size
        );
    }
    let giant = &layout.words[0];
    let tiny = &layout.words[layout.words.len() - 1];
    assert!(giant.font_size > tiny.font_size * 50.0);
}

#[test]
fn duplicate_words_keep_unique_keys() {
    let (layout, _) = layout_fixture(&fixture_path("duplicates.txt"));
    let keys: HashSet<&str> = layout.words.iter().map(|word| word.key.as_str()).collect();
    assert_eq!(keys.len(), layout.words.len());
}

#[test]
fn inline_config_block_is_applied() {
    let (layout, config) = layout_fixture(&fixture_path("languages.json5"));
    assert_eq!(config.layout.font_size_ratio, 6.0);
    let rust = layout.words.iter().find(|word| word.text == "Rust").unwrap();
    assert_eq!(rust.color, "#B7410E");
    let c = layout.words.iter().find(|word| word.text == "C").unwrap();
    assert_eq!(c.color, "black");
    let haskell = layout.words.iter().find(|word| word.text == "Haskell").unwrap();
    assert!((haskell.rotation - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    let lisp = layout.words.iter().find(|word| word.text == "Lisp").unwrap();
    assert!((lisp.rotation - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    // Ratio 6 bounds the spread between the largest and smallest word.
    let largest = layout.words.iter().map(|w| w.font_size).fold(f64::MIN, f64::max);
    let smallest = layout.words.iter().map(|w| w.font_size).fold(f64::MAX, f64::min);
    assert!(largest / smallest <= 6.0 + 1e-9);
}

#[test]
fn render_with_options_produces_svg() {
    let options = RenderOptions::modern()
        .with_size(320.0, 240.0)
        .with_fast_text(true);
    let svg = render_with_options("hello 3\nworld 1", options).unwrap();
    assert_valid_svg(&svg, "inline");
    assert!(svg.contains("width=\"320\""));
    assert!(svg.contains(">hello</text>"));
}

#[test]
fn zero_area_container_renders_no_words() {
    let options = RenderOptions::default()
        .with_size(0.0, 240.0)
        .with_fast_text(true);
    let svg = render_with_options("hello 3", options).unwrap();
    assert!(!svg.contains("<text"));
}
