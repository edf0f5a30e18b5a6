use crate::ir::RotationUnit;
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Ratio between the smallest and the largest font size; 0 derives it
    /// from the weights.
    pub font_size_ratio: f64,
    /// Extra clearance around each word, relative to its font size.
    pub spacing: f64,
    /// Default rotation for words that do not carry one.
    pub rotation: f64,
    pub rotation_unit: RotationUnit,
    /// Probe the font database before measuring.
    pub load_fonts: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            font_size_ratio: 0.0,
            spacing: 0.0,
            rotation: 0.0,
            rotation_unit: RotationUnit::Rad,
            load_fonts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 400.0,
            background: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::classic();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            render,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_weight: Option<NumberOrString>,
    font_variant: Option<String>,
    font_style: Option<String>,
    colors: Option<Vec<String>>,
    background: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrString::Number(val) => Some(*val),
            NumberOrString::String(val) => val.trim().parse::<f64>().ok(),
        }
    }

    fn as_string(&self) -> String {
        match self {
            NumberOrString::Number(val) => format!("{}", val),
            NumberOrString::String(val) => val.clone(),
        }
    }
}

/// On-disk and inline (`%%{init: ...}%%`) configuration form.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    font_size_ratio: Option<NumberOrString>,
    spacing: Option<NumberOrString>,
    rotation: Option<NumberOrString>,
    rotation_unit: Option<String>,
    load_fonts: Option<bool>,
    width: Option<f32>,
    height: Option<f32>,
}

impl ConfigFile {
    pub fn apply(self, config: &mut Config) {
        if let Some(theme_name) = self.theme.as_deref() {
            if theme_name == "modern" {
                config.theme = Theme::modern();
            } else if theme_name == "classic" || theme_name == "default" {
                config.theme = Theme::classic();
            }
            config.render.background = config.theme.background.clone();
        }

        if let Some(vars) = self.theme_variables {
            if let Some(v) = vars.font_family {
                config.theme.font_family = v;
            }
            if let Some(v) = vars.font_weight {
                config.theme.font_weight = v.as_string();
            }
            if let Some(v) = vars.font_variant {
                config.theme.font_variant = v;
            }
            if let Some(v) = vars.font_style {
                config.theme.font_style = v;
            }
            if let Some(v) = vars.colors {
                config.theme.colors = v;
            }
            if let Some(v) = vars.background {
                config.theme.background = v.clone();
                config.render.background = v;
            }
        }

        if let Some(v) = self.font_size_ratio.as_ref().and_then(NumberOrString::as_f64) {
            config.layout.font_size_ratio = v;
        }
        if let Some(v) = self.spacing.as_ref().and_then(NumberOrString::as_f64) {
            config.layout.spacing = v;
        }
        if let Some(v) = self.rotation.as_ref().and_then(NumberOrString::as_f64) {
            config.layout.rotation = v;
        }
        if let Some(unit) = self.rotation_unit.as_deref().and_then(RotationUnit::from_token) {
            config.layout.rotation_unit = unit;
        }
        if let Some(v) = self.load_fonts {
            config.layout.load_fonts = v;
        }
        if let Some(v) = self.width {
            config.render.width = v;
        }
        if let Some(v) = self.height {
            config.render.height = v;
        }
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;
    parsed.apply(&mut config);
    Ok(config)
}

/// Merge a free-form init block (from the word list input) into `config`.
/// Unknown keys are ignored.
pub fn merge_init_config(mut config: Config, init: serde_json::Value) -> anyhow::Result<Config> {
    let parsed: ConfigFile = serde_json::from_value(init)?;
    parsed.apply(&mut config);
    Ok(config)
}
