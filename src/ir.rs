use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationUnit {
    #[default]
    Rad,
    Deg,
    Turn,
}

impl RotationUnit {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "rad" | "radian" | "radians" => Some(Self::Rad),
            "deg" | "degree" | "degrees" => Some(Self::Deg),
            "turn" | "turns" => Some(Self::Turn),
            _ => None,
        }
    }

    pub fn to_radians(self, value: f64) -> f64 {
        match self {
            Self::Rad => value,
            Self::Deg => value.to_radians(),
            Self::Turn => value * 2.0 * PI,
        }
    }
}

/// Style tuple a glyph is rasterized with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSpec {
    pub family: String,
    pub weight: String,
    pub variant: String,
    pub style: String,
}

impl FontSpec {
    pub fn new(family: &str) -> Self {
        Self {
            family: family.to_string(),
            ..Default::default()
        }
    }

    /// CSS `font` shorthand for the given pixel size.
    pub fn css(&self, font_size: f64) -> String {
        format!(
            "{} {} {} {}px {}",
            self.style, self.variant, self.weight, font_size, self.family
        )
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "serif".to_string(),
            weight: "normal".to_string(),
            variant: "normal".to_string(),
            style: "normal".to_string(),
        }
    }
}

/// Fields a caller may set explicitly on a word. Anything left out is filled
/// from [`WordDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordFields {
    pub text: Option<String>,
    pub weight: Option<f64>,
    pub rotation: Option<f64>,
    pub rotation_unit: Option<RotationUnit>,
    pub font_family: Option<String>,
    pub font_weight: Option<String>,
    pub font_variant: Option<String>,
    pub font_style: Option<String>,
    pub color: Option<String>,
}

/// A word as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawWord {
    Empty,
    Text(String),
    Pair(String, f64),
    Fields(WordFields),
}

impl RawWord {
    pub fn weighted(text: &str, weight: f64) -> Self {
        Self::Pair(text.to_string(), weight)
    }

    fn fields(&self) -> WordFields {
        match self {
            Self::Empty => WordFields::default(),
            Self::Text(text) => WordFields {
                text: Some(text.clone()),
                ..Default::default()
            },
            Self::Pair(text, weight) => WordFields {
                text: Some(text.clone()),
                weight: Some(*weight),
                ..Default::default()
            },
            Self::Fields(fields) => fields.clone(),
        }
    }
}

impl From<&str> for RawWord {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

type DefaultFn<T> = Arc<dyn Fn(&RawWord, usize, &[RawWord]) -> T + Send + Sync>;

/// Either a constant or a function of `(word, index, all_words)`.
#[derive(Clone)]
pub enum WordDefault<T> {
    Value(T),
    Computed(DefaultFn<T>),
}

impl<T: Clone> WordDefault<T> {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&RawWord, usize, &[RawWord]) -> T + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    pub fn resolve(&self, word: &RawWord, index: usize, words: &[RawWord]) -> T {
        match self {
            Self::Value(value) => value.clone(),
            Self::Computed(f) => f(word, index, words),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for WordDefault<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl<T> From<T> for WordDefault<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

#[derive(Debug, Clone)]
pub struct WordDefaults {
    pub text: WordDefault<String>,
    pub weight: WordDefault<f64>,
    pub rotation: WordDefault<f64>,
    pub rotation_unit: WordDefault<RotationUnit>,
    pub font_family: WordDefault<String>,
    pub font_weight: WordDefault<String>,
    pub font_variant: WordDefault<String>,
    pub font_style: WordDefault<String>,
    pub color: WordDefault<String>,
}

impl Default for WordDefaults {
    fn default() -> Self {
        let font = FontSpec::default();
        Self {
            text: String::new().into(),
            weight: 1.0.into(),
            rotation: 0.0.into(),
            rotation_unit: RotationUnit::Rad.into(),
            font_family: font.family.into(),
            font_weight: font.weight.into(),
            font_variant: font.variant.into(),
            font_style: font.style.into(),
            color: "Black".to_string().into(),
        }
    }
}

/// A word with every field resolved and its rotation in radians.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub source: RawWord,
    pub index: usize,
    pub text: String,
    pub weight: f64,
    pub rotation: f64,
    pub font: FontSpec,
    pub color: String,
}

pub fn normalize_words(words: &[RawWord], defaults: &WordDefaults) -> Vec<Word> {
    words
        .iter()
        .enumerate()
        .map(|(index, word)| {
            let fields = word.fields();
            let text = fields
                .text
                .unwrap_or_else(|| defaults.text.resolve(word, index, words));
            let weight = fields
                .weight
                .unwrap_or_else(|| defaults.weight.resolve(word, index, words));
            let rotation = fields
                .rotation
                .unwrap_or_else(|| defaults.rotation.resolve(word, index, words));
            let rotation_unit = fields
                .rotation_unit
                .unwrap_or_else(|| defaults.rotation_unit.resolve(word, index, words));
            let font = FontSpec {
                family: fields
                    .font_family
                    .unwrap_or_else(|| defaults.font_family.resolve(word, index, words)),
                weight: fields
                    .font_weight
                    .unwrap_or_else(|| defaults.font_weight.resolve(word, index, words)),
                variant: fields
                    .font_variant
                    .unwrap_or_else(|| defaults.font_variant.resolve(word, index, words)),
                style: fields
                    .font_style
                    .unwrap_or_else(|| defaults.font_style.resolve(word, index, words)),
            };
            let color = fields
                .color
                .unwrap_or_else(|| defaults.color.resolve(word, index, words));
            Word {
                source: word.clone(),
                index,
                text,
                weight,
                rotation: rotation_unit.to_radians(rotation),
                font,
                color,
            }
        })
        .collect()
}
