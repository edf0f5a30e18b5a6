use crate::ir::{FontSpec, WordDefault, WordDefaults};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_weight: String,
    pub font_variant: String,
    pub font_style: String,
    pub colors: Vec<String>,
    pub background: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "serif".to_string(),
            font_weight: "normal".to_string(),
            font_variant: "normal".to_string(),
            font_style: "normal".to_string(),
            colors: vec!["Black".to_string()],
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_weight: "600".to_string(),
            font_variant: "normal".to_string(),
            font_style: "normal".to_string(),
            colors: ["#1C2430", "#3A5BA0", "#7A8AA6", "#C0504D", "#4F8A5B", "#9370DB"]
                .iter()
                .map(|value| value.to_string())
                .collect(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn font(&self) -> FontSpec {
        FontSpec {
            family: self.font_family.clone(),
            weight: self.font_weight.clone(),
            variant: self.font_variant.clone(),
            style: self.font_style.clone(),
        }
    }

    /// Word defaults drawn from this theme; colors cycle through the palette
    /// by input index.
    pub fn word_defaults(&self) -> WordDefaults {
        let font = self.font();
        let colors = if self.colors.is_empty() {
            vec!["Black".to_string()]
        } else {
            self.colors.clone()
        };
        WordDefaults {
            font_family: font.family.into(),
            font_weight: font.weight.into(),
            font_variant: font.variant.into(),
            font_style: font.style.into(),
            color: WordDefault::computed(move |_, index, _| colors[index % colors.len()].clone()),
            ..Default::default()
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}
