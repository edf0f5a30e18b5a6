use crate::ir::{FontSpec, RawWord};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Container proportions with the shorter side normalized to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aspect {
    pub x: f64,
    pub y: f64,
}

impl Aspect {
    pub const SQUARE: Self = Self { x: 1.0, y: 1.0 };

    pub fn from_container(width: f64, height: f64) -> Self {
        if width > 0.0 && height > 0.0 {
            if width > height {
                return Self {
                    x: width / height,
                    y: 1.0,
                };
            }
            if height > width {
                return Self {
                    x: 1.0,
                    y: height / width,
                };
            }
        }
        Self::SQUARE
    }
}

/// Tight box around every stamped grid pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl GridBounds {
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed_words: usize,
    pub total_words: usize,
}

/// Receives placement progress; `None` marks the end of a pass.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: Option<Progress>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: Option<Progress>) {}
}

/// Observable slot holding the latest progress value.
#[derive(Debug, Clone, Default)]
pub struct ProgressSlot {
    inner: Arc<Mutex<Option<Progress>>>,
}

impl ProgressSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Progress> {
        self.inner.lock().ok().and_then(|slot| *slot)
    }
}

impl ProgressSink for ProgressSlot {
    fn report(&self, progress: Option<Progress>) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = progress;
        }
    }
}

/// Logs every progress update at trace level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, progress: Option<Progress>) {
        match progress {
            Some(progress) => tracing::trace!(
                completed = progress.completed_words,
                total = progress.total_words,
                "placement progress"
            ),
            None => tracing::trace!("placement finished"),
        }
    }
}

/// One laid-out word. `left`/`top` locate the center of the word's text box
/// inside the container.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedWord {
    pub key: String,
    pub word: RawWord,
    pub index: usize,
    pub text: String,
    pub weight: f64,
    pub rotation: f64,
    pub font: FontSpec,
    pub font_size: f64,
    pub left: f64,
    pub top: f64,
    pub color: String,
}

impl PlacedWord {
    pub fn css_font(&self) -> String {
        self.font.css(self.font_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloudLayout {
    pub width: f64,
    pub height: f64,
    pub words: Vec<PlacedWord>,
}
