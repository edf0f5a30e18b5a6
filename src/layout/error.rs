use crate::raster::RasterError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout pass cancelled")]
    Cancelled,
    #[error("failed to rasterize {text:?}: {source}")]
    Rasterizer {
        text: String,
        #[source]
        source: RasterError,
    },
    #[error("grid worker failed: {0}")]
    Worker(String),
    #[error("grid worker answered {request} with an unexpected response")]
    Protocol { request: &'static str },
    #[error("spacing {spacing} exceeds the limit of {limit}")]
    Spacing { spacing: f64, limit: f64 },
}

impl LayoutError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LayoutError::Cancelled)
    }
}

/// Cooperative cancellation flag shared between a pass and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), LayoutError> {
        if self.is_cancelled() {
            return Err(LayoutError::Cancelled);
        }
        Ok(())
    }
}
