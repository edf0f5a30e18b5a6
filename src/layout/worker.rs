// Isolated execution of the collision grid. A pass talks to its grid only
// through typed requests; each request is answered before the next is sent.

use super::error::LayoutError;
use super::grid::PixelGrid;
use super::types::{Aspect, GridBounds};
use crate::raster::GlyphMask;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum GridRequest {
    Init(Aspect),
    Clear,
    Put {
        mask: GlyphMask,
        left: i32,
        top: i32,
    },
    FindFit {
        mask: GlyphMask,
        left: i32,
        top: i32,
        padding: u32,
    },
    GetBounds,
}

impl GridRequest {
    pub fn name(&self) -> &'static str {
        match self {
            GridRequest::Init(_) => "init",
            GridRequest::Clear => "clear",
            GridRequest::Put { .. } => "put",
            GridRequest::FindFit { .. } => "findFit",
            GridRequest::GetBounds => "getBounds",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridResponse {
    Done,
    Fit { left: i32, top: i32 },
    Bounds(GridBounds),
}

/// Applies one request to a grid. Shared by every isolate implementation.
pub fn serve(grid: &mut PixelGrid, request: GridRequest) -> GridResponse {
    match request {
        GridRequest::Init(aspect) => {
            grid.init(aspect);
            GridResponse::Done
        }
        GridRequest::Clear => {
            grid.clear();
            GridResponse::Done
        }
        GridRequest::Put { mask, left, top } => {
            grid.put(&mask, left, top);
            GridResponse::Done
        }
        GridRequest::FindFit {
            mask,
            left,
            top,
            padding,
        } => {
            let (left, top) = grid.find_fit(&mask, left, top, padding);
            GridResponse::Fit { left, top }
        }
        GridRequest::GetBounds => GridResponse::Bounds(grid.bounds()),
    }
}

/// Handle to one grid owned by a single layout pass.
pub trait GridIsolate: Send {
    fn send(&mut self, request: GridRequest) -> Result<GridResponse, LayoutError>;
    /// Releases the grid. Calling it more than once is a no-op.
    fn terminate(&mut self);
}

pub trait IsolateFactory: Send + Sync {
    fn spawn(&self) -> Result<Box<dyn GridIsolate>, LayoutError>;
}

/// Runs each grid on its own named thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadIsolateFactory;

impl IsolateFactory for ThreadIsolateFactory {
    fn spawn(&self) -> Result<Box<dyn GridIsolate>, LayoutError> {
        Ok(Box::new(ThreadIsolate::spawn()?))
    }
}

pub struct ThreadIsolate {
    requests: Option<Sender<GridRequest>>,
    responses: Receiver<GridResponse>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadIsolate {
    pub fn spawn() -> Result<Self, LayoutError> {
        let (request_tx, request_rx) = mpsc::channel::<GridRequest>();
        let (response_tx, response_rx) = mpsc::channel::<GridResponse>();
        let handle = thread::Builder::new()
            .name("wordcloud-grid".to_string())
            .spawn(move || {
                let mut grid = PixelGrid::new(Aspect::SQUARE);
                for request in request_rx {
                    let response = serve(&mut grid, request);
                    if response_tx.send(response).is_err() {
                        break;
                    }
                }
                tracing::trace!("grid worker exiting");
            })
            .map_err(|err| LayoutError::Worker(format!("failed to spawn grid thread: {err}")))?;
        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            handle: Some(handle),
        })
    }
}

impl GridIsolate for ThreadIsolate {
    fn send(&mut self, request: GridRequest) -> Result<GridResponse, LayoutError> {
        let name = request.name();
        let Some(requests) = self.requests.as_ref() else {
            return Err(LayoutError::Worker(format!(
                "{name} sent to a terminated grid"
            )));
        };
        requests
            .send(request)
            .map_err(|_| LayoutError::Worker(format!("grid thread hung up before {name}")))?;
        self.responses
            .recv()
            .map_err(|_| LayoutError::Worker(format!("grid thread died while serving {name}")))
    }

    fn terminate(&mut self) {
        // Dropping the sender ends the worker's receive loop.
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("grid thread panicked");
            }
        }
    }
}

impl Drop for ThreadIsolate {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Serves requests on the caller's thread, for hosts without threads and
/// for deterministic tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineIsolateFactory;

impl IsolateFactory for InlineIsolateFactory {
    fn spawn(&self) -> Result<Box<dyn GridIsolate>, LayoutError> {
        Ok(Box::new(InlineIsolate::default()))
    }
}

#[derive(Debug, Clone)]
pub struct InlineIsolate {
    grid: Option<PixelGrid>,
}

impl Default for InlineIsolate {
    fn default() -> Self {
        Self {
            grid: Some(PixelGrid::new(Aspect::SQUARE)),
        }
    }
}

impl GridIsolate for InlineIsolate {
    fn send(&mut self, request: GridRequest) -> Result<GridResponse, LayoutError> {
        match self.grid.as_mut() {
            Some(grid) => Ok(serve(grid, request)),
            None => Err(LayoutError::Worker(format!(
                "{} sent to a terminated grid",
                request.name()
            ))),
        }
    }

    fn terminate(&mut self) {
        self.grid = None;
    }
}
