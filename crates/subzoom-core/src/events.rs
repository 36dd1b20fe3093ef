use std::fmt;
use std::sync::mpsc;
use std::sync::Arc;

use crate::decoder::Bitmap;
use crate::geometry::IntRect;

/// Observable load lifecycle of a [`crate::state::SubsamplingState`].
///
/// Emitted in order: `Loading`, then `SourceLoaded` or `SourceLoadError` and,
/// independently, `PreviewLoaded` or `PreviewLoadError`; any number of
/// `TileLoadError`; on teardown an optional `DisposePreview` and finally `Destroyed`.
#[derive(Clone, Debug)]
pub enum LoadEvent {
    Loading,
    SourceLoaded { width: u32, height: u32 },
    SourceLoadError(String),
    PreviewLoaded { width: u32, height: u32 },
    PreviewLoadError(String),
    TileLoadError {
        rect: IntRect,
        sample_size: u32,
        message: String,
    },
    /// Hands an externally supplied preview back to its owner.
    DisposePreview(Arc<Bitmap>),
    Destroyed,
}

impl fmt::Display for LoadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading"),
            Self::SourceLoaded { width, height } => write!(f, "Source loaded ({width}x{height})"),
            Self::SourceLoadError(msg) => write!(f, "Source load error: {msg}"),
            Self::PreviewLoaded { width, height } => {
                write!(f, "Preview loaded ({width}x{height})")
            }
            Self::PreviewLoadError(msg) => write!(f, "Preview load error: {msg}"),
            Self::TileLoadError {
                rect,
                sample_size,
                message,
            } => write!(f, "Tile {rect} @{sample_size} failed: {message}"),
            Self::DisposePreview(_) => write!(f, "Dispose preview"),
            Self::Destroyed => write!(f, "Destroyed"),
        }
    }
}

/// Invoked whenever published render state changes.
pub type RepaintCallback = Arc<dyn Fn() + Send + Sync>;

/// Fan-out for load events and repaint requests. Send failures are ignored:
/// an observer that went away just stops receiving.
#[derive(Clone, Default)]
pub(crate) struct EventSink {
    tx: Option<mpsc::Sender<LoadEvent>>,
    repaint: Option<RepaintCallback>,
}

impl EventSink {
    pub(crate) fn new(tx: Option<mpsc::Sender<LoadEvent>>, repaint: Option<RepaintCallback>) -> Self {
        Self { tx, repaint }
    }

    pub(crate) fn emit(&self, event: LoadEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
        self.request_repaint();
    }

    pub(crate) fn request_repaint(&self) {
        if let Some(repaint) = &self.repaint {
            repaint();
        }
    }
}
