//! Progress reporting and cooperative cancellation for long-running work.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A status update emitted while loading a source or running a segmentation batch.
///
/// Every event has a human-readable `Display` so simple frontends can print it verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    ExtractionStarted,
    TracksFound {
        count: usize,
    },
    DownloadProgress {
        percent: f32,
    },
    TrackStarted {
        index: usize,
        total: usize,
        title: String,
    },
    TrackCompleted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    TrackFailed {
        index: usize,
        total: usize,
        title: String,
        error: String,
    },
    Cancelled {
        remaining: usize,
    },
    BatchFinished {
        succeeded: usize,
        failed: usize,
        skipped: usize,
    },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExtractionStarted => write!(f, "extracting track list from description"),
            Self::TracksFound { count } => write!(f, "found {count} tracks in description"),
            Self::DownloadProgress { percent } => write!(f, "downloading: {percent:.1}%"),
            Self::TrackStarted {
                index,
                total,
                title,
            } => write!(f, "processing track {}/{total}: {title}", index + 1),
            Self::TrackCompleted { index, total, path } => {
                let name = path.file_name().unwrap_or(path.as_os_str());
                write!(f, "created {}/{total}: {}", index + 1, name.to_string_lossy())
            }
            Self::TrackFailed {
                index,
                total,
                title,
                error,
            } => write!(f, "failed {}/{total}: {title}: {error}", index + 1),
            Self::Cancelled { remaining } => {
                write!(f, "cancelled; {remaining} tracks not processed")
            }
            Self::BatchFinished {
                succeeded,
                failed,
                skipped,
            } => write!(
                f,
                "finished: {succeeded} succeeded, {failed} failed, {skipped} skipped"
            ),
        }
    }
}

/// Consumer for progress events.
///
/// Implemented for any `FnMut(&ProgressEvent)`, so a closure is usually enough.
pub trait ProgressSink {
    fn on_event(&mut self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(&ProgressEvent),
{
    fn on_event(&mut self, event: &ProgressEvent) {
        self(event)
    }
}

/// A sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_event(&mut self, _event: &ProgressEvent) {}
}

/// Shared flag for cooperative cancellation.
///
/// Cancellation is observed between tracks only; a running transcoder is never interrupted, so
/// no half-written output is left behind by a cancel.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
