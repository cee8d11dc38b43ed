//! `tracksplit` splits one long recording (typically a full-album upload) into numbered,
//! tagged per-track audio files.
//!
//! This crate provides:
//! - A timestamp codec and a tracklist extractor for free-form descriptions
//! - An editable, always-sorted track timeline
//! - A segmentation engine driving an external transcoder, with best-effort tagging
//! - A session that acquires sources, tracks transient files and cleans up after itself
//!
//! External tools sit behind small traits ([`Transcoder`], [`TagSink`], [`SourceAcquirer`]) so
//! the pipeline can be exercised without `ffmpeg` or `yt-dlp` installed.

// Crate-wide error type.
mod error;
pub use error::{Error, Result};

// Timeline model and extraction.
pub mod extractor;
pub mod timeline;
pub mod timestamp;
pub mod track;

// Segmentation and its collaborators.
pub mod progress;
pub mod segmenter;
pub mod tagging;
pub mod transcoder;

// Acquisition and orchestration.
pub mod cover;
pub mod probe;
pub mod session;
pub mod source;

pub mod config;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

pub use config::Settings;
pub use extractor::{extract_from_description, extract_timeline};
pub use progress::{CancelToken, NoProgress, ProgressEvent, ProgressSink};
pub use segmenter::{BatchReport, SegmentOpts, Segmenter, TrackOutcome, TrackStatus};
pub use session::{Session, SessionOpts};
pub use source::{AcquiredSource, SourceAcquirer, YtDlpAcquirer};
pub use tagging::{LoftyTagger, TagFields, TagSink};
pub use timeline::Timeline;
pub use timestamp::Timestamp;
pub use track::{Track, TrackEdit};
pub use transcoder::{FfmpegTranscoder, TranscodeRequest, Transcoder};
