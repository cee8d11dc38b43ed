//! Carve one source file into numbered, tagged segments.
//!
//! Tracks are processed strictly one after another. Each track either produces a file or a
//! recorded error; a failing track never stops the batch. File names are a pure function of
//! position and title, so re-running a batch rewrites the same files in place.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, info_span, warn};

use crate::config::Settings;
use crate::progress::{CancelToken, ProgressEvent, ProgressSink};
use crate::tagging::{TagFields, TagSink, tag_best_effort};
use crate::timeline::Timeline;
use crate::track::Track;
use crate::transcoder::{TranscodeRequest, Transcoder};
use crate::{Error, Result};

/// Characters that are unsafe in file names on common filesystems.
const HOSTILE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Per-batch output configuration.
#[derive(Debug, Clone)]
pub struct SegmentOpts {
    pub output_dir: PathBuf,
    pub codec: String,
    pub bitrate: String,
    pub extension: String,
    pub max_title_len: usize,
    pub overwrite: bool,
    pub album: String,
    pub default_artist: String,
    pub embed_cover: bool,
}

impl Default for SegmentOpts {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for SegmentOpts {
    fn from(settings: &Settings) -> Self {
        Self {
            output_dir: settings.output.dir.clone(),
            codec: settings.output.codec.clone(),
            bitrate: settings.output.bitrate.clone(),
            extension: settings.output.extension.trim_start_matches('.').to_string(),
            max_title_len: settings.output.max_title_len,
            overwrite: settings.output.overwrite,
            album: settings.tags.album.clone(),
            default_artist: settings.tags.default_artist.clone(),
            embed_cover: settings.tags.embed_cover,
        }
    }
}

impl SegmentOpts {
    /// `{output_dir}/{NN}. {sanitized title}.{ext}` for the 0-based `index`.
    pub fn output_path(&self, index: usize, title: &str) -> PathBuf {
        self.output_dir
            .join(output_file_name(index, title, self.max_title_len, &self.extension))
    }
}

/// File name for the track at 0-based `index`: two-digit 1-based prefix, sanitized title,
/// extension. The prefix width never grows past two digits.
pub fn output_file_name(index: usize, title: &str, max_title_len: usize, extension: &str) -> String {
    format!(
        "{:02}. {}.{}",
        index + 1,
        sanitize_title(title, max_title_len),
        extension
    )
}

/// Strip filesystem-hostile and control characters and cap the length in characters.
pub fn sanitize_title(title: &str, max_len: usize) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !HOSTILE_CHARS.contains(c) && !c.is_control())
        .collect();
    let truncated: String = cleaned.trim().chars().take(max_len).collect();
    let truncated = truncated.trim_end();

    if truncated.is_empty() {
        "track".to_string()
    } else {
        truncated.to_string()
    }
}

/// What happened to one track.
#[derive(Debug)]
pub enum TrackStatus {
    Succeeded { path: PathBuf, tagged: bool },
    Failed(Error),
    Skipped,
}

#[derive(Debug)]
pub struct TrackOutcome {
    pub index: usize,
    pub title: String,
    pub status: TrackStatus,
}

impl TrackOutcome {
    pub fn path(&self) -> Option<&Path> {
        match &self.status {
            TrackStatus::Succeeded { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match &self.status {
            TrackStatus::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Aggregate result of a batch, one outcome per timeline entry in timeline order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<TrackOutcome>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &TrackOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TrackStatus::Succeeded { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &TrackOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TrackStatus::Failed(_)))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &TrackOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TrackStatus::Skipped))
    }

    /// Every track produced a file.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.succeeded().count() == self.outcomes.len()
    }
}

/// The segmentation engine: a transcoder, a tag sink and output options.
pub struct Segmenter<T: Transcoder, G: TagSink> {
    transcoder: T,
    tagger: G,
    opts: SegmentOpts,
}

impl<T: Transcoder, G: TagSink> Segmenter<T, G> {
    pub fn new(transcoder: T, tagger: G, opts: SegmentOpts) -> Self {
        Self {
            transcoder,
            tagger,
            opts,
        }
    }

    pub fn opts(&self) -> &SegmentOpts {
        &self.opts
    }

    pub fn transcoder(&self) -> &T {
        &self.transcoder
    }

    /// Produce one segment per track of `timeline`.
    ///
    /// Only failing to create the output directory is fatal; everything else is recorded per
    /// track in the returned report.
    pub fn run(
        &self,
        timeline: &Timeline,
        source: &Path,
        cover: Option<&[u8]>,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<BatchReport> {
        fs::create_dir_all(&self.opts.output_dir)?;

        let total = timeline.len();
        let cover = cover.filter(|_| self.opts.embed_cover);
        let mut report = BatchReport::default();

        info!(
            total,
            source = %source.display(),
            output_dir = %self.opts.output_dir.display(),
            "segmentation started"
        );

        for (index, track) in timeline.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                progress.on_event(&ProgressEvent::Cancelled {
                    remaining: total - index,
                });
                report.outcomes.extend(timeline.iter().enumerate().skip(index).map(|(i, t)| {
                    TrackOutcome {
                        index: i,
                        title: t.title.clone(),
                        status: TrackStatus::Skipped,
                    }
                }));
                break;
            }

            let _span = info_span!("track", index, title = %track.title).entered();
            progress.on_event(&ProgressEvent::TrackStarted {
                index,
                total,
                title: track.title.clone(),
            });

            let status = match self.process(index, track, source, cover) {
                Ok((path, tagged)) => {
                    progress.on_event(&ProgressEvent::TrackCompleted {
                        index,
                        total,
                        path: path.clone(),
                    });
                    TrackStatus::Succeeded { path, tagged }
                }
                Err(err) => {
                    warn!(error = %err, "track failed");
                    progress.on_event(&ProgressEvent::TrackFailed {
                        index,
                        total,
                        title: track.title.clone(),
                        error: err.to_string(),
                    });
                    TrackStatus::Failed(err)
                }
            };

            report.outcomes.push(TrackOutcome {
                index,
                title: track.title.clone(),
                status,
            });
        }

        let (succeeded, failed, skipped) = (
            report.succeeded().count(),
            report.failed().count(),
            report.skipped().count(),
        );
        info!(succeeded, failed, skipped, "segmentation finished");
        progress.on_event(&ProgressEvent::BatchFinished {
            succeeded,
            failed,
            skipped,
        });

        Ok(report)
    }

    fn process(
        &self,
        index: usize,
        track: &Track,
        source: &Path,
        cover: Option<&[u8]>,
    ) -> Result<(PathBuf, bool)> {
        // Re-checked here: a timeline can reach the engine without going through the mutation
        // API, and tied starts infer an end equal to the start.
        let duration = track.duration_secs()?;
        let output = self.opts.output_path(index, &track.title);

        let request = TranscodeRequest {
            input: source,
            seek_seconds: track.start.as_secs(),
            duration_seconds: duration,
            codec: &self.opts.codec,
            bitrate: &self.opts.bitrate,
            output: &output,
            overwrite: self.opts.overwrite,
        };

        // Past this point any file at `output` is ours to replace, so a failed encode may
        // remove it.
        if !self.opts.overwrite && output.exists() {
            return Err(Error::transcode(
                &output,
                "output already exists and overwriting is disabled",
            ));
        }

        if let Err(err) = self.transcoder.transcode(&request) {
            remove_partial(&output);
            return Err(err);
        }
        if !output.is_file() {
            return Err(Error::transcode(
                &output,
                "transcoder reported success but produced no file",
            ));
        }

        let fields = TagFields {
            title: track.title.clone(),
            album: self.opts.album.clone(),
            artist: track
                .artist
                .clone()
                .unwrap_or_else(|| self.opts.default_artist.clone()),
        };
        let tagged = tag_best_effort(&self.tagger, &output, &fields, cover);

        Ok((output, tagged))
    }
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => info!(path = %path.display(), "removed partial output"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "could not remove partial output"),
    }
}
