//! Pipeline orchestration.
//!
//! A [`Session`] owns one loaded source at a time together with everything derived from it:
//! the track timeline, the cover image and any preview clips. Loading another source, calling
//! [`Session::cleanup`] or dropping the session discards the transient pieces. Files the user
//! pointed us at are never deleted.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::cover;
use crate::extractor::extract_from_description;
use crate::probe;
use crate::progress::{CancelToken, ProgressEvent, ProgressSink};
use crate::segmenter::{BatchReport, Segmenter, sanitize_title};
use crate::source::SourceAcquirer;
use crate::tagging::TagSink;
use crate::timeline::Timeline;
use crate::transcoder::{TranscodeRequest, Transcoder};
use crate::{Error, Result};

/// Session-level knobs that don't belong to a single batch.
#[derive(Debug, Clone)]
pub struct SessionOpts {
    pub preview_seconds: u32,
    pub preview_codec: String,
    pub preview_bitrate: String,
    pub preview_extension: String,
    /// Download and crop the source thumbnail as cover art on remote loads.
    pub fetch_cover: bool,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for SessionOpts {
    fn from(settings: &Settings) -> Self {
        Self {
            preview_seconds: settings.preview.seconds,
            preview_codec: settings.output.codec.clone(),
            preview_bitrate: settings.output.bitrate.clone(),
            preview_extension: settings.output.extension.trim_start_matches('.').to_string(),
            fetch_cover: settings.tags.embed_cover,
        }
    }
}

/// The audio currently loaded into a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub path: PathBuf,
    /// Downloaded by us into the work directory and removed on cleanup.
    pub transient: bool,
    pub title: Option<String>,
    pub uploader: Option<String>,
}

pub struct Session {
    id: Uuid,
    work_dir: TempDir,
    opts: SessionOpts,
    source: Option<LoadedSource>,
    cover: Option<Vec<u8>>,
    timeline: Option<Timeline>,
    previews: Vec<PathBuf>,
}

impl Session {
    pub fn new(opts: SessionOpts) -> Result<Self> {
        let work_dir = tempfile::Builder::new().prefix("tracksplit-").tempdir()?;
        let id = Uuid::new_v4();
        debug!(session = %id, work_dir = %work_dir.path().display(), "session created");

        Ok(Self {
            id,
            work_dir,
            opts,
            source: None,
            cover: None,
            timeline: None,
            previews: Vec::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    pub fn source(&self) -> Option<&LoadedSource> {
        self.source.as_ref()
    }

    /// `None` when no extraction was attempted for the current source.
    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }

    pub fn timeline_mut(&mut self) -> Option<&mut Timeline> {
        self.timeline.as_mut()
    }

    /// The current timeline, created empty if none exists yet (manual entry).
    pub fn timeline_or_default(&mut self) -> &mut Timeline {
        self.timeline.get_or_insert_with(Timeline::new)
    }

    pub fn set_timeline(&mut self, timeline: Timeline) {
        self.timeline = Some(timeline);
    }

    pub fn cover(&self) -> Option<&[u8]> {
        self.cover.as_deref()
    }

    pub fn set_cover(&mut self, bytes: Vec<u8>) {
        self.cover = Some(bytes);
    }

    pub fn clear_cover(&mut self) {
        self.cover = None;
    }

    pub fn preview_files(&self) -> &[PathBuf] {
        &self.previews
    }

    /// Acquire a remote source and extract its timeline from the description.
    ///
    /// Whatever was loaded before is discarded first. Returns the extracted timeline, or `None`
    /// when the source came without a description.
    pub fn load_remote<A: SourceAcquirer + ?Sized>(
        &mut self,
        acquirer: &A,
        url: &str,
        progress: &mut dyn ProgressSink,
    ) -> Result<Option<&Timeline>> {
        let _span = info_span!("load_remote", session = %self.id).entered();
        self.reset();

        let acquired = acquirer.acquire(url, self.work_dir.path(), progress)?;
        info!(path = %acquired.audio_path.display(), "source acquired");

        self.source = Some(LoadedSource {
            path: acquired.audio_path,
            transient: true,
            title: acquired.title,
            uploader: acquired.uploader,
        });

        if let Some(url) = acquired.thumbnail_url.as_deref().filter(|_| self.opts.fetch_cover) {
            match cover::fetch_thumbnail(url).and_then(|bytes| cover::crop_to_jpeg(&bytes, None))
            {
                Ok(jpeg) => self.cover = Some(jpeg),
                Err(err) => warn!(error = %err, "continuing without cover art"),
            }
        }

        self.extract(acquired.description.as_deref(), progress);
        Ok(self.timeline.as_ref())
    }

    /// Use a file already on disk. It is never deleted by the session.
    pub fn load_local(
        &mut self,
        path: &Path,
        description: Option<&str>,
        progress: &mut dyn ProgressSink,
    ) -> Result<Option<&Timeline>> {
        let _span = info_span!("load_local", session = %self.id).entered();
        if !path.is_file() {
            return Err(Error::acquisition(format!(
                "'{}' is not a readable file",
                path.display()
            )));
        }
        self.reset();

        self.source = Some(LoadedSource {
            path: path.to_path_buf(),
            transient: false,
            title: path.file_stem().map(|s| s.to_string_lossy().into_owned()),
            uploader: None,
        });

        self.extract(description, progress);
        Ok(self.timeline.as_ref())
    }

    fn extract(&mut self, description: Option<&str>, progress: &mut dyn ProgressSink) {
        progress.on_event(&ProgressEvent::ExtractionStarted);
        self.timeline = extract_from_description(description);

        let count = self.timeline.as_ref().map_or(0, Timeline::len);
        info!(count, "track timeline extracted");
        progress.on_event(&ProgressEvent::TracksFound { count });
        self.warn_about_late_tracks();
    }

    /// Tracks that start at or past the end of the audio can only fail; say so early.
    fn warn_about_late_tracks(&self) {
        let (Some(source), Some(timeline)) = (&self.source, &self.timeline) else {
            return;
        };
        match probe::source_duration(&source.path) {
            Ok(Some(duration)) => {
                let secs = u32::try_from(duration.as_secs()).unwrap_or(u32::MAX);
                for index in timeline.starting_after(secs) {
                    if let Some(track) = timeline.get(index) {
                        warn!(
                            index,
                            title = %track.title,
                            start = %track.start,
                            source_secs = secs,
                            "track starts past the end of the source"
                        );
                    }
                }
            }
            Ok(None) => debug!("source duration unknown"),
            Err(err) => debug!(error = %err, "could not probe source duration"),
        }
    }

    /// Run `segmenter` over a snapshot of the current timeline.
    pub fn segment<T: Transcoder, G: TagSink>(
        &self,
        segmenter: &Segmenter<T, G>,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<BatchReport> {
        let source = self.source.as_ref().ok_or(Error::NoSource)?;
        let timeline = self.timeline.clone().ok_or(Error::NoTimeline)?;
        if timeline.is_empty() {
            return Err(Error::NoTimeline);
        }

        let _span = info_span!("segment", session = %self.id).entered();
        segmenter.run(&timeline, &source.path, self.cover(), progress, cancel)
    }

    /// Render the first `preview_seconds` of track `index` into the work directory.
    pub fn preview<T: Transcoder + ?Sized>(&mut self, index: usize, transcoder: &T) -> Result<PathBuf> {
        let source = self.source.as_ref().ok_or(Error::NoSource)?;
        let track = self
            .timeline
            .as_ref()
            .ok_or(Error::NoTimeline)?
            .get(index)
            .ok_or_else(|| Error::validation(format!("no track at index {index}")))?;

        let limit = self.opts.preview_seconds;
        let duration = track.duration_secs()?.map_or(limit, |d| d.min(limit));
        let output = self.work_dir.path().join(format!(
            "preview-{:02}-{}.{}",
            index + 1,
            sanitize_title(&track.title, 40),
            self.opts.preview_extension
        ));

        let request = TranscodeRequest {
            input: &source.path,
            seek_seconds: track.start.as_secs(),
            duration_seconds: Some(duration),
            codec: &self.opts.preview_codec,
            bitrate: &self.opts.preview_bitrate,
            output: &output,
            overwrite: true,
        };
        if let Err(err) = transcoder.transcode(&request) {
            remove_logged(&output);
            return Err(err);
        }

        if !self.previews.contains(&output) {
            self.previews.push(output.clone());
        }
        Ok(output)
    }

    /// Remove the transient source and every preview clip. Failures are logged only.
    pub fn cleanup(&mut self) {
        for path in self.previews.drain(..) {
            remove_logged(&path);
        }
        if let Some(source) = self.source.as_ref().filter(|s| s.transient) {
            remove_logged(&source.path);
        }
    }

    fn reset(&mut self) {
        self.cleanup();
        self.source = None;
        self.timeline = None;
        self.cover = None;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_logged(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed transient file"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove transient file"),
    }
}
