#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracksplit::{Error, Result, TagFields, TagSink, TranscodeRequest, Transcoder};

/// Writes a small text file per request instead of running ffmpeg.
#[derive(Default)]
pub struct FakeTranscoder {
    /// Requests whose seek matches one of these fail after leaving a partial file behind.
    pub fail_at_seek: HashSet<u32>,
    pub calls: RefCell<Vec<(u32, Option<u32>, PathBuf)>>,
}

impl FakeTranscoder {
    pub fn failing_at(seeks: &[u32]) -> Self {
        Self {
            fail_at_seek: seeks.iter().copied().collect(),
            ..Self::default()
        }
    }
}

impl Transcoder for FakeTranscoder {
    fn transcode(&self, request: &TranscodeRequest<'_>) -> Result<()> {
        self.calls.borrow_mut().push((
            request.seek_seconds,
            request.duration_seconds,
            request.output.to_path_buf(),
        ));

        fs::write(request.output, b"partial")?;
        if self.fail_at_seek.contains(&request.seek_seconds) {
            return Err(Error::Transcode {
                output: request.output.to_path_buf(),
                message: "simulated encoder crash".into(),
            });
        }
        fs::write(
            request.output,
            format!("seek={} dur={:?}", request.seek_seconds, request.duration_seconds),
        )?;
        Ok(())
    }
}

/// Records tag requests; optionally fails every one of them.
#[derive(Default)]
pub struct RecordingTagger {
    pub fail: bool,
    pub applied: RefCell<Vec<(PathBuf, TagFields, bool)>>,
}

impl TagSink for RecordingTagger {
    fn apply(&self, path: &Path, fields: &TagFields, cover: Option<&[u8]>) -> Result<()> {
        if self.fail {
            return Err(Error::Tagging("simulated tag failure".into()));
        }
        self.applied
            .borrow_mut()
            .push((path.to_path_buf(), fields.clone(), cover.is_some()));
        Ok(())
    }
}

pub fn file_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<Vec<_>>>()?;
    names.sort();
    Ok(names)
}
