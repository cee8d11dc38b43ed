//! Source acquisition: fetch one remote video's audio plus its metadata.
//!
//! The default implementation drives `yt-dlp`. The downloaded file's location is taken from
//! what the downloader prints after post-processing, never from scanning a directory for a
//! well-known prefix.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::sync::mpsc;
use std::thread;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::progress::{ProgressEvent, ProgressSink};
use crate::{Error, Result};

/// What a successful acquisition hands to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredSource {
    pub audio_path: PathBuf,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub title: Option<String>,
    pub uploader: Option<String>,
}

/// Fetches a remote source into `work_dir`.
pub trait SourceAcquirer {
    fn acquire(
        &self,
        url: &str,
        work_dir: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<AcquiredSource>;
}

/// The subset of `yt-dlp --dump-single-json` output the pipeline uses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

impl VideoInfo {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// [`SourceAcquirer`] backed by the `yt-dlp` command-line downloader.
#[derive(Debug, Clone)]
pub struct YtDlpAcquirer {
    program: PathBuf,
    audio_format: String,
}

impl Default for YtDlpAcquirer {
    fn default() -> Self {
        Self::new("yt-dlp", "mp3")
    }
}

impl YtDlpAcquirer {
    pub fn new(program: impl Into<PathBuf>, audio_format: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            audio_format: audio_format.into(),
        }
    }

    fn fetch_info(&self, url: &str) -> Result<VideoInfo> {
        let output = Command::new(&self.program)
            .args(["--dump-single-json", "--no-playlist", "--no-warnings", url])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(Error::acquisition(format!(
                "metadata lookup exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        VideoInfo::from_json(&String::from_utf8_lossy(&output.stdout))
            .map_err(|e| Error::acquisition(format!("unreadable metadata: {e}")))
    }

    /// Arguments for the download step. The output template is rooted in `work_dir`.
    pub fn download_args(&self, url: &str, work_dir: &Path) -> Vec<String> {
        let template = work_dir.join("source.%(ext)s");
        vec![
            "-f".into(),
            "bestaudio/best".into(),
            "-x".into(),
            "--audio-format".into(),
            self.audio_format.clone(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--newline".into(),
            "--progress".into(),
            "--print".into(),
            "after_move:filepath".into(),
            "-o".into(),
            template.to_string_lossy().into_owned(),
            url.into(),
        ]
    }

    fn download(
        &self,
        url: &str,
        work_dir: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<PathBuf> {
        let mut child = Command::new(&self.program)
            .args(self.download_args(url, work_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // yt-dlp may put progress on either stream depending on its quiet mode, so both are
        // read line by line on helper threads and funneled through one channel.
        let (tx, rx) = mpsc::channel::<(Stream, String)>();
        let readers = [
            child.stdout.take().map(|s| forward_lines(s, Stream::Stdout, tx.clone())),
            child.stderr.take().map(|s| forward_lines(s, Stream::Stderr, tx.clone())),
        ];
        drop(tx);

        let mut printed_path: Option<PathBuf> = None;
        let mut stderr_tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

        for (stream, line) in rx {
            if let Some(percent) = parse_download_percent(&line) {
                progress.on_event(&ProgressEvent::DownloadProgress { percent });
                continue;
            }
            match stream {
                Stream::Stdout => {
                    let candidate = line.trim();
                    if !candidate.is_empty() && !candidate.starts_with('[') {
                        printed_path = Some(PathBuf::from(candidate));
                    }
                }
                Stream::Stderr => {
                    debug!(line = %line, "yt-dlp");
                    push_tail(&mut stderr_tail, line);
                }
            }
        }

        for reader in readers.into_iter().flatten() {
            let _ = reader.join();
        }
        let status = child.wait()?;

        if !status.success() {
            return Err(Error::acquisition(format!(
                "download exited with {status}: {}",
                Vec::from(stderr_tail).join("\n").trim()
            )));
        }

        let path = printed_path
            .ok_or_else(|| Error::acquisition("downloader did not report an output file"))?;
        if !path.is_file() {
            return Err(Error::acquisition(format!(
                "downloader reported '{}' but no such file exists",
                path.display()
            )));
        }
        Ok(path)
    }

    fn spawn_error(&self, err: std::io::Error) -> Error {
        Error::acquisition(format!(
            "could not start '{}': {err}",
            self.program.display()
        ))
    }
}

impl SourceAcquirer for YtDlpAcquirer {
    fn acquire(
        &self,
        url: &str,
        work_dir: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<AcquiredSource> {
        if url.trim().is_empty() {
            return Err(Error::acquisition("no URL provided"));
        }

        let info = self.fetch_info(url)?;
        info!(title = ?info.title, "fetched video metadata");

        let audio_path = self.download(url, work_dir, progress)?;
        info!(path = %audio_path.display(), "audio downloaded");

        Ok(AcquiredSource {
            audio_path,
            description: info.description,
            thumbnail_url: info.thumbnail,
            title: info.title,
            uploader: info.uploader.or(info.channel),
        })
    }
}

/// Stderr lines kept for the error message of a failed download.
const STDERR_TAIL_LINES: usize = 20;

fn push_tail(tail: &mut VecDeque<String>, line: String) {
    if tail.len() == STDERR_TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

fn forward_lines<R: Read + Send + 'static>(
    reader: R,
    stream: Stream,
    tx: mpsc::Sender<(Stream, String)>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for line in BufReader::new(reader).lines() {
            let Ok(line) = line else { break };
            if tx.send((stream, line)).is_err() {
                break;
            }
        }
    })
}

/// Read the percentage out of a `[download]  42.7% of ...` line.
pub fn parse_download_percent(line: &str) -> Option<f32> {
    static PERCENT: OnceLock<Regex> = OnceLock::new();
    let re = PERCENT.get_or_init(|| {
        Regex::new(r"^\[download\]\s+(\d{1,3}(?:\.\d+)?)%").expect("static progress pattern")
    });

    re.captures(line.trim_start())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f32>().ok())
        .filter(|p| (0.0..=100.0).contains(p))
}
