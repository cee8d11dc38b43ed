//! External transcoder seam.
//!
//! The engine re-invokes the transcoder once per track with a seek and an optional duration
//! instead of decoding the whole source once. That costs some redundant decode work but keeps
//! memory flat and tolerates sources that are not cheaply seekable.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::{Error, Result};

/// One seek + trim + re-encode job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeRequest<'a> {
    pub input: &'a Path,
    pub seek_seconds: u32,
    /// `None` means "to the end of the stream".
    pub duration_seconds: Option<u32>,
    pub codec: &'a str,
    pub bitrate: &'a str,
    pub output: &'a Path,
    pub overwrite: bool,
}

/// Something that can cut one segment out of a source file.
///
/// Implementations must either produce `request.output` and return `Ok(())`, or return an
/// [`Error::Transcode`]. Whatever they leave at the output path on failure is removed by the
/// caller.
pub trait Transcoder {
    fn transcode(&self, request: &TranscodeRequest<'_>) -> Result<()>;
}

impl<T: Transcoder + ?Sized> Transcoder for &T {
    fn transcode(&self, request: &TranscodeRequest<'_>) -> Result<()> {
        (**self).transcode(request)
    }
}

/// Runs `ffmpeg` as a blocking subprocess.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Verify the binary can be spawned (`ffmpeg -version`).
    pub fn check_available(&self) -> Result<()> {
        let output = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                Error::msg(format!(
                    "'{}' is required but could not be started: {e}",
                    self.program.display()
                ))
            })?;

        if !output.status.success() {
            return Err(Error::msg(format!(
                "'{} -version' exited with {}",
                self.program.display(),
                output.status
            )));
        }
        Ok(())
    }

    /// The full argument vector for `request`, excluding the program name.
    pub fn args(request: &TranscodeRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();

        args.push(request.input.as_os_str().to_owned());
        args.push("-ss".into());
        args.push(request.seek_seconds.to_string().into());

        if let Some(duration) = request.duration_seconds {
            args.push("-t".into());
            args.push(duration.to_string().into());
        }

        args.extend(
            [
                "-vn",
                "-acodec",
                request.codec,
                "-b:a",
                request.bitrate,
                if request.overwrite { "-y" } else { "-n" },
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(request.output.as_os_str().to_owned());
        args
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, request: &TranscodeRequest<'_>) -> Result<()> {
        let args = Self::args(request);
        debug!(program = %self.program.display(), ?args, "running transcoder");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                Error::transcode(
                    request.output,
                    format!("failed to start '{}': {e}", self.program.display()),
                )
            })?;

        // With `-loglevel error`, anything on stderr is an error report.
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();

        if !output.status.success() {
            let detail = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                format!("exited with {}: {stderr}", output.status)
            };
            return Err(Error::transcode(request.output, detail));
        }
        if !stderr.is_empty() {
            return Err(Error::transcode(request.output, stderr.to_string()));
        }
        Ok(())
    }
}
