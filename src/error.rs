use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

/// tracksplit's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// tracksplit's crate-wide error type.
///
/// The variants follow how far a failure is allowed to travel:
/// - `InvalidTimestamp` is swallowed by the extractor but surfaced for manual entry.
/// - `Validation` is always surfaced to whoever asked for the mutation.
/// - `Acquisition` aborts loading a source.
/// - `Transcode` and `Tagging` are per-track and end up in a batch report or a log line.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid timestamp: '{0}'")]
    InvalidTimestamp(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("source acquisition failed: {0}")]
    Acquisition(String),

    #[error("transcode failed for '{}': {message}", output.display())]
    Transcode { output: PathBuf, message: String },

    #[error("tagging failed: {0}")]
    Tagging(String),

    #[error("cover art: {0}")]
    Cover(String),

    #[error("no audio source is loaded")]
    NoSource,

    #[error("no track timeline is available")]
    NoTimeline,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn acquisition(message: impl Into<String>) -> Self {
        Self::Acquisition(message.into())
    }

    pub(crate) fn transcode(output: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Transcode {
            output: output.into(),
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Other(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcode_error_names_the_output_file() {
        let err = Error::transcode("/tmp/out/01. Intro.mp3", "exit status 1");
        let text = err.to_string();
        assert!(text.contains("01. Intro.mp3"));
        assert!(text.contains("exit status 1"));
    }

    #[test]
    fn anyhow_chains_are_flattened_into_messages() {
        let inner = anyhow::anyhow!("disk full").context("writing tags");
        let err: Error = inner.into();
        assert_eq!(err.to_string(), "writing tags: disk full");
    }
}
