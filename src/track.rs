use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;
use crate::{Error, Result};

/// One boundary-delimited piece of the source audio.
///
/// `end` holds only an *explicit* end (typed by a user or read from a `TIME - TITLE - TIME`
/// line). The end inferred from the next track's start is kept separately and recomputed by
/// [`crate::Timeline`] on every mutation; [`Track::end`] returns whichever applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub start: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip)]
    pub(crate) inferred_end: Option<Timestamp>,
}

impl Track {
    pub fn new(title: impl Into<String>, start: Timestamp) -> Self {
        Self {
            title: title.into(),
            start,
            end: None,
            artist: None,
            inferred_end: None,
        }
    }

    pub fn with_end(mut self, end: Timestamp) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// The effective end: explicit if set, otherwise the next track's start.
    ///
    /// `None` means "run to the end of the source audio".
    pub fn end(&self) -> Option<Timestamp> {
        self.end.or(self.inferred_end)
    }

    /// Whether the end was supplied rather than inferred.
    pub fn has_explicit_end(&self) -> bool {
        self.end.is_some()
    }

    /// Length in seconds between start and the effective end.
    ///
    /// `Ok(None)` means open-ended. A zero or negative span is a validation error: this is the
    /// engine's defensive re-check for timelines that never went through the mutation API, and
    /// for tied starts where the inferred end equals the start.
    pub fn duration_secs(&self) -> Result<Option<u32>> {
        match self.end() {
            None => Ok(None),
            Some(end) => end.seconds_after(self.start).map(Some).ok_or_else(|| {
                Error::validation(format!(
                    "track '{}' ends at {end}, which is not after its start {}",
                    self.title, self.start
                ))
            }),
        }
    }

    /// Check the per-track invariants: usable title, and an explicit end after the start.
    pub fn validate(&self) -> Result<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::validation("track title must not be empty"));
        }
        if title.chars().all(char::is_numeric) {
            return Err(Error::validation(format!(
                "track title '{title}' must not be purely numeric"
            )));
        }
        if let Some(end) = self.end {
            if end <= self.start {
                return Err(Error::validation(format!(
                    "end {end} must be after start {} for track '{title}'",
                    self.start
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn same_identity(&self, title: &str, start: Timestamp) -> bool {
        self.start == start && self.title == title
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.start)?;
        if let Some(end) = self.end() {
            write!(f, " - {end}")?;
        }
        Ok(())
    }
}

/// A partial update for [`crate::Timeline::edit`].
///
/// Fields left as `None` are untouched. `end` and `artist` use a nested option so a caller can
/// clear them (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct TrackEdit {
    pub title: Option<String>,
    pub start: Option<Timestamp>,
    pub end: Option<Option<Timestamp>>,
    pub artist: Option<Option<String>>,
}

impl TrackEdit {
    pub(crate) fn apply_to(&self, track: &mut Track) {
        if let Some(title) = &self.title {
            track.title = title.trim().to_string();
        }
        if let Some(start) = self.start {
            track.start = start;
        }
        if let Some(end) = self.end {
            track.end = end;
        }
        if let Some(artist) = &self.artist {
            track.artist = artist.clone();
        }
    }
}

/// Parse one manual entry line: `Title | start | end? | artist?`.
///
/// Timestamps that fail to parse propagate as [`Error::InvalidTimestamp`]; a line without at
/// least a title and a start is a [`Error::Validation`].
pub fn parse_manual_entry(line: &str) -> Result<Track> {
    let parts: Vec<&str> = line.split('|').map(str::trim).collect();
    let (title, start) = match parts.as_slice() {
        [title, start, ..] if !start.is_empty() => (*title, *start),
        _ => {
            return Err(Error::validation(format!(
                "expected 'Title | Start | End (optional)', got '{}'",
                line.trim()
            )));
        }
    };

    let mut track = Track::new(title, Timestamp::parse(start)?);
    if let Some(end) = parts.get(2).filter(|s| !s.is_empty()) {
        track.end = Some(Timestamp::parse(end)?);
    }
    if let Some(artist) = parts.get(3).filter(|s| !s.is_empty()) {
        track.artist = Some(artist.to_string());
    }

    track.validate()?;
    Ok(track)
}
