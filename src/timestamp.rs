//! Whole-second clock values and their textual form.
//!
//! Parsing is lenient about padding (`1:5`, `01:05` and `0:01:05` are all accepted), while
//! formatting always emits the canonical `M:SS` / `H:MM:SS` form. Round-trips are therefore
//! only exact within the canonical convention.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// A non-negative number of whole seconds into the source audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u32);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    pub const fn as_secs(self) -> u32 {
        self.0
    }

    /// Parse `M:SS`, `MM:SS` or `H:MM:SS` into seconds.
    ///
    /// Fields are not normalized: `0:75` is 75 seconds. Any field count other than 2 or 3, any
    /// field that is not a base-10 integer, and any value that overflows fails with
    /// [`Error::InvalidTimestamp`].
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidTimestamp(text.to_string());

        let fields = text
            .trim()
            .split(':')
            .map(|f| f.parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<u32>>>()?;

        let secs = match fields.as_slice() {
            [m, s] => m.checked_mul(60).and_then(|v| v.checked_add(*s)),
            [h, m, s] => h
                .checked_mul(3600)
                .and_then(|v| v.checked_add(m.checked_mul(60)?))
                .and_then(|v| v.checked_add(*s)),
            _ => None,
        };

        secs.map(Self).ok_or_else(invalid)
    }

    /// Seconds from `earlier` to `self`, or `None` when `self` is not strictly later.
    pub fn seconds_after(self, earlier: Timestamp) -> Option<u32> {
        self.0.checked_sub(earlier.0).filter(|d| *d > 0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0 / 3600;
        let minutes = (self.0 % 3600) / 60;
        let secs = self.0 % 60;

        if hours > 0 {
            write!(f, "{hours}:{minutes:02}:{secs:02}")
        } else {
            write!(f, "{minutes}:{secs:02}")
        }
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
