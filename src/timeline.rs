//! The ordered, validated sequence of track boundaries for one source.
//!
//! Every mutation goes through the same steps: validate a candidate, commit, stable-sort by
//! start, then recompute inferred ends. A rejected mutation leaves the timeline untouched.

use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;
use crate::track::{Track, TrackEdit, parse_manual_entry};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Track>", into = "Vec<Track>")]
pub struct Timeline {
    tracks: Vec<Track>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a timeline from arbitrary tracks, validating each exactly as [`Timeline::add`] does.
    pub fn from_tracks(tracks: impl IntoIterator<Item = Track>) -> Result<Self> {
        let mut timeline = Self::new();
        for track in tracks {
            timeline.add(track)?;
        }
        Ok(timeline)
    }

    /// Build a timeline from `Title | start | end? | artist?` lines.
    ///
    /// Blank lines and lines starting with `#` are ignored. The first failing line aborts the
    /// build and its 1-based line number is attached to the error.
    pub fn from_manual_entries(text: &str) -> Result<Self> {
        let mut timeline = Self::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line_no = idx + 1;
            parse_manual_entry(line)
                .and_then(|track| timeline.add(track))
                .map_err(|err| match err {
                    Error::InvalidTimestamp(t) => {
                        Error::InvalidTimestamp(format!("{t} (line {line_no})"))
                    }
                    Error::Validation(msg) => Error::Validation(format!("line {line_no}: {msg}")),
                    other => other,
                })?;
        }
        Ok(timeline)
    }

    /// Validate and insert a track; returns its index after re-sorting.
    pub fn add(&mut self, mut track: Track) -> Result<usize> {
        track.title = track.title.trim().to_string();
        track.inferred_end = None;
        track.validate()?;
        self.ensure_unique(&track.title, track.start, None)?;

        let (title, start) = (track.title.clone(), track.start);
        self.tracks.push(track);
        self.normalize();
        self.position_of(&title, start)
            .ok_or_else(|| Error::msg("track vanished after insert"))
    }

    /// Apply `changes` to the track at `index`; returns its index after re-sorting.
    pub fn edit(&mut self, index: usize, changes: TrackEdit) -> Result<usize> {
        let current = self.get(index).ok_or_else(|| out_of_range(index, self.len()))?;

        let mut candidate = current.clone();
        changes.apply_to(&mut candidate);
        candidate.inferred_end = None;
        candidate.validate()?;
        self.ensure_unique(&candidate.title, candidate.start, Some(index))?;

        let (title, start) = (candidate.title.clone(), candidate.start);
        self.tracks[index] = candidate;
        self.normalize();
        self.position_of(&title, start)
            .ok_or_else(|| Error::msg("track vanished after edit"))
    }

    /// Remove the track at `index`.
    ///
    /// Later indices shift down by one; callers holding a selection should re-resolve it with
    /// [`Timeline::position_of`].
    pub fn delete(&mut self, index: usize) -> Result<Track> {
        if index >= self.len() {
            return Err(out_of_range(index, self.len()));
        }
        let mut removed = self.tracks.remove(index);
        removed.inferred_end = None;
        self.infer_ends();
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Track> {
        self.tracks.iter()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Find a track by its identity, the `(title, start)` pair.
    pub fn position_of(&self, title: &str, start: Timestamp) -> Option<usize> {
        self.tracks.iter().position(|t| t.same_identity(title, start))
    }

    /// Indices of tracks that start at or after `source_secs`.
    pub fn starting_after(&self, source_secs: u32) -> Vec<usize> {
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.start.as_secs() >= source_secs)
            .map(|(i, _)| i)
            .collect()
    }

    /// Insert without validation; the extractor has already cleaned and checked its candidates.
    pub(crate) fn push_unchecked(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub(crate) fn contains(&self, title: &str, start: Timestamp) -> bool {
        self.position_of(title, start).is_some()
    }

    pub(crate) fn normalize(&mut self) {
        // `sort_by_key` is stable, so equal starts keep discovery order.
        self.tracks.sort_by_key(|t| t.start);
        self.infer_ends();
    }

    fn infer_ends(&mut self) {
        let next_starts: Vec<Option<Timestamp>> = self
            .tracks
            .iter()
            .skip(1)
            .map(|t| Some(t.start))
            .chain(std::iter::once(None))
            .collect();

        for (track, next_start) in self.tracks.iter_mut().zip(next_starts) {
            track.inferred_end = if track.end.is_some() { None } else { next_start };
        }
    }

    fn ensure_unique(&self, title: &str, start: Timestamp, skip: Option<usize>) -> Result<()> {
        let clash = self
            .tracks
            .iter()
            .enumerate()
            .any(|(i, t)| Some(i) != skip && t.same_identity(title, start));
        if clash {
            return Err(Error::validation(format!(
                "a track titled '{title}' already starts at {start}"
            )));
        }
        Ok(())
    }
}

fn out_of_range(index: usize, len: usize) -> Error {
    Error::validation(format!("track index {index} is out of range (timeline has {len})"))
}

impl TryFrom<Vec<Track>> for Timeline {
    type Error = Error;

    fn try_from(tracks: Vec<Track>) -> Result<Self> {
        Self::from_tracks(tracks)
    }
}

impl From<Timeline> for Vec<Track> {
    fn from(timeline: Timeline) -> Self {
        timeline.tracks
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a Track;
    type IntoIter = std::slice::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: u32) -> Timestamp {
        Timestamp::from_secs(s)
    }

    fn titles(timeline: &Timeline) -> Vec<&str> {
        timeline.iter().map(|t| t.title.as_str()).collect()
    }

    fn sample() -> Timeline {
        Timeline::from_tracks([
            Track::new("Alpha", ts(10)),
            Track::new("Beta", ts(90)),
            Track::new("Intro", ts(0)),
        ])
        .unwrap()
    }

    #[test]
    fn add_sorts_and_infers_ends() {
        let timeline = sample();
        assert_eq!(titles(&timeline), ["Intro", "Alpha", "Beta"]);
        assert_eq!(timeline.get(0).and_then(Track::end), Some(ts(10)));
        assert_eq!(timeline.get(1).and_then(Track::end), Some(ts(90)));
        assert_eq!(timeline.get(2).and_then(Track::end), None);
    }

    #[test]
    fn add_returns_index_after_sorting() -> anyhow::Result<()> {
        let mut timeline = sample();
        let idx = timeline.add(Track::new("Interlude", ts(45)))?;
        assert_eq!(idx, 2);
        assert_eq!(timeline.get(1).and_then(Track::end), Some(ts(45)));
        Ok(())
    }

    #[test]
    fn add_rejects_duplicates_and_leaves_timeline_unchanged() {
        let mut timeline = sample();
        let before = timeline.clone();
        let err = timeline.add(Track::new("Alpha", ts(10))).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(timeline, before);
    }

    #[test]
    fn same_title_at_a_different_start_is_a_distinct_track() -> anyhow::Result<()> {
        let mut timeline = sample();
        timeline.add(Track::new("Alpha", ts(200)))?;
        assert_eq!(timeline.len(), 4);
        Ok(())
    }

    #[test]
    fn explicit_ends_survive_resorting() -> anyhow::Result<()> {
        let mut timeline = Timeline::new();
        timeline.add(Track::new("Long", ts(0)).with_end(ts(50)))?;
        timeline.add(Track::new("Next", ts(60)))?;
        assert_eq!(timeline.get(0).and_then(Track::end), Some(ts(50)));

        timeline.add(Track::new("Between", ts(30)))?;
        assert_eq!(timeline.get(0).and_then(Track::end), Some(ts(50)));
        assert_eq!(timeline.get(1).and_then(Track::end), Some(ts(60)));
        Ok(())
    }

    #[test]
    fn edit_rejects_end_before_start_without_mutating() {
        let mut timeline = sample();
        let before = timeline.clone();

        let err = timeline
            .edit(
                1,
                TrackEdit {
                    end: Some(Some(ts(5))),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("0:05")));
        assert_eq!(timeline, before);
    }

    #[test]
    fn edit_resorts_and_reports_new_index() -> anyhow::Result<()> {
        let mut timeline = sample();
        let idx = timeline.edit(
            0,
            TrackEdit {
                title: Some("Outro".into()),
                start: Some(ts(300)),
                ..Default::default()
            },
        )?;
        assert_eq!(idx, 2);
        assert_eq!(titles(&timeline), ["Alpha", "Beta", "Outro"]);
        assert_eq!(timeline.get(1).and_then(Track::end), Some(ts(300)));
        Ok(())
    }

    #[test]
    fn edit_can_clear_an_explicit_end() -> anyhow::Result<()> {
        let mut timeline = sample();
        timeline.edit(
            0,
            TrackEdit {
                end: Some(Some(ts(5))),
                ..Default::default()
            },
        )?;
        assert!(timeline.get(0).is_some_and(Track::has_explicit_end));

        timeline.edit(
            0,
            TrackEdit {
                end: Some(None),
                ..Default::default()
            },
        )?;
        assert_eq!(timeline.get(0).and_then(Track::end), Some(ts(10)));
        Ok(())
    }

    #[test]
    fn edit_rejects_collision_with_another_track() {
        let mut timeline = sample();
        let err = timeline
            .edit(
                0,
                TrackEdit {
                    title: Some("Alpha".into()),
                    start: Some(ts(10)),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn out_of_range_indices_are_validation_errors() {
        let mut timeline = sample();
        assert!(matches!(
            timeline.edit(9, TrackEdit::default()),
            Err(Error::Validation(_))
        ));
        assert!(matches!(timeline.delete(3), Err(Error::Validation(_))));
    }

    #[test]
    fn delete_reinfers_the_predecessor_end() -> anyhow::Result<()> {
        let mut timeline = sample();
        let removed = timeline.delete(1)?;
        assert_eq!(removed.title, "Alpha");
        assert_eq!(removed.end(), None);
        assert_eq!(timeline.get(0).and_then(Track::end), Some(ts(90)));
        assert_eq!(timeline.position_of("Beta", ts(90)), Some(1));
        Ok(())
    }

    #[test]
    fn manual_entries_report_line_numbers() {
        let text = "# my album\nIntro | 0:00\n\nBroken | 1:zz\n";
        let err = Timeline::from_manual_entries(text).unwrap_err();
        assert!(matches!(err, Error::InvalidTimestamp(ref t) if t.contains("line 4")));

        let dupes = "A | 0:00\nA | 0:00\n";
        let err = Timeline::from_manual_entries(dupes).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn starting_after_flags_tracks_past_the_source_end() {
        let timeline = sample();
        assert_eq!(timeline.starting_after(60), vec![2]);
        assert!(timeline.starting_after(1000).is_empty());
    }

    #[test]
    fn json_round_trip_validates() -> anyhow::Result<()> {
        let timeline = sample();
        let json = serde_json::to_string(&timeline)?;
        assert!(json.contains("\"start\":\"0:10\""));
        let back: Timeline = serde_json::from_str(&json)?;
        assert_eq!(back, timeline);

        let bad = r#"[{"title":"A","start":"1:00","end":"0:30"}]"#;
        assert!(serde_json::from_str::<Timeline>(bad).is_err());
        Ok(())
    }
}
