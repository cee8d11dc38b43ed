//! Metadata embedding for finished segments.
//!
//! Tagging is best-effort: the audio file is the valuable artifact, so a failure here is logged
//! and never turns a successful track into a failed one.

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, anyhow};
use lofty::config::WriteOptions;
use lofty::picture::{Picture, PictureType};
use lofty::prelude::*;
use lofty::tag::Tag;
use tracing::{debug, warn};

use crate::{Error, Result};

/// The text fields written to every segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFields {
    pub title: String,
    pub album: String,
    pub artist: String,
}

/// Writes tag fields and optional cover art into an existing audio file.
pub trait TagSink {
    fn apply(&self, path: &Path, fields: &TagFields, cover: Option<&[u8]>) -> Result<()>;
}

impl<T: TagSink + ?Sized> TagSink for &T {
    fn apply(&self, path: &Path, fields: &TagFields, cover: Option<&[u8]>) -> Result<()> {
        (**self).apply(path, fields, cover)
    }
}

/// [`TagSink`] backed by `lofty` (ID3v2 for MP3, the native tag format elsewhere).
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagger;

impl LoftyTagger {
    fn write(path: &Path, fields: &TagFields, cover: Option<&[u8]>) -> anyhow::Result<()> {
        let mut tagged = lofty::read_from_path(path)
            .with_context(|| format!("failed to read '{}'", path.display()))?;

        if tagged.primary_tag_mut().is_none() {
            let tag_type = tagged.primary_tag_type();
            tagged.insert_tag(Tag::new(tag_type));
        }
        let tag = tagged
            .primary_tag_mut()
            .ok_or_else(|| anyhow!("file format does not support tags"))?;

        tag.set_title(fields.title.clone());
        tag.set_album(fields.album.clone());
        tag.set_artist(fields.artist.clone());

        if let Some(bytes) = cover {
            let mut picture = Picture::from_reader(&mut Cursor::new(bytes))
                .context("cover bytes are not a supported image")?;
            picture.set_pic_type(PictureType::CoverFront);
            tag.remove_picture_type(PictureType::CoverFront);
            tag.push_picture(picture);
        }

        tag.save_to_path(path, WriteOptions::default())
            .with_context(|| format!("failed to save tags to '{}'", path.display()))?;
        Ok(())
    }
}

impl TagSink for LoftyTagger {
    fn apply(&self, path: &Path, fields: &TagFields, cover: Option<&[u8]>) -> Result<()> {
        Self::write(path, fields, cover).map_err(|e| Error::Tagging(format!("{e:#}")))
    }
}

/// Run `sink` and swallow any failure after logging it.
///
/// Returns whether tagging succeeded, for callers that want to count it.
pub fn tag_best_effort<S: TagSink + ?Sized>(
    sink: &S,
    path: &Path,
    fields: &TagFields,
    cover: Option<&[u8]>,
) -> bool {
    match sink.apply(path, fields, cover) {
        Ok(()) => {
            debug!(path = %path.display(), title = %fields.title, "tags written");
            true
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "tagging failed; keeping untagged audio");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> TagFields {
        TagFields {
            title: "Intro".into(),
            album: "Album".into(),
            artist: "Artist".into(),
        }
    }

    #[test]
    fn lofty_rejects_files_that_are_not_audio() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("01. Intro.txt");
        std::fs::write(&path, b"definitely not an mpeg stream")?;

        let err = LoftyTagger.apply(&path, &fields(), None).unwrap_err();
        assert!(matches!(err, Error::Tagging(_)));
        // The file itself is left alone.
        assert_eq!(std::fs::read(&path)?, b"definitely not an mpeg stream");
        Ok(())
    }

    #[test]
    fn best_effort_swallows_errors() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("missing.mp3");
        assert!(!tag_best_effort(&LoftyTagger, &missing, &fields(), None));
        Ok(())
    }
}
