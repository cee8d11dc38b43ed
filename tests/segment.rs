mod common;

use std::fs;
use std::path::Path;

use common::{FakeTranscoder, RecordingTagger, file_names};
use tracksplit::{
    CancelToken, Error, NoProgress, ProgressEvent, SegmentOpts, Segmenter, Timeline, Timestamp,
    Track, TrackStatus,
};

fn three_tracks() -> anyhow::Result<Timeline> {
    Ok(Timeline::from_tracks([
        Track::new("Intro", Timestamp::from_secs(0)),
        Track::new("A/B", Timestamp::from_secs(90)),
        Track::new("Outro", Timestamp::from_secs(200)),
    ])?)
}

fn opts(dir: &Path) -> SegmentOpts {
    SegmentOpts {
        output_dir: dir.to_path_buf(),
        album: "Live".into(),
        default_artist: "Band".into(),
        ..SegmentOpts::default()
    }
}

#[test]
fn produces_numbered_sanitized_files() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out");
    let transcoder = FakeTranscoder::default();
    let tagger = RecordingTagger::default();
    let segmenter = Segmenter::new(&transcoder, &tagger, opts(&out));

    let report = segmenter.run(
        &three_tracks()?,
        Path::new("source.webm"),
        Some(&b"jpeg"[..]),
        &mut NoProgress,
        &CancelToken::new(),
    )?;

    assert!(report.is_complete());
    assert_eq!(
        file_names(&out)?,
        ["01. Intro.mp3", "02. AB.mp3", "03. Outro.mp3"]
    );

    // Bounded tracks get a duration, the last one runs to the end.
    let calls = transcoder.calls.borrow();
    let spans: Vec<_> = calls.iter().map(|(s, d, _)| (*s, *d)).collect();
    assert_eq!(spans, [(0, Some(90)), (90, Some(110)), (200, None)]);

    let applied = tagger.applied.borrow();
    assert_eq!(applied.len(), 3);
    assert_eq!(applied[1].1.title, "A/B");
    assert_eq!(applied[1].1.album, "Live");
    assert_eq!(applied[1].1.artist, "Band");
    assert!(applied.iter().all(|(_, _, cover)| *cover));
    Ok(())
}

#[test]
fn a_failing_track_does_not_stop_the_batch() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let transcoder = FakeTranscoder::failing_at(&[90]);
    let tagger = RecordingTagger::default();
    let segmenter = Segmenter::new(&transcoder, &tagger, opts(dir.path()));

    let mut events = Vec::new();
    let report = segmenter.run(
        &three_tracks()?,
        Path::new("source.webm"),
        None,
        &mut |e: &ProgressEvent| events.push(e.clone()),
        &CancelToken::new(),
    )?;

    assert_eq!(report.succeeded().count(), 2);
    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].index, 1);
    assert!(matches!(failed[0].error(), Some(Error::Transcode { .. })));

    // The partial file was removed.
    assert_eq!(file_names(dir.path())?, ["01. Intro.mp3", "03. Outro.mp3"]);

    assert!(events.iter().any(|e| matches!(e, ProgressEvent::TrackFailed { index: 1, .. })));
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::BatchFinished {
            succeeded: 2,
            failed: 1,
            skipped: 0
        })
    );
    Ok(())
}

#[test]
fn rerunning_overwrites_instead_of_duplicating() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let transcoder = FakeTranscoder::default();
    let tagger = RecordingTagger::default();
    let segmenter = Segmenter::new(&transcoder, &tagger, opts(dir.path()));
    let timeline = three_tracks()?;

    for _ in 0..2 {
        segmenter.run(
            &timeline,
            Path::new("source.webm"),
            None,
            &mut NoProgress,
            &CancelToken::new(),
        )?;
    }
    assert_eq!(file_names(dir.path())?.len(), 3);
    Ok(())
}

#[test]
fn existing_output_is_left_alone_without_overwrite() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let existing = dir.path().join("01. Intro.mp3");
    fs::write(&existing, "earlier")?;

    let transcoder = FakeTranscoder::failing_at(&[0]);
    let tagger = RecordingTagger::default();
    let segmenter = Segmenter::new(
        &transcoder,
        &tagger,
        SegmentOpts {
            overwrite: false,
            ..opts(dir.path())
        },
    );

    let report = segmenter.run(
        &three_tracks()?,
        Path::new("source.webm"),
        None,
        &mut NoProgress,
        &CancelToken::new(),
    )?;

    assert_eq!(fs::read_to_string(&existing)?, "earlier");
    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].index, 0);
    assert!(matches!(failed[0].error(), Some(Error::Transcode { .. })));

    // The transcoder was never asked to write over the existing file.
    let seeks: Vec<_> = transcoder.calls.borrow().iter().map(|(s, _, _)| *s).collect();
    assert_eq!(seeks, [90, 200]);
    assert_eq!(
        file_names(dir.path())?,
        ["01. Intro.mp3", "02. AB.mp3", "03. Outro.mp3"]
    );
    Ok(())
}

#[test]
fn cancellation_is_observed_between_tracks() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let transcoder = FakeTranscoder::default();
    let tagger = RecordingTagger::default();
    let segmenter = Segmenter::new(&transcoder, &tagger, opts(dir.path()));
    let cancel = CancelToken::new();

    let mut sink = |e: &ProgressEvent| {
        if matches!(e, ProgressEvent::TrackCompleted { index: 0, .. }) {
            cancel.cancel();
        }
    };
    let report = segmenter.run(
        &three_tracks()?,
        Path::new("source.webm"),
        None,
        &mut sink,
        &cancel,
    )?;

    assert!(report.cancelled);
    assert!(!report.is_complete());
    assert_eq!(report.succeeded().count(), 1);
    assert_eq!(report.skipped().count(), 2);
    assert_eq!(transcoder.calls.borrow().len(), 1);
    assert_eq!(file_names(dir.path())?, ["01. Intro.mp3"]);
    Ok(())
}

#[test]
fn tagging_failure_keeps_the_track() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let transcoder = FakeTranscoder::default();
    let tagger = RecordingTagger {
        fail: true,
        ..RecordingTagger::default()
    };
    let segmenter = Segmenter::new(&transcoder, &tagger, opts(dir.path()));

    let report = segmenter.run(
        &three_tracks()?,
        Path::new("source.webm"),
        None,
        &mut NoProgress,
        &CancelToken::new(),
    )?;

    assert!(report.is_complete());
    for outcome in &report.outcomes {
        assert!(matches!(
            outcome.status,
            TrackStatus::Succeeded { tagged: false, .. }
        ));
        let path = outcome.path().map(Path::to_path_buf).unwrap_or_default();
        assert!(fs::read_to_string(path)?.starts_with("seek="));
    }
    Ok(())
}

#[test]
fn tied_starts_fail_only_the_empty_track() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let transcoder = FakeTranscoder::default();
    let tagger = RecordingTagger::default();
    let segmenter = Segmenter::new(&transcoder, &tagger, opts(dir.path()));

    let timeline = Timeline::from_tracks([
        Track::new("First", Timestamp::from_secs(60)),
        Track::new("Second", Timestamp::from_secs(60)),
        Track::new("Third", Timestamp::from_secs(120)),
    ])?;
    let report = segmenter.run(
        &timeline,
        Path::new("source.webm"),
        None,
        &mut NoProgress,
        &CancelToken::new(),
    )?;

    let failed: Vec<_> = report.failed().map(|o| o.title.as_str()).collect();
    assert_eq!(failed, ["First"]);
    assert!(matches!(
        report.outcomes[0].error(),
        Some(Error::Validation(_))
    ));
    assert_eq!(report.succeeded().count(), 2);
    Ok(())
}

#[test]
fn missing_output_after_success_is_a_failure() -> anyhow::Result<()> {
    struct SilentTranscoder;
    impl tracksplit::Transcoder for SilentTranscoder {
        fn transcode(&self, _: &tracksplit::TranscodeRequest<'_>) -> tracksplit::Result<()> {
            Ok(())
        }
    }

    let dir = tempfile::tempdir()?;
    let tagger = RecordingTagger::default();
    let segmenter = Segmenter::new(SilentTranscoder, &tagger, opts(dir.path()));
    let report = segmenter.run(
        &three_tracks()?,
        Path::new("source.webm"),
        None,
        &mut NoProgress,
        &CancelToken::new(),
    )?;
    assert_eq!(report.failed().count(), 3);
    assert!(tagger.applied.borrow().is_empty());
    Ok(())
}
