// src/probe.rs

//! Container probing for acquired sources.
//!
//! Only the header is read: the goal is the source duration, so the pipeline can warn about
//! tracks that start past the end of the audio before spending a transcode on them.
//!
//! Probing is advisory. Callers treat `Ok(None)` and errors alike as "duration unknown".

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, anyhow};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::{FormatOptions, Track};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::Result;

/// Probe the container at `path` and pick its default audio track.
///
/// Track selection: the first track with a real codec and a known sample rate.
pub fn probe_default_track(path: &Path) -> Result<Track> {
    let file = File::open(path).with_context(|| format!("failed to open '{}'", path.display()))?;

    let mss_opts = MediaSourceStreamOptions {
        // Symphonia wants a power-of-two buffer > 32KiB for reliable probing.
        buffer_len: 256 * 1024,
    };
    let mss = MediaSourceStream::new(Box::new(file), mss_opts);

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("failed to probe '{}'", path.display()))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .cloned()
        .ok_or_else(|| anyhow!("no audio track found in '{}'", path.display()))?;

    Ok(track)
}

/// Length of the default audio track, when the container declares it.
pub fn source_duration(path: &Path) -> Result<Option<Duration>> {
    let track = probe_default_track(path)?;
    Ok(track_duration(&track))
}

fn track_duration(track: &Track) -> Option<Duration> {
    let params = &track.codec_params;
    let frames = params.n_frames?;

    if let (Some(time_base), Some(_)) = (params.time_base, params.sample_rate) {
        let time = time_base.calc_time(frames);
        return Some(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac));
    }

    let rate = params.sample_rate.filter(|r| *r > 0)?;
    Some(Duration::from_secs_f64(frames as f64 / f64::from(rate)))
}
