use std::path::Path;
use std::time::Duration;

use tracksplit::probe::source_duration;

fn write_silence(path: &Path, sample_rate: u32, seconds: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for _ in 0..sample_rate * seconds {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(())
}

#[test]
fn reports_wav_duration() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("source.wav");
    write_silence(&path, 8_000, 3)?;

    let duration = source_duration(&path)?.expect("wav declares its length");
    let drift = duration.abs_diff(Duration::from_secs(3));
    assert!(drift < Duration::from_millis(10), "got {duration:?}");
    Ok(())
}
