// Split a full-album recording into numbered, tagged per-track files.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use tracksplit::config::{Settings, resolve_config_path};
use tracksplit::cover::crop_to_jpeg;
use tracksplit::logging;
use tracksplit::{
    CancelToken, FfmpegTranscoder, LoftyTagger, ProgressEvent, SegmentOpts, Segmenter, Session,
    SessionOpts, Timeline, Timestamp, TrackStatus, YtDlpAcquirer,
};

#[derive(Parser, Debug)]
#[command(name = "tracksplit")]
#[command(about = "Split a full-album recording into per-track audio files", long_about = None)]
struct Params {
    /// Video URL to download (its description supplies the tracklist).
    #[arg(short = 'u', long, conflicts_with = "audio", required_unless_present = "audio")]
    url: Option<String>,

    /// Local audio file to split instead of downloading.
    #[arg(short = 'a', long)]
    audio: Option<PathBuf>,

    /// Text file with a description to extract timestamps from (with --audio).
    #[arg(long, requires = "audio", conflicts_with = "url")]
    description_file: Option<PathBuf>,

    /// Manual tracklist, one `Title | start | end? | artist?` per line ("-" reads stdin).
    /// Replaces whatever was extracted.
    #[arg(short = 't', long)]
    tracks_file: Option<PathBuf>,

    /// Directory for the produced files (overrides the config file).
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Artist for tracks that don't name their own.
    #[arg(long)]
    artist: Option<String>,

    /// Album tag written to every track.
    #[arg(long)]
    album: Option<String>,

    /// Image file to embed as cover art (center-cropped to a square).
    #[arg(long, conflicts_with = "no_cover")]
    cover: Option<PathBuf>,

    /// Don't embed any cover art.
    #[arg(long, default_value_t = false)]
    no_cover: bool,

    /// Print the tracklist and exit without splitting.
    #[arg(long, default_value_t = false)]
    list_only: bool,

    /// Print the tracklist as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Config file (defaults to TRACKSPLIT_CONFIG_PATH or the XDG location).
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace). TRACKSPLIT_LOG wins.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Serialize)]
struct TrackRow<'a> {
    number: usize,
    title: &'a str,
    start: Timestamp,
    end: Option<Timestamp>,
    artist: Option<&'a str>,
}

fn main() -> Result<ExitCode> {
    let params = Params::parse();
    logging::init_with(logging::level_for_verbosity(params.verbose));

    let settings = load_settings(&params)?;
    let mut session_opts = SessionOpts::from(&settings);
    session_opts.fetch_cover &= !params.no_cover;
    let mut session = Session::new(session_opts)?;

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    let mut progress = progress_printer(bar.clone());

    if let Some(url) = &params.url {
        let acquirer = YtDlpAcquirer::new(&settings.tools.yt_dlp, &settings.output.extension);
        session.load_remote(&acquirer, url, &mut progress)?;
    } else if let Some(audio) = &params.audio {
        let description = params
            .description_file
            .as_ref()
            .map(|p| {
                fs::read_to_string(p).with_context(|| format!("failed to read {}", p.display()))
            })
            .transpose()?;
        session.load_local(audio, description.as_deref(), &mut progress)?;
    }

    if let Some(path) = &params.tracks_file {
        let text = read_text(path)?;
        session.set_timeline(Timeline::from_manual_entries(&text)?);
    }

    if params.no_cover {
        session.clear_cover();
    } else if let Some(path) = &params.cover {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        session.set_cover(crop_to_jpeg(&bytes, None)?);
    }

    let Some(timeline) = session.timeline().filter(|t| !t.is_empty()) else {
        bar.finish_and_clear();
        bail!("no tracks found; supply a tracklist with --tracks-file");
    };
    bar.suspend(|| print_timeline(timeline, params.json))?;

    if params.list_only {
        bar.finish_and_clear();
        return Ok(ExitCode::SUCCESS);
    }

    let ffmpeg = FfmpegTranscoder::new(&settings.tools.ffmpeg);
    ffmpeg.check_available()?;

    let mut opts = SegmentOpts::from(&settings);
    opts.embed_cover &= !params.no_cover;
    let segmenter = Segmenter::new(ffmpeg, LoftyTagger, opts);

    let report = session.segment(&segmenter, &mut progress, &CancelToken::new())?;
    bar.finish_and_clear();

    for outcome in &report.outcomes {
        match &outcome.status {
            TrackStatus::Succeeded { path, tagged } => {
                let note = if *tagged { "" } else { " (untagged)" };
                eprintln!("✅ {}{note}", path.display());
            }
            TrackStatus::Failed(err) => eprintln!("❌ {}: {err}", outcome.title),
            TrackStatus::Skipped => eprintln!("⏭  {}", outcome.title),
        }
    }

    if report.failed().count() > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn load_settings(params: &Params) -> Result<Settings> {
    let path = params.config.clone().or_else(resolve_config_path);
    let mut settings = Settings::load_from(path.as_deref()).context("failed to load settings")?;

    if let Some(dir) = &params.output_dir {
        settings.output.dir = dir.clone();
    }
    if let Some(artist) = &params.artist {
        settings.tags.default_artist = artist.clone();
    }
    if let Some(album) = &params.album {
        settings.tags.album = album.clone();
    }
    Ok(settings)
}

fn read_text(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read tracklist from stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn progress_printer(bar: ProgressBar) -> impl FnMut(&ProgressEvent) {
    move |event| match event {
        ProgressEvent::DownloadProgress { percent } => {
            bar.set_length(100);
            bar.set_position(percent.round() as u64);
            bar.set_message("downloading");
        }
        ProgressEvent::TrackStarted { index, total, title } => {
            bar.set_length(*total as u64);
            bar.set_position(*index as u64);
            bar.set_message(title.clone());
        }
        ProgressEvent::TrackCompleted { index, .. } => bar.set_position(*index as u64 + 1),
        ProgressEvent::TrackFailed { .. } | ProgressEvent::Cancelled { .. } => {
            bar.println(event.to_string());
        }
        other => bar.set_message(other.to_string()),
    }
}

fn timeline_rows(timeline: &Timeline) -> Vec<TrackRow<'_>> {
    timeline
        .iter()
        .enumerate()
        .map(|(i, t)| TrackRow {
            number: i + 1,
            title: &t.title,
            start: t.start,
            end: t.end(),
            artist: t.artist.as_deref(),
        })
        .collect()
}

fn print_timeline(timeline: &Timeline, json: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if json {
        serde_json::to_writer_pretty(&mut out, &timeline_rows(timeline))?;
        writeln!(out)?;
        return Ok(());
    }

    for row in timeline_rows(timeline) {
        let end = row.end.map_or_else(|| "end".to_string(), |e| e.to_string());
        write!(out, "{:02}. {} - {}  {}", row.number, row.start, end, row.title)?;
        if let Some(artist) = row.artist {
            write!(out, " ({artist})")?;
        }
        writeln!(out)?;
    }
    Ok(())
}
