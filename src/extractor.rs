//! Recover a track timeline from a free-text description.
//!
//! Each line is tried against an ordered list of patterns, most specific first:
//! 1. `TIME - TITLE - TIME` (explicit start and end)
//! 2. `[N.] TITLE [-] TIME [~]`
//! 3. `[N.] TIME [-] TITLE`
//!
//! The first pattern that matches a line decides it. If that pattern's timestamp does not
//! parse, the line is dropped rather than offered to the next pattern; a wrong boundary is
//! worse than a missing one because it silently shifts every following track.
//!
//! The extractor never fails. Malformed input simply yields fewer tracks.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::timeline::Timeline;
use crate::timestamp::Timestamp;
use crate::track::Track;

/// Section-header words. Lines containing one of these are never treated as data rows.
const HEADER_MARKERS: &[&str] = &["tracklist", "track list", "playlist", "setlist"];

/// Clock token. `\d` is Unicode-aware, so non-ASCII digits match here and are then rejected by
/// [`Timestamp::parse`], which takes the line down the "skip" path.
const TIME: &str = r"\d{1,3}:\d{2}(?::\d{2})?";

/// Opening/closing quote pairs stripped from the edges of titles.
const QUOTE_PAIRS: &[(char, char)] = &[
    ('"', '"'),
    ('\'', '\''),
    ('“', '”'),
    ('‘', '’'),
    ('「', '」'),
    ('『', '』'),
    ('«', '»'),
];

struct Patterns {
    three_part: Regex,
    title_then_time: Regex,
    time_then_title: Regex,
    annotation: Regex,
    leading_time: Regex,
    trailing_time: Regex,
    leading_noise: Regex,
}

impl Patterns {
    fn new() -> Self {
        let compile = |pattern: &str| Regex::new(pattern).expect("static extractor pattern");

        Self {
            three_part: compile(&format!(
                r"^\s*[\[(]?(?P<start>{TIME})[\])]?\s*[-–—~〜～]+\s*(?P<title>.+?)\s*[-–—~〜～]+\s*[\[(]?(?P<end>{TIME})[\])]?\s*$"
            )),
            title_then_time: compile(&format!(
                r"^\s*(?:\d+[.)]\s*)?(?P<title>.+?)\s*[-–—~〜～|:]*\s*[\[(]?(?P<time>{TIME})[\])]?\s*[~〜～]?\s*$"
            )),
            time_then_title: compile(&format!(
                r"^\s*(?:\d+[.)]\s+)?[\[(]?(?P<time>{TIME})[\])]?\s*[-–—~〜～|:.]?\s*(?P<title>.+?)\s*$"
            )),
            annotation: compile(r"[(\[（【［][^)\]）】］]*[)\]）】］]"),
            leading_time: compile(&format!(r"^\s*(?:\d+[.)]\s*)?[\[(]?{TIME}")),
            trailing_time: compile(&format!(
                r"\s*[-–—~〜～|]*\s*[\[(]?{TIME}[\])]?\s*[~〜～]?\s*$"
            )),
            leading_noise: compile(r"^[\s\d\-–—_.．、·・:#)\]）】］(\[（【［]+"),
        }
    }
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(Patterns::new)
}

/// One accepted row before deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    title: String,
    start: Timestamp,
    end: Option<Timestamp>,
}

/// Why a line produced no candidate. Only used for debug logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Blank,
    Header,
    NoMatch,
    BadTimestamp,
    EndNotAfterStart,
    EmptyTitle,
}

/// Extract from an optional description.
///
/// `None` means no extraction was attempted (there was no description); `Some(empty)` means
/// the description was read and contained no usable tracklist.
pub fn extract_from_description(description: Option<&str>) -> Option<Timeline> {
    description.map(extract_timeline)
}

/// Extract an ordered, deduplicated timeline with inferred ends from `text`.
pub fn extract_timeline(text: &str) -> Timeline {
    let mut timeline = Timeline::new();

    for (idx, line) in text.lines().enumerate() {
        match parse_line(line) {
            Ok(candidate) => {
                if timeline.contains(&candidate.title, candidate.start) {
                    debug!(line = idx + 1, title = %candidate.title, "duplicate track dropped");
                    continue;
                }
                let mut track = Track::new(candidate.title, candidate.start);
                track.end = candidate.end;
                timeline.push_unchecked(track);
            }
            Err(Skip::Blank) => {}
            Err(reason) => debug!(line = idx + 1, ?reason, text = line, "line skipped"),
        }
    }

    timeline.normalize();
    timeline
}

fn parse_line(line: &str) -> Result<Candidate, Skip> {
    let line = line.trim();
    if line.is_empty() {
        return Err(Skip::Blank);
    }

    let lowered = line.to_lowercase();
    if HEADER_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Err(Skip::Header);
    }

    let p = patterns();

    let (raw_title, start, end) = if let Some(caps) = p.three_part.captures(line) {
        let start = parse_group(&caps, "start")?;
        let end = parse_group(&caps, "end")?;
        if end <= start {
            return Err(Skip::EndNotAfterStart);
        }
        (group(&caps, "title"), start, Some(end))
    } else if let Some(caps) = p
        .title_then_time
        .captures(line)
        .filter(|_| !p.leading_time.is_match(line))
    {
        (group(&caps, "title"), parse_group(&caps, "time")?, None)
    } else if let Some(caps) = p.time_then_title.captures(line) {
        // A second clock value after the title is a duration or an unlabeled end; only the
        // leading one is trusted as the start.
        let title = group(&caps, "title");
        let title = p.trailing_time.replace(title, "");
        return finish(&title, parse_group(&caps, "time")?, None);
    } else {
        return Err(Skip::NoMatch);
    };

    finish(raw_title, start, end)
}

fn finish(raw_title: &str, start: Timestamp, end: Option<Timestamp>) -> Result<Candidate, Skip> {
    let title = clean_title(raw_title).ok_or(Skip::EmptyTitle)?;
    Ok(Candidate { title, start, end })
}

fn group<'t>(caps: &Captures<'t>, name: &str) -> &'t str {
    caps.name(name).map(|m| m.as_str()).unwrap_or_default()
}

fn parse_group(caps: &Captures<'_>, name: &str) -> Result<Timestamp, Skip> {
    Timestamp::parse(group(caps, name)).map_err(|_| Skip::BadTimestamp)
}

/// Normalize a raw title, or `None` when nothing usable remains.
///
/// Steps: drop `(...)`/`[...]` annotations, strip leading track-number and punctuation noise,
/// strip trailing separators, unbalanced closing quotes and a quote pair enclosing the whole
/// title, collapse whitespace. Titles that end up empty or purely numeric are rejected.
pub fn clean_title(raw: &str) -> Option<String> {
    let p = patterns();

    let without_annotations = p.annotation.replace_all(raw, " ");
    let collapsed = without_annotations.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut title = p.leading_noise.replace(&collapsed, "").into_owned();

    loop {
        let before = title.len();
        title = trim_trailing_separators(&title).to_string();
        title = strip_unbalanced_closing_quote(&title).to_string();
        title = strip_enclosing_quotes(&title).trim().to_string();
        if title.len() == before {
            break;
        }
    }

    if title.is_empty() || title.chars().all(char::is_numeric) {
        return None;
    }
    Some(title)
}

fn trim_trailing_separators(s: &str) -> &str {
    s.trim_end_matches(|c: char| {
        c.is_whitespace()
            || matches!(
                c,
                '~' | '〜' | '～' | '-' | '–' | '—' | '|' | ':' | '(' | '[' | '（' | '【'
            )
    })
}

/// `"Title"` becomes `Title`, but only when the outer pair encloses the whole title.
fn strip_enclosing_quotes(s: &str) -> &str {
    let mut chars = s.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return s;
    };

    let inner = &s[first.len_utf8()..s.len() - last.len_utf8()];
    let encloses = QUOTE_PAIRS.iter().any(|&(open, close)| {
        first == open && last == close && !inner.contains(open) && !inner.contains(close)
    });

    if encloses { inner } else { s }
}

fn strip_unbalanced_closing_quote(s: &str) -> &str {
    let Some(last) = s.chars().last() else {
        return s;
    };

    let unbalanced = QUOTE_PAIRS.iter().any(|&(open, close)| {
        if last != close {
            return false;
        }
        if open == close {
            s.chars().filter(|c| *c == close).count() % 2 == 1
        } else {
            !s.contains(open)
        }
    });

    if unbalanced {
        &s[..s.len() - last.len_utf8()]
    } else {
        s
    }
}
