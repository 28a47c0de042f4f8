//! Parses filenames reported inside a provider's container (the response
//! to `select_files`/`get_torrent_info`) into season/episode/title info so
//! the Cached-Source Selector can decide whether a container actually
//! satisfies an item's wanted-files predicate. Grounded on the teacher's
//! `FilenameParser`/`TvParser` regex-based approach rather than a fragile
//! split-on-separators one.

use once_cell::sync::Lazy;
use regex::Regex;

static SEASON_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)s(\d{1,3})[\s._-]*e(\d{1,4})").unwrap());

static EPISODE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)s(\d{1,3})[\s._-]*e(\d{1,4})[\s._-]*e(\d{1,4})").unwrap());

static LOOSE_EPISODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})x(\d{1,4})\b").unwrap());

static SEASON_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bseason[\s._-]*(\d{1,3})\b").unwrap());

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

const NOISE_TOKENS: &[&str] = &[
    "1080p", "720p", "2160p", "4k", "bluray", "webrip", "webdl", "web-dl", "hdtv", "dvdrip",
    "x264", "x265", "hevc", "10bit", "aac", "dts", "flac", "proper", "repack",
];

/// What could be extracted from one container filename.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedFilename {
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Set when the filename names an inclusive episode range
    /// (`S01E01E02`), e.g. a combined two-part file.
    pub episode_end: Option<u32>,
    pub title: Option<String>,
    pub year: Option<i32>,
}

impl ParsedFilename {
    /// Whether this parse covers `episode` within a season-matching range
    /// (handles both the single-episode and the `E01E02` combined case).
    pub fn covers_episode(&self, season: u32, episode: u32) -> bool {
        if self.season != Some(season) {
            return false;
        }
        match (self.episode, self.episode_end) {
            (Some(start), Some(end)) => episode >= start && episode <= end,
            (Some(start), None) => episode == start,
            _ => false,
        }
    }
}

/// Parses a container-reported filename (no directory context available,
/// unlike the teacher's filesystem-backed parser).
pub fn parse_filename(filename: &str) -> ParsedFilename {
    let stem = strip_extension(filename);

    if let Some(caps) = EPISODE_RANGE.captures(&stem) {
        return ParsedFilename {
            season: caps.get(1).and_then(|m| m.as_str().parse().ok()),
            episode: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            episode_end: caps.get(3).and_then(|m| m.as_str().parse().ok()),
            title: extract_title(&stem),
            year: extract_year(&stem),
        };
    }

    if let Some(caps) = SEASON_EPISODE.captures(&stem) {
        return ParsedFilename {
            season: caps.get(1).and_then(|m| m.as_str().parse().ok()),
            episode: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            episode_end: None,
            title: extract_title(&stem),
            year: extract_year(&stem),
        };
    }

    if let Some(caps) = LOOSE_EPISODE.captures(&stem) {
        return ParsedFilename {
            season: caps.get(1).and_then(|m| m.as_str().parse().ok()),
            episode: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            episode_end: None,
            title: extract_title(&stem),
            year: extract_year(&stem),
        };
    }

    if let Some(caps) = SEASON_ONLY.captures(&stem) {
        return ParsedFilename {
            season: caps.get(1).and_then(|m| m.as_str().parse().ok()),
            episode: None,
            episode_end: None,
            title: extract_title(&stem),
            year: extract_year(&stem),
        };
    }

    ParsedFilename {
        title: extract_title(&stem),
        year: extract_year(&stem),
        ..Default::default()
    }
}

fn strip_extension(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            stem.to_string()
        }
        _ => filename.to_string(),
    }
}

fn extract_year(stem: &str) -> Option<i32> {
    YEAR.find(stem).and_then(|m| m.as_str().parse().ok())
}

fn extract_title(stem: &str) -> Option<String> {
    let mut cleaned = stem.replace(['.', '_'], " ");

    if let Some(m) = SEASON_EPISODE.find(&cleaned) {
        cleaned.truncate(m.start());
    } else if let Some(m) = LOOSE_EPISODE.find(&cleaned) {
        cleaned.truncate(m.start());
    } else if let Some(m) = YEAR.find(&cleaned) {
        cleaned.truncate(m.start());
    }

    for token in NOISE_TOKENS {
        let pattern = Regex::new(&format!(r"(?i)\b{token}\b")).unwrap();
        cleaned = pattern.replace_all(&cleaned, "").to_string();
    }

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_season_episode_marker() {
        let parsed = parse_filename("The.Wire.S01E03.1080p.BluRay.x264-GROUP.mkv");
        assert_eq!(parsed.season, Some(1));
        assert_eq!(parsed.episode, Some(3));
        assert_eq!(parsed.title.as_deref(), Some("The Wire"));
    }

    #[test]
    fn parses_loose_1x03_style_marker() {
        let parsed = parse_filename("show.name.1x03.mkv");
        assert_eq!(parsed.season, Some(1));
        assert_eq!(parsed.episode, Some(3));
    }

    #[test]
    fn parses_combined_episode_range() {
        let parsed = parse_filename("Show.S02E01E02.WEBRip.mkv");
        assert_eq!(parsed.season, Some(2));
        assert!(parsed.covers_episode(2, 1));
        assert!(parsed.covers_episode(2, 2));
        assert!(!parsed.covers_episode(2, 3));
    }

    #[test]
    fn movie_filename_extracts_title_and_year() {
        let parsed = parse_filename("The.Matrix.1999.2160p.mkv");
        assert_eq!(parsed.year, Some(1999));
        assert_eq!(parsed.season, None);
        assert_eq!(parsed.title.as_deref(), Some("The Matrix"));
    }
}
