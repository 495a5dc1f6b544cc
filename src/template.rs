//! Path templates for library destinations
//!
//! A template is a relative path with `{PLACEHOLDER}` tokens, for example
//! `Shows/{TITLE}/Season {SEASON_PAD}/{TITLE} - {SEASON_EPISODE}.{EXT}`.
//!
//! | Placeholder | Value |
//! |---|---|
//! | `TITLE`, `ORIGINAL_TITLE` | sanitized titles |
//! | `YEAR` | release year or `Unknown` |
//! | `LANGUAGE_NAME` | language name, else code, else `Unknown` |
//! | `LANGUAGE_CODE` | ISO 639-1 code or `unknown` |
//! | `ORIGIN_COUNTRY` | first origin country or `Unknown` |
//! | `SEASON`, `EPISODE` | numbers, default 1 |
//! | `SEASON_PAD`, `EPISODE_PAD` | zero-padded to two digits |
//! | `SEASON_EPISODE` | `S01E02` |
//! | `EPISODE_NAME` | sanitized episode title or empty |
//! | `EXT` | file extension, default `mkv` |
//!
//! Unknown placeholders are replaced by their bare name.

use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::types::{MediaType, ResolvedMedia};

#[allow(clippy::unwrap_used)] // literal pattern
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(\w+)\}").unwrap());

/// Characters that are invalid in file names on at least one common platform
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Substitute every placeholder in `template` with values from `media`
pub fn resolve_path(template: &str, media: &ResolvedMedia) -> String {
    let season = media.season.unwrap_or(1);
    let episode = media.episode.unwrap_or(1);

    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            match key {
                "TITLE" => sanitize(&media.title),
                "ORIGINAL_TITLE" => sanitize(&media.original_title),
                "YEAR" => media
                    .year
                    .map(|y| y.to_string())
                    .unwrap_or_else(|| "Unknown".to_string()),
                "LANGUAGE_NAME" => media
                    .language_name
                    .clone()
                    .or_else(|| media.language_code.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                "LANGUAGE_CODE" => media
                    .language_code
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                "ORIGIN_COUNTRY" => media
                    .origin_country
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
                "SEASON" => season.to_string(),
                "SEASON_PAD" => format!("{season:02}"),
                "EPISODE" => episode.to_string(),
                "EPISODE_PAD" => format!("{episode:02}"),
                "SEASON_EPISODE" => format!("S{season:02}E{episode:02}"),
                "EPISODE_NAME" => sanitize(media.episode_name.as_deref().unwrap_or("")),
                "EXT" => {
                    if media.extension.is_empty() {
                        "mkv".to_string()
                    } else {
                        media.extension.clone()
                    }
                }
                other => other.to_string(),
            }
        })
        .into_owned()
}

/// Pick the template for the media type and resolve it under `root`
pub fn destination_path(
    root: &Path,
    movie_template: &str,
    series_template: &str,
    media: &ResolvedMedia,
) -> PathBuf {
    let template = match media.media_type {
        MediaType::Movie => movie_template,
        MediaType::Series => series_template,
    };
    root.join(resolve_path(template, media))
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}
