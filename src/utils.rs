//! Utility functions for filename handling and temp file management

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Extension used when the filename hint has none
pub const DEFAULT_EXTENSION: &str = "mkv";

/// Suffix appended to the final path while a transfer is in progress
pub const TEMP_SUFFIX: &str = ".tmp";

struct CleanupRule {
    pattern: Regex,
    replacement: &'static str,
}

#[allow(clippy::unwrap_used)] // literal patterns
static CLEANUP_RULES: LazyLock<Vec<CleanupRule>> = LazyLock::new(|| {
    [
        // bold/italic markdown
        (r"\*\*|__", ""),
        // hashtags like #Bollywood
        (r"#\w+", ""),
        // bracketed tags like [MS] or [Malayalam 1080p]
        (r"\[.*?\]", ""),
        // "@Channel - " style prefixes
        (r"@\S+\s*-?\s*", ""),
        // "www.site.com - " style prefixes
        (r"www\.\S+\s*-?\s*", ""),
        (r"\s{2,}", " "),
    ]
    .into_iter()
    .map(|(pattern, replacement)| CleanupRule {
        pattern: Regex::new(pattern).unwrap(),
        replacement,
    })
    .collect()
});

/// Strip channel noise from a filename hint before classification
///
/// Removes markdown emphasis, hashtags, bracketed tags, `@channel -` and
/// `www.site -` prefixes, and collapses repeated whitespace.
///
/// # Examples
///
/// ```
/// use telly_dl::utils::clean_file_name;
///
/// assert_eq!(
///     clean_file_name("@TamilMV - **Leo** [Tamil 1080p] #Kollywood 2023.mkv"),
///     "Leo 2023.mkv"
/// );
/// ```
#[must_use]
pub fn clean_file_name(name: &str) -> String {
    let mut cleaned = name.to_string();
    for rule in CLEANUP_RULES.iter() {
        cleaned = rule
            .pattern
            .replace_all(&cleaned, rule.replacement)
            .into_owned();
    }
    cleaned.trim().to_string()
}

/// Extension of a filename hint without the dot, or [`DEFAULT_EXTENSION`]
///
/// # Examples
///
/// ```
/// use telly_dl::utils::file_extension;
///
/// assert_eq!(file_extension("Dark.S01E01.mp4"), "mp4");
/// assert_eq!(file_extension("no extension"), "mkv");
/// ```
#[must_use]
pub fn file_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Path the transfer writes to before the atomic rename: `final + ".tmp"`
#[must_use]
pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let mut raw = final_path.as_os_str().to_os_string();
    raw.push(TEMP_SUFFIX);
    PathBuf::from(raw)
}

/// Delete a partial transfer if one exists
///
/// Returns whether a file was removed. A missing file is not an error.
pub async fn remove_temp_file(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
