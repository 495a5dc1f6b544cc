//! Configuration types for telly-dl
//!
//! A [`Config`] is built once by the embedder (from a file, environment, or code)
//! and shared read-only as `Arc<Config>` with every component that needs it.

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Download behavior configuration (destination layout, concurrency)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory of the media library (default: "./media")
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,

    /// Path template for movies, relative to `media_root`
    #[serde(default = "default_movie_template")]
    pub movie_template: String,

    /// Path template for series episodes, relative to `media_root`
    #[serde(default = "default_series_template")]
    pub series_template: String,

    /// Maximum concurrent downloads (default: 1)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Strip channel tags, hashtags and markup from filename hints before classifying (default: true)
    #[serde(default = "default_true")]
    pub clean_file_names: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            media_root: default_media_root(),
            movie_template: default_movie_template(),
            series_template: default_series_template(),
            max_concurrent_downloads: default_max_concurrent(),
            clean_file_names: true,
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Queue snapshot path (default: "./downloads-queue.json")
    #[serde(default = "default_queue_path")]
    pub queue_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            queue_path: default_queue_path(),
        }
    }
}

/// Stall watchdog configuration
///
/// A transfer that reports no progress for longer than `stall_timeout` is aborted.
/// The check runs every `poll_interval`, so an abort happens at most
/// `stall_timeout + poll_interval` after the last progress report.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// How often the watchdog checks for progress (default: 10 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Idle time after which a transfer is considered stalled (default: 3 minutes)
    #[serde(default = "default_stall_timeout", with = "duration_serde")]
    pub stall_timeout: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            stall_timeout: default_stall_timeout(),
        }
    }
}

/// Media server library refresh endpoint
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LibraryRefreshConfig {
    /// Base URL of the media server (e.g. "http://jellyfin:8096")
    pub url: String,

    /// API key sent in the `MediaBrowser` authorization header
    pub api_key: String,

    /// Client name sent in the authorization header (default: "telly-dl")
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Timeout for refresh requests (default: 30 seconds)
    #[serde(default = "default_notify_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// Notification configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Library refresh after each completed download (disabled when None)
    #[serde(default)]
    pub library_refresh: Option<LibraryRefreshConfig>,
}

/// Main configuration for MediaDownloader
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Destination layout and concurrency
    #[serde(default)]
    pub download: DownloadConfig,

    /// Queue persistence
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Stall detection for transfers
    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// Downstream notifications
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Shared process-wide settings
    #[serde(flatten)]
    pub runtime: RuntimeConfig,
}

/// Process-wide timing settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Interval between idle connection health checks (default: 6 seconds)
    #[serde(default = "default_heartbeat_interval", with = "duration_serde")]
    pub heartbeat_interval: Duration,

    /// Maximum time to wait for in-flight downloads during shutdown (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl Config {
    /// Media library root
    pub fn media_root(&self) -> &PathBuf {
        &self.download.media_root
    }

    /// Queue snapshot path
    pub fn queue_path(&self) -> &PathBuf {
        &self.persistence.queue_path
    }

    /// Check the configuration for values the downloader cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::config(
                "max_concurrent_downloads",
                "must be at least 1",
            ));
        }
        if self.download.movie_template.trim().is_empty() {
            return Err(Error::config("movie_template", "must not be empty"));
        }
        if self.download.series_template.trim().is_empty() {
            return Err(Error::config("series_template", "must not be empty"));
        }
        if self.watchdog.poll_interval.is_zero() {
            return Err(Error::config("poll_interval", "must be greater than zero"));
        }
        if self.watchdog.stall_timeout < self.watchdog.poll_interval {
            return Err(Error::config(
                "stall_timeout",
                "must not be shorter than poll_interval",
            ));
        }
        if self.runtime.heartbeat_interval.is_zero() {
            return Err(Error::config(
                "heartbeat_interval",
                "must be greater than zero",
            ));
        }
        if let Some(refresh) = &self.notifications.library_refresh
            && url::Url::parse(&refresh.url).is_err()
        {
            return Err(Error::config(
                "library_refresh.url",
                format!("invalid URL: {}", refresh.url),
            ));
        }
        Ok(())
    }
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_movie_template() -> String {
    "Movies/{TITLE} ({YEAR})/{TITLE} ({YEAR}).{EXT}".to_string()
}

fn default_series_template() -> String {
    "Shows/{TITLE}/Season {SEASON_PAD}/{TITLE} - {SEASON_EPISODE} - {EPISODE_NAME}.{EXT}"
        .to_string()
}

fn default_max_concurrent() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_queue_path() -> PathBuf {
    PathBuf::from("downloads-queue.json")
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_stall_timeout() -> Duration {
    Duration::from_secs(3 * 60)
}

fn default_client_name() -> String {
    "telly-dl".to_string()
}

fn default_notify_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(6)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
