//! In-memory collaborators built only on the public trait surface

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telly_dl::services::{
    ConnectorFactory, FilenameClassifier, MediaResolver, ProgressFn, SourceConnector,
};
use telly_dl::types::ContentHandle;
use telly_dl::{
    Config, MediaInfo, MediaType, ResolveHints, ResolvedMedia, ServiceError, Services,
    SourceLocator,
};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Chat id every fake message lives in
pub const CHAT_ID: i64 = -1009876;

const CHUNK_SIZE: usize = 4;

/// Messages keyed by id, plus ids whose transfer hangs after the first chunk
#[derive(Default)]
pub struct MemoryChannel {
    messages: Mutex<HashMap<i32, Vec<u8>>>,
    stalling: Mutex<HashSet<i32>>,
    chunk_delay: Mutex<Duration>,
    active: AtomicUsize,
    /// Highest number of transfers observed at the same time
    pub peak_active: AtomicUsize,
    /// Connections opened so far
    pub opened: AtomicUsize,
    /// Connections reset so far
    pub resets: AtomicUsize,
    /// Messages whose transfer had not finished when its connection was reset
    pub aborted: Mutex<Vec<i32>>,
}

impl MemoryChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn post(&self, message_id: i32, content: &[u8]) {
        self.messages
            .lock()
            .unwrap()
            .insert(message_id, content.to_vec());
    }

    pub fn post_stalling(&self, message_id: i32, content: &[u8]) {
        self.post(message_id, content);
        self.stalling.lock().unwrap().insert(message_id);
    }

    pub fn set_chunk_delay(&self, delay: Duration) {
        *self.chunk_delay.lock().unwrap() = delay;
    }

    pub fn source(message_id: i32) -> SourceLocator {
        SourceLocator::new(Some(CHAT_ID), message_id)
    }

    fn content(&self, message_id: i32) -> Option<Vec<u8>> {
        self.messages.lock().unwrap().get(&message_id).cloned()
    }

    fn stalls(&self, message_id: i32) -> bool {
        self.stalling.lock().unwrap().contains(&message_id)
    }
}

/// Opens a [`MemoryConnection`] per task
pub struct MemoryFactory(pub Arc<MemoryChannel>);

#[async_trait]
impl ConnectorFactory for MemoryFactory {
    async fn open(&self) -> Result<Arc<dyn SourceConnector>, ServiceError> {
        self.0.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryConnection {
            channel: Arc::clone(&self.0),
            torn_down: CancellationToken::new(),
            streaming: Mutex::new(None),
        }))
    }
}

struct MemoryConnection {
    channel: Arc<MemoryChannel>,
    torn_down: CancellationToken,
    /// Message whose transfer started on this connection and has not finished
    streaming: Mutex<Option<i32>>,
}

/// Decrements the active-transfer count however the stream ends
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SourceConnector for MemoryConnection {
    async fn fetch(&self, source: &SourceLocator) -> Result<Option<ContentHandle>, ServiceError> {
        Ok(self
            .channel
            .content(source.message_id)
            .map(|bytes| ContentHandle {
                media_id: source.message_id.to_string(),
                size_bytes: Some(bytes.len() as u64),
            }))
    }

    async fn stream(
        &self,
        handle: &ContentHandle,
        dest: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64, ServiceError> {
        let message_id: i32 = handle
            .media_id
            .parse()
            .map_err(|_| ServiceError::Failed("bad media id".into()))?;
        let bytes = self
            .channel
            .content(message_id)
            .ok_or_else(|| ServiceError::Failed("message deleted".into()))?;
        let stalls = self.channel.stalls(message_id);
        let delay = *self.channel.chunk_delay.lock().unwrap();

        *self.streaming.lock().unwrap() = Some(message_id);
        let now_active = self.channel.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _active = ActiveGuard(&self.channel.active);
        self.channel
            .peak_active
            .fetch_max(now_active, Ordering::SeqCst);

        let io = |e: std::io::Error| ServiceError::Failed(e.to_string());
        let mut file = tokio::fs::File::create(dest).await.map_err(io)?;
        let total = bytes.len() as u64;
        let mut done = 0u64;

        for chunk in bytes.chunks(CHUNK_SIZE) {
            file.write_all(chunk).await.map_err(io)?;
            file.flush().await.map_err(io)?;
            done += chunk.len() as u64;
            on_progress(done, total);

            if stalls {
                self.torn_down.cancelled().await;
                return Err(ServiceError::Disconnected);
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        *self.streaming.lock().unwrap() = None;
        Ok(done)
    }

    async fn reset(&self) -> Result<(), ServiceError> {
        self.channel.resets.fetch_add(1, Ordering::SeqCst);
        if let Some(message_id) = self.streaming.lock().unwrap().take() {
            self.channel.aborted.lock().unwrap().push(message_id);
        }
        self.torn_down.cancel();
        Ok(())
    }
}

/// Title is everything before the first dot; a four-digit part becomes the year
pub struct DotClassifier;

#[async_trait]
impl FilenameClassifier for DotClassifier {
    async fn classify(&self, file_name: &str) -> Result<MediaInfo, ServiceError> {
        let mut parts = file_name.split('.');
        let title = parts.next().unwrap_or_default().trim().to_string();
        let year = parts
            .find(|p| p.len() == 4 && p.chars().all(|c| c.is_ascii_digit()))
            .and_then(|p| p.parse().ok());
        Ok(MediaInfo {
            candidate_title: title,
            year,
            is_movie: true,
            ..MediaInfo::default()
        })
    }
}

/// Knows a fixed set of movie titles
pub struct Catalogue {
    known: HashSet<String>,
}

impl Catalogue {
    pub fn with(titles: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            known: titles.iter().map(|t| t.to_string()).collect(),
        })
    }
}

#[async_trait]
impl MediaResolver for Catalogue {
    async fn resolve(
        &self,
        candidate_title: &str,
        hints: &ResolveHints,
    ) -> Result<Option<ResolvedMedia>, ServiceError> {
        if !self.known.contains(candidate_title) {
            return Ok(None);
        }
        Ok(Some(ResolvedMedia {
            media_type: MediaType::Movie,
            title: candidate_title.to_string(),
            original_title: candidate_title.to_string(),
            year: hints.year,
            season: None,
            episode: None,
            episode_name: None,
            extension: hints.file_extension.clone(),
            language_code: Some("ml".into()),
            language_name: Some("Malayalam".into()),
            origin_country: vec!["IN".into()],
        }))
    }
}

/// Collaborators wired to `channel` and `catalogue`
pub fn services(channel: &Arc<MemoryChannel>, catalogue: Arc<Catalogue>) -> Services {
    Services::new(
        Arc::new(MemoryFactory(Arc::clone(channel))),
        Arc::new(DotClassifier),
        catalogue,
    )
}

/// Config rooted in `dir` with a fast watchdog
pub fn config_in(dir: &Path, concurrency: usize) -> Config {
    let mut config = Config::default();
    config.download.media_root = dir.join("library");
    config.download.max_concurrent_downloads = concurrency;
    config.persistence.queue_path = dir.join("state").join("queue.json");
    config.watchdog.poll_interval = Duration::from_millis(25);
    config.watchdog.stall_timeout = Duration::from_millis(200);
    config.runtime.shutdown_timeout = Duration::from_millis(300);
    config
}
