//! Shared test doubles for the downloader and pipeline tests.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::ServiceError;
use crate::services::{
    ConnectorFactory, FilenameClassifier, IndicatorChannel, LibraryNotifier, MediaResolver,
    ProgressFn, Services, SourceConnector,
};
use crate::types::{
    ContentHandle, IndicatorKind, MediaInfo, MediaType, ResolveHints, ResolvedMedia,
    SourceLocator,
};

/// What a [`ScriptedConnector`] does when asked to fetch and stream
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Deliver these chunks in order
    Deliver(Vec<Vec<u8>>),
    /// The message no longer exists
    Missing,
    /// Fetch fails with a transport error
    FetchError,
    /// Write these bytes, then hang until the connection is reset
    Stall(Vec<u8>),
    /// Write these bytes, then fail
    FailAfter(Vec<u8>),
    /// Write these bytes, then panic
    PanicAfter(Vec<u8>),
}

pub(crate) struct ScriptedConnector {
    script: Script,
    pub(crate) resets: AtomicUsize,
    torn_down: CancellationToken,
}

impl ScriptedConnector {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            resets: AtomicUsize::new(0),
            torn_down: CancellationToken::new(),
        }
    }

    fn total_bytes(&self) -> u64 {
        match &self.script {
            Script::Deliver(chunks) => chunks.iter().map(|c| c.len() as u64).sum(),
            Script::Stall(bytes) | Script::FailAfter(bytes) | Script::PanicAfter(bytes) => {
                bytes.len() as u64 * 4
            }
            Script::Missing | Script::FetchError => 0,
        }
    }
}

async fn write_chunk(file: &mut tokio::fs::File, chunk: &[u8]) -> Result<(), ServiceError> {
    file.write_all(chunk)
        .await
        .map_err(|e| ServiceError::Failed(e.to_string()))?;
    file.flush()
        .await
        .map_err(|e| ServiceError::Failed(e.to_string()))
}

#[async_trait]
impl SourceConnector for ScriptedConnector {
    async fn fetch(&self, source: &SourceLocator) -> Result<Option<ContentHandle>, ServiceError> {
        match self.script {
            Script::Missing => Ok(None),
            Script::FetchError => Err(ServiceError::Disconnected),
            _ => Ok(Some(ContentHandle {
                media_id: format!("media-{}", source.message_id),
                size_bytes: Some(self.total_bytes()),
            })),
        }
    }

    async fn stream(
        &self,
        _handle: &ContentHandle,
        dest: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<u64, ServiceError> {
        let total = self.total_bytes();
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ServiceError::Failed(e.to_string()))?;

        match &self.script {
            Script::Deliver(chunks) => {
                let mut done = 0;
                for chunk in chunks {
                    write_chunk(&mut file, chunk).await?;
                    done += chunk.len() as u64;
                    on_progress(done, total);
                    tokio::task::yield_now().await;
                }
                Ok(done)
            }
            Script::Stall(bytes) => {
                write_chunk(&mut file, bytes).await?;
                on_progress(bytes.len() as u64, total);
                self.torn_down.cancelled().await;
                Err(ServiceError::Disconnected)
            }
            Script::FailAfter(bytes) => {
                write_chunk(&mut file, bytes).await?;
                on_progress(bytes.len() as u64, total);
                Err(ServiceError::Failed("connection reset by peer".into()))
            }
            Script::PanicAfter(bytes) => {
                write_chunk(&mut file, bytes).await?;
                on_progress(bytes.len() as u64, total);
                panic!("connector bug after {} bytes", bytes.len());
            }
            Script::Missing | Script::FetchError => {
                Err(ServiceError::Failed("nothing to stream".into()))
            }
        }
    }

    async fn reset(&self) -> Result<(), ServiceError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.torn_down.cancel();
        Ok(())
    }
}

/// Hands out a fresh [`ScriptedConnector`] per task and keeps them for inspection
pub(crate) struct ScriptedFactory {
    script: Option<Script>,
    pub(crate) opened: Mutex<Vec<Arc<ScriptedConnector>>>,
}

impl ScriptedFactory {
    pub(crate) fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Some(script),
            opened: Mutex::new(Vec::new()),
        })
    }

    /// A factory whose connections can never be opened
    pub(crate) fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            script: None,
            opened: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn connectors(&self) -> Vec<Arc<ScriptedConnector>> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectorFactory for ScriptedFactory {
    async fn open(&self) -> Result<Arc<dyn SourceConnector>, ServiceError> {
        let Some(script) = self.script.clone() else {
            return Err(ServiceError::Timeout(Duration::from_secs(10)));
        };
        let connector = Arc::new(ScriptedConnector::new(script));
        self.opened.lock().unwrap().push(Arc::clone(&connector));
        Ok(connector)
    }
}

/// Uses everything before the first dot as the title
#[derive(Default)]
pub(crate) struct StemClassifier {
    pub(crate) seen: Mutex<Vec<String>>,
    pub(crate) fail: bool,
}

#[async_trait]
impl FilenameClassifier for StemClassifier {
    async fn classify(&self, file_name: &str) -> Result<MediaInfo, ServiceError> {
        self.seen.lock().unwrap().push(file_name.to_string());
        if self.fail {
            return Err(ServiceError::Failed("model returned garbage".into()));
        }
        let title = file_name.split('.').next().unwrap_or(file_name).trim();
        Ok(MediaInfo {
            candidate_title: title.to_string(),
            is_movie: true,
            ..MediaInfo::default()
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup {
    Found,
    NotFound,
    Unavailable,
}

/// Resolves every title to a 2020 movie of the same name, leaving the extension to the pipeline
pub(crate) struct EchoResolver {
    lookup: Lookup,
    pub(crate) hints: Mutex<Vec<ResolveHints>>,
}

impl EchoResolver {
    pub(crate) fn new(lookup: Lookup) -> Arc<Self> {
        Arc::new(Self {
            lookup,
            hints: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl MediaResolver for EchoResolver {
    async fn resolve(
        &self,
        candidate_title: &str,
        hints: &ResolveHints,
    ) -> Result<Option<ResolvedMedia>, ServiceError> {
        self.hints.lock().unwrap().push(hints.clone());
        match self.lookup {
            Lookup::NotFound => Ok(None),
            Lookup::Unavailable => Err(ServiceError::Status {
                code: 503,
                body: "maintenance".into(),
            }),
            Lookup::Found => Ok(Some(ResolvedMedia {
                media_type: MediaType::Movie,
                title: candidate_title.to_string(),
                original_title: candidate_title.to_string(),
                year: Some(2020),
                season: None,
                episode: None,
                episode_name: None,
                extension: String::new(),
                language_code: None,
                language_name: None,
                origin_country: Vec::new(),
            })),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingIndicators {
    pub(crate) seen: Mutex<Vec<(SourceLocator, IndicatorKind)>>,
}

impl RecordingIndicators {
    pub(crate) fn kinds(&self) -> Vec<IndicatorKind> {
        self.seen.lock().unwrap().iter().map(|(_, k)| *k).collect()
    }
}

#[async_trait]
impl IndicatorChannel for RecordingIndicators {
    async fn emit(&self, source: &SourceLocator, kind: IndicatorKind) -> Result<(), ServiceError> {
        self.seen.lock().unwrap().push((*source, kind));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct CountingLibrary {
    pub(crate) calls: AtomicUsize,
    pub(crate) fail: bool,
}

#[async_trait]
impl LibraryNotifier for CountingLibrary {
    async fn notify(&self) -> Result<(), ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ServiceError::Status {
                code: 401,
                body: "bad token".into(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "library_refresh"
    }
}

/// Collaborators plus handles to inspect what they saw
pub(crate) struct Fakes {
    pub(crate) factory: Arc<ScriptedFactory>,
    pub(crate) classifier: Arc<StemClassifier>,
    pub(crate) resolver: Arc<EchoResolver>,
    pub(crate) indicators: Arc<RecordingIndicators>,
    pub(crate) library: Arc<CountingLibrary>,
}

impl Fakes {
    pub(crate) fn new(script: Script, lookup: Lookup) -> Self {
        Self::with_factory(ScriptedFactory::new(script), lookup)
    }

    pub(crate) fn with_factory(factory: Arc<ScriptedFactory>, lookup: Lookup) -> Self {
        Self {
            factory,
            classifier: Arc::new(StemClassifier::default()),
            resolver: EchoResolver::new(lookup),
            indicators: Arc::new(RecordingIndicators::default()),
            library: Arc::new(CountingLibrary::default()),
        }
    }

    pub(crate) fn services(&self) -> Services {
        Services::new(
            self.factory.clone(),
            self.classifier.clone(),
            self.resolver.clone(),
        )
        .with_indicators(self.indicators.clone())
        .with_library(self.library.clone())
    }
}

/// Config rooted in `dir` with a fast watchdog
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.download.media_root = dir.join("media");
    config.persistence.queue_path = dir.join("queue.json");
    config.watchdog.poll_interval = Duration::from_millis(20);
    config.watchdog.stall_timeout = Duration::from_millis(150);
    config.runtime.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Poll `check` until it holds or a second passes
pub(crate) async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Every file under `dir`, recursively
pub(crate) fn files_under(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(files_under(&path));
        } else {
            found.push(path);
        }
    }
    found.sort();
    found
}
