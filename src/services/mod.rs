//! External collaborators of the download pipeline
//!
//! The pipeline never talks to a chat network, classifier, metadata
//! database or media server directly. It goes through the traits in this
//! module, so any backend (or a test double) can be plugged in.

mod library;
mod noop;
mod traits;

pub use library::HttpLibraryNotifier;
pub use noop::{NoOpIndicatorChannel, NoOpLibraryNotifier};
pub use traits::{
    ConnectorFactory, FilenameClassifier, IndicatorChannel, LibraryNotifier, MediaResolver,
    ProgressFn, SessionConnection, SourceConnector,
};

use std::sync::Arc;

use crate::config::NotificationConfig;
use crate::error::Result;

/// Collaborators handed to the downloader
#[derive(Clone)]
pub struct Services {
    /// Opens a transport connection per task
    pub connectors: Arc<dyn ConnectorFactory>,
    /// Filename classifier
    pub classifier: Arc<dyn FilenameClassifier>,
    /// Title resolver
    pub resolver: Arc<dyn MediaResolver>,
    /// Status indicators on source messages
    pub indicators: Arc<dyn IndicatorChannel>,
    /// Library refresh after a successful commit
    pub library: Arc<dyn LibraryNotifier>,
}

impl Services {
    /// Bundle the required collaborators with no-op indicator and library notifiers
    pub fn new(
        connectors: Arc<dyn ConnectorFactory>,
        classifier: Arc<dyn FilenameClassifier>,
        resolver: Arc<dyn MediaResolver>,
    ) -> Self {
        Self {
            connectors,
            classifier,
            resolver,
            indicators: Arc::new(NoOpIndicatorChannel),
            library: Arc::new(NoOpLibraryNotifier),
        }
    }

    /// Replace the indicator channel
    pub fn with_indicators(mut self, indicators: Arc<dyn IndicatorChannel>) -> Self {
        self.indicators = indicators;
        self
    }

    /// Replace the library notifier
    pub fn with_library(mut self, library: Arc<dyn LibraryNotifier>) -> Self {
        self.library = library;
        self
    }

    /// Use the HTTP library notifier when one is configured
    pub fn with_notification_config(self, config: &NotificationConfig) -> Result<Self> {
        match &config.library_refresh {
            Some(refresh) => Ok(self.with_library(Arc::new(HttpLibraryNotifier::new(refresh)?))),
            None => Ok(self),
        }
    }
}
