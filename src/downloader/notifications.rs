//! Best-effort side effects: message indicators and library refresh
//!
//! Everything here is fire-and-forget. Calls are spawned, never awaited by
//! the pipeline, and their failures never change a task's outcome.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::services::{IndicatorChannel, LibraryNotifier, Services};
use crate::types::{Event, IndicatorKind, SourceLocator};

/// Dispatches indicators and library refreshes without blocking the caller
#[derive(Clone)]
pub(crate) struct Notifier {
    indicators: Arc<dyn IndicatorChannel>,
    library: Arc<dyn LibraryNotifier>,
    event_tx: broadcast::Sender<Event>,
}

impl Notifier {
    pub(crate) fn new(services: &Services, event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            indicators: Arc::clone(&services.indicators),
            library: Arc::clone(&services.library),
            event_tx,
        }
    }

    /// Show `kind` on the source message
    pub(crate) fn indicate(&self, source: SourceLocator, kind: IndicatorKind) {
        let indicators = Arc::clone(&self.indicators);
        tokio::spawn(async move {
            if let Err(e) = indicators.emit(&source, kind).await {
                tracing::warn!(source = %source, ?kind, error = %e, "failed to emit indicator");
            }
        });
    }

    /// Ask the media server to rescan; failures surface as [`Event::NotificationFailed`]
    pub(crate) fn refresh_library(&self) {
        let library = Arc::clone(&self.library);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            match library.notify().await {
                Ok(()) => tracing::debug!(target_name = library.name(), "library refresh sent"),
                Err(e) => {
                    tracing::warn!(target_name = library.name(), error = %e, "library refresh failed");
                    event_tx
                        .send(Event::NotificationFailed {
                            target: library.name().to_string(),
                            error: e.to_string(),
                        })
                        .ok();
                }
            }
        });
    }
}
