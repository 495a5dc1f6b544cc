//! No-op collaborators for optional integrations

use async_trait::async_trait;

use super::traits::{IndicatorChannel, LibraryNotifier};
use crate::error::ServiceError;
use crate::types::{IndicatorKind, SourceLocator};

/// Library notifier used when no media server is configured
///
/// # Examples
///
/// ```
/// use telly_dl::services::{LibraryNotifier, NoOpLibraryNotifier};
///
/// # #[tokio::main]
/// # async fn main() {
/// let notifier = NoOpLibraryNotifier;
/// assert!(notifier.notify().await.is_ok());
/// # }
/// ```
pub struct NoOpLibraryNotifier;

#[async_trait]
impl LibraryNotifier for NoOpLibraryNotifier {
    async fn notify(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Indicator channel that drops every indicator
pub struct NoOpIndicatorChannel;

#[async_trait]
impl IndicatorChannel for NoOpIndicatorChannel {
    async fn emit(&self, source: &SourceLocator, kind: IndicatorKind) -> Result<(), ServiceError> {
        tracing::trace!(source = %source, ?kind, "indicator dropped");
        Ok(())
    }
}
