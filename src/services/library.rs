//! Media server library refresh over HTTP

use async_trait::async_trait;
use std::time::Duration;

use super::traits::LibraryNotifier;
use crate::config::LibraryRefreshConfig;
use crate::error::{Error, Result, ServiceError};

/// Asks a Jellyfin-compatible server to rescan its libraries
///
/// Sends `POST {url}/Library/Refresh` with a `MediaBrowser` authorization header.
pub struct HttpLibraryNotifier {
    client: reqwest::Client,
    endpoint: String,
    authorization: String,
    timeout: Duration,
}

impl HttpLibraryNotifier {
    /// Build a notifier from its configuration
    ///
    /// Fails when the configured URL cannot be parsed or the HTTP client
    /// cannot be built.
    pub fn new(config: &LibraryRefreshConfig) -> Result<Self> {
        let base = url::Url::parse(&config.url).map_err(|e| {
            Error::config("library_refresh.url", format!("invalid URL {}: {}", config.url, e))
        })?;
        let endpoint = format!("{}/Library/Refresh", base.as_str().trim_end_matches('/'));
        let authorization = format!(
            "MediaBrowser Client=\"{}\", Token=\"{}\"",
            config.client_name, config.api_key
        );

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("{}/{}", config.client_name, env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            authorization,
            timeout: config.timeout,
        })
    }

    /// Full refresh URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LibraryNotifier for HttpLibraryNotifier {
    async fn notify(&self) -> std::result::Result<(), ServiceError> {
        let request = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.authorization)
            .send();

        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => return Err(ServiceError::Timeout(self.timeout)),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ServiceError::Timeout(self.timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                code: status.as_u16(),
                body,
            });
        }

        tracing::debug!(endpoint = %self.endpoint, "library refresh requested");
        Ok(())
    }

    fn name(&self) -> &str {
        "library_refresh"
    }
}
