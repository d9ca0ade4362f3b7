//! HTTP plumbing shared by every source client: spacing, caching, status
//! and JSON handling.

use crate::cache::{ApiResponseCache, RequestSpacer};
use evidentia_core::config::SourcesConfig;
use evidentia_core::error::SourceError;
use evidentia_core::http::HttpTransport;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// GET-with-cache helper owned by one source client.
pub struct SourceHttp {
    source_id: &'static str,
    transport: Arc<dyn HttpTransport>,
    cache: ApiResponseCache,
    spacer: RequestSpacer,
}

impl SourceHttp {
    pub fn new(
        source_id: &'static str,
        transport: Arc<dyn HttpTransport>,
        cache: ApiResponseCache,
        min_interval: Duration,
    ) -> Self {
        Self {
            source_id,
            transport,
            cache,
            spacer: RequestSpacer::new(min_interval),
        }
    }

    /// Cache and spacing as configured in `sources`.
    pub fn from_config(
        source_id: &'static str,
        transport: Arc<dyn HttpTransport>,
        config: &SourcesConfig,
        min_interval: Duration,
    ) -> Self {
        Self::new(
            source_id,
            transport,
            ApiResponseCache::new(
                Duration::from_secs(config.cache_ttl_secs),
                config.cache_max_entries,
            ),
            min_interval,
        )
    }

    pub fn source_id(&self) -> &'static str {
        self.source_id
    }

    /// Fetch `url` as JSON. Successful bodies are cached by URL.
    pub async fn get_json(&self, url: &str, headers: &[(&str, &str)]) -> Result<Value, SourceError> {
        if let Some(cached) = self.cache.get(url) {
            debug!(source = self.source_id, url, "Source cache hit");
            return Ok(cached);
        }

        self.spacer.wait().await;
        let reply = self
            .transport
            .get(url, headers)
            .await
            .map_err(|e| SourceError::Request {
                source_id: self.source_id.to_string(),
                message: e.to_string(),
            })?;
        if !reply.is_success() {
            return Err(SourceError::Http {
                source_id: self.source_id.to_string(),
                status: reply.status,
            });
        }
        let body = reply.json().map_err(|e| SourceError::Parse {
            source_id: self.source_id.to_string(),
            message: e.to_string(),
        })?;
        self.cache.insert(url.to_string(), body.clone());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidentia_core::http::{HttpReply, ScriptedTransport, TransportError};
    use serde_json::json;

    fn http(transport: Arc<ScriptedTransport>) -> SourceHttp {
        SourceHttp::new(
            "test",
            transport,
            ApiResponseCache::new(Duration::from_secs(60), 8),
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn test_second_get_served_from_cache() {
        let transport = Arc::new(ScriptedTransport::new().with_reply(HttpReply::ok_json(&json!({"ok": 1}))));
        let client = http(transport.clone());
        assert_eq!(client.get_json("https://x/a", &[]).await.unwrap(), json!({"ok": 1}));
        assert_eq!(client.get_json("https://x/a", &[]).await.unwrap(), json!({"ok": 1}));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_reply(HttpReply::new(429, "slow down"))
                .with_reply(HttpReply::new(200, "<html>"))
                .with_error(TransportError::Connection("refused".into())),
        );
        let client = http(transport);
        assert!(matches!(
            client.get_json("https://x/1", &[]).await,
            Err(SourceError::Http { status: 429, .. })
        ));
        assert!(matches!(
            client.get_json("https://x/2", &[]).await,
            Err(SourceError::Parse { .. })
        ));
        assert!(matches!(
            client.get_json("https://x/3", &[]).await,
            Err(SourceError::Request { .. })
        ));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_reply(HttpReply::new(503, ""))
                .with_reply(HttpReply::ok_json(&json!([]))),
        );
        let client = http(transport.clone());
        assert!(client.get_json("https://x/a", &[]).await.is_err());
        assert!(client.get_json("https://x/a", &[]).await.is_ok());
        assert_eq!(transport.request_count(), 2);
    }
}
