//! Provider registry: configuration per provider, adapter lookup, and dispatch
//! with quota fallback.

use super::{ProviderAdapter, create_adapter, fallback_model_for, send_with_fallback};
use crate::config::{EvidentiaConfig, ProviderConfig};
use crate::error::ProviderError;
use crate::http::{HttpTransport, ReqwestTransport};
use crate::types::{AiResponse, ProviderId};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Sends a message to a provider by identity.
///
/// The dialectical coordinator and the phase pipeline depend on this seam
/// rather than on the registry itself.
#[async_trait]
pub trait ProviderDispatch: Send + Sync {
    async fn send(&self, provider: ProviderId, message: &str) -> Result<AiResponse, ProviderError>;
}

/// Holds provider configuration and one adapter per provider identity.
pub struct ProviderRegistry {
    configs: BTreeMap<ProviderId, ProviderConfig>,
    adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Build adapters for every provider over a shared transport.
    pub fn new(
        configs: BTreeMap<ProviderId, ProviderConfig>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let adapters = ProviderId::ALL
            .iter()
            .map(|id| {
                let config = configs
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| ProviderConfig::for_provider(*id));
                (*id, create_adapter(*id, &config, transport.clone()))
            })
            .collect();
        Self { configs, adapters }
    }

    /// Build a registry with a real HTTP client from loaded configuration.
    pub fn from_config(config: &EvidentiaConfig) -> Result<Self, ProviderError> {
        let transport = ReqwestTransport::new(&config.http).map_err(|e| {
            ProviderError::Connection {
                provider: config.research.active_provider,
                message: e.to_string(),
            }
        })?;
        Ok(Self::new(config.providers.clone(), Arc::new(transport)))
    }

    /// Replace the adapter for the adapter's own provider identity.
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    /// Replace the configuration for one provider.
    pub fn with_config(mut self, provider: ProviderId, config: ProviderConfig) -> Self {
        self.configs.insert(provider, config);
        self
    }

    pub fn config(&self, provider: ProviderId) -> ProviderConfig {
        self.configs
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| ProviderConfig::for_provider(provider))
    }

    fn adapter(&self, provider: ProviderId) -> Result<&Arc<dyn ProviderAdapter>, ProviderError> {
        self.adapters
            .get(&provider)
            .ok_or(ProviderError::ConfigMissing { provider })
    }

    /// Probe a provider with its configured model. Never fails.
    pub async fn test_connection(&self, provider: ProviderId) -> bool {
        let config = self.config(provider);
        if !config.enabled {
            debug!(provider = %provider, "Skipping connection test for disabled provider");
            return false;
        }
        let Some(api_key) = config.resolve_api_key(provider) else {
            debug!(provider = %provider, "Skipping connection test: no API key");
            return false;
        };
        match self.adapter(provider) {
            Ok(adapter) => adapter.test_connection(&api_key, &config.model).await,
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ProviderDispatch for ProviderRegistry {
    async fn send(&self, provider: ProviderId, message: &str) -> Result<AiResponse, ProviderError> {
        let config = self.config(provider);
        if !config.enabled {
            return Err(ProviderError::Disabled { provider });
        }
        let api_key = config
            .resolve_api_key(provider)
            .ok_or(ProviderError::ConfigMissing { provider })?;
        let adapter = self.adapter(provider)?;
        let fallback = fallback_model_for(provider, &config);

        info!(provider = %provider, model = %config.model, "Dispatching provider call");
        send_with_fallback(
            adapter.as_ref(),
            &api_key,
            &config.model,
            fallback.as_deref(),
            message,
        )
        .await
    }
}
