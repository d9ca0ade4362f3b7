//! Configuration system for Evidentia.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/evidentia/config.toml` and/or `.evidentia/config.toml`
//! in the workspace directory.
//!
//! The core never reads configuration from ambient state: callers load an
//! [`EvidentiaConfig`] once and pass the relevant sections into each component.

use crate::types::ProviderId;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidentiaConfig {
    /// Per-provider settings, keyed by provider identity.
    #[serde(default = "default_providers")]
    pub providers: BTreeMap<ProviderId, ProviderConfig>,
    #[serde(default)]
    pub research: ResearchSettings,
    #[serde(default)]
    pub evidence: EvidenceConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub external_agent: ExternalAgentConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for EvidentiaConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            research: ResearchSettings::default(),
            evidence: EvidenceConfig::default(),
            sources: SourcesConfig::default(),
            external_agent: ExternalAgentConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

fn default_providers() -> BTreeMap<ProviderId, ProviderConfig> {
    ProviderId::ALL
        .iter()
        .map(|id| (*id, ProviderConfig::for_provider(*id)))
        .collect()
}

fn default_true() -> bool {
    true
}

impl EvidentiaConfig {
    /// Configuration for one provider, falling back to its defaults.
    pub fn provider(&self, id: ProviderId) -> ProviderConfig {
        self.providers
            .get(&id)
            .cloned()
            .unwrap_or_else(|| ProviderConfig::for_provider(id))
    }

    /// Validate the whole configuration and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid. Warnings are human-readable
    /// and never abort loading.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let active = self.provider(self.research.active_provider);
        if !active.enabled {
            warnings.push(format!(
                "active provider '{}' is disabled",
                self.research.active_provider
            ));
        }
        if self.research.dialectical_mode {
            match self.research.secondary_provider {
                None => warnings.push(
                    "dialectical_mode is enabled but no secondary_provider is set; \
                     phases will run on a single provider"
                        .to_string(),
                ),
                Some(secondary) if secondary == self.research.active_provider => warnings.push(
                    format!("secondary_provider equals active_provider ('{secondary}')"),
                ),
                Some(_) => {}
            }
        }
        warnings.extend(self.evidence.validate());
        if self.external_agent.poll_interval_secs == 0 {
            warnings.push("external_agent.poll_interval_secs is 0; polling will spin".to_string());
        }
        warnings
    }
}

/// Settings for one LLM provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key. Empty means "resolve from the environment".
    #[serde(default)]
    pub api_key: String,
    /// Preferred model identifier.
    pub model: String,
    /// Whether the provider may be used.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Optional base URL override for the API endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Override for the model used after a quota failure.
    #[serde(default)]
    pub fallback_model: Option<String>,
    /// Override for the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl ProviderConfig {
    /// Default settings for a provider: its preferred model, enabled, no key.
    pub fn for_provider(id: ProviderId) -> Self {
        Self {
            api_key: String::new(),
            model: id.default_model().to_string(),
            enabled: true,
            base_url: None,
            fallback_model: None,
            api_key_env: None,
        }
    }

    /// Settings with an explicit key and model.
    pub fn with_key(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            enabled: true,
            base_url: None,
            fallback_model: None,
            api_key_env: None,
        }
    }

    /// Resolve the API key: the configured value first, then the environment.
    pub fn resolve_api_key(&self, id: ProviderId) -> Option<String> {
        let configured = self.api_key.trim();
        if !configured.is_empty() {
            return Some(configured.to_string());
        }
        let var = self.api_key_env.as_deref().unwrap_or(id.api_key_env());
        std::env::var(var)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

/// Research settings normally owned by the settings collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSettings {
    /// Provider used for single-provider phases and as the dialectical primary.
    pub active_provider: ProviderId,
    /// Second provider for dialectical mode.
    #[serde(default)]
    pub secondary_provider: Option<ProviderId>,
    /// Run phases through the dialectical coordinator when possible.
    #[serde(default)]
    pub dialectical_mode: bool,
    /// Rewrite the query with the active provider before phase 1.
    #[serde(default)]
    pub enhance_prompt: bool,
    /// Directory for the JSON history store. Defaults to the platform data dir.
    #[serde(default)]
    pub history_dir: Option<PathBuf>,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            active_provider: ProviderId::OpenAi,
            secondary_provider: None,
            dialectical_mode: false,
            enhance_prompt: false,
            history_dir: None,
        }
    }
}

impl ResearchSettings {
    /// The secondary provider to pair with the active one, if dialectical
    /// execution applies.
    pub fn dialectical_partner(&self) -> Option<ProviderId> {
        if !self.dialectical_mode {
            return None;
        }
        self.secondary_provider
            .filter(|secondary| *secondary != self.active_provider)
    }

    /// Resolved history directory.
    pub fn resolved_history_dir(&self) -> PathBuf {
        self.history_dir.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("dev", "evidentia", "evidentia")
                .map(|d| d.data_dir().join("history"))
                .unwrap_or_else(|| PathBuf::from(".evidentia").join("history"))
        })
    }
}

/// Evidence aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// Results requested from each source per query.
    pub limit_per_source: usize,
    /// Minimum unique results before broadening stops.
    pub min_results: usize,
    /// Minimum quality score kept after scoring.
    pub min_quality: f64,
    /// Maximum number of scored papers returned.
    pub max_results: usize,
    /// Maximum decomposed variants.
    pub max_variants: usize,
    /// Variants searched in the first attempt.
    pub initial_variants: usize,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            limit_per_source: 10,
            min_results: 20,
            min_quality: 0.2,
            max_results: 60,
            max_variants: 8,
            initial_variants: 4,
        }
    }
}

impl EvidenceConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !(0.0..=1.0).contains(&self.min_quality) {
            warnings.push(format!(
                "evidence.min_quality ({}) is outside [0.0, 1.0]",
                self.min_quality
            ));
        }
        if self.limit_per_source == 0 {
            warnings.push("evidence.limit_per_source is 0; no papers will be fetched".into());
        }
        if self.max_results < self.min_results {
            warnings.push(format!(
                "evidence.max_results ({}) < evidence.min_results ({})",
                self.max_results, self.min_results
            ));
        }
        warnings
    }
}

/// Settings for one bibliographic source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceToggle {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// API key, for sources that accept one (Semantic Scholar).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Contact address for polite-pool access (OpenAlex, Crossref).
    #[serde(default)]
    pub mailto: Option<String>,
}

impl Default for SourceToggle {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            mailto: None,
        }
    }
}

/// Bibliographic source client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub semantic_scholar: SourceToggle,
    #[serde(default)]
    pub openalex: SourceToggle,
    #[serde(default)]
    pub crossref: SourceToggle,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Response cache TTL.
    pub cache_ttl_secs: u64,
    /// Maximum cached responses per client.
    pub cache_max_entries: usize,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            semantic_scholar: SourceToggle::default(),
            openalex: SourceToggle::default(),
            crossref: SourceToggle::default(),
            timeout_secs: 30,
            cache_ttl_secs: 3600,
            cache_max_entries: 256,
        }
    }
}

/// External research agent settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalAgentConfig {
    /// Route research through the external agent instead of the phase pipeline.
    #[serde(default)]
    pub enabled: bool,
    /// Jobs endpoint; `POST` starts a job, `GET {base_url}/{id}` polls it.
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
    #[serde(default)]
    pub model: Option<String>,
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ExternalAgentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1/responses".to_string(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: Some("o3-deep-research".to_string()),
            poll_interval_secs: 5,
            timeout_secs: 600,
        }
    }
}

impl ExternalAgentConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// HTTP client settings shared by provider adapters and the job client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            connect_timeout_secs: 10,
        }
    }
}

/// Load configuration with layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `EVIDENTIA_`)
/// 3. Workspace-local config (`.evidentia/config.toml`)
/// 4. User config (`~/.config/evidentia/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&EvidentiaConfig>,
) -> Result<EvidentiaConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(EvidentiaConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "evidentia", "evidentia") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".evidentia").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // EVIDENTIA_RESEARCH__ACTIVE_PROVIDER, EVIDENTIA_PROVIDERS__DEEPSEEK__MODEL, ...
    figment = figment.merge(Env::prefixed("EVIDENTIA_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Load configuration from an explicit file on top of the defaults.
pub fn load_config_file(path: &Path) -> Result<EvidentiaConfig, Box<figment::Error>> {
    Figment::from(Serialized::defaults(EvidentiaConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("EVIDENTIA_").split("__"))
        .extract()
        .map_err(Box::new)
}
