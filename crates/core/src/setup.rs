//! Wiring shared by the server and CLI binaries: turn configuration into a
//! provider registry.

use crate::config::AppConfig;
use providers::noop::NoopProvider;
use providers::remote::{RemoteAnalysisConfig, RemoteAnalysisProvider};
use providers::ProviderRegistry;
use std::sync::Arc;

/// Build the provider registry from configuration. The noop provider is
/// always registered so a misconfigured deployment fails visibly instead of
/// panicking; the remote gateway is added when a URL is configured.
pub fn build_registry(cfg: &AppConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new().with_text("noop", Arc::new(NoopProvider));

    if let Some(base_url) = &cfg.providers.remote_url {
        let remote = Arc::new(RemoteAnalysisProvider::new(RemoteAnalysisConfig {
            base_url: base_url.clone(),
            api_key: std::env::var("ANALYSIS_API_KEY").ok(),
        }));
        registry = registry
            .with_text("remote", remote.clone())
            .with_labels("remote", remote);
    }

    let preferred_text = cfg.providers.text.clone().unwrap_or_else(|| {
        if cfg.providers.remote_url.is_some() {
            "remote".to_string()
        } else {
            "noop".to_string()
        }
    });
    registry = registry.set_preferred_text(&preferred_text);

    if let Some(labels) = &cfg.providers.labels {
        registry = registry.set_preferred_labels(labels);
    } else if cfg.providers.remote_url.is_some() {
        registry = registry.set_preferred_labels("remote");
    }

    registry
}
