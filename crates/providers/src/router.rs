//! Provider router: builds providers from config and picks the default.

use std::collections::HashMap;
use std::sync::Arc;

use ragpilot_config::AppConfig;
use ragpilot_core::provider::Provider;
use tracing::debug;

use crate::openai_compat::OpenAiCompatProvider;

/// Named providers plus the one used when nothing else is asked for.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    pub fn default_name(&self) -> &str {
        &self.default_provider
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build every configured provider, and the default one even if it has no
/// `[providers.<name>]` table.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();
        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));

        debug!(provider = %name, base_url = %base_url, "Registering provider");
        router.register(
            name.clone(),
            Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key)),
        );
    }

    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let base_url = default_base_url(&config.default_provider);
        router.register(
            config.default_provider.clone(),
            Arc::new(OpenAiCompatProvider::new(
                &config.default_provider,
                &base_url,
                &api_key,
            )),
        );
    }

    router
}

/// Model for the default provider: its `default_model` override, else the
/// global one.
pub fn resolve_model(config: &AppConfig) -> String {
    config
        .providers
        .get(&config.default_provider)
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone())
}

/// Default base URL for well-known OpenAI-compatible providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragpilot_config::ProviderConfig;

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("deepseek");
        router.register("deepseek", Arc::new(OpenAiCompatProvider::deepseek("sk-test")));

        assert!(router.get("deepseek").is_some());
        assert!(router.get("nonexistent").is_none());
        assert_eq!(router.default().unwrap().name(), "deepseek");
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("deepseek").contains("api.deepseek.com"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config() {
        let router = build_from_config(&AppConfig::default());
        assert_eq!(router.default_name(), "deepseek");
        assert!(router.default().is_some());
        assert_eq!(router.list(), vec!["deepseek"]);
    }

    #[test]
    fn configured_providers_are_registered() {
        let mut config = AppConfig {
            default_provider: "ollama".into(),
            ..AppConfig::default()
        };
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-openai".into()),
                api_url: None,
                default_model: Some("gpt-4o-mini".into()),
            },
        );

        let router = build_from_config(&config);
        assert_eq!(router.list(), vec!["ollama", "openai"]);
        assert_eq!(router.default().unwrap().name(), "ollama");
    }

    #[test]
    fn provider_model_overrides_global_model() {
        let mut config = AppConfig::default();
        assert_eq!(resolve_model(&config), "deepseek-chat");

        config.providers.insert(
            "deepseek".into(),
            ProviderConfig {
                default_model: Some("deepseek-reasoner".into()),
                ..ProviderConfig::default()
            },
        );
        assert_eq!(resolve_model(&config), "deepseek-reasoner");
    }
}
