//! Wiring from `AppConfig` to a ready [`QaAgent`].

use std::sync::Arc;

use ragpilot_agent::QaAgent;
use ragpilot_config::AppConfig;
use ragpilot_context::{ContextAssembler, build_counter};
use ragpilot_index::KeywordRetriever;
use ragpilot_providers::{build_from_config, resolve_model};
use ragpilot_session::FileSessionStore;
use tracing::debug;

pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Providers that run locally and take no API key.
const KEYLESS_PROVIDERS: &[&str] = &["ollama", "vllm", "llamacpp", "llama.cpp"];

pub fn load_config() -> CliResult<AppConfig> {
    AppConfig::load().map_err(|e| format!("Failed to load config: {e}").into())
}

/// Fail early, with setup instructions, when the provider needs a key we do not have.
pub fn require_api_key(config: &AppConfig) -> CliResult<()> {
    if config.has_api_key() || KEYLESS_PROVIDERS.contains(&config.default_provider.as_str()) {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured for '{}'!", config.default_provider);
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    DEEPSEEK_API_KEY = 'sk-...'   (DeepSeek, the default provider)");
    eprintln!("    OPENAI_API_KEY   = 'sk-...'   (OpenAI)");
    eprintln!("    RAGPILOT_API_KEY = 'sk-...'   (generic)");
    eprintln!();
    eprintln!("  Or add `api_key` to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}

pub fn open_sessions(config: &AppConfig) -> Arc<FileSessionStore> {
    Arc::new(FileSessionStore::open(config.session.dir.clone()))
}

/// Build the agent: counter, retriever over the saved index, provider, sessions.
pub fn build_agent(config: &AppConfig) -> CliResult<QaAgent> {
    let counter = build_counter(&config.tokenizer);
    let retriever = KeywordRetriever::open(&config.index.path, counter.clone(), config.index.top_k)?;
    if retriever.index().tokenizer != counter.name() {
        debug!(
            index_tokenizer = %retriever.index().tokenizer,
            counter = counter.name(),
            "Index was built with a different counter; snippet costs are recounted"
        );
    }

    let router = build_from_config(config);
    let provider = router.default().ok_or("No default provider configured")?;

    let assembler = ContextAssembler::new(config.context.clone(), counter);
    let mut agent = QaAgent::new(
        provider,
        Arc::new(retriever),
        open_sessions(config),
        assembler,
        resolve_model(config),
    )
    .with_temperature(config.default_temperature);

    if let Some(prompt) = &config.system_prompt {
        agent = agent.with_system_prompt(prompt.clone());
    }
    Ok(agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_providers_need_no_key() {
        let config = AppConfig {
            default_provider: "ollama".into(),
            ..AppConfig::default()
        };
        assert!(require_api_key(&config).is_ok());
    }

    #[test]
    fn configured_key_is_accepted() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        assert!(require_api_key(&config).is_ok());
    }

    #[test]
    fn missing_index_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.index.path = dir.path().join("index.json");
        config.session.dir = dir.path().to_path_buf();

        let err = build_agent(&config).err().unwrap();
        assert!(err.to_string().contains("ragpilot index"));
    }
}
