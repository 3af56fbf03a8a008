//! `ragpilot config`: configuration management commands.

use std::path::{Path, PathBuf};

use ragpilot_config::{AppConfig, STATE_DIR};

use crate::runtime::CliResult;

fn project_config_path() -> PathBuf {
    Path::new(STATE_DIR).join("config.toml")
}

fn global_config_path() -> PathBuf {
    AppConfig::config_dir().join("config.toml")
}

pub async fn validate() -> CliResult<()> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("  ok  config parsed and validated");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push(format!(
                    "no API key for '{}' (set DEEPSEEK_API_KEY, OPENAI_API_KEY or RAGPILOT_API_KEY)",
                    config.default_provider
                ));
            }
            if config.context.reserved_response_tokens * 2 > config.context.total_context_window {
                warnings.push("more than half of the window is reserved for the response".into());
            }
            if !config.index.path.exists() {
                warnings.push(format!(
                    "no index at {} (run `ragpilot index`)",
                    config.index.path.display()
                ));
            }

            for w in &warnings {
                println!("  !!  {w}");
            }

            println!();
            println!("  Provider:  {}", config.default_provider);
            println!("  Model:     {}", ragpilot_providers::resolve_model(&config));
            println!(
                "  Window:    {} ({} reserved, history ratio {})",
                config.context.total_context_window,
                config.context.reserved_response_tokens,
                config.context.effective_history_ratio()
            );
            println!("  Tokenizer: {:?}", config.tokenizer.kind);
        }
        Err(e) => {
            println!("  error  {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> CliResult<()> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config.redacted())?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> CliResult<()> {
    let project = project_config_path();
    let marker = |p: &Path| if p.exists() { "" } else { " (missing)" };
    let global = global_config_path();
    println!("global   {}{}", global.display(), marker(&global));
    println!("project  {}{}", project.display(), marker(&project));
    Ok(())
}

pub async fn init(project: bool, force: bool) -> CliResult<()> {
    let path = if project {
        project_config_path()
    } else {
        global_config_path()
    };
    write_default(&path, force)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn write_default(path: &Path, force: bool) -> CliResult<()> {
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_paths_end_in_config_toml() {
        assert!(global_config_path().ends_with(".ragpilot/config.toml"));
        assert_eq!(project_config_path(), Path::new(".ragpilot/config.toml"));
    }

    #[test]
    fn init_writes_loadable_defaults_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        write_default(&path, false).unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_provider, "deepseek");

        assert!(write_default(&path, false).is_err());
        assert!(write_default(&path, true).is_ok());
    }
}
