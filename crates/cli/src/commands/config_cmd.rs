//! `chatkit config`: Configuration management commands.

use chatkit_config::{AppConfig, BackendKind};

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = config_warnings(&config);
            let backend = &config.backend;

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Backend:   {}", backend.kind);
            println!("   Base URL:  {}", backend.base_url);
            println!("   Roots:     {}", config.dispatch.progress_roots.join(", "));
            println!("   Hidden:    {}", config.dispatch.hidden_skills.join(", "));
            println!("   Timeout:   {}s", config.stream.turn_timeout_secs);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Settings that load fine but will likely fail or surprise at run time.
fn config_warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    let backend = &config.backend;

    if backend.token.is_none() {
        warnings.push("No token set (set CHATKIT_TOKEN env var)");
    }
    if backend.kind == BackendKind::Dip && backend.agent_key.is_none() {
        warnings.push("backend.agent_key is required for the dip backend");
    }
    if backend.kind == BackendKind::Dip && backend.agent_id.is_none() {
        warnings.push("backend.agent_id is not set");
    }
    if backend.kind == BackendKind::Coze && backend.bot_id.is_none() {
        warnings.push("backend.bot_id is required for the coze backend");
    }
    if config.stream.turn_timeout_secs == 0 {
        warnings.push("stream.turn_timeout_secs = 0: turns never time out");
    }
    warnings
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.backend.token.is_some() {
        config.backend.token = Some("[REDACTED]".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if config_path.exists() && !force {
        println!("⚠️  {} already exists (use --force to overwrite)", config_path.display());
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Wrote {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dip_warns_about_each_missing_id() {
        let mut config = AppConfig::default();
        config.backend.kind = BackendKind::Dip;
        config.backend.token = Some("t".into());
        config.backend.agent_key = None;
        config.backend.agent_id = None;

        let warnings = config_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("agent_key")));
        assert!(warnings.iter().any(|w| w.contains("agent_id")));
    }

    #[test]
    fn complete_coze_config_has_no_warnings() {
        let mut config = AppConfig::default();
        config.backend.kind = BackendKind::Coze;
        config.backend.token = Some("t".into());
        config.backend.bot_id = Some("bot".into());
        config.stream.turn_timeout_secs = 30;

        assert!(config_warnings(&config).is_empty());
    }
}
