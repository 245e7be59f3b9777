//! `paragraf config`: configuration management commands.

use std::path::Path;

use anyhow::Context;
use paragraf_config::AppConfig;

const REDACTED: &str = "[REDACTED]";

pub fn validate(config_path: &Path) -> anyhow::Result<()> {
    println!("🔍 Validating {} ...", config_path.display());

    match AppConfig::load_from(config_path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:    {}", config.llm_provider);
            println!("   Environment: {}", config.environment);
            println!("   Table:       {}", config.database.table);
            println!(
                "   Retrieval:   top_k={} threshold={}",
                config.rag.retrieval_top_k, config.rag.similarity_threshold
            );
            println!(
                "   Context:     {} tokens, {} turns",
                config.rag.max_context_tokens, config.rag.max_conversation_turns
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Problems that do not stop the config from loading but will stop a query.
fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if config.azure.endpoint.is_none() || config.azure.api_key.is_none() {
        warnings.push("Azure endpoint or key missing; embeddings need AZURE_OPENAI_ENDPOINT and AZURE_OPENAI_API_KEY");
    }
    if config.llm_provider.eq_ignore_ascii_case("gemini") && config.gemini.api_key.is_none() {
        warnings.push("llm_provider is gemini but GOOGLE_API_KEY is not set");
    }
    if config.database.url.is_none() {
        warnings.push("No database url (DATABASE_URL); only --corpus searches will work");
    }

    warnings
}

pub fn show(config_path: &Path) -> anyhow::Result<()> {
    let config = redacted(AppConfig::load_from(config_path).context("Failed to load config")?);
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn redacted(mut config: AppConfig) -> AppConfig {
    for secret in [
        &mut config.database.url,
        &mut config.azure.api_key,
        &mut config.gemini.api_key,
    ] {
        if secret.is_some() {
            *secret = Some(REDACTED.into());
        }
    }
    config
}

pub fn path(config_path: &Path) {
    println!("{}", config_path.display());
}

pub fn init(config_path: &Path, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", config_path.display());
    }
    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    std::fs::write(config_path, AppConfig::default_toml())
        .with_context(|| format!("writing {}", config_path.display()))?;

    println!("✅ Wrote default config to {}", config_path.display());
    println!("   Set AZURE_OPENAI_ENDPOINT, AZURE_OPENAI_API_KEY and DATABASE_URL, or edit the file.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_hides_every_secret() {
        let mut config = AppConfig::default();
        config.database.url = Some("postgres://user:pw@db/legal".into());
        config.azure.api_key = Some("azure-secret".into());

        let rendered = toml::to_string_pretty(&redacted(config)).unwrap();
        assert!(!rendered.contains("azure-secret"));
        assert!(!rendered.contains("pw@db"));
        assert!(rendered.contains(REDACTED));
        assert!(!rendered.contains("[gemini]\napi_key"));
    }

    #[test]
    fn init_writes_a_loadable_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        init(&path, false).unwrap();
        let parsed = AppConfig::read_file(&path).unwrap();
        assert_eq!(parsed.rag.retrieval_top_k, 8);

        assert!(init(&path, false).is_err());
        assert!(init(&path, true).is_ok());
    }

    #[test]
    fn warns_about_missing_credentials() {
        let mut config = AppConfig::default();
        config.llm_provider = "gemini".into();
        let found = warnings(&config);
        assert_eq!(found.len(), 3);

        config.azure.endpoint = Some("https://x.openai.azure.com".into());
        config.azure.api_key = Some("k".into());
        config.gemini.api_key = Some("g".into());
        config.database.url = Some("postgres://localhost/legal".into());
        assert!(warnings(&config).is_empty());
    }
}
