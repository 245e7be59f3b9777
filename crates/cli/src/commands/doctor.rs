//! `paragraf doctor`: diagnose configuration and connectivity.

use std::path::Path;

use paragraf_config::AppConfig;
use paragraf_retrieval::PgVectorRetriever;

pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    println!("🩺 Paragraf Doctor: System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ⚠️  No config file at {}; using defaults and environment", config_path.display());
    }

    let config = match AppConfig::load_from(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid (provider: {})", config.llm_provider);
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    match paragraf_providers::build_embedder(&config) {
        Ok(embedder) => println!("  ✅ Embedder ready ({}, {} dims)", embedder.name(), embedder.dimensions()),
        Err(e) => {
            println!("  ❌ Embedder: {e}");
            issues += 1;
        }
    }

    match paragraf_providers::build_generation_provider(&config) {
        Ok(provider) => println!("  ✅ Generation provider ready ({} / {})", provider.name(), provider.model()),
        Err(e) => {
            println!("  ❌ Generation provider: {e}");
            issues += 1;
        }
    }

    match config.database.url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => match PgVectorRetriever::connect(url, 1, &config.database.table).await {
            Ok(retriever) => match retriever.ping().await {
                Ok(()) => println!("  ✅ Database reachable (table: {})", config.database.table),
                Err(e) => {
                    println!("  ❌ Database query failed: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Database unreachable: {e}");
                issues += 1;
            }
        },
        None => {
            println!("  ⚠️  No database url; only --corpus searches will work");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
