//! Subcommand implementations and the wiring they share.

pub mod ask;
pub mod config_cmd;
pub mod doctor;
pub mod normalize;
pub mod search;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use paragraf_config::AppConfig;
use paragraf_core::{ConversationMessage, DocumentChunk, MetadataFilter, Retriever};
use paragraf_rag::{PipelineSettings, RagPipeline, RetrievalOptions};
use paragraf_retrieval::{InMemoryRetriever, PgVectorRetriever};

/// Retrieval flags shared by `ask` and `search`.
#[derive(Debug, Clone, Default, Args)]
pub struct RetrievalArgs {
    /// Number of chunks to retrieve (default: rag.retrieval_top_k)
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Minimum similarity in [0, 1] (default: rag.similarity_threshold)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Metadata containment filter as a JSON object, e.g. '{"title":"BGB"}'
    #[arg(long)]
    pub filter: Option<String>,

    /// Search a JSON corpus file instead of the database
    #[arg(long)]
    pub corpus: Option<PathBuf>,
}

impl RetrievalArgs {
    pub fn options(&self) -> anyhow::Result<RetrievalOptions> {
        let mut options = RetrievalOptions::default();
        if let Some(top_k) = self.top_k {
            options = options.with_top_k(top_k);
        }
        if let Some(threshold) = self.threshold {
            anyhow::ensure!(
                (0.0..=1.0).contains(&threshold),
                "--threshold must be between 0.0 and 1.0, got {threshold}"
            );
            options = options.with_threshold(threshold);
        }
        if let Some(raw) = &self.filter {
            let filter = MetadataFilter::from_json(raw).map_err(anyhow::Error::msg)?;
            options = options.with_filter(filter);
        }
        Ok(options)
    }
}

/// Load, override from the environment, and validate.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::load_from(path).with_context(|| format!("loading config from {}", path.display()))
}

/// The retriever the flags ask for: a JSON corpus, or pgvector.
pub async fn build_retriever(config: &AppConfig, corpus: Option<&Path>) -> anyhow::Result<Arc<dyn Retriever>> {
    if let Some(path) = corpus {
        return Ok(Arc::new(InMemoryRetriever::load_json(path).await?));
    }

    let url = config
        .database
        .url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .context("database.url (DATABASE_URL) is not set; pass --corpus to search a JSON file instead")?;
    let retriever = PgVectorRetriever::connect(url, config.database.max_connections, &config.database.table).await?;
    Ok(Arc::new(retriever))
}

/// Wire embedder, retriever and provider into a pipeline.
pub async fn build_pipeline(config: &AppConfig, corpus: Option<&Path>) -> anyhow::Result<RagPipeline> {
    let embedder = paragraf_providers::build_embedder(config)?;
    let provider = paragraf_providers::build_generation_provider(config)?;
    let retriever = build_retriever(config, corpus).await?;

    tracing::info!(
        environment = %config.environment,
        provider = provider.name(),
        retriever = retriever.name(),
        "Pipeline ready"
    );
    Ok(RagPipeline::new(embedder, retriever, provider, PipelineSettings::from(&config.rag))?)
}

/// Read prior turns from a JSON array file.
pub fn load_history(path: &Path) -> anyhow::Result<Vec<ConversationMessage>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading history {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing history {}", path.display()))
}

/// Print ranked sources the way both `ask` and `search` show them.
pub fn print_sources(sources: &[DocumentChunk]) {
    if sources.is_empty() {
        println!("   (keine Quellen gefunden)");
        return;
    }
    for (i, chunk) in sources.iter().enumerate() {
        println!(
            "   {}. {} ({:.0}%)",
            i + 1,
            chunk.source_display(),
            f64::from(chunk.similarity) * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_to_none() {
        let options = RetrievalArgs::default().options().unwrap();
        assert_eq!(options.top_k, None);
        assert_eq!(options.similarity_threshold, None);
        assert!(options.metadata_filter.is_none());
    }

    #[test]
    fn options_carry_flags() {
        let args = RetrievalArgs {
            top_k: Some(3),
            threshold: Some(0.5),
            filter: Some(r#"{"title":"StGB"}"#.into()),
            corpus: None,
        };
        let options = args.options().unwrap();
        assert_eq!(options.top_k, Some(3));
        assert_eq!(options.similarity_threshold, Some(0.5));
        assert_eq!(
            options.metadata_filter,
            Some(MetadataFilter::default().with("title", "StGB"))
        );
    }

    #[test]
    fn rejects_bad_filter_and_threshold() {
        let bad_filter = RetrievalArgs {
            filter: Some("[1, 2]".into()),
            ..Default::default()
        };
        assert!(bad_filter.options().is_err());

        let bad_threshold = RetrievalArgs {
            threshold: Some(1.5),
            ..Default::default()
        };
        assert!(bad_threshold.options().is_err());
    }

    #[test]
    fn history_file_parses_roles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(
            &path,
            r#"[{"role":"user","content":"Was ist § 433?"},{"role":"assistant","content":"Kaufvertrag."}]"#,
        )
        .unwrap();

        let history = load_history(&path).unwrap();
        assert_eq!(
            history,
            vec![
                ConversationMessage::user("Was ist § 433?"),
                ConversationMessage::assistant("Kaufvertrag."),
            ]
        );
    }

    #[test]
    fn history_rejects_system_turns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, r#"[{"role":"system","content":"x"}]"#).unwrap();
        assert!(load_history(&path).is_err());
    }

    #[tokio::test]
    async fn database_is_required_without_corpus() {
        let err = build_retriever(&AppConfig::default(), None).await.err().unwrap();
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
