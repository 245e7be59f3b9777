//! `paragraf search`: show what a question would retrieve.

use std::path::Path;

use super::{RetrievalArgs, build_pipeline, load_config, print_sources};

pub async fn run(config_path: &Path, query: &str, json: bool, retrieval: &RetrievalArgs) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let options = retrieval.options()?;
    let pipeline = build_pipeline(&config, retrieval.corpus.as_deref()).await?;

    let chunks = pipeline.search_only(query, &options).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    println!("🔍 {} Treffer für \"{query}\"", chunks.len());
    print_sources(&chunks);
    for chunk in &chunks {
        println!("\n--- {} ---\n{}", chunk.source_display(), chunk.content);
    }
    Ok(())
}
