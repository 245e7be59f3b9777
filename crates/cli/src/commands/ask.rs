//! `paragraf ask`: answer a question from retrieved sources.

use std::io::Write;
use std::path::{Path, PathBuf};

use futures::{Stream, StreamExt};

use super::{RetrievalArgs, build_pipeline, load_config, load_history, print_sources};

pub struct AskArgs {
    pub query: String,
    pub stream: bool,
    pub history: Option<PathBuf>,
    pub json: bool,
    pub retrieval: RetrievalArgs,
}

pub async fn run(config_path: &Path, args: AskArgs) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let options = args.retrieval.options()?;
    let history = match &args.history {
        Some(path) => load_history(path)?,
        None => Vec::new(),
    };
    let pipeline = build_pipeline(&config, args.retrieval.corpus.as_deref()).await?;

    if args.stream {
        let mut stream = pipeline.run_stream(&args.query, &history, &options).await?;
        let outcome = relay(&mut stream.fragments, &mut std::io::stdout()).await;
        println!("\n");
        println!("📚 Quellen:");
        print_sources(&stream.sources);
        return outcome;
    }

    let result = pipeline.run(&args.query, &history, &options).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}\n", result.answer);
    println!("📚 Quellen ({} Tokens Kontext):", result.context_tokens);
    print_sources(&result.sources);
    Ok(())
}

/// Copy fragments to `out` as they arrive. Stops at the first failure.
async fn relay<S, W>(fragments: &mut S, out: &mut W) -> anyhow::Result<()>
where
    S: Stream<Item = paragraf_core::Result<String>> + Unpin,
    W: Write,
{
    while let Some(fragment) = fragments.next().await {
        write!(out, "{}", fragment?)?;
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use paragraf_core::{FragmentStream, ProviderError, StreamEvent};

    #[tokio::test]
    async fn relay_writes_fragments_up_to_a_failure() {
        let mut stream = FragmentStream::from_events(
            "test",
            vec![
                Ok(StreamEvent::Fragment("Nach ".into())),
                Ok(StreamEvent::Fragment("§ 823".into())),
                Err(ProviderError::StreamInterrupted("connection reset".into())),
            ],
        );
        let mut out = Vec::new();

        let err = relay(&mut stream, &mut out).await.unwrap_err();
        assert_eq!(String::from_utf8(out).unwrap(), "Nach § 823");
        let err = err.downcast::<paragraf_core::RagError>().unwrap();
        assert_eq!(err.kind(), "generation");
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn relay_copies_a_complete_stream() {
        let mut stream = FragmentStream::from_fragments("test", vec!["Ja".into(), ".".into()]);
        let mut out = Vec::new();
        relay(&mut stream, &mut out).await.unwrap();
        assert_eq!(out, b"Ja.");
    }
}
