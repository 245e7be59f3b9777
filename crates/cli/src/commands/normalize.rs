//! `paragraf normalize`: run the OCR normalizer over a piece of text.

use paragraf_rag::{TextNormalizer, estimate_tokens};

pub fn run(text: &str) -> anyhow::Result<()> {
    let normalizer = TextNormalizer::builtin()?;
    let normalized = normalizer.normalize(text);

    println!("{normalized}");
    eprintln!(
        "rules {} | {} → {} chars | ~{} tokens",
        normalizer.rules().version(),
        text.chars().count(),
        normalized.chars().count(),
        estimate_tokens(&normalized)
    );
    Ok(())
}
