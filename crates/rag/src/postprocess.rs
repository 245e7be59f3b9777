//! Cleanup applied to complete model answers.
//!
//! The model copies OCR damage and loose markdown from its sources. Fixing
//! that needs the whole answer, since a fragment boundary can split a word or
//! a `**` pair, so this never runs on individual stream fragments.

use paragraf_core::error::{RagError, Result};
use regex::{Captures, Regex};

use crate::normalize::TextNormalizer;

/// Repairs bold spacing, numbered-list spacing and OCR word breaks.
#[derive(Debug, Clone)]
pub struct AnswerPostProcessor {
    normalizer: TextNormalizer,
    bold: Regex,
    list_number: Regex,
}

impl AnswerPostProcessor {
    pub fn new(normalizer: TextNormalizer) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| RagError::Config(format!("invalid post-processing pattern '{pattern}': {e}")))
        };
        Ok(Self {
            normalizer,
            bold: compile(r"\*\*([^*\n]+?)\*\*")?,
            list_number: compile(r"(\d+)[ \t]+\.")?,
        })
    }

    pub fn process(&self, answer: &str) -> String {
        let bold = self.bold.replace_all(answer, |caps: &Captures<'_>| {
            let inner = caps[1].trim();
            if inner.is_empty() {
                caps[0].to_string()
            } else {
                format!("**{inner}**")
            }
        });
        let lists = self.list_number.replace_all(&bold, "$1.");
        self.normalizer.repair_words(&lists)
    }
}
