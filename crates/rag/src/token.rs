//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. This stays
//! close enough to the chat model's BPE encoding for context budgeting, and
//! keeps budgets deterministic across platforms.

/// Counts tokens under a named, versioned scheme.
pub trait TokenCounter: Send + Sync {
    /// Scheme identifier, e.g. `"chars-per-token-4/v1"`.
    fn scheme(&self) -> &str;

    /// Token count of `text`. Appending non-empty text never lowers it.
    fn count(&self, text: &str) -> usize;
}

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up. Counts chars, not bytes,
/// so umlauts cost the same as ASCII letters.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.chars().count().div_ceil(4)
}

/// The shipped [`TokenCounter`], backed by [`estimate_tokens`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CharHeuristicCounter;

impl CharHeuristicCounter {
    pub const SCHEME: &'static str = "chars-per-token-4/v1";
}

impl TokenCounter for CharHeuristicCounter {
    fn scheme(&self) -> &str {
        Self::SCHEME
    }

    fn count(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn umlauts_count_as_single_chars() {
        // 4 chars, 8 bytes
        assert_eq!(estimate_tokens("äöüß"), 1);
    }

    #[test]
    fn counter_reports_scheme() {
        let counter = CharHeuristicCounter;
        assert_eq!(counter.scheme(), "chars-per-token-4/v1");
        assert_eq!(counter.count("§ 823 BGB"), 3);
    }

    proptest! {
        #[test]
        fn appending_never_decreases(a in "\\PC{0,200}", b in "\\PC{1,50}") {
            let counter = CharHeuristicCounter;
            let joined = format!("{a}{b}");
            prop_assert!(counter.count(&joined) >= counter.count(&a));
        }
    }
}
