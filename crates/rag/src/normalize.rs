//! OCR-aware text normalization for German legal sources.
//!
//! The corpus was produced by automatic text recognition, which regularly
//! splits words into fragments (`"V ors atz"`) and statute abbreviations into
//! pieces (`"B GB"`). [`TextNormalizer`] repairs both before chunk text
//! reaches the model. The answer post-processor shares the same [`RuleTable`],
//! so both sides apply identical corrections.
//!
//! Steps, in order:
//! 1. abbreviation repair (case-sensitive, word-bounded)
//! 2. compound-word repair and generic fragment rejoining, repeated together
//!    until the text stops changing
//! 3. whitespace cleanup: collapse space runs, drop whitespace before closing
//!    punctuation, trim

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use paragraf_core::error::{RagError, Result};
use regex::{Captures, NoExpand, Regex};

/// Identifier of the built-in rule set. Bump when rules change so cached
/// normalized text can be invalidated.
pub const RULE_TABLE_VERSION: &str = "de-legal-ocr/1";

/// Upper bound on repair passes over one text.
const MAX_REPAIR_PASSES: usize = 8;

/// Longest fragment the generic rejoining step will absorb.
const MAX_CONTINUATION_CHARS: usize = 4;

const TERMINAL_PUNCTUATION: [char; 6] = ['.', ',', ';', ':', '!', '?'];

const ABBREVIATIONS: &[(&str, &str)] = &[
    (r"\bB\s+GB\b", "BGB"),
    (r"\bSt\s+GB\b", "StGB"),
    (r"\bH\s+GB\b", "HGB"),
    (r"\bG\s+G\b", "GG"),
    (r"\bZ\s+PO\b", "ZPO"),
    (r"\bSt\s+PO\b", "StPO"),
    (r"\bVw\s+VfG\b", "VwVfG"),
    (r"\bVw\s+GO\b", "VwGO"),
    (r"\bBG\s+B\b", "BGB"),
    (r"\bAbs\s+\.", "Abs."),
    (r"\bNr\s+\.", "Nr."),
    (r"\bArt\s+\.", "Art."),
];

/// Nouns are always capitalized in German, so their broken spellings map to
/// one canonical form.
const CANONICAL_COMPOUNDS: &[(&str, &[&str])] = &[
    ("Haftung", &["Haft", "ung"]),
    ("Vorsatz", &["V", "ors", "atz"]),
    ("Fahrlässigkeit", &["F", "ah", "rl", "äss", "ig", "keit"]),
    ("Tatbestand", &["Tat", "bestand"]),
    ("Rechtswidrigkeit", &["Rechts", "wid", "rig", "keit"]),
    ("Rechtsanwalt", &["Rechts", "anw", "alt"]),
    ("Vereinbarung", &["Verein", "barung"]),
    ("Verträge", &["Vertr", "äge"]),
    ("Begehung", &["Be", "geh", "ung"]),
    ("Strafmaß", &["Str", "af", "maß"]),
];

/// Adjective stems keep their case and inflection; only the gaps go.
const CONCATENATED_STEMS: &[&[&str]] = &[
    &["straf", "recht", "lich"],
    &["zivil", "recht", "lich"],
    &["rechts", "widrig"],
    &["vor", "sätz", "lich"],
    &["fahr", "lässig"],
    &["vertrag", "lich"],
];

/// Short function words that are real words, never OCR fragments.
const STOPWORDS: &[&str] = &[
    // German
    "ab", "aber", "als", "also", "am", "an", "auch", "auf", "aus", "bat", "bei", "bin", "bis",
    "bist", "da", "dann", "das", "dass", "daß", "dein", "dem", "den", "der", "des", "dich", "die",
    "dies", "dir", "doch", "du", "eben", "ein", "eine", "er", "erst", "es", "etwa", "euch", "euer",
    "fast", "frei", "für", "gab", "ganz", "gar", "geht", "gern", "gibt", "gilt", "gut", "hat",
    "hast", "her", "hier", "hin", "hoch", "ich", "ihm", "ihn", "ihr", "ihre", "im", "in", "ins",
    "ist", "ja", "je", "jede", "kam", "kann", "kaum", "kein", "lag", "lang", "las", "mag", "mal",
    "man", "mehr", "mein", "mir", "mit", "muss", "muß", "nach", "nah", "nein", "neu", "nie", "noch",
    "nun", "nur", "ob", "oder", "oft", "ohne", "per", "pro", "sah", "sagt", "sehr", "sei", "seid",
    "sein", "seit", "sich", "sie", "sind", "so", "soll", "tat", "tut", "um", "und", "uns", "vom",
    "von", "vor", "war", "was", "weg", "weil", "wem", "wen", "wer", "wie", "will", "wir", "wird",
    "wo", "wäre", "zu", "zum", "zur", "zwei", "drei", "vier", "darf", "denn", "dort", "ggf", "bzw",
    "usw", "vgl", "sog", "oben", "eins", "dazu", "bald", "wohl", "zwar", "eher", "dar", "los", "fest",
    "fort", "inne", "samt", "laut", "ca", "bzgl", "iVm", "mich", "alle", "viel", "wann", "weit",
    "kurz", "voll", "klar", "wahr", "habe", "ging", "nahm", "ließ", "fand", "bloß", "bar",
    "irrt", "lügt", "ruht", "lebt", "lief", "fiel", "hält", "rät", "lädt", "lies", "sieh",
    // Legal abbreviations, usually written with a trailing period
    "gem", "lit", "ff", "abs", "nr", "art", "bspw", "insb", "inkl", "zzgl", "evtl", "ggü", "ua",
    "uä", "zb", "sa", "idr", "ivm", "idf", "af", "nf", "hm", "rn", "rdnr", "aa", "str", "vorb",
    // English
    "a", "and", "are", "as", "at", "be", "but", "by", "do", "for", "from", "has", "have", "he",
    "her", "his", "i", "if", "is", "it", "its", "me", "my", "no", "not", "of", "on", "or", "our",
    "she", "than", "that", "the", "then", "they", "this", "to", "up", "us", "was", "we", "were",
    "what", "when", "who", "with", "you", "your",
];

/// How a compound rule rewrites its match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompoundRepair {
    /// Replace the whole fragmented word with this spelling
    Canonical(String),
    /// Strip the whitespace from the match, keeping case and any inflection
    /// suffix that follows the stem
    Concatenate,
}

#[derive(Debug, Clone)]
struct AbbreviationRule {
    pattern: Regex,
    replacement: String,
}

#[derive(Debug, Clone)]
struct CompoundRule {
    pattern: Regex,
    repair: CompoundRepair,
}

/// The ordered, versioned set of OCR repair rules.
#[derive(Debug, Clone)]
pub struct RuleTable {
    version: String,
    abbreviations: Vec<AbbreviationRule>,
    compounds: Vec<CompoundRule>,
    stopwords: HashSet<String>,
}

impl RuleTable {
    /// A table with no rules at all.
    pub fn empty(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            abbreviations: Vec::new(),
            compounds: Vec::new(),
            stopwords: HashSet::new(),
        }
    }

    /// The rules observed in the legal corpus.
    pub fn builtin() -> Result<Self> {
        let mut table = Self::empty(RULE_TABLE_VERSION);
        for (pattern, replacement) in ABBREVIATIONS {
            table.push_abbreviation(pattern, replacement)?;
        }
        for (canonical, fragments) in CANONICAL_COMPOUNDS {
            table.push_compound(fragments, CompoundRepair::Canonical((*canonical).to_string()))?;
        }
        for fragments in CONCATENATED_STEMS {
            table.push_compound(fragments, CompoundRepair::Concatenate)?;
        }
        for word in STOPWORDS {
            table.push_stopword(word);
        }
        Ok(table)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Append a case-sensitive regex rule; `replacement` is inserted literally.
    pub fn push_abbreviation(&mut self, pattern: &str, replacement: &str) -> Result<()> {
        self.abbreviations.push(AbbreviationRule {
            pattern: compile(pattern)?,
            replacement: replacement.to_string(),
        });
        Ok(())
    }

    /// Append a case-insensitive compound rule matching `fragments` separated
    /// by optional whitespace. Matches without any whitespace are left alone.
    pub fn push_compound(&mut self, fragments: &[&str], repair: CompoundRepair) -> Result<()> {
        let body = fragments
            .iter()
            .map(|f| regex::escape(f))
            .collect::<Vec<_>>()
            .join(r"\s*");
        let pattern = match &repair {
            CompoundRepair::Canonical(_) => format!(r"(?i)\b{body}\b"),
            CompoundRepair::Concatenate => format!(r"(?i)\b{body}\p{{Ll}}*\b"),
        };
        self.compounds.push(CompoundRule {
            pattern: compile(&pattern)?,
            repair,
        });
        Ok(())
    }

    /// Mark a word as never mergeable by the generic rejoining step.
    pub fn push_stopword(&mut self, word: &str) {
        self.stopwords.insert(word.to_lowercase());
    }

    /// Number of regex rules (abbreviations plus compounds).
    pub fn len(&self) -> usize {
        self.abbreviations.len() + self.compounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(&word.to_lowercase())
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| RagError::Config(format!("invalid normalizer rule '{pattern}': {e}")))
}

/// Applies a [`RuleTable`] to text. Cheap to clone; the table is shared.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    table: Arc<RuleTable>,
    space_runs: Regex,
    space_before_punctuation: Regex,
}

impl TextNormalizer {
    pub fn new(table: Arc<RuleTable>) -> Result<Self> {
        Ok(Self {
            table,
            space_runs: compile(r" {2,}")?,
            space_before_punctuation: compile(r"\s+([.,;:!?)])")?,
        })
    }

    /// A normalizer over [`RuleTable::builtin`].
    pub fn builtin() -> Result<Self> {
        Self::new(Arc::new(RuleTable::builtin()?))
    }

    pub fn rules(&self) -> &RuleTable {
        &self.table
    }

    /// Full normalization: word repair followed by whitespace cleanup.
    ///
    /// Total and idempotent: `normalize(normalize(x)) == normalize(x)`.
    pub fn normalize(&self, text: &str) -> String {
        let repaired = self.repair_words(text);
        let collapsed = self.space_runs.replace_all(&repaired, " ");
        let tightened = self.space_before_punctuation.replace_all(&collapsed, "$1");
        tightened.trim().to_string()
    }

    /// Abbreviation, compound and fragment repair without touching layout.
    /// Used on generated answers, whose markdown indentation must survive.
    pub fn repair_words(&self, text: &str) -> String {
        let mut current = self.repair_abbreviations(text);
        for _ in 0..MAX_REPAIR_PASSES {
            let next = self.merge_fragments(&self.repair_compounds(&current));
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn repair_abbreviations(&self, text: &str) -> String {
        self.table
            .abbreviations
            .iter()
            .fold(text.to_string(), |acc, rule| {
                rule.pattern
                    .replace_all(&acc, NoExpand(&rule.replacement))
                    .into_owned()
            })
    }

    fn repair_compounds(&self, text: &str) -> String {
        self.table.compounds.iter().fold(text.to_string(), |acc, rule| {
            rule.pattern
                .replace_all(&acc, |caps: &Captures<'_>| {
                    let matched = &caps[0];
                    if !matched.chars().any(char::is_whitespace) {
                        return matched.to_string();
                    }
                    match &rule.repair {
                        CompoundRepair::Canonical(word) => word.clone(),
                        CompoundRepair::Concatenate => {
                            matched.chars().filter(|c| !c.is_whitespace()).collect()
                        }
                    }
                })
                .into_owned()
        })
    }

    /// One left-to-right pass of generic rejoining. Each word keeps absorbing
    /// following fragments for as long as they qualify.
    fn merge_fragments(&self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;

        while i < chars.len() {
            if !chars[i].is_alphabetic() {
                out.push(chars[i]);
                i += 1;
                continue;
            }

            let end = skip(&chars, i, char::is_alphabetic);
            let mut word: String = chars[i..end].iter().collect();
            i = end;
            while let Some(fragment) = self.continuation(&word, &chars, i) {
                word.extend(&chars[fragment.clone()]);
                i = fragment.end;
            }
            out.push_str(&word);
        }
        out
    }

    /// The char range of the fragment `word` may absorb at position `at`.
    ///
    /// A fragment is a lowercase, non-stopword run of at most
    /// [`MAX_CONTINUATION_CHARS`] letters, separated from `word` by horizontal
    /// whitespace and followed by another lowercase word or terminal
    /// punctuation.
    fn continuation(&self, word: &str, chars: &[char], at: usize) -> Option<Range<usize>> {
        if self.table.is_stopword(word) {
            return None;
        }

        let start = skip(chars, at, is_horizontal_space);
        if start == at {
            return None;
        }
        let end = skip(chars, start, char::is_alphabetic);
        let fragment = &chars[start..end];
        if fragment.is_empty()
            || fragment.len() > MAX_CONTINUATION_CHARS
            || !fragment.iter().all(|c| c.is_lowercase())
            || chars.get(end).is_some_and(|c| c.is_alphanumeric())
        {
            return None;
        }
        if self.table.is_stopword(&fragment.iter().collect::<String>()) {
            return None;
        }

        let next = skip(chars, end, char::is_whitespace);
        chars
            .get(next)
            .is_some_and(|&c| TERMINAL_PUNCTUATION.contains(&c) || c.is_lowercase())
            .then_some(start..end)
    }
}

fn is_horizontal_space(c: char) -> bool {
    c.is_whitespace() && c != '\n' && c != '\r'
}

/// Index of the first char at or after `from` that fails `pred`.
fn skip(chars: &[char], from: usize, pred: impl Fn(char) -> bool) -> usize {
    chars[from..]
        .iter()
        .position(|&c| !pred(c))
        .map_or(chars.len(), |p| from + p)
}
