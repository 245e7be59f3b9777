//! Retrieved document chunks and the metadata predicate used to filter them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A retrievable unit of source text with its relevance score.
///
/// Chunks are produced by a [`Retriever`](crate::retriever::Retriever) and are
/// read-only from that point on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Opaque unique identifier (a UUID for the pgvector backend)
    pub id: String,

    /// The raw chunk text as stored in the corpus
    pub content: String,

    /// Arbitrary metadata (title, section, court, date, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Similarity to the query, always within `[0, 1]`
    #[serde(default)]
    pub similarity: f32,
}

impl DocumentChunk {
    /// Create a chunk, clamping `similarity` into `[0, 1]`.
    ///
    /// Cosine distance can produce values slightly outside the unit range
    /// (and NaN for zero vectors); those are clamped, NaN becomes 0.
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        metadata: Map<String, Value>,
        similarity: f32,
    ) -> Self {
        let similarity = if similarity.is_nan() {
            0.0
        } else {
            similarity.clamp(0.0, 1.0)
        };
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
            similarity,
        }
    }

    /// Human-readable label: `"title – section"`, either one alone, or
    /// `"Dokument #id"` when neither is present.
    pub fn source_display(&self) -> String {
        let title = self.metadata_str("title");
        let section = self.metadata_str("section");
        match (title, section) {
            (Some(t), Some(s)) => format!("{t} – {s}"),
            (Some(t), None) => t.to_string(),
            (None, Some(s)) => s.to_string(),
            (None, None) => format!("Dokument #{}", self.id),
        }
    }

    /// Look up a non-empty string metadata value.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Structural containment predicate over chunk metadata.
///
/// Mirrors PostgreSQL's `jsonb @>` operator so the in-memory retriever and the
/// pgvector retriever agree on which chunks a filter admits:
/// - objects: every filter key must exist and its value must be contained;
/// - arrays: every filter element must be contained in some element;
/// - scalars: equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataFilter(pub Map<String, Value>);

impl MetadataFilter {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Parse a filter from a JSON object literal.
    pub fn from_json(raw: &str) -> Result<Self, String> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(format!("metadata filter must be a JSON object, got {other}")),
            Err(e) => Err(format!("invalid metadata filter JSON: {e}")),
        }
    }

    /// Builder-style helper for a single key/value constraint.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `metadata` contains every constraint in this filter.
    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.0
            .iter()
            .all(|(k, want)| metadata.get(k).is_some_and(|have| contains(have, want)))
    }

    /// The filter as a JSON document (bound as `jsonb` by the SQL backend).
    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// `jsonb @>` below the root: objects and arrays recurse, scalars compare
/// equal. An array never contains a bare scalar, and a scalar element never
/// matches inside a nested array.
fn contains(have: &Value, want: &Value) -> bool {
    match (have, want) {
        (Value::Object(h), Value::Object(w)) => w
            .iter()
            .all(|(k, wv)| h.get(k).is_some_and(|hv| contains(hv, wv))),
        (Value::Array(h), Value::Array(w)) => {
            w.iter().all(|wv| h.iter().any(|hv| contains(hv, wv)))
        }
        (h, w) => h == w,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn source_display_prefers_title_and_section() {
        let c = DocumentChunk::new(
            "1",
            "text",
            meta(json!({"title": "BGB", "section": "§ 823"})),
            0.9,
        );
        assert_eq!(c.source_display(), "BGB – § 823");
    }

    #[test]
    fn source_display_falls_back() {
        let title_only = DocumentChunk::new("1", "t", meta(json!({"title": "StGB"})), 0.5);
        assert_eq!(title_only.source_display(), "StGB");

        let section_only = DocumentChunk::new("1", "t", meta(json!({"section": "Art. 1"})), 0.5);
        assert_eq!(section_only.source_display(), "Art. 1");

        let bare = DocumentChunk::new("abc-123", "t", Map::new(), 0.5);
        assert_eq!(bare.source_display(), "Dokument #abc-123");
    }

    #[test]
    fn blank_title_is_ignored() {
        let c = DocumentChunk::new("7", "t", meta(json!({"title": "  ", "section": 4})), 0.5);
        assert_eq!(c.source_display(), "Dokument #7");
    }

    #[test]
    fn similarity_is_clamped() {
        assert_eq!(DocumentChunk::new("a", "", Map::new(), 1.2).similarity, 1.0);
        assert_eq!(DocumentChunk::new("a", "", Map::new(), -0.1).similarity, 0.0);
        assert_eq!(DocumentChunk::new("a", "", Map::new(), f32::NAN).similarity, 0.0);
    }

    #[test]
    fn filter_matches_nested_objects_and_arrays() {
        let m = meta(json!({
            "court": "BGH",
            "tags": ["zivilrecht", "haftung"],
            "source": {"kind": "urteil", "year": 2020}
        }));

        assert!(MetadataFilter::default().matches(&m));
        assert!(MetadataFilter::default().with("court", "BGH").matches(&m));
        assert!(MetadataFilter::default().with("tags", json!(["haftung"])).matches(&m));
        assert!(
            MetadataFilter::default()
                .with("source", json!({"kind": "urteil"}))
                .matches(&m)
        );

        assert!(!MetadataFilter::default().with("court", "BVerfG").matches(&m));
        assert!(!MetadataFilter::default().with("missing", 1).matches(&m));
        assert!(!MetadataFilter::default().with("tags", json!(["strafrecht"])).matches(&m));
        assert!(!MetadataFilter::default().with("tags", "zivilrecht").matches(&m));
        assert!(
            !MetadataFilter::default()
                .with("source", json!({"year": 2021}))
                .matches(&m)
        );
    }

    #[test]
    fn filter_keeps_array_nesting_levels_apart() {
        let m = meta(json!({
            "nested": [[1, 2], {"art": "urteil", "jahr": 2020}],
            "flat": [1, 2]
        }));

        assert!(!MetadataFilter::default().with("nested", json!([1])).matches(&m));
        assert!(MetadataFilter::default().with("nested", json!([[1]])).matches(&m));
        assert!(MetadataFilter::default().with("nested", json!([{"art": "urteil"}])).matches(&m));
        assert!(!MetadataFilter::default().with("flat", 1).matches(&m));
        assert!(MetadataFilter::default().with("flat", json!([2, 1])).matches(&m));
    }

    #[test]
    fn filter_from_json_rejects_non_objects() {
        assert!(MetadataFilter::from_json(r#"{"court":"BGH"}"#).is_ok());
        assert!(MetadataFilter::from_json("[1,2]").is_err());
        assert!(MetadataFilter::from_json("{oops").is_err());
    }
}
