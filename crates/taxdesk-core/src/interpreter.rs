//! Classification of backend query responses
//!
//! The analytics backend answers every question with a loosely shaped JSON
//! object whose `query_type` field says which agent produced it. [`interpret`]
//! turns any such value into a [`QueryResult`] and never fails: payloads it
//! cannot classify land in [`QueryResult::Unrecognized`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// A backend answer, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryResult {
    /// Answered from invoice data through a generated query.
    Structured {
        reasoning: Option<String>,
        answer: Option<String>,
        generated_query: Option<String>,
        /// Rows the generated query returned, when the backend includes them.
        #[serde(default)]
        rows: Vec<Value>,
    },
    /// Answered from GST rule retrieval.
    Unstructured {
        reasoning: Option<String>,
        answer: String,
    },
    /// Data retrieval and rule context combined into one analysis.
    Hybrid {
        reasoning: Option<String>,
        retrieval_query: Option<String>,
        context_rule: Option<String>,
        final_answer: String,
    },
    Error {
        message: String,
    },
    /// No recognized `query_type`. Rendered without a type-specific body.
    Unrecognized {
        query_type: Option<String>,
        reasoning: Option<String>,
    },
}

/// The classification tag of a [`QueryResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Structured,
    Unstructured,
    Hybrid,
    Error,
    Unrecognized,
}

impl QueryKind {
    /// Wire literal of the `query_type` discriminant, where there is one.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            QueryKind::Structured => Some("STRUCTURED_QUERY"),
            QueryKind::Unstructured => Some("UNSTRUCTURED_QUERY"),
            QueryKind::Hybrid => Some("HYBRID_QUERY"),
            QueryKind::Error | QueryKind::Unrecognized => None,
        }
    }

    /// Parse the wire literal of `query_type`.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "STRUCTURED_QUERY" => Some(QueryKind::Structured),
            "UNSTRUCTURED_QUERY" => Some(QueryKind::Unstructured),
            "HYBRID_QUERY" => Some(QueryKind::Hybrid),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            QueryKind::Structured => "STRUCTURED QUERY",
            QueryKind::Unstructured => "UNSTRUCTURED QUERY",
            QueryKind::Hybrid => "HYBRID QUERY",
            QueryKind::Error => "ERROR",
            QueryKind::Unrecognized => "UNCLASSIFIED",
        }
    }
}

impl QueryResult {
    pub fn kind(&self) -> QueryKind {
        match self {
            QueryResult::Structured { .. } => QueryKind::Structured,
            QueryResult::Unstructured { .. } => QueryKind::Unstructured,
            QueryResult::Hybrid { .. } => QueryKind::Hybrid,
            QueryResult::Error { .. } => QueryKind::Error,
            QueryResult::Unrecognized { .. } => QueryKind::Unrecognized,
        }
    }

    pub fn reasoning(&self) -> Option<&str> {
        match self {
            QueryResult::Structured { reasoning, .. }
            | QueryResult::Unstructured { reasoning, .. }
            | QueryResult::Hybrid { reasoning, .. }
            | QueryResult::Unrecognized { reasoning, .. } => reasoning.as_deref(),
            QueryResult::Error { .. } => None,
        }
    }
}

/// Read `key` as text. Null and empty strings are treated as absent; any
/// other non-string value is rendered as its JSON text.
fn text_field(obj: &Value, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Classify a backend response. Total: every input maps to exactly one variant.
///
/// Each field is read on its own, so a badly shaped sub-field never hides the
/// `error` or `query_type` discriminants.
pub fn interpret(raw: &Value) -> QueryResult {
    if let Some(message) = text_field(raw, "error") {
        return QueryResult::Error { message };
    }

    let query_type = text_field(raw, "query_type");
    let reasoning = text_field(raw, "reasoning");

    match query_type.as_deref().and_then(QueryKind::from_wire) {
        Some(QueryKind::Structured) => QueryResult::Structured {
            reasoning,
            answer: text_field(raw, "structured_answer"),
            generated_query: text_field(raw, "sql_query"),
            rows: match raw.get("query_result") {
                Some(Value::Array(rows)) => rows.clone(),
                _ => Vec::new(),
            },
        },
        Some(QueryKind::Unstructured) => QueryResult::Unstructured {
            reasoning,
            answer: text_field(raw, "rag_answer").unwrap_or_default(),
        },
        Some(QueryKind::Hybrid) => {
            // Anything but an object carries no steps
            let analysis = match raw.get("hybrid_analysis") {
                Some(obj @ Value::Object(_)) => obj,
                _ => &Value::Null,
            };
            QueryResult::Hybrid {
                reasoning,
                retrieval_query: text_field(analysis, "sql_used"),
                context_rule: text_field(analysis, "gst_rule_applied"),
                final_answer: text_field(analysis, "final_result").unwrap_or_default(),
            }
        }
        _ => {
            debug!(query_type = ?query_type, "unrecognized response, rendering unclassified");
            QueryResult::Unrecognized { query_type, reasoning }
        }
    }
}
