use serde::{Deserialize, Serialize};

/// One retrieval hit. `score` is the provider's similarity score in [0, 1];
/// providers return hits ordered descending by score, ties in provider order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub title: String,
    pub snippet: String,
    pub source_url: String,
    pub score: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectReason {
    NoDocuments,
    LowConfidence,
    RetrievalFailed,
}

impl DirectReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            DirectReason::NoDocuments => "no_documents",
            DirectReason::LowConfidence => "low_confidence",
            DirectReason::RetrievalFailed => "retrieval_failed",
        }
    }
}

/// Computed exactly once per query; attached to the response for
/// observability.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutingDecision {
    UseRag {
        avg_confidence: f32,
        context: Vec<RetrievedDocument>,
    },
    UseDirect {
        reason: DirectReason,
    },
}

impl RoutingDecision {
    pub fn label(&self) -> &'static str {
        match self {
            RoutingDecision::UseRag { .. } => "rag",
            RoutingDecision::UseDirect { .. } => "direct",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RoutedAnswer {
    pub answer: String,
    pub decision: RoutingDecision,
    /// Populated only for `UseRag`, for client-side citation display.
    pub sources: Vec<RetrievedDocument>,
}
