use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::RagError;
use crate::generation::GenerationClient;
use crate::model::{DirectReason, RetrievedDocument, RoutedAnswer, RoutingDecision};
use crate::retrieval::RetrievalClient;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.3;
pub const DEFAULT_SIMILARITY_TOP_K: usize = 5;

const EMPTY_ANSWER_FALLBACK: &str =
    "I apologize, but I'm unable to generate a response at this time.";

#[derive(Clone, Copy, Debug)]
pub struct RouterConfig {
    pub confidence_threshold: f32,
    pub similarity_top_k: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            similarity_top_k: DEFAULT_SIMILARITY_TOP_K,
        }
    }
}

/// Decides, per query, whether the generation prompt is enriched with
/// retrieved context or sent bare, based on mean similarity of the top-k
/// hits. Retrieval problems degrade to the direct path; only generation
/// failure is surfaced to the caller, since direct generation is already the
/// bottom of the fallback chain.
pub struct ConfidenceRouter {
    retrieval: Arc<dyn RetrievalClient>,
    generation: Arc<dyn GenerationClient>,
    config: RouterConfig,
}

impl ConfidenceRouter {
    pub fn new(
        retrieval: Arc<dyn RetrievalClient>,
        generation: Arc<dyn GenerationClient>,
        config: RouterConfig,
    ) -> Self {
        Self {
            retrieval,
            generation,
            config,
        }
    }

    pub async fn route(&self, query: &str) -> Result<RoutedAnswer, RagError> {
        let decision = self.decide(query).await;
        match &decision {
            RoutingDecision::UseRag { avg_confidence, .. } => info!(
                decision = decision.label(),
                avg_confidence,
                threshold = self.config.confidence_threshold,
                "routing decision computed"
            ),
            RoutingDecision::UseDirect { reason } => info!(
                decision = decision.label(),
                reason = reason.as_str(),
                threshold = self.config.confidence_threshold,
                "routing decision computed"
            ),
        }

        let prompt = match &decision {
            RoutingDecision::UseRag { context, .. } => build_context_prompt(query, context),
            RoutingDecision::UseDirect { .. } => query.to_string(),
        };

        let raw = self.generation.generate(&prompt).await?;
        let generated = !raw.trim().is_empty();
        let answer = match raw.trim() {
            "" => {
                warn!("generation returned an empty answer, substituting fallback text");
                EMPTY_ANSWER_FALLBACK.to_string()
            }
            trimmed => trimmed.to_string(),
        };

        // Direct answers are written back to the index so future queries can
        // retrieve them. Best-effort, and only for text the generator
        // actually produced.
        if generated && matches!(decision, RoutingDecision::UseDirect { .. }) {
            if let Err(err) = self.retrieval.index_answer(query, &answer).await {
                warn!(error = %err, "failed to index direct answer");
            } else {
                debug!("direct answer indexed for future retrieval");
            }
        }

        let sources = match &decision {
            RoutingDecision::UseRag { context, .. } => context.clone(),
            RoutingDecision::UseDirect { .. } => Vec::new(),
        };

        Ok(RoutedAnswer {
            answer,
            decision,
            sources,
        })
    }

    /// The decision is computed exactly once per query and is deterministic
    /// given the same retrieval results and threshold. Documents are never
    /// re-sorted here; ranking belongs to the retrieval provider.
    async fn decide(&self, query: &str) -> RoutingDecision {
        let docs = match self.retrieval.retrieve(query, self.config.similarity_top_k).await {
            Ok(docs) => docs,
            Err(err) => {
                warn!(error = %err, "retrieval failed, routing direct");
                return RoutingDecision::UseDirect {
                    reason: DirectReason::RetrievalFailed,
                };
            }
        };

        if docs.is_empty() {
            debug!("retrieval returned no documents, routing direct");
            return RoutingDecision::UseDirect {
                reason: DirectReason::NoDocuments,
            };
        }

        let avg_confidence =
            docs.iter().map(|doc| doc.score).sum::<f32>() / docs.len() as f32;
        // The threshold is inclusive: meeting it exactly counts as confident.
        if avg_confidence >= self.config.confidence_threshold {
            RoutingDecision::UseRag {
                avg_confidence,
                context: docs,
            }
        } else {
            debug!(
                avg_confidence,
                threshold = self.config.confidence_threshold,
                "below confidence threshold, routing direct"
            );
            RoutingDecision::UseDirect {
                reason: DirectReason::LowConfidence,
            }
        }
    }
}

/// Context snippets are concatenated highest-score first, exactly in the
/// order the retrieval provider ranked them.
fn build_context_prompt(query: &str, context: &[RetrievedDocument]) -> String {
    let mut prompt = String::from(
        "Answer the question using the context below. \
         If the context is not relevant, answer from general knowledge.\n\nContext:\n",
    );
    for (index, doc) in context.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}: {}\n", index + 1, doc.title, doc.snippet));
    }
    prompt.push_str(&format!("\nQuestion: {query}"));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::StaticRetrieval;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct FailingRetrieval;

    #[async_trait]
    impl RetrievalClient for FailingRetrieval {
        async fn retrieve(
            &self,
            _query: &str,
            _top_k: usize,
        ) -> Result<Vec<RetrievedDocument>, RagError> {
            Err(RagError::retrieval_unavailable("vector store timeout"))
        }

        async fn index_answer(&self, _query: &str, _answer: &str) -> Result<(), RagError> {
            Err(RagError::retrieval_unavailable("vector store timeout"))
        }
    }

    #[derive(Default)]
    struct RecordingGeneration {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl GenerationClient for RecordingGeneration {
        async fn generate(&self, prompt: &str) -> Result<String, RagError> {
            if self.fail {
                return Err(RagError::generation_failed("upstream 500"));
            }
            self.prompts.lock().push(prompt.to_string());
            Ok(format!("answer to: {prompt}"))
        }
    }

    struct EmptyGeneration;

    #[async_trait]
    impl GenerationClient for EmptyGeneration {
        async fn generate(&self, _prompt: &str) -> Result<String, RagError> {
            Ok("   ".to_string())
        }
    }

    fn doc(id: &str, score: f32) -> RetrievedDocument {
        RetrievedDocument {
            id: id.into(),
            title: format!("title-{id}"),
            snippet: format!("snippet-{id}"),
            source_url: format!("https://docs.example/{id}"),
            score,
        }
    }

    fn router_with(
        retrieval: Arc<dyn RetrievalClient>,
        generation: Arc<dyn GenerationClient>,
        threshold: f32,
    ) -> ConfidenceRouter {
        ConfidenceRouter::new(
            retrieval,
            generation,
            RouterConfig {
                confidence_threshold: threshold,
                similarity_top_k: 5,
            },
        )
    }

    #[tokio::test]
    async fn high_confidence_routes_to_rag() {
        let retrieval = Arc::new(StaticRetrieval::new(vec![
            doc("a", 0.9),
            doc("b", 0.8),
            doc("c", 0.7),
        ]));
        let generation = Arc::new(RecordingGeneration::default());
        let routed = router_with(retrieval, generation.clone(), 0.3)
            .route("what is rag?")
            .await
            .expect("route");

        match &routed.decision {
            RoutingDecision::UseRag { avg_confidence, context } => {
                assert!((avg_confidence - 0.8).abs() < 1e-6);
                assert_eq!(context.len(), 3);
            }
            other => panic!("expected rag decision, got {other:?}"),
        }
        assert_eq!(routed.sources.len(), 3);
        let prompt = generation.prompts.lock()[0].clone();
        assert!(prompt.contains("snippet-a"));
        assert!(prompt.contains("Question: what is rag?"));
        // Highest score first.
        assert!(prompt.find("snippet-a").unwrap() < prompt.find("snippet-c").unwrap());
    }

    #[tokio::test]
    async fn low_confidence_routes_direct() {
        let retrieval = Arc::new(StaticRetrieval::new(vec![doc("a", 0.1), doc("b", 0.2)]));
        let generation = Arc::new(RecordingGeneration::default());
        let routed = router_with(retrieval, generation.clone(), 0.3)
            .route("question")
            .await
            .expect("route");

        assert_eq!(
            routed.decision,
            RoutingDecision::UseDirect {
                reason: DirectReason::LowConfidence
            }
        );
        assert!(routed.sources.is_empty());
        assert_eq!(generation.prompts.lock()[0], "question");
    }

    #[tokio::test]
    async fn threshold_is_inclusive() {
        let retrieval = Arc::new(StaticRetrieval::new(vec![doc("a", 0.4), doc("b", 0.2)]));
        let generation = Arc::new(RecordingGeneration::default());
        let routed = router_with(retrieval, generation, 0.3)
            .route("question")
            .await
            .expect("route");

        assert!(matches!(routed.decision, RoutingDecision::UseRag { .. }));
    }

    #[tokio::test]
    async fn retrieval_failure_falls_back_to_bare_query() {
        let generation = Arc::new(RecordingGeneration::default());
        let routed = router_with(Arc::new(FailingRetrieval), generation.clone(), 0.3)
            .route("still answered")
            .await
            .expect("route");

        assert_eq!(
            routed.decision,
            RoutingDecision::UseDirect {
                reason: DirectReason::RetrievalFailed
            }
        );
        assert_eq!(generation.prompts.lock()[0], "still answered");
        assert!(!routed.answer.is_empty());
    }

    #[tokio::test]
    async fn no_documents_routes_direct() {
        let retrieval = Arc::new(StaticRetrieval::new(Vec::new()));
        let generation = Arc::new(RecordingGeneration::default());
        let routed = router_with(retrieval, generation, 0.3)
            .route("question")
            .await
            .expect("route");

        assert_eq!(
            routed.decision,
            RoutingDecision::UseDirect {
                reason: DirectReason::NoDocuments
            }
        );
        assert!(routed.sources.is_empty());
    }

    #[tokio::test]
    async fn generation_failure_is_terminal() {
        let retrieval = Arc::new(StaticRetrieval::new(vec![doc("a", 0.9)]));
        let generation = Arc::new(RecordingGeneration {
            prompts: Mutex::new(Vec::new()),
            fail: true,
        });
        let err = router_with(retrieval, generation, 0.3)
            .route("question")
            .await
            .expect_err("generation failure surfaces");
        assert_eq!(err.0.code.http_status, 500);
    }

    #[tokio::test]
    async fn empty_generation_yields_apology() {
        let retrieval = Arc::new(StaticRetrieval::new(Vec::new()));
        let routed = router_with(retrieval, Arc::new(EmptyGeneration), 0.3)
            .route("question")
            .await
            .expect("route");
        assert_eq!(routed.answer, EMPTY_ANSWER_FALLBACK);
    }

    #[tokio::test]
    async fn direct_answer_is_written_back_to_index() {
        let retrieval = Arc::new(StaticRetrieval::new(Vec::new()));
        let generation = Arc::new(RecordingGeneration::default());
        let routed = router_with(retrieval.clone(), generation, 0.3)
            .route("what is a vector index?")
            .await
            .expect("route");
        assert!(matches!(
            routed.decision,
            RoutingDecision::UseDirect { .. }
        ));

        let docs = retrieval.retrieve("", 5).await.expect("retrieve");
        assert_eq!(docs.len(), 1);
        assert!(docs[0].snippet.starts_with("Q: what is a vector index?"));
        assert!(docs[0].snippet.contains(&routed.answer));
    }

    #[tokio::test]
    async fn rag_answers_are_not_written_back() {
        let retrieval = Arc::new(StaticRetrieval::new(vec![doc("a", 0.9)]));
        let generation = Arc::new(RecordingGeneration::default());
        router_with(retrieval.clone(), generation, 0.3)
            .route("question")
            .await
            .expect("route");

        let docs = retrieval.retrieve("", 5).await.expect("retrieve");
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn fallback_apology_is_not_written_back() {
        let retrieval = Arc::new(StaticRetrieval::new(Vec::new()));
        router_with(retrieval.clone(), Arc::new(EmptyGeneration), 0.3)
            .route("question")
            .await
            .expect("route");

        let docs = retrieval.retrieve("", 5).await.expect("retrieve");
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn write_back_failure_does_not_lose_the_answer() {
        let generation = Arc::new(RecordingGeneration::default());
        let routed = router_with(Arc::new(FailingRetrieval), generation, 0.3)
            .route("question")
            .await
            .expect("route");
        assert!(!routed.answer.is_empty());
    }

    #[tokio::test]
    async fn equal_scores_keep_provider_order() {
        let retrieval = Arc::new(StaticRetrieval::new(vec![
            doc("first", 0.5),
            doc("second", 0.5),
        ]));
        let generation = Arc::new(RecordingGeneration::default());
        let routed = router_with(retrieval, generation, 0.3)
            .route("question")
            .await
            .expect("route");

        match routed.decision {
            RoutingDecision::UseRag { context, .. } => {
                assert_eq!(context[0].id, "first");
                assert_eq!(context[1].id, "second");
            }
            other => panic!("expected rag decision, got {other:?}"),
        }
    }
}
