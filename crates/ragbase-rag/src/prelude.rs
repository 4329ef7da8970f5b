pub use crate::errors::RagError;
pub use crate::generation::{
    GenerationClient, LocalGenerationClient, OpenAiGenerationClient, OpenAiGenerationConfig,
    DEFAULT_GENERATION_TIMEOUT,
};
pub use crate::model::{DirectReason, RetrievedDocument, RoutedAnswer, RoutingDecision};
pub use crate::retrieval::{
    HttpRetrievalClient, HttpRetrievalConfig, RetrievalClient, StaticRetrieval,
    DEFAULT_RETRIEVAL_TIMEOUT,
};
pub use crate::router::{
    ConfidenceRouter, RouterConfig, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_SIMILARITY_TOP_K,
};
