use ragbase_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct RagError(pub Box<ErrorObj>);

impl RagError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn retrieval_unavailable(msg: &str) -> Self {
        RagError(Box::new(
            ErrorBuilder::new(codes::PROVIDER_UNAVAILABLE)
                .user_msg("Document retrieval is unavailable.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn generation_failed(msg: &str) -> Self {
        RagError(Box::new(
            ErrorBuilder::new(codes::LLM_UPSTREAM)
                .user_msg("Sorry, I encountered an error. Please try again.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn config(msg: &str) -> Self {
        RagError(Box::new(
            ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                .user_msg("Generation backend is misconfigured.")
                .dev_msg(msg)
                .build(),
        ))
    }
}
