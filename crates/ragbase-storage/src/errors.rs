use ragbase_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct StorageError(pub Box<ErrorObj>);

impl StorageError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn is_not_found(&self) -> bool {
        self.0.code == codes::STORAGE_NOT_FOUND
    }

    pub fn not_found(what: &str) -> Self {
        StorageError(Box::new(
            ErrorBuilder::new(codes::STORAGE_NOT_FOUND)
                .user_msg("Thread not found.")
                .dev_msg(what)
                .build(),
        ))
    }

    pub fn internal(msg: &str) -> Self {
        StorageError(Box::new(
            ErrorBuilder::new(codes::STORAGE_INTERNAL)
                .user_msg("Storage operation failed.")
                .dev_msg(msg)
                .build(),
        ))
    }
}
