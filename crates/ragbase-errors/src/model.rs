use serde::Serialize;

use crate::codes::ErrorCode;
use crate::retry::RetryClass;

/// Canonical error value carried through every crate in the workspace.
/// `user_msg` is safe to show to callers; `dev_msg` stays on the
/// observability channel and never leaves the process in a response body.
#[derive(Clone, Debug)]
pub struct ErrorObj {
    pub code: ErrorCode,
    pub user_msg: String,
    pub dev_msg: Option<String>,
}

impl ErrorObj {
    pub fn http_status(&self) -> u16 {
        self.code.http_status
    }

    pub fn retry(&self) -> RetryClass {
        self.code.retry
    }

    pub fn public_view(&self) -> PublicErrorView {
        PublicErrorView {
            code: self.code.code,
            message: self.user_msg.clone(),
            retryable: self.retry().is_transient(),
        }
    }
}

impl std::fmt::Display for ErrorObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.dev_msg {
            Some(dev) => write!(f, "{}: {}", self.code.code, dev),
            None => write!(f, "{}: {}", self.code.code, self.user_msg),
        }
    }
}

/// The subset of an error that may be serialized into a response body.
#[derive(Clone, Debug, Serialize)]
pub struct PublicErrorView {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

pub struct ErrorBuilder {
    code: ErrorCode,
    user_msg: Option<String>,
    dev_msg: Option<String>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            user_msg: None,
            dev_msg: None,
        }
    }

    pub fn user_msg(mut self, msg: impl Into<String>) -> Self {
        self.user_msg = Some(msg.into());
        self
    }

    pub fn dev_msg(mut self, msg: impl Into<String>) -> Self {
        self.dev_msg = Some(msg.into());
        self
    }

    pub fn build(self) -> ErrorObj {
        ErrorObj {
            code: self.code,
            user_msg: self
                .user_msg
                .unwrap_or_else(|| "An internal error occurred.".to_string()),
            dev_msg: self.dev_msg,
        }
    }
}
