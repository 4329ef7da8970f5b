use crate::retry::RetryClass;

/// Stable error code: the `code` string is part of the wire contract and
/// never changes once published.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: &'static str,
    pub http_status: u16,
    pub retry: RetryClass,
}

pub const AUTH_UNAUTHENTICATED: ErrorCode = ErrorCode {
    code: "AUTH.UNAUTHENTICATED",
    http_status: 401,
    retry: RetryClass::None,
};

pub const SCHEMA_VALIDATION: ErrorCode = ErrorCode {
    code: "SCHEMA.VALIDATION",
    http_status: 400,
    retry: RetryClass::None,
};

pub const STORAGE_NOT_FOUND: ErrorCode = ErrorCode {
    code: "STORAGE.NOT_FOUND",
    http_status: 404,
    retry: RetryClass::None,
};

pub const QUOTA_EXCEEDED: ErrorCode = ErrorCode {
    code: "QUOTA.EXCEEDED",
    http_status: 429,
    retry: RetryClass::Transient,
};

pub const PROVIDER_UNAVAILABLE: ErrorCode = ErrorCode {
    code: "PROVIDER.UNAVAILABLE",
    http_status: 503,
    retry: RetryClass::Transient,
};

pub const LLM_UPSTREAM: ErrorCode = ErrorCode {
    code: "LLM.UPSTREAM",
    http_status: 500,
    retry: RetryClass::Transient,
};

pub const STORAGE_INTERNAL: ErrorCode = ErrorCode {
    code: "STORAGE.INTERNAL",
    http_status: 500,
    retry: RetryClass::Transient,
};

pub const UNKNOWN_INTERNAL: ErrorCode = ErrorCode {
    code: "UNKNOWN.INTERNAL",
    http_status: 500,
    retry: RetryClass::Permanent,
};
