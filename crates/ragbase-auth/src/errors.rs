use ragbase_errors::prelude::*;
use thiserror::Error;

/// Infrastructure-level auth failure (key provider, client construction).
/// Token-level failures use [`TokenValidationFailure`] instead.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AuthError(pub Box<ErrorObj>);

impl AuthError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn provider_unavailable(msg: &str) -> Self {
        AuthError(Box::new(
            ErrorBuilder::new(codes::PROVIDER_UNAVAILABLE)
                .user_msg("Identity provider is unavailable.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn internal(msg: &str) -> Self {
        AuthError(Box::new(
            ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                .user_msg("Authentication failed.")
                .dev_msg(msg)
                .build(),
        ))
    }
}

/// Exactly one variant per failed verification. The variant name is logged;
/// the raw token never is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TokenValidationFailure {
    #[error("token is structurally malformed")]
    Malformed,
    #[error("token key id is not in the current key set")]
    UnknownKeyId,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token is expired")]
    Expired,
    #[error("token audience does not match this application")]
    WrongAudience,
    #[error("token issuer is not the expected provider")]
    WrongIssuer,
    #[error("identity provider unreachable and no cached keys exist")]
    ProviderUnreachable,
}

impl TokenValidationFailure {
    pub const fn as_str(self) -> &'static str {
        match self {
            TokenValidationFailure::Malformed => "malformed",
            TokenValidationFailure::UnknownKeyId => "unknown_key_id",
            TokenValidationFailure::BadSignature => "bad_signature",
            TokenValidationFailure::Expired => "expired",
            TokenValidationFailure::WrongAudience => "wrong_audience",
            TokenValidationFailure::WrongIssuer => "wrong_issuer",
            TokenValidationFailure::ProviderUnreachable => "provider_unreachable",
        }
    }
}
