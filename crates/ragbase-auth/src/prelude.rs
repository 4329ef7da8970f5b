pub use crate::errors::{AuthError, TokenValidationFailure};
pub use crate::keyset::{
    HttpKeyFetcher, JwkKey, KeyFetcher, KeySetCache, SigningKeySet, StaticKeyFetcher,
    DEFAULT_FETCH_TIMEOUT, DEFAULT_KEY_TTL,
};
pub use crate::verifier::{TokenVerifier, VerifiedIdentity, VerifierConfig};
