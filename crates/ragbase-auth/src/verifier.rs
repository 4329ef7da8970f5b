use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tracing::warn;

use ragbase_types::prelude::Timestamp;

use crate::errors::TokenValidationFailure;
use crate::keyset::{JwkKey, KeySetCache};

/// Ordered alias lists for optional profile claims. The first alias present
/// in the claim set wins; absent claims default to the empty string.
const EMAIL_ALIASES: &[&str] = &["email"];
const NAME_ALIASES: &[&str] = &["name", "given_name"];
const PICTURE_ALIASES: &[&str] = &["picture", "avatar_url"];

#[derive(Clone, Debug)]
pub struct VerifierConfig {
    pub issuer: String,
    pub audience: String,
    pub algorithms: Vec<Algorithm>,
}

impl VerifierConfig {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            algorithms: vec![Algorithm::RS256],
        }
    }

    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }
}

/// Identity produced by a successful verification. Request-scoped; never
/// persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
}

impl VerifiedIdentity {
    /// Conversation ownership key: verified email when present, subject id
    /// otherwise.
    pub fn owner_key(&self) -> &str {
        if self.email.is_empty() {
            &self.subject
        } else {
            &self.email
        }
    }
}

pub struct TokenVerifier {
    config: VerifierConfig,
    keys: Arc<KeySetCache>,
}

impl TokenVerifier {
    pub fn new(config: VerifierConfig, keys: Arc<KeySetCache>) -> Self {
        Self { config, keys }
    }

    /// Validates structure, signature, expiry, audience and issuer, in that
    /// order, so every failed token maps to exactly one failure variant.
    /// Signature verification runs with jsonwebtoken's claim validation
    /// disabled; exp/aud/iss are then checked explicitly in contract order.
    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, TokenValidationFailure> {
        let header =
            jsonwebtoken::decode_header(token).map_err(|_| TokenValidationFailure::Malformed)?;
        let kid = header
            .kid
            .as_deref()
            .ok_or(TokenValidationFailure::Malformed)?;
        let jwk = self.resolve_key(kid).await?;

        let alg = self.select_algorithm(jwk.alg.as_deref())?;
        let key = decoding_key(&jwk)?;

        let mut validation = Validation::new(alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims::<&str>(&[]);

        let data = jsonwebtoken::decode::<Value>(token, &key, &validation).map_err(|err| {
            match err.kind() {
                ErrorKind::InvalidSignature => TokenValidationFailure::BadSignature,
                _ => TokenValidationFailure::Malformed,
            }
        })?;
        let claims = match data.claims {
            Value::Object(map) => map,
            _ => return Err(TokenValidationFailure::Malformed),
        };

        let exp = claims
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or(TokenValidationFailure::Malformed)?;
        if unix_now() >= exp {
            return Err(TokenValidationFailure::Expired);
        }

        if !audience_matches(claims.get("aud"), &self.config.audience) {
            return Err(TokenValidationFailure::WrongAudience);
        }

        match claims.get("iss").and_then(Value::as_str) {
            Some(iss) if iss == self.config.issuer => {}
            _ => return Err(TokenValidationFailure::WrongIssuer),
        }

        let subject =
            claim_string(&claims, &["sub"]).ok_or(TokenValidationFailure::Malformed)?;
        let issued_at = claims.get("iat").and_then(Value::as_i64).unwrap_or(0);

        Ok(VerifiedIdentity {
            subject,
            email: claim_string(&claims, EMAIL_ALIASES).unwrap_or_default(),
            name: claim_string(&claims, NAME_ALIASES).unwrap_or_default(),
            picture: claim_string(&claims, PICTURE_ALIASES).unwrap_or_default(),
            issued_at: Timestamp::from_unix_secs(issued_at),
            expires_at: Timestamp::from_unix_secs(exp),
        })
    }

    /// Keys rotate; a kid miss may just mean the cache is stale, so force one
    /// refresh and retry the lookup before failing.
    async fn resolve_key(&self, kid: &str) -> Result<JwkKey, TokenValidationFailure> {
        let set = self.keys.get().await.map_err(|err| {
            warn!(error = %err, "key set unavailable during verification");
            TokenValidationFailure::ProviderUnreachable
        })?;
        if let Some(key) = set.find(kid) {
            return Ok(key.clone());
        }

        let set = self.keys.force_refresh().await.map_err(|err| {
            warn!(error = %err, "forced key refresh failed");
            TokenValidationFailure::ProviderUnreachable
        })?;
        set.find(kid)
            .cloned()
            .ok_or(TokenValidationFailure::UnknownKeyId)
    }

    fn select_algorithm(&self, alg: Option<&str>) -> Result<Algorithm, TokenValidationFailure> {
        match alg {
            Some(alg) => {
                let parsed = Algorithm::from_str(alg)
                    .map_err(|_| TokenValidationFailure::BadSignature)?;
                if self.config.algorithms.contains(&parsed) {
                    Ok(parsed)
                } else {
                    Err(TokenValidationFailure::BadSignature)
                }
            }
            None => self
                .config
                .algorithms
                .first()
                .copied()
                .ok_or(TokenValidationFailure::BadSignature),
        }
    }
}

fn decoding_key(jwk: &JwkKey) -> Result<DecodingKey, TokenValidationFailure> {
    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk
                .n
                .as_ref()
                .ok_or(TokenValidationFailure::ProviderUnreachable)?;
            let e = jwk
                .e
                .as_ref()
                .ok_or(TokenValidationFailure::ProviderUnreachable)?;
            DecodingKey::from_rsa_components(n, e).map_err(|err| {
                warn!(kid = %jwk.kid, error = %err, "unusable rsa key material");
                TokenValidationFailure::ProviderUnreachable
            })
        }
        "oct" => {
            let secret = jwk
                .k
                .as_ref()
                .ok_or(TokenValidationFailure::ProviderUnreachable)?;
            let bytes = base64::engine::general_purpose::URL_SAFE
                .decode(secret)
                .map_err(|err| {
                    warn!(kid = %jwk.kid, error = %err, "unusable oct key material");
                    TokenValidationFailure::ProviderUnreachable
                })?;
            Ok(DecodingKey::from_secret(&bytes))
        }
        other => {
            warn!(kid = %jwk.kid, kty = other, "unsupported jwk key type");
            Err(TokenValidationFailure::ProviderUnreachable)
        }
    }
}

fn audience_matches(aud: Option<&Value>, expected: &str) -> bool {
    match aud {
        Some(Value::String(s)) => s == expected,
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| item.as_str() == Some(expected)),
        _ => false,
    }
}

fn claim_string(map: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    for alias in aliases {
        match map.get(*alias) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(Value::Number(num)) => return Some(num.to_string()),
            _ => continue,
        }
    }
    None
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "verifier-test-secret";
    const KID: &str = "hs-test";
    const ISSUER: &str = "https://issuer.example";
    const AUDIENCE: &str = "client-id-123";

    fn hs256_jwk() -> JwkKey {
        JwkKey {
            kid: KID.into(),
            alg: Some("HS256".into()),
            kty: "oct".into(),
            n: None,
            e: None,
            k: Some(base64::engine::general_purpose::URL_SAFE.encode(SECRET)),
        }
    }

    fn verifier() -> TokenVerifier {
        let keys = Arc::new(KeySetCache::static_keys(vec![hs256_jwk()]));
        TokenVerifier::new(
            VerifierConfig::new(ISSUER, AUDIENCE).with_algorithms(vec![Algorithm::HS256]),
            keys,
        )
    }

    fn mint(claims: Value) -> String {
        mint_with(claims, SECRET, KID)
    }

    fn mint_with(claims: Value, secret: &str, kid: &str) -> String {
        let header = Header {
            alg: Algorithm::HS256,
            kid: Some(kid.into()),
            ..Header::default()
        };
        encode(&header, &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .expect("encode jwt")
    }

    fn base_claims(now: i64) -> Value {
        json!({
            "sub": "user-123",
            "email": "user@example.com",
            "name": "Test User",
            "iss": ISSUER,
            "aud": AUDIENCE,
            "exp": now + 600,
            "iat": now,
        })
    }

    #[tokio::test]
    async fn valid_token_yields_identity() {
        let now = unix_now();
        let identity = verifier()
            .verify(&mint(base_claims(now)))
            .await
            .expect("verify");
        assert_eq!(identity.subject, "user-123");
        assert_eq!(identity.email, "user@example.com");
        assert_eq!(identity.owner_key(), "user@example.com");
        assert_eq!(identity.expires_at.as_unix_secs(), now + 600);
    }

    #[tokio::test]
    async fn verification_is_idempotent() {
        let token = mint(base_claims(unix_now()));
        let v = verifier();
        let first = v.verify(&token).await.expect("first");
        let second = v.verify(&token).await.expect("second");
        assert_eq!(first.subject, second.subject);
        assert_eq!(first.email, second.email);
    }

    #[tokio::test]
    async fn expired_token_fails_even_with_valid_signature() {
        let now = unix_now();
        let mut claims = base_claims(now);
        claims["exp"] = json!(now - 60);
        let err = verifier().verify(&mint(claims)).await.unwrap_err();
        assert_eq!(err, TokenValidationFailure::Expired);
    }

    #[tokio::test]
    async fn wrong_audience_fails_despite_valid_signature_and_expiry() {
        let mut claims = base_claims(unix_now());
        claims["aud"] = json!("some-other-client");
        let err = verifier().verify(&mint(claims)).await.unwrap_err();
        assert_eq!(err, TokenValidationFailure::WrongAudience);
    }

    #[tokio::test]
    async fn wrong_issuer_fails() {
        let mut claims = base_claims(unix_now());
        claims["iss"] = json!("https://evil.example");
        let err = verifier().verify(&mint(claims)).await.unwrap_err();
        assert_eq!(err, TokenValidationFailure::WrongIssuer);
    }

    #[tokio::test]
    async fn foreign_signature_fails() {
        let token = mint_with(base_claims(unix_now()), "not-the-secret", KID);
        let err = verifier().verify(&token).await.unwrap_err();
        assert_eq!(err, TokenValidationFailure::BadSignature);
    }

    #[tokio::test]
    async fn garbage_token_is_malformed() {
        let err = verifier().verify("not-a-jwt").await.unwrap_err();
        assert_eq!(err, TokenValidationFailure::Malformed);
    }

    #[tokio::test]
    async fn unknown_kid_fails_after_forced_refresh() {
        let token = mint_with(base_claims(unix_now()), SECRET, "rotated-away");
        let err = verifier().verify(&token).await.unwrap_err();
        assert_eq!(err, TokenValidationFailure::UnknownKeyId);
    }

    #[tokio::test]
    async fn profile_claims_fall_back_through_aliases() {
        let now = unix_now();
        let mut claims = base_claims(now);
        claims.as_object_mut().unwrap().remove("name");
        claims["given_name"] = json!("Given");
        let identity = verifier().verify(&mint(claims)).await.expect("verify");
        assert_eq!(identity.name, "Given");
        assert_eq!(identity.picture, "");
    }
}
