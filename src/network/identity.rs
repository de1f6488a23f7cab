//! Connection Identity
//!
//! Reads the room code and display name from the WebSocket handshake
//! and resolves the name a connection plays under. The server never
//! authenticates anyone itself: names come either straight from the
//! query string or from a JWT issued by an external auth provider.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Longest display name kept, in characters.
pub const MAX_NAME_CHARS: usize = 32;

/// Cookie carrying the session JWT.
pub const TOKEN_COOKIE: &str = "access_token";

// =============================================================================
// HANDSHAKE
// =============================================================================

/// What a client supplied when opening its socket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    /// `code` query parameter.
    pub code: Option<String>,
    /// `name` query parameter.
    pub name: Option<String>,
    /// `token` query parameter, or the `access_token` cookie.
    pub token: Option<String>,
}

impl Handshake {
    /// Parse the request query string and `Cookie` header.
    ///
    /// Empty values count as absent.
    pub fn parse(query: Option<&str>, cookie_header: Option<&str>) -> Self {
        let mut handshake = Handshake::default();

        if let Some(query) = query {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                match key.as_ref() {
                    "code" => handshake.code = Some(value.to_string()),
                    "name" => handshake.name = Some(value.to_string()),
                    "token" => handshake.token = Some(value.to_string()),
                    _ => {}
                }
            }
        }

        if handshake.token.is_none() {
            handshake.token = cookie_header.and_then(|header| cookie_value(header, TOKEN_COOKIE));
        }

        handshake
    }
}

fn cookie_value(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Trim and bound a display name. Blank names are rejected.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_NAME_CHARS).collect())
}

/// Fresh `Player-xxxx` name for connections without one.
pub fn anonymous_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("Player-{}", &id[..4])
}

// =============================================================================
// LOOKUP
// =============================================================================

/// Supplies the display name for a connecting socket.
pub trait IdentityLookup: Send + Sync {
    /// Name for this handshake, or `None` to fall back to an
    /// anonymous one.
    fn display_name(&self, handshake: &Handshake) -> Option<String>;
}

/// Trusts the `name` query parameter.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryNameLookup;

impl IdentityLookup for QueryNameLookup {
    fn display_name(&self, handshake: &Handshake) -> Option<String> {
        handshake.name.as_deref().and_then(sanitize_name)
    }
}

/// Prefers the name inside a verified JWT, then the query parameter.
#[derive(Clone)]
pub struct JwtNameLookup {
    verifier: TokenVerifier,
}

impl JwtNameLookup {
    /// Lookup verifying tokens against `config`.
    pub fn new(config: &AuthConfig) -> Result<Self, TokenError> {
        Ok(Self { verifier: TokenVerifier::new(config)? })
    }
}

impl IdentityLookup for JwtNameLookup {
    fn display_name(&self, handshake: &Handshake) -> Option<String> {
        let from_token = handshake.token.as_deref().and_then(|token| {
            self.verifier
                .verify(token)
                .map_err(|e| debug!("Ignoring handshake token: {}", e))
                .ok()
                .and_then(|claims| claims.display_name().and_then(sanitize_name))
        });
        from_token.or_else(|| QueryNameLookup.display_name(handshake))
    }
}

// =============================================================================
// JWT
// =============================================================================

/// Where access tokens come from and how to check them.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// Required `iss`, if any.
    pub issuer: Option<String>,
    /// Required `aud`, if any.
    pub audience: Option<String>,
    /// RS256 public key (PEM). Takes precedence over `secret`.
    pub public_key_pem: Option<String>,
    /// HS256 shared secret.
    pub secret: Option<String>,
    /// Accept expired tokens. Tests only.
    pub skip_expiry: bool,
}

impl AuthConfig {
    /// Is there a key to verify against?
    pub fn is_configured(&self) -> bool {
        self.public_key_pem.is_some() || self.secret.is_some()
    }
}

/// Claims this server reads from an access token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Account identifier.
    #[serde(default)]
    pub sub: String,
    /// Display name, when the provider sets one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Expiry (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience (string or list).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,
}

impl TokenClaims {
    /// `name` if set, otherwise `sub`.
    pub fn display_name(&self) -> Option<&str> {
        [self.name.as_deref(), Some(self.sub.as_str())]
            .into_iter()
            .flatten()
            .find(|candidate| !candidate.trim().is_empty())
    }
}

/// Why a token was not accepted.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Neither a public key nor a secret is configured
    #[error("no verification key configured")]
    NoKey,
    /// The configured public key does not parse
    #[error("unusable public key: {0}")]
    BadKey(String),
    /// Not a JWT
    #[error("malformed token")]
    Malformed,
    /// Signed with some other key
    #[error("bad signature")]
    BadSignature,
    /// Past `exp`
    #[error("token expired")]
    Expired,
    /// `iss` mismatch
    #[error("unexpected issuer")]
    WrongIssuer,
    /// `aud` mismatch
    #[error("unexpected audience")]
    WrongAudience,
    /// Neither `name` nor `sub` carries a usable name
    #[error("token names nobody")]
    Anonymous,
    /// Anything else jsonwebtoken reports
    #[error("token rejected: {0}")]
    Other(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                TokenError::Malformed
            }
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidIssuer => TokenError::WrongIssuer,
            ErrorKind::InvalidAudience => TokenError::WrongAudience,
            _ => TokenError::Other(err.to_string()),
        }
    }
}

/// Decoding key and validation rules, built once from an [`AuthConfig`].
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Build a verifier. Fails when no key is configured or the PEM is bad.
    pub fn new(config: &AuthConfig) -> Result<Self, TokenError> {
        let (key, algorithm) = match (&config.public_key_pem, &config.secret) {
            (Some(pem), _) => (
                DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| TokenError::BadKey(e.to_string()))?,
                Algorithm::RS256,
            ),
            (None, Some(secret)) => (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256),
            (None, None) => return Err(TokenError::NoKey),
        };

        // Only checked when present; `exp` is not mandatory
        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims.clear();
        validation.validate_exp = !config.skip_expiry;
        match &config.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        if let Some(iss) = &config.issuer {
            validation.set_issuer(&[iss]);
        }

        Ok(Self { key, validation })
    }

    /// Check a token's signature and claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.key, &self.validation)?.claims;
        if claims.display_name().is_none() {
            return Err(TokenError::Anonymous);
        }
        Ok(claims)
    }
}

// =============================================================================
// TESTS
// =============================================================================
