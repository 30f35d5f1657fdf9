//! Session token handling.
//!
//! 7tv session tokens are JWTs. We only read the payload (user id + expiry) to
//! give early feedback; the signature is the server's business.

use std::{
    fmt, fs,
    path::Path,
    sync::OnceLock,
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::{
    domain::{EmoteSetId, UserId},
    errors::TokenError,
    Result,
};

/// Opaque bearer credential. Held in memory only; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(raw: impl Into<String>) -> std::result::Result<Self, TokenError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TokenError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Decode the JWT payload without verifying the signature.
    pub fn claims(&self) -> std::result::Result<TokenClaims, TokenError> {
        let payload = self.0.split('.').nth(1).ok_or(TokenError::Malformed)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| TokenError::Malformed)?;
        let v: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)?;

        let sub = v.get("sub").and_then(|s| s.as_str());
        let exp = v
            .get("exp")
            .and_then(|e| e.as_i64().or_else(|| e.as_f64().map(|f| f as i64)));
        let (Some(sub), Some(exp)) = (sub, exp) else {
            return Err(TokenError::MissingClaims);
        };
        let expires_at = DateTime::<Utc>::from_timestamp(exp, 0).ok_or(TokenError::MissingClaims)?;

        Ok(TokenClaims {
            user_id: UserId(sub.to_string()),
            expires_at,
        })
    }

    /// Claims of a token that is still valid at `now`.
    pub fn validate_at(&self, now: DateTime<Utc>) -> std::result::Result<TokenClaims, TokenError> {
        let claims = self.claims()?;
        if claims.expires_at < now {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    pub fn validate(&self) -> std::result::Result<TokenClaims, TokenError> {
        self.validate_at(Utc::now())
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

/// Read a token previously saved with [`save_token_file`]. Missing or blank
/// files yield `None`.
pub fn load_token_file(path: &Path) -> Result<Option<AuthToken>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(contents
        .lines()
        .next()
        .and_then(|line| AuthToken::new(line).ok()))
}

/// Persist a token in plain text. Only called on explicit user opt-in.
pub fn save_token_file(path: &Path, token: &AuthToken) -> Result<()> {
    fs::write(path, token.expose())?;
    Ok(())
}

/// Accepts legacy ObjectIDs, ULIDs and the literal `global`.
pub fn is_valid_set_id(id: &str) -> bool {
    static OBJECT_ID: OnceLock<Regex> = OnceLock::new();
    static ULID: OnceLock<Regex> = OnceLock::new();

    let object_id = OBJECT_ID.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{24}$").expect("regex"));
    let ulid = ULID.get_or_init(|| Regex::new(r"^[0-7][0-9A-HJKMNP-TV-Z]{25}$").expect("regex"));

    id == "global" || object_id.is_match(id) || ulid.is_match(id)
}

pub fn parse_set_id(id: &str) -> std::result::Result<EmoteSetId, crate::Error> {
    let id = id.trim();
    if !is_valid_set_id(id) {
        return Err(crate::Error::Config(format!("invalid emote set id: {id:?}")));
    }
    Ok(EmoteSetId(id.to_string()))
}
