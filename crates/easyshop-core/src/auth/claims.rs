//! Client-side decoding of the bearer credential's claims.
//!
//! The credential is three base64url segments joined by `.`. Only the middle
//! one is read. The signature is not checked here; the server already did.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

/// Role assumed when the credential carries none.
pub const DEFAULT_ROLE: &str = "USER";

/// Role granting administrative access.
pub const ADMIN_ROLE: &str = "ADMIN";

#[derive(Error, Debug)]
pub enum ClaimsError {
    #[error("credential must have 3 segments, found {0}")]
    Segments(usize),

    #[error("claims segment is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("claims segment is not valid claims JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("claims have an empty subject")]
    EmptySubject,
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: String,
    role: Option<String>,
    exp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    pub subject: String,
    pub role: String,
    /// Seconds since the Unix epoch. May be fractional.
    pub expires_at: f64,
}

/// Current time in seconds since the Unix epoch, with millisecond precision.
fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

impl Claims {
    pub fn decode(token: &str) -> Result<Self, ClaimsError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(ClaimsError::Segments(segments.len()));
        }

        let payload = segments[1];
        let bytes = if payload.ends_with('=') {
            URL_SAFE.decode(payload)?
        } else {
            URL_SAFE_NO_PAD.decode(payload)?
        };
        let raw: RawClaims = serde_json::from_slice(&bytes)?;

        if raw.sub.is_empty() {
            return Err(ClaimsError::EmptySubject);
        }

        Ok(Self {
            subject: raw.sub,
            role: raw
                .role
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            expires_at: raw.exp,
        })
    }

    /// Expired once `now` has passed `exp`.
    pub fn is_expired_at(&self, now: f64) -> bool {
        self.expires_at < now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_secs())
    }

    pub fn seconds_until_expiry(&self) -> i64 {
        (self.expires_at - now_secs()).max(0.0) as i64
    }
}

/// Build an unsigned credential carrying `claims`, for tests and fixtures.
pub fn encode_unsigned(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> i64 {
        Utc::now().timestamp()
    }

    #[test]
    fn test_decode_full_claims() {
        let token = encode_unsigned(&json!({"sub": "a@x.com", "role": "ADMIN", "exp": now() + 3600}));
        let claims = Claims::decode(&token).unwrap();
        assert_eq!(claims.subject, "a@x.com");
        assert_eq!(claims.role, "ADMIN");
        assert!(!claims.is_expired());
        assert!(claims.seconds_until_expiry() > 3500);
    }

    #[test]
    fn test_decode_defaults_role() {
        let token = encode_unsigned(&json!({"sub": "a@x.com", "exp": now() + 60}));
        assert_eq!(Claims::decode(&token).unwrap().role, DEFAULT_ROLE);

        let token = encode_unsigned(&json!({"sub": "a@x.com", "role": "", "exp": now() + 60}));
        assert_eq!(Claims::decode(&token).unwrap().role, DEFAULT_ROLE);
    }

    #[test]
    fn test_decode_ignores_extra_claims() {
        let token = encode_unsigned(&json!({
            "sub": "a@x.com", "role": "USER", "type": "access", "iat": now(), "exp": now() + 60
        }));
        assert!(Claims::decode(&token).is_ok());
    }

    #[test]
    fn test_decode_accepts_padded_segment() {
        let payload = URL_SAFE.encode(json!({"sub": "ab", "exp": 1}).to_string());
        let token = format!("h.{}.s", payload);
        assert_eq!(Claims::decode(&token).unwrap().subject, "ab");
    }

    #[test]
    fn test_expiry_boundary() {
        let claims = Claims {
            subject: "a@x.com".into(),
            role: DEFAULT_ROLE.into(),
            expires_at: 1_000.0,
        };
        assert!(!claims.is_expired_at(999.0));
        assert!(!claims.is_expired_at(1_000.0));
        assert!(claims.is_expired_at(1_000.5));
    }

    #[test]
    fn test_decode_fractional_expiry() {
        let exp = now() as f64 + 3600.5;
        let token = encode_unsigned(&json!({"sub": "a@x.com", "exp": exp}));
        let claims = Claims::decode(&token).unwrap();
        assert_eq!(claims.expires_at, exp);
        assert!(!claims.is_expired());
        assert!(claims.is_expired_at(exp + 0.25));
        assert!(claims.seconds_until_expiry() > 3500);
    }

    #[test]
    fn test_past_expiry_is_expired() {
        let token = encode_unsigned(&json!({"sub": "a@x.com", "exp": now() - 10}));
        let claims = Claims::decode(&token).unwrap();
        assert!(claims.is_expired());
        assert_eq!(claims.seconds_until_expiry(), 0);
    }

    #[test]
    fn test_malformed_credentials() {
        assert!(matches!(Claims::decode(""), Err(ClaimsError::Segments(1))));
        assert!(matches!(Claims::decode("a.b"), Err(ClaimsError::Segments(2))));
        assert!(matches!(Claims::decode("a.b.c.d"), Err(ClaimsError::Segments(4))));
        assert!(matches!(Claims::decode("a.!!!.c"), Err(ClaimsError::Encoding(_))));

        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("hello"));
        assert!(matches!(Claims::decode(&not_json), Err(ClaimsError::Json(_))));

        let no_exp = encode_unsigned(&json!({"sub": "a@x.com"}));
        assert!(matches!(Claims::decode(&no_exp), Err(ClaimsError::Json(_))));

        let empty_sub = encode_unsigned(&json!({"sub": "", "exp": now() + 60}));
        assert!(matches!(Claims::decode(&empty_sub), Err(ClaimsError::EmptySubject)));
    }
}
