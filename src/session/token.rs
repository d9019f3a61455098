//! Session token generation, hashing, and cookie encoding.

use anyhow::{Context, Result};
use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

pub const SESSION_COOKIE_NAME: &str = "snippetbox_session";

const TOKEN_BYTES: usize = 32;

/// Create a new session token for the cookie (256 bits from the OS RNG).
/// The raw value is only ever sent to the client; stores key on its hash.
pub fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a session token so raw values never reach the store.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Tokens we issue decode to exactly [`TOKEN_BYTES`]; anything else is ignored.
#[must_use]
pub fn is_well_formed(token: &str) -> bool {
    Base64UrlUnpadded::decode_vec(token).is_ok_and(|bytes| bytes.len() == TOKEN_BYTES)
}

pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            if key.trim() == SESSION_COOKIE_NAME {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}

/// Build a secure `HttpOnly` cookie for the session token.
pub fn session_cookie(
    token: &str,
    max_age_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_well_formed_and_distinct() -> Result<()> {
        let first = generate_session_token()?;
        let second = generate_session_token()?;
        assert!(is_well_formed(&first));
        assert!(is_well_formed(&second));
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed("not base64 at all!"));
    }

    #[test]
    fn hash_is_stable_and_distinct() {
        assert_eq!(hash_session_token("token"), hash_session_token("token"));
        assert_ne!(hash_session_token("token"), hash_session_token("other"));
        assert_eq!(hash_session_token("token").len(), 32);
    }

    #[test]
    fn extract_finds_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; snippetbox_session=abc123; lang=en"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn extract_none_when_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(extract_session_token(&headers), None);
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn cookie_flags() -> Result<()> {
        let cookie = session_cookie("tok", 60, true)?;
        let cookie = cookie.to_str()?;
        assert!(cookie.starts_with("snippetbox_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=60"));
        assert!(cookie.ends_with("; Secure"));

        let cleared = clear_session_cookie(false)?;
        let cleared = cleared.to_str()?;
        assert!(cleared.contains("Max-Age=0"));
        assert!(!cleared.contains("Secure"));
        Ok(())
    }
}
