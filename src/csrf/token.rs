use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use subtle::ConstantTimeEq;

/// Number of leading characters kept when a token shows up in a status
/// payload or a log line.
pub const VISIBLE_PREFIX_CHARS: usize = 10;

/// An anti-forgery token.
///
/// `Debug` is redacted so a token never leaks through `{:?}` formatting;
/// use [`CsrfToken::truncated`] for diagnostics.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Generate a token from `length` bytes of OS randomness, URL-safe base64 encoded.
    pub fn generate(length: usize) -> Self {
        let mut bytes = vec![0u8; length];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn truncated(&self) -> String {
        truncate_token(&self.0)
    }

    /// Constant-time comparison against an untrusted candidate.
    pub fn matches(&self, candidate: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), candidate.as_bytes())
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CsrfToken").field(&"***").finish()
    }
}

impl From<String> for CsrfToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Length mismatch returns early; token length is public (fixed by config),
/// only the content comparison has to be timing-safe.
pub fn constant_time_eq(expected: &[u8], candidate: &[u8]) -> bool {
    if expected.len() != candidate.len() {
        return false;
    }
    expected.ct_eq(candidate).into()
}

/// First [`VISIBLE_PREFIX_CHARS`] characters followed by `...`.
pub fn truncate_token(token: &str) -> String {
    let prefix: String = token.chars().take(VISIBLE_PREFIX_CHARS).collect();
    format!("{}...", prefix)
}
