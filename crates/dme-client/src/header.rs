//! Carrier token extraction from raw redirect response headers.
//!
//! The carrier hands out its token by answering the token-server request with
//! a redirect whose `Location` URI carries the token as a query parameter:
//!
//! ```text
//! Location: https://carrier/redirect?a=1&dt-id=ABC123&b=2
//! ```
//!
//! Every function here is pure. A line that does not match is a normal
//! outcome, since most header lines are not `Location`.

/// Query parameter the carrier uses for its token.
pub const CARRIER_TOKEN_KEY: &str = "dt-id";

const LOCATION_HEADER: &str = "Location";

/// Strips exactly one trailing `\r\n`. Anything else passes through as-is.
pub fn trim_eol(line: &str) -> &str {
    line.strip_suffix("\r\n").unwrap_or(line)
}

/// Splits a header line on its first `:`.
///
/// The value has exactly one leading space removed when present.
pub fn split_header(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key, value.strip_prefix(' ').unwrap_or(value)))
}

/// Returns the value of the first query parameter named `key` in `uri`.
///
/// Segments are scanned left to right, including the final one. A segment
/// without `=` is a key with an empty value.
pub fn query_param<'a>(uri: &'a str, key: &str) -> Option<&'a str> {
    let (_, query) = uri.split_once('?')?;
    query.split('&').find_map(|segment| {
        let (name, value) = segment.split_once('=').unwrap_or((segment, ""));
        (name == key).then_some(value)
    })
}

/// Extracts `key` from the URI of a raw `Location` header line.
pub fn extract_redirect_param<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (name, value) = split_header(trim_eol(line))?;
    if name != LOCATION_HEADER {
        return None;
    }
    query_param(value, key)
}

/// Accumulates the carrier token across the header lines of one response.
///
/// The first match wins. Later `Location` lines are still inspected but never
/// overwrite a token already found.
#[derive(Debug, Clone)]
pub struct TokenCollector {
    key: String,
    token: Option<String>,
    lines_seen: usize,
}

impl TokenCollector {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            token: None,
            lines_seen: 0,
        }
    }

    pub fn carrier() -> Self {
        Self::new(CARRIER_TOKEN_KEY)
    }

    /// Feeds one header line. Returns `true` if this line produced the token.
    pub fn observe(&mut self, line: &str) -> bool {
        self.lines_seen += 1;
        if self.token.is_some() {
            return false;
        }
        match extract_redirect_param(line, &self.key) {
            Some(value) => {
                self.token = Some(value.to_string());
                true
            }
            None => false,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn lines_seen(&self) -> usize {
        self.lines_seen
    }

    pub fn into_token(self) -> Option<String> {
        self.token
    }
}
