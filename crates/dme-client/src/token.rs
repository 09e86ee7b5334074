//! Carrier token acquisition through the token server's redirect.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderName;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{DmeError, DmeResult};
use crate::header::{TokenCollector, CARRIER_TOKEN_KEY};
use crate::tls::{build_http_client, RedirectMode, TlsCredentials};

/// Short-lived token issued by the carrier. Empty means the carrier's redirect
/// carried no token.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CarrierToken(String);

impl CarrierToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for CarrierToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CarrierToken(len={})", self.0.len())
    }
}

/// Status and raw header lines of a response whose redirect was not followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResponse {
    pub status: u16,
    /// Lines in received order, each `Name: value\r\n`.
    pub header_lines: Vec<String>,
}

/// Issues the single token-server request.
#[async_trait]
pub trait RedirectFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> DmeResult<RedirectResponse>;
}

/// Reqwest-backed fetcher: redirects off, mutual TLS from caller PEM material.
#[derive(Debug, Clone)]
pub struct HttpRedirectFetcher {
    http: Client,
    timeout: Duration,
}

impl HttpRedirectFetcher {
    pub fn new(credentials: &TlsCredentials, timeout: Duration) -> DmeResult<Self> {
        let http = build_http_client(credentials, RedirectMode::Capture, timeout)?;
        Ok(Self { http, timeout })
    }

    /// Wraps an existing client. It must be built with redirects disabled.
    pub fn with_client(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

#[async_trait]
impl RedirectFetcher for HttpRedirectFetcher {
    async fn fetch(&self, uri: &str) -> DmeResult<RedirectResponse> {
        let res = self.http.get(uri).timeout(self.timeout).send().await?;
        let status = res.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(DmeError::TransportStatus { status });
        }

        let mut header_lines = Vec::with_capacity(res.headers().len());
        for (name, value) in res.headers() {
            // Header bytes are untrusted; a stray non-ASCII byte must not hide the query.
            let value = String::from_utf8_lossy(value.as_bytes());
            header_lines.push(format!("{}: {value}\r\n", canonical_header_name(name)));
        }
        Ok(RedirectResponse {
            status: status.as_u16(),
            header_lines,
        })
    }
}

/// HTTP/1.1 wire capitalisation (`location` -> `Location`). The HTTP stack
/// hands names back lowercased.
fn canonical_header_name(name: &HeaderName) -> String {
    let mut out = String::with_capacity(name.as_str().len());
    let mut upper = true;
    for ch in name.as_str().chars() {
        if upper {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        upper = ch == '-';
    }
    out
}

pub struct TokenAcquirer<F = HttpRedirectFetcher> {
    fetcher: F,
    key: String,
}

impl TokenAcquirer<HttpRedirectFetcher> {
    /// `timeout` bounds the single token-server request.
    pub fn from_credentials(credentials: &TlsCredentials, timeout: Duration) -> DmeResult<Self> {
        Ok(Self::new(HttpRedirectFetcher::new(credentials, timeout)?))
    }
}

impl<F: RedirectFetcher> TokenAcquirer<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            key: CARRIER_TOKEN_KEY.to_string(),
        }
    }

    /// Looks for a different query parameter than `dt-id`.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetches a fresh carrier token. Never retried here.
    pub async fn acquire(&self, token_server_uri: &str) -> DmeResult<CarrierToken> {
        if token_server_uri.is_empty() {
            return Err(DmeError::configuration(
                "token server uri is empty; register first",
            ));
        }

        let response = self.fetcher.fetch(token_server_uri).await?;
        if !(300..400).contains(&response.status) {
            warn!(
                target = "dme.token",
                status = response.status,
                "token server did not redirect"
            );
        }

        let mut collector = TokenCollector::new(self.key.as_str());
        for line in &response.header_lines {
            collector.observe(line);
        }
        let token = CarrierToken::new(collector.into_token().unwrap_or_default());
        debug!(
            target = "dme.token",
            status = response.status,
            headers = response.header_lines.len(),
            token_len = token.as_str().len(),
            "carrier token acquired"
        );
        Ok(token)
    }
}

impl<F> fmt::Debug for TokenAcquirer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAcquirer").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CannedFetcher {
        response: RedirectResponse,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RedirectFetcher for CannedFetcher {
        async fn fetch(&self, _uri: &str) -> DmeResult<RedirectResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn canned(lines: &[&str]) -> (TokenAcquirer<CannedFetcher>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = CannedFetcher {
            response: RedirectResponse {
                status: 303,
                header_lines: lines.iter().map(|line| line.to_string()).collect(),
            },
            calls: calls.clone(),
        };
        (TokenAcquirer::new(fetcher), calls)
    }

    #[tokio::test]
    async fn empty_uri_fails_without_network() {
        let (acquirer, calls) = canned(&["Location: https://c/r?dt-id=X\r\n"]);
        let err = acquirer.acquire("").await.unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn returns_first_token_from_headers() {
        let (acquirer, calls) = canned(&[
            "Content-Type: text/html\r\n",
            "Location: https://carrier/redirect?a=1&dt-id=ABC123&b=2\r\n",
            "Location: https://carrier/redirect?dt-id=LATER\r\n",
        ]);
        let token = acquirer.acquire("https://ts/x").await.expect("token");
        assert_eq!(token.as_str(), "ABC123");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_token_is_empty_not_error() {
        let (acquirer, _) = canned(&["Location: https://carrier/redirect?a=1&b=2\r\n"]);
        let token = acquirer.acquire("https://ts/x").await.expect("token");
        assert!(token.is_empty());
    }

    #[tokio::test]
    async fn custom_key_is_honoured() {
        let (acquirer, _) = canned(&["Location: https://c/r?dt-id=A&alt=B\r\n"]);
        let acquirer = acquirer.with_key("alt");
        assert_eq!(acquirer.acquire("https://ts/x").await.unwrap().as_str(), "B");
    }

    #[test]
    fn canonicalises_header_names() {
        let name = HeaderName::from_static("location");
        assert_eq!(canonical_header_name(&name), "Location");
        let name = HeaderName::from_static("content-location");
        assert_eq!(canonical_header_name(&name), "Content-Location");
    }

    #[test]
    fn debug_does_not_leak_token() {
        let rendered = format!("{:?}", CarrierToken::new("SECRET"));
        assert!(!rendered.contains("SECRET"));
    }
}
