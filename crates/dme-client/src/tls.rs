use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Certificate, Client, Identity};

use crate::error::{DmeError, DmeResult};

/// Mutual-TLS material supplied by the caller as PEM text.
///
/// Loading the files is the caller's business; this type never touches the
/// filesystem.
#[derive(Clone, Default)]
pub struct TlsCredentials {
    pub ca_cert_pem: Option<String>,
    pub client_cert_pem: Option<String>,
    pub client_key_pem: Option<String>,
}

impl std::fmt::Debug for TlsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsCredentials")
            .field("ca_cert", &self.ca_cert_pem.is_some())
            .field("client_cert", &self.client_cert_pem.is_some())
            .field("client_key", &self.client_key_pem.is_some())
            .finish()
    }
}

impl TlsCredentials {
    pub fn new(
        ca_cert_pem: impl Into<String>,
        client_cert_pem: impl Into<String>,
        client_key_pem: impl Into<String>,
    ) -> Self {
        Self {
            ca_cert_pem: Some(ca_cert_pem.into()),
            client_cert_pem: Some(client_cert_pem.into()),
            client_key_pem: Some(client_key_pem.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ca_cert_pem.is_none() && self.client_cert_pem.is_none() && self.client_key_pem.is_none()
    }

    fn identity(&self) -> DmeResult<Option<Identity>> {
        match (&self.client_cert_pem, &self.client_key_pem) {
            (Some(cert), Some(key)) => {
                let mut pem = String::with_capacity(cert.len() + key.len() + 1);
                pem.push_str(cert.trim_end());
                pem.push('\n');
                pem.push_str(key);
                Identity::from_pem(pem.as_bytes())
                    .map(Some)
                    .map_err(|err| DmeError::configuration(format!("invalid client identity: {err}")))
            }
            (None, None) => Ok(None),
            _ => Err(DmeError::configuration(
                "client certificate and key must be supplied together",
            )),
        }
    }

    fn root_certificate(&self) -> DmeResult<Option<Certificate>> {
        self.ca_cert_pem
            .as_deref()
            .map(|pem| {
                Certificate::from_pem(pem.as_bytes())
                    .map_err(|err| DmeError::configuration(format!("invalid CA certificate: {err}")))
            })
            .transpose()
    }
}

/// Which redirect behaviour the built client should have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    Follow,
    /// Hand 3xx responses back untouched.
    Capture,
}

/// Builds a rustls-backed client with peer verification left on.
pub fn build_http_client(
    credentials: &TlsCredentials,
    redirects: RedirectMode,
    connect_timeout: Duration,
) -> DmeResult<Client> {
    let mut builder = Client::builder()
        .use_rustls_tls()
        .connect_timeout(connect_timeout)
        .redirect(match redirects {
            RedirectMode::Follow => Policy::default(),
            RedirectMode::Capture => Policy::none(),
        });

    if let Some(root) = credentials.root_certificate()? {
        builder = builder.add_root_certificate(root);
    }
    if let Some(identity) = credentials.identity()? {
        builder = builder.identity(identity);
    }

    builder
        .build()
        .map_err(|err| DmeError::configuration(format!("failed to build http client: {err}")))
}
