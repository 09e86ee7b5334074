use std::time::Duration;

use url::Url;

use crate::error::{DmeError, DmeResult};

pub const DEFAULT_CARRIER_NAME: &str = "tdg";
pub const DEFAULT_DME_DOMAIN: &str = "dme.mobiledgex.net";
pub const DEFAULT_REST_PORT: u16 = 38001;
pub const DEFAULT_RPC_PORT: u16 = 50051;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Identity of the application registering with the match engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub app_name: String,
    pub dev_name: String,
    pub app_version: String,
}

impl AppIdentity {
    pub fn new(
        app_name: impl Into<String>,
        dev_name: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            dev_name: dev_name.into(),
            app_version: app_version.into(),
        }
    }
}

impl Default for AppIdentity {
    fn default() -> Self {
        Self::new("EmptyMatchEngineApp", "EmptyMatchEngineApp", "1.0")
    }
}

#[derive(Debug, Clone)]
pub struct DmeConfig {
    pub app: AppIdentity,
    /// Deadline applied to every individual request.
    pub request_timeout: Duration,
    pub dme_domain: String,
    pub default_carrier: String,
}

impl Default for DmeConfig {
    fn default() -> Self {
        Self {
            app: AppIdentity::default(),
            request_timeout: DEFAULT_TIMEOUT,
            dme_domain: DEFAULT_DME_DOMAIN.to_string(),
            default_carrier: DEFAULT_CARRIER_NAME.to_string(),
        }
    }
}

impl DmeConfig {
    pub fn new(app: AppIdentity) -> Self {
        Self {
            app,
            ..Self::default()
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_dme_domain(mut self, domain: impl Into<String>) -> Self {
        self.dme_domain = domain.into();
        self
    }

    pub fn with_default_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.default_carrier = carrier.into();
        self
    }

    /// `<carrier>.<domain>`, falling back to the default carrier when empty.
    pub fn dme_host(&self, carrier_name: &str) -> String {
        let carrier = carrier_name.trim();
        let carrier = if carrier.is_empty() {
            self.default_carrier.as_str()
        } else {
            carrier
        };
        format!("{carrier}.{}", self.dme_domain)
    }

    pub fn dme_base_url(&self, carrier_name: &str, port: u16) -> DmeResult<Url> {
        parse_base_url(&format!("https://{}:{port}", self.dme_host(carrier_name)))
    }
}

/// Parses an explicit DME endpoint such as `https://host:38001`.
pub fn parse_base_url(raw: &str) -> DmeResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|err| DmeError::configuration(format!("invalid DME url {raw:?}: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(DmeError::configuration(format!(
            "unsupported DME url scheme {other:?}"
        ))),
    }
}
