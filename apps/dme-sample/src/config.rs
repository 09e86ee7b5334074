use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use dme_client::config::DEFAULT_CARRIER_NAME;
use dme_client::{AppIdentity, DmeConfig, TlsCredentials};
use serde::Deserialize;

use crate::cli::{Cli, Wire};

/// Settings read from `DME_*` environment variables (and `.env`).
#[derive(Debug, Clone, Deserialize)]
pub struct SampleConfig {
    #[serde(default = "default_carrier")]
    pub carrier_name: String,
    #[serde(default)]
    pub dme_url: Option<String>,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_name")]
    pub dev_name: String,
    #[serde(default = "default_app_version")]
    pub app_version: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    #[serde(default)]
    pub client_cert: Option<PathBuf>,
    #[serde(default)]
    pub client_key: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub wire: Wire,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            carrier_name: default_carrier(),
            dme_url: None,
            app_name: default_app_name(),
            dev_name: default_app_name(),
            app_version: default_app_version(),
            auth_token: None,
            ca_cert: None,
            client_cert: None,
            client_key: None,
            timeout_secs: default_timeout_secs(),
            log_filter: default_log_filter(),
            wire: Wire::default(),
        }
    }
}

impl SampleConfig {
    pub fn from_env() -> Self {
        ::config::Config::builder()
            .add_source(::config::Environment::with_prefix("DME"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map(SampleConfig::normalize)
            .unwrap_or_else(|_| SampleConfig::default())
    }

    /// Command-line flags override the environment.
    pub fn merge_cli(mut self, cli: &Cli) -> Self {
        if let Some(carrier) = &cli.carrier {
            self.carrier_name = carrier.clone();
        }
        if let Some(url) = &cli.dme_url {
            self.dme_url = Some(url.clone());
        }
        if let Some(token) = &cli.auth_token {
            self.auth_token = Some(token.clone());
        }
        if let Some(path) = &cli.ca_cert {
            self.ca_cert = Some(path.clone());
        }
        if let Some(path) = &cli.client_cert {
            self.client_cert = Some(path.clone());
        }
        if let Some(path) = &cli.client_key {
            self.client_key = Some(path.clone());
        }
        if let Some(secs) = cli.timeout_secs {
            self.timeout_secs = secs;
        }
        if let Some(wire) = cli.wire {
            self.wire = wire;
        }
        self.normalize()
    }

    pub fn dme_config(&self) -> DmeConfig {
        DmeConfig::new(AppIdentity::new(
            &self.app_name,
            &self.dev_name,
            &self.app_version,
        ))
        .with_request_timeout(Duration::from_secs(self.timeout_secs.max(1)))
    }

    /// Reads the PEM files named in the configuration.
    pub fn load_credentials(&self) -> Result<TlsCredentials> {
        Ok(TlsCredentials {
            ca_cert_pem: read_pem(self.ca_cert.as_ref())?,
            client_cert_pem: read_pem(self.client_cert.as_ref())?,
            client_key_pem: read_pem(self.client_key.as_ref())?,
        })
    }

    fn normalize(mut self) -> Self {
        self.dme_url = Self::normalize_opt(self.dme_url.take());
        self.auth_token = Self::normalize_opt(self.auth_token.take());
        self.carrier_name = self.carrier_name.trim().to_string();
        self
    }

    fn normalize_opt(value: Option<String>) -> Option<String> {
        value.and_then(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }
}

fn read_pem(path: Option<&PathBuf>) -> Result<Option<String>> {
    path.map(|path| {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    })
    .transpose()
}

fn default_carrier() -> String {
    DEFAULT_CARRIER_NAME.to_string()
}

fn default_app_name() -> String {
    "EmptyMatchEngineApp".to_string()
}

fn default_app_version() -> String {
    "1.0".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_log_filter() -> String {
    "info".to_string()
}
