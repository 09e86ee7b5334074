use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::{endpoint, normalize_base, status_error, DmeMethod, HttpTarget, TransportClient};
use crate::config::{DmeConfig, DEFAULT_REST_PORT};
use crate::error::DmeResult;
use crate::messages::{
    AppInstListReply, AppInstListRequest, DynamicLocGroupReply, DynamicLocGroupRequest,
    FindCloudletReply, FindCloudletRequest, FqdnListReply, FqdnListRequest, GetLocationReply,
    GetLocationRequest, RegisterClientReply, RegisterClientRequest, VerifyLocationReply,
    VerifyLocationRequest,
};
use crate::tls::{build_http_client, RedirectMode, TlsCredentials};

/// JSON-over-HTTPS variant of the match-engine API.
#[derive(Debug, Clone)]
pub struct RestTransport {
    target: HttpTarget,
}

impl RestTransport {
    pub fn new(base_url: Url, credentials: &TlsCredentials, timeout: Duration) -> DmeResult<Self> {
        let http = build_http_client(credentials, RedirectMode::Follow, timeout)?;
        Ok(Self::with_client(http, base_url, timeout))
    }

    /// Targets `https://<carrier>.<domain>:38001`.
    pub fn for_carrier(
        config: &DmeConfig,
        carrier_name: &str,
        credentials: &TlsCredentials,
    ) -> DmeResult<Self> {
        let base_url = config.dme_base_url(carrier_name, DEFAULT_REST_PORT)?;
        Self::new(base_url, credentials, config.request_timeout)
    }

    pub fn with_client(http: reqwest::Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            target: HttpTarget {
                http,
                base_url: normalize_base(base_url),
                timeout,
            },
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.target.base_url
    }

    async fn post<Req, Rep>(&self, method: DmeMethod, request: &Req) -> DmeResult<Rep>
    where
        Req: Serialize + Sync,
        Rep: DeserializeOwned,
    {
        let url = endpoint(&self.target.base_url, method.rest_path())?;
        debug!(target = "dme.transport", method = ?method, url = %url, "posting json request");

        let res = self
            .target
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.target.timeout)
            .json(request)
            .send()
            .await?;

        let status = res.status();
        let body = res.bytes().await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl TransportClient for RestTransport {
    async fn register_client(
        &self,
        request: &RegisterClientRequest,
    ) -> DmeResult<RegisterClientReply> {
        self.post(DmeMethod::RegisterClient, request).await
    }

    async fn verify_location(
        &self,
        request: &VerifyLocationRequest,
    ) -> DmeResult<VerifyLocationReply> {
        self.post(DmeMethod::VerifyLocation, request).await
    }

    async fn find_cloudlet(&self, request: &FindCloudletRequest) -> DmeResult<FindCloudletReply> {
        self.post(DmeMethod::FindCloudlet, request).await
    }

    async fn get_location(&self, request: &GetLocationRequest) -> DmeResult<GetLocationReply> {
        self.post(DmeMethod::GetLocation, request).await
    }

    async fn get_app_inst_list(
        &self,
        request: &AppInstListRequest,
    ) -> DmeResult<AppInstListReply> {
        self.post(DmeMethod::GetAppInstList, request).await
    }

    async fn get_fqdn_list(&self, request: &FqdnListRequest) -> DmeResult<FqdnListReply> {
        self.post(DmeMethod::GetFqdnList, request).await
    }

    async fn add_user_to_group(
        &self,
        request: &DynamicLocGroupRequest,
    ) -> DmeResult<DynamicLocGroupReply> {
        self.post(DmeMethod::AddUserToGroup, request).await
    }
}
