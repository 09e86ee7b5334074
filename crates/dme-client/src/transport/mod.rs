//! Wire transports for the match-engine API.
//!
//! The session logic only sees [`TransportClient`]; the REST and binary-RPC
//! variants differ in encoding and paths, nothing else.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::error::{DmeError, DmeResult};
use crate::messages::{
    AppInstListReply, AppInstListRequest, DynamicLocGroupReply, DynamicLocGroupRequest,
    FindCloudletReply, FindCloudletRequest, FqdnListReply, FqdnListRequest, GetLocationReply,
    GetLocationRequest, RegisterClientReply, RegisterClientRequest, VerifyLocationReply,
    VerifyLocationRequest,
};

mod binary;
mod rest;

pub use binary::{decode_frame, encode_frame, BinaryRpcTransport, RPC_SERVICE};
pub use rest::RestTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DmeMethod {
    RegisterClient,
    VerifyLocation,
    FindCloudlet,
    GetLocation,
    GetAppInstList,
    GetFqdnList,
    AddUserToGroup,
}

impl DmeMethod {
    pub fn rest_path(self) -> &'static str {
        match self {
            DmeMethod::RegisterClient => "v1/registerclient",
            DmeMethod::VerifyLocation => "v1/verifylocation",
            DmeMethod::FindCloudlet => "v1/findcloudlet",
            DmeMethod::GetLocation => "v1/getlocation",
            DmeMethod::GetAppInstList => "v1/getappinstlist",
            DmeMethod::GetFqdnList => "v1/getfqdnlist",
            DmeMethod::AddUserToGroup => "v1/dynamiclocgroup",
        }
    }

    pub fn rpc_name(self) -> &'static str {
        match self {
            DmeMethod::RegisterClient => "RegisterClient",
            DmeMethod::VerifyLocation => "VerifyLocation",
            DmeMethod::FindCloudlet => "FindCloudlet",
            DmeMethod::GetLocation => "GetLocation",
            DmeMethod::GetAppInstList => "GetAppInstList",
            DmeMethod::GetFqdnList => "GetFqdnList",
            DmeMethod::AddUserToGroup => "AddUserToGroup",
        }
    }
}

/// One request/reply exchange with the match engine per method.
///
/// Implementations apply a fresh deadline to every call and never retry.
#[async_trait]
pub trait TransportClient: Send + Sync {
    async fn register_client(
        &self,
        request: &RegisterClientRequest,
    ) -> DmeResult<RegisterClientReply>;

    async fn verify_location(
        &self,
        request: &VerifyLocationRequest,
    ) -> DmeResult<VerifyLocationReply>;

    async fn find_cloudlet(&self, request: &FindCloudletRequest) -> DmeResult<FindCloudletReply>;

    async fn get_location(&self, request: &GetLocationRequest) -> DmeResult<GetLocationReply>;

    async fn get_app_inst_list(
        &self,
        request: &AppInstListRequest,
    ) -> DmeResult<AppInstListReply>;

    async fn get_fqdn_list(&self, request: &FqdnListRequest) -> DmeResult<FqdnListReply>;

    async fn add_user_to_group(
        &self,
        request: &DynamicLocGroupRequest,
    ) -> DmeResult<DynamicLocGroupReply>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i32,
    message: String,
}

/// Maps a non-success HTTP answer from the DME to a protocol error, using the
/// gateway's `{"code", "message"}` body when present.
pub(crate) fn status_error(status: StatusCode, body: &[u8]) -> DmeError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => DmeError::protocol(parsed.code, parsed.message),
        Err(_) => DmeError::protocol(
            i32::from(status.as_u16()),
            String::from_utf8_lossy(body).trim().to_string(),
        ),
    }
}

/// Ensures the base ends in `/` so relative joins keep any path prefix.
pub(crate) fn normalize_base(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

pub(crate) fn endpoint(base: &Url, path: &str) -> DmeResult<Url> {
    base.join(path)
        .map_err(|err| DmeError::configuration(format!("invalid endpoint {path}: {err}")))
}

#[derive(Debug, Clone)]
pub(crate) struct HttpTarget {
    pub http: reqwest::Client,
    pub base_url: Url,
    pub timeout: Duration,
}
