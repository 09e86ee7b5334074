use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::{endpoint, normalize_base, status_error, DmeMethod, HttpTarget, TransportClient};
use crate::config::{DmeConfig, DEFAULT_RPC_PORT};
use crate::error::{DmeError, DmeResult};
use crate::messages::{
    AppInstListReply, AppInstListRequest, DynamicLocGroupReply, DynamicLocGroupRequest,
    FindCloudletReply, FindCloudletRequest, FqdnListReply, FqdnListRequest, GetLocationReply,
    GetLocationRequest, RegisterClientReply, RegisterClientRequest, VerifyLocationReply,
    VerifyLocationRequest,
};
use crate::tls::{build_http_client, RedirectMode, TlsCredentials};

pub const RPC_SERVICE: &str = "distributed_match_engine.Match_Engine_Api";

const CONTENT_TYPE_BINARY: &str = "application/octet-stream";
const FRAME_HEADER_LEN: usize = 5;
const FLAG_UNCOMPRESSED: u8 = 0;

/// Frames a record as `flag(1) | len(u32 BE) | bincode payload`.
pub fn encode_frame<T: Serialize>(value: &T) -> DmeResult<Bytes> {
    let payload = bincode::serialize(value)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| DmeError::Parse(format!("frame too large: {} bytes", payload.len())))?;
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u8(FLAG_UNCOMPRESSED);
    buf.put_u32(len);
    buf.put_slice(&payload);
    Ok(buf.freeze())
}

pub fn decode_frame<T: DeserializeOwned>(frame: &[u8]) -> DmeResult<T> {
    if frame.len() < FRAME_HEADER_LEN {
        return Err(DmeError::Parse(format!(
            "short frame: {} bytes",
            frame.len()
        )));
    }
    if frame[0] != FLAG_UNCOMPRESSED {
        return Err(DmeError::Parse(format!(
            "unsupported frame flag {:#x}",
            frame[0]
        )));
    }
    let declared = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]) as usize;
    let payload = &frame[FRAME_HEADER_LEN..];
    if payload.len() != declared {
        return Err(DmeError::Parse(format!(
            "frame length mismatch: declared {declared}, got {}",
            payload.len()
        )));
    }
    Ok(bincode::deserialize(payload)?)
}

/// Binary-RPC variant: bincode records in length-prefixed frames, one POST
/// per call to `/<service>/<Method>`.
#[derive(Debug, Clone)]
pub struct BinaryRpcTransport {
    target: HttpTarget,
}

impl BinaryRpcTransport {
    pub fn new(base_url: Url, credentials: &TlsCredentials, timeout: Duration) -> DmeResult<Self> {
        let http = build_http_client(credentials, RedirectMode::Follow, timeout)?;
        Ok(Self::with_client(http, base_url, timeout))
    }

    /// Targets `https://<carrier>.<domain>:50051`.
    pub fn for_carrier(
        config: &DmeConfig,
        carrier_name: &str,
        credentials: &TlsCredentials,
    ) -> DmeResult<Self> {
        let base_url = config.dme_base_url(carrier_name, DEFAULT_RPC_PORT)?;
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

    async fn call<Req, Rep>(&self, method: DmeMethod, request: &Req) -> DmeResult<Rep>
    where
        Req: Serialize + Sync,
        Rep: DeserializeOwned,
    {
        let path = format!("{RPC_SERVICE}/{}", method.rpc_name());
        let url = endpoint(&self.target.base_url, &path)?;
        let frame = encode_frame(request)?;
        debug!(
            target = "dme.transport",
            method = ?method,
            url = %url,
            frame_len = frame.len(),
            "sending rpc frame"
        );

        let res = self
            .target
            .http
            .post(url)
            .header(ACCEPT, CONTENT_TYPE_BINARY)
            .header(CONTENT_TYPE, CONTENT_TYPE_BINARY)
            .timeout(self.target.timeout)
            .body(frame)
            .send()
            .await?;

        let status = res.status();
        let body = res.bytes().await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        decode_frame(&body)
    }
}

#[async_trait]
impl TransportClient for BinaryRpcTransport {
    async fn register_client(
        &self,
        request: &RegisterClientRequest,
    ) -> DmeResult<RegisterClientReply> {
        self.call(DmeMethod::RegisterClient, request).await
    }

    async fn verify_location(
        &self,
        request: &VerifyLocationRequest,
    ) -> DmeResult<VerifyLocationReply> {
        self.call(DmeMethod::VerifyLocation, request).await
    }

    async fn find_cloudlet(&self, request: &FindCloudletRequest) -> DmeResult<FindCloudletReply> {
        self.call(DmeMethod::FindCloudlet, request).await
    }

    async fn get_location(&self, request: &GetLocationRequest) -> DmeResult<GetLocationReply> {
        self.call(DmeMethod::GetLocation, request).await
    }

    async fn get_app_inst_list(
        &self,
        request: &AppInstListRequest,
    ) -> DmeResult<AppInstListReply> {
        self.call(DmeMethod::GetAppInstList, request).await
    }

    async fn get_fqdn_list(&self, request: &FqdnListRequest) -> DmeResult<FqdnListReply> {
        self.call(DmeMethod::GetFqdnList, request).await
    }

    async fn add_user_to_group(
        &self,
        request: &DynamicLocGroupRequest,
    ) -> DmeResult<DynamicLocGroupReply> {
        self.call(DmeMethod::AddUserToGroup, request).await
    }
}
