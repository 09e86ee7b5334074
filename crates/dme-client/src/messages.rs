//! Request and reply records exchanged with the match engine.
//!
//! Field names follow the DME REST gateway. Replies default every field since
//! the gateway omits zero values.

use serde::{Deserialize, Serialize};

use crate::location::Location;

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterClientRequest {
    #[serde(rename = "ver")]
    pub version: u32,
    #[serde(rename = "AppName")]
    pub app_name: String,
    #[serde(rename = "DevName")]
    pub dev_name: String,
    #[serde(rename = "AppVers")]
    pub app_version: String,
    #[serde(rename = "AuthToken", default)]
    pub auth_token: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyStatus {
    #[serde(rename = "RS_SUCCESS")]
    Success,
    #[serde(rename = "RS_FAIL")]
    Fail,
    #[default]
    #[serde(rename = "RS_UNDEFINED", other)]
    Undefined,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterClientReply {
    #[serde(rename = "ver")]
    pub version: u32,
    pub status: ReplyStatus,
    #[serde(rename = "SessionCookie")]
    pub session_cookie: String,
    #[serde(rename = "TokenServerURI")]
    pub token_server_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyLocationRequest {
    #[serde(rename = "ver")]
    pub version: u32,
    #[serde(rename = "SessionCookie")]
    pub session_cookie: String,
    #[serde(rename = "CarrierName")]
    pub carrier_name: String,
    #[serde(rename = "GpsLocation")]
    pub gps_location: Location,
    #[serde(rename = "VerifyLocToken", default)]
    pub verify_loc_token: String,
}

impl VerifyLocationRequest {
    /// A copy of this request carrying `token`.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            verify_loc_token: token.into(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TowerStatus {
    #[serde(rename = "CONNECTED_TO_SPECIFIED_TOWER")]
    ConnectedToSpecifiedTower,
    #[serde(rename = "NOT_CONNECTED_TO_SPECIFIED_TOWER")]
    NotConnectedToSpecifiedTower,
    #[default]
    #[serde(rename = "TOWER_UNKNOWN", other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpsLocationStatus {
    #[serde(rename = "LOC_VERIFIED")]
    Verified,
    #[serde(rename = "LOC_MISMATCH_SAME_COUNTRY")]
    MismatchSameCountry,
    #[serde(rename = "LOC_MISMATCH_OTHER_COUNTRY")]
    MismatchOtherCountry,
    #[serde(rename = "LOC_ROAMING_COUNTRY_MATCH")]
    RoamingCountryMatch,
    #[serde(rename = "LOC_ROAMING_COUNTRY_MISMATCH")]
    RoamingCountryMismatch,
    #[serde(rename = "LOC_ERROR_UNAUTHORIZED")]
    ErrorUnauthorized,
    #[serde(rename = "LOC_ERROR_OTHER")]
    ErrorOther,
    #[default]
    #[serde(rename = "LOC_UNKNOWN", other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyLocationReply {
    #[serde(rename = "ver")]
    pub version: u32,
    pub tower_status: TowerStatus,
    pub gps_location_status: GpsLocationStatus,
    pub gps_location_accuracy_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindCloudletRequest {
    #[serde(rename = "ver")]
    pub version: u32,
    #[serde(rename = "SessionCookie")]
    pub session_cookie: String,
    #[serde(rename = "CarrierName")]
    pub carrier_name: String,
    #[serde(rename = "GpsLocation")]
    pub gps_location: Location,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FindStatus {
    #[serde(rename = "FIND_FOUND")]
    Found,
    #[serde(rename = "FIND_NOTFOUND")]
    NotFound,
    #[default]
    #[serde(rename = "FIND_UNKNOWN", other)]
    Unknown,
}

/// Transport protocol of an exposed application port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LProto {
    #[serde(rename = "L_PROTO_TCP")]
    Tcp,
    #[serde(rename = "L_PROTO_UDP")]
    Udp,
    #[serde(rename = "L_PROTO_HTTP")]
    Http,
    #[default]
    #[serde(rename = "L_PROTO_UNKNOWN", other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppPort {
    pub proto: LProto,
    pub internal_port: i32,
    pub public_port: i32,
    pub public_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindCloudletReply {
    #[serde(rename = "ver")]
    pub version: u32,
    pub status: FindStatus,
    pub cloudlet_location: Location,
    pub fqdn: String,
    pub ports: Vec<AppPort>,
}

impl FindCloudletReply {
    pub fn is_found(&self) -> bool {
        self.status == FindStatus::Found
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLocationRequest {
    #[serde(rename = "ver")]
    pub version: u32,
    #[serde(rename = "SessionCookie")]
    pub session_cookie: String,
    #[serde(rename = "CarrierName")]
    pub carrier_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocStatus {
    #[serde(rename = "LOC_FOUND")]
    Found,
    #[serde(rename = "LOC_DENIED")]
    Denied,
    #[default]
    #[serde(rename = "LOC_UNKNOWN", other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetLocationReply {
    #[serde(rename = "ver")]
    pub version: u32,
    pub status: LocStatus,
    #[serde(rename = "CarrierName")]
    pub carrier_name: String,
    pub tower: u64,
    #[serde(rename = "NetworkLocation")]
    pub network_location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInstListRequest {
    #[serde(rename = "ver")]
    pub version: u32,
    #[serde(rename = "SessionCookie")]
    pub session_cookie: String,
    #[serde(rename = "CarrierName")]
    pub carrier_name: String,
    #[serde(rename = "GpsLocation")]
    pub gps_location: Location,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppInstListStatus {
    #[serde(rename = "AI_SUCCESS")]
    Success,
    #[serde(rename = "AI_FAIL")]
    Fail,
    #[default]
    #[serde(rename = "AI_UNDEFINED", other)]
    Undefined,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppInstance {
    #[serde(rename = "AppName")]
    pub app_name: String,
    #[serde(rename = "AppVers")]
    pub app_version: String,
    #[serde(rename = "FQDN")]
    pub fqdn: String,
    pub ports: Vec<AppPort>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudletLocation {
    #[serde(rename = "CarrierName")]
    pub carrier_name: String,
    #[serde(rename = "CloudletName")]
    pub cloudlet_name: String,
    #[serde(rename = "GpsLocation")]
    pub gps_location: Location,
    #[serde(rename = "Distance")]
    pub distance: f64,
    #[serde(rename = "Appinstances")]
    pub app_instances: Vec<AppInstance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppInstListReply {
    #[serde(rename = "ver")]
    pub version: u32,
    pub status: AppInstListStatus,
    #[serde(rename = "Cloudlets")]
    pub cloudlets: Vec<CloudletLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FqdnListRequest {
    #[serde(rename = "ver")]
    pub version: u32,
    #[serde(rename = "SessionCookie")]
    pub session_cookie: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FqdnListStatus {
    #[serde(rename = "FL_SUCCESS")]
    Success,
    #[serde(rename = "FL_FAIL")]
    Fail,
    #[default]
    #[serde(rename = "FL_UNDEFINED", other)]
    Undefined,
}

/// Official FQDNs published for one application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppFqdn {
    #[serde(rename = "AppName")]
    pub app_name: String,
    #[serde(rename = "DevName")]
    pub dev_name: String,
    #[serde(rename = "AppVers")]
    pub app_version: String,
    #[serde(rename = "FQDNs")]
    pub fqdns: Vec<String>,
    #[serde(rename = "AndroidPackageName")]
    pub android_package_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FqdnListReply {
    #[serde(rename = "ver")]
    pub version: u32,
    #[serde(rename = "AppFqdns")]
    pub app_fqdns: Vec<AppFqdn>,
    pub status: FqdnListStatus,
}

/// How members of a dynamic location group talk to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DlgCommType {
    #[serde(rename = "DLG_SECURE")]
    Secure,
    #[serde(rename = "DLG_OPEN")]
    Open,
    #[default]
    #[serde(rename = "DLG_UNDEFINED", other)]
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicLocGroupRequest {
    #[serde(rename = "ver")]
    pub version: u32,
    #[serde(rename = "SessionCookie")]
    pub session_cookie: String,
    #[serde(rename = "LgId")]
    pub lg_id: u64,
    #[serde(rename = "CommType")]
    pub comm_type: DlgCommType,
    #[serde(rename = "UserData", default)]
    pub user_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicLocGroupReply {
    #[serde(rename = "ver")]
    pub version: u32,
    pub status: ReplyStatus,
    pub error_code: u32,
    pub group_cookie: String,
}
