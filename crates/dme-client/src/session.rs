//! Register → VerifyLocation → FindCloudlet sequencing.
//!
//! A session is not meant for concurrent use. Every step that moves the
//! session forward takes `&mut self`; wrap the session in a lock to share it.

use tracing::{debug, info, warn};

use crate::config::DmeConfig;
use crate::error::{DmeError, DmeResult};
use crate::location::Location;
use crate::messages::{
    AppInstListReply, AppInstListRequest, AppInstListStatus, DlgCommType, DynamicLocGroupReply,
    DynamicLocGroupRequest, FindCloudletReply, FindCloudletRequest, FqdnListReply,
    FqdnListRequest, FqdnListStatus, GetLocationReply, GetLocationRequest, RegisterClientReply,
    RegisterClientRequest, ReplyStatus, VerifyLocationReply, VerifyLocationRequest,
    PROTOCOL_VERSION,
};
use crate::token::{HttpRedirectFetcher, RedirectFetcher, TokenAcquirer};
use crate::transport::TransportClient;

/// Server-assigned session context from a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    session_cookie: String,
    token_server_uri: String,
}

impl SessionState {
    /// Transition out of `Fresh`. Fails unless the reply is a success that
    /// carries a session cookie.
    pub fn from_register_reply(reply: &RegisterClientReply) -> DmeResult<Self> {
        if reply.status != ReplyStatus::Success {
            return Err(DmeError::protocol(
                -1,
                format!("register client returned {:?}", reply.status),
            ));
        }
        if reply.session_cookie.is_empty() {
            return Err(DmeError::protocol(
                -1,
                "register client reply carried no session cookie",
            ));
        }
        Ok(Self {
            session_cookie: reply.session_cookie.clone(),
            token_server_uri: reply.token_server_uri.clone(),
        })
    }

    pub fn session_cookie(&self) -> &str {
        &self.session_cookie
    }

    /// May be empty when the carrier has no token step.
    pub fn token_server_uri(&self) -> &str {
        &self.token_server_uri
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    Fresh,
    Registered,
    LocationVerified,
    CloudletFound,
}

pub struct EdgeDiscoverySession<T, F = HttpRedirectFetcher> {
    transport: T,
    tokens: TokenAcquirer<F>,
    config: DmeConfig,
    state: Option<SessionState>,
    phase: SessionPhase,
}

impl<T, F> EdgeDiscoverySession<T, F>
where
    T: TransportClient,
    F: RedirectFetcher,
{
    pub fn new(transport: T, tokens: TokenAcquirer<F>, config: DmeConfig) -> Self {
        Self {
            transport,
            tokens,
            config,
            state: None,
            phase: SessionPhase::Fresh,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn config(&self) -> &DmeConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Drops the session so the next step has to register again.
    pub fn reset(&mut self) {
        self.state = None;
        self.phase = SessionPhase::Fresh;
    }

    pub fn register_request(&self, auth_token: Option<&str>) -> RegisterClientRequest {
        RegisterClientRequest {
            version: PROTOCOL_VERSION,
            app_name: self.config.app.app_name.clone(),
            dev_name: self.config.app.dev_name.clone(),
            app_version: self.config.app.app_version.clone(),
            auth_token: auth_token.unwrap_or_default().to_string(),
        }
    }

    /// Registers with the DME. The session state is replaced only when the
    /// reply is a success; otherwise it is left exactly as it was.
    pub async fn register(&mut self, auth_token: Option<&str>) -> DmeResult<RegisterClientReply> {
        let request = self.register_request(auth_token);
        let reply = self.transport.register_client(&request).await?;
        let state = SessionState::from_register_reply(&reply).map_err(|err| {
            warn!(target = "dme.session", status = ?reply.status, "registration rejected");
            err
        })?;

        info!(
            target = "dme.session",
            app = %request.app_name,
            token_server = %state.token_server_uri,
            "registered with match engine"
        );
        self.state = Some(state);
        self.phase = SessionPhase::Registered;
        Ok(reply)
    }

    pub fn verify_location_request(
        &self,
        carrier_name: &str,
        location: Location,
        carrier_token: Option<&str>,
    ) -> DmeResult<VerifyLocationRequest> {
        let state = self.require_registered("verify location")?;
        Ok(VerifyLocationRequest {
            version: PROTOCOL_VERSION,
            session_cookie: state.session_cookie.clone(),
            carrier_name: self.carrier_or_default(carrier_name),
            gps_location: location,
            verify_loc_token: carrier_token.unwrap_or_default().to_string(),
        })
    }

    /// Verifies the device location. A non-empty `carrier_token` is sent as
    /// is; otherwise a fresh token is fetched from the token server for this
    /// call alone.
    pub async fn verify_location(
        &mut self,
        carrier_name: &str,
        location: Location,
        carrier_token: Option<&str>,
    ) -> DmeResult<VerifyLocationReply> {
        let request = self.verify_location_request(carrier_name, location, carrier_token)?;
        let request = if request.verify_loc_token.is_empty() {
            let token_server_uri = self
                .state
                .as_ref()
                .map(|state| state.token_server_uri.as_str())
                .unwrap_or_default();
            if token_server_uri.is_empty() {
                return Err(DmeError::configuration(
                    "no token server uri; registration did not complete",
                ));
            }
            let token = self.tokens.acquire(token_server_uri).await?;
            if token.is_empty() {
                warn!(target = "dme.session", "carrier redirect carried no token");
            }
            request.with_token(token.into_string())
        } else {
            debug!(target = "dme.session", "using caller supplied carrier token");
            request
        };

        let reply = self.transport.verify_location(&request).await?;
        debug!(
            target = "dme.session",
            tower = ?reply.tower_status,
            gps = ?reply.gps_location_status,
            accuracy_km = reply.gps_location_accuracy_km,
            "location verified"
        );
        self.advance(SessionPhase::LocationVerified);
        Ok(reply)
    }

    pub fn find_cloudlet_request(
        &self,
        carrier_name: &str,
        location: Location,
    ) -> DmeResult<FindCloudletRequest> {
        let state = self.require_registered("find cloudlet")?;
        Ok(FindCloudletRequest {
            version: PROTOCOL_VERSION,
            session_cookie: state.session_cookie.clone(),
            carrier_name: self.carrier_or_default(carrier_name),
            gps_location: location,
        })
    }

    /// Finds the nearest cloudlet. Any status other than `FIND_FOUND` is a
    /// protocol error and leaves the phase where it was.
    pub async fn find_cloudlet(
        &mut self,
        carrier_name: &str,
        location: Location,
    ) -> DmeResult<FindCloudletReply> {
        let request = self.find_cloudlet_request(carrier_name, location)?;
        let reply = self.transport.find_cloudlet(&request).await?;
        if !reply.is_found() {
            warn!(target = "dme.session", status = ?reply.status, "no cloudlet found");
            return Err(DmeError::protocol(
                -1,
                format!("find cloudlet returned {:?}", reply.status),
            ));
        }
        info!(
            target = "dme.session",
            fqdn = %reply.fqdn,
            ports = reply.ports.len(),
            "cloudlet found"
        );
        self.advance(SessionPhase::CloudletFound);
        Ok(reply)
    }

    /// Carrier network view of where the device is.
    pub async fn get_location(&self, carrier_name: &str) -> DmeResult<GetLocationReply> {
        let state = self.require_registered("get location")?;
        let request = GetLocationRequest {
            version: PROTOCOL_VERSION,
            session_cookie: state.session_cookie.clone(),
            carrier_name: self.carrier_or_default(carrier_name),
        };
        self.transport.get_location(&request).await
    }

    pub async fn get_app_inst_list(
        &self,
        carrier_name: &str,
        location: Location,
    ) -> DmeResult<AppInstListReply> {
        let state = self.require_registered("get app instance list")?;
        let request = AppInstListRequest {
            version: PROTOCOL_VERSION,
            session_cookie: state.session_cookie.clone(),
            carrier_name: self.carrier_or_default(carrier_name),
            gps_location: location,
        };
        let reply = self.transport.get_app_inst_list(&request).await?;
        if reply.status == AppInstListStatus::Fail {
            return Err(DmeError::protocol(-1, "app instance list returned AI_FAIL"));
        }
        Ok(reply)
    }

    /// Official FQDNs of every application. Only platform apps are allowed
    /// to ask.
    pub async fn get_fqdn_list(&self) -> DmeResult<FqdnListReply> {
        let state = self.require_registered("get fqdn list")?;
        let request = FqdnListRequest {
            version: PROTOCOL_VERSION,
            session_cookie: state.session_cookie.clone(),
        };
        let reply = self.transport.get_fqdn_list(&request).await?;
        if reply.status == FqdnListStatus::Fail {
            return Err(DmeError::protocol(-1, "fqdn list returned FL_FAIL"));
        }
        Ok(reply)
    }

    pub async fn add_user_to_group(
        &self,
        lg_id: u64,
        comm_type: DlgCommType,
        user_data: &str,
    ) -> DmeResult<DynamicLocGroupReply> {
        let state = self.require_registered("add user to group")?;
        let request = DynamicLocGroupRequest {
            version: PROTOCOL_VERSION,
            session_cookie: state.session_cookie.clone(),
            lg_id,
            comm_type,
            user_data: user_data.to_string(),
        };
        let reply = self.transport.add_user_to_group(&request).await?;
        if reply.status != ReplyStatus::Success {
            return Err(DmeError::protocol(
                i32::try_from(reply.error_code).unwrap_or(-1),
                format!("add user to group returned {:?}", reply.status),
            ));
        }
        debug!(target = "dme.session", lg_id, "joined dynamic location group");
        Ok(reply)
    }

    fn require_registered(&self, step: &str) -> DmeResult<&SessionState> {
        self.state.as_ref().ok_or_else(|| {
            DmeError::configuration(format!("cannot {step} before a successful register"))
        })
    }

    fn carrier_or_default(&self, carrier_name: &str) -> String {
        let carrier_name = carrier_name.trim();
        if carrier_name.is_empty() {
            self.config.default_carrier.clone()
        } else {
            carrier_name.to_string()
        }
    }

    fn advance(&mut self, phase: SessionPhase) {
        if phase > self.phase {
            self.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{AppPort, FindStatus, LProto, TowerStatus};
    use crate::token::RedirectResponse;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        registers: Vec<RegisterClientRequest>,
        verifies: Vec<VerifyLocationRequest>,
        finds: Vec<FindCloudletRequest>,
        groups: Vec<DynamicLocGroupRequest>,
        cookies_seen: Vec<String>,
        token_fetches: Vec<String>,
    }

    #[derive(Clone)]
    struct FakeDme {
        recorded: Arc<Mutex<Recorded>>,
        register_reply: Arc<Mutex<RegisterClientReply>>,
        find_reply: Arc<Mutex<FindCloudletReply>>,
    }

    #[async_trait]
    impl TransportClient for FakeDme {
        async fn register_client(
            &self,
            request: &RegisterClientRequest,
        ) -> DmeResult<RegisterClientReply> {
            self.recorded.lock().unwrap().registers.push(request.clone());
            Ok(self.register_reply.lock().unwrap().clone())
        }

        async fn verify_location(
            &self,
            request: &VerifyLocationRequest,
        ) -> DmeResult<VerifyLocationReply> {
            self.recorded.lock().unwrap().verifies.push(request.clone());
            Ok(VerifyLocationReply {
                version: 1,
                tower_status: TowerStatus::ConnectedToSpecifiedTower,
                ..VerifyLocationReply::default()
            })
        }

        async fn find_cloudlet(
            &self,
            request: &FindCloudletRequest,
        ) -> DmeResult<FindCloudletReply> {
            self.recorded.lock().unwrap().finds.push(request.clone());
            Ok(self.find_reply.lock().unwrap().clone())
        }

        async fn get_location(&self, _request: &GetLocationRequest) -> DmeResult<GetLocationReply> {
            Ok(GetLocationReply::default())
        }

        async fn get_app_inst_list(
            &self,
            _request: &AppInstListRequest,
        ) -> DmeResult<AppInstListReply> {
            Ok(AppInstListReply {
                status: AppInstListStatus::Fail,
                ..AppInstListReply::default()
            })
        }

        async fn get_fqdn_list(&self, request: &FqdnListRequest) -> DmeResult<FqdnListReply> {
            self.recorded
                .lock()
                .unwrap()
                .cookies_seen
                .push(request.session_cookie.clone());
            Ok(FqdnListReply {
                version: 1,
                status: FqdnListStatus::Success,
                ..FqdnListReply::default()
            })
        }

        async fn add_user_to_group(
            &self,
            request: &DynamicLocGroupRequest,
        ) -> DmeResult<DynamicLocGroupReply> {
            self.recorded.lock().unwrap().groups.push(request.clone());
            let status = if request.lg_id == 0 {
                ReplyStatus::Fail
            } else {
                ReplyStatus::Success
            };
            Ok(DynamicLocGroupReply {
                version: 1,
                status,
                error_code: if request.lg_id == 0 { 7 } else { 0 },
                group_cookie: format!("G{}", request.lg_id),
            })
        }
    }

    struct FakeTokenServer {
        recorded: Arc<Mutex<Recorded>>,
    }

    #[async_trait]
    impl RedirectFetcher for FakeTokenServer {
        async fn fetch(&self, uri: &str) -> DmeResult<RedirectResponse> {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.token_fetches.push(uri.to_string());
            let n = recorded.token_fetches.len();
            Ok(RedirectResponse {
                status: 303,
                header_lines: vec![
                    "Content-Length: 0\r\n".into(),
                    format!("Location: https://carrier/redirect?a=1&dt-id=T{n}\r\n"),
                ],
            })
        }
    }

    fn session(
        register_reply: RegisterClientReply,
    ) -> (
        EdgeDiscoverySession<FakeDme, FakeTokenServer>,
        Arc<Mutex<Recorded>>,
    ) {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let dme = FakeDme {
            recorded: recorded.clone(),
            register_reply: Arc::new(Mutex::new(register_reply)),
            find_reply: Arc::new(Mutex::new(FindCloudletReply {
                version: 1,
                status: FindStatus::Found,
                fqdn: "app.cloudlet.example".into(),
                ports: vec![
                    AppPort {
                        proto: LProto::Tcp,
                        internal_port: 80,
                        public_port: 8080,
                        public_path: "/a".into(),
                    },
                    AppPort {
                        proto: LProto::Udp,
                        internal_port: 53,
                        public_port: 5353,
                        public_path: "/b".into(),
                    },
                ],
                ..FindCloudletReply::default()
            })),
        };
        let tokens = TokenAcquirer::new(FakeTokenServer {
            recorded: recorded.clone(),
        });
        (
            EdgeDiscoverySession::new(dme, tokens, DmeConfig::default()),
            recorded,
        )
    }

    fn ok_register() -> RegisterClientReply {
        RegisterClientReply {
            version: 1,
            status: ReplyStatus::Success,
            session_cookie: "S1".into(),
            token_server_uri: "https://ts/x".into(),
        }
    }

    #[tokio::test]
    async fn steps_before_register_fail_without_network() {
        let (mut session, recorded) = session(ok_register());
        let err = session
            .verify_location("tdg", Location::new(1.0, 2.0), None)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        let err = session
            .find_cloudlet("tdg", Location::new(1.0, 2.0))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(session.get_location("tdg").await.unwrap_err().is_configuration());

        let recorded = recorded.lock().unwrap();
        assert!(recorded.verifies.is_empty());
        assert!(recorded.finds.is_empty());
        assert!(recorded.token_fetches.is_empty());
        assert_eq!(session.phase(), SessionPhase::Fresh);
    }

    #[tokio::test]
    async fn register_populates_state_and_request_identity() {
        let (mut session, recorded) = session(ok_register());
        session.register(Some("auth")).await.expect("register");
        assert_eq!(session.phase(), SessionPhase::Registered);
        let state = session.state().expect("state");
        assert_eq!(state.session_cookie(), "S1");
        assert_eq!(state.token_server_uri(), "https://ts/x");

        let recorded = recorded.lock().unwrap();
        let request = &recorded.registers[0];
        assert_eq!(request.version, 1);
        assert_eq!(request.app_name, "EmptyMatchEngineApp");
        assert_eq!(request.auth_token, "auth");
    }

    #[tokio::test]
    async fn failed_register_leaves_session_fresh() {
        let (mut session, _) = session(RegisterClientReply {
            status: ReplyStatus::Fail,
            ..ok_register()
        });
        let err = session.register(None).await.unwrap_err();
        assert!(matches!(err, DmeError::Protocol { .. }));
        assert!(session.state().is_none());
        assert_eq!(session.phase(), SessionPhase::Fresh);
    }

    #[tokio::test]
    async fn verify_location_injects_fresh_token_each_call() {
        let (mut session, recorded) = session(ok_register());
        session.register(None).await.expect("register");
        session
            .verify_location("tdg", Location::new(1.0, 2.0), None)
            .await
            .expect("verify");
        session
            .verify_location("tdg", Location::new(1.0, 2.0), None)
            .await
            .expect("verify again");
        assert_eq!(session.phase(), SessionPhase::LocationVerified);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.token_fetches, vec!["https://ts/x", "https://ts/x"]);
        assert_eq!(recorded.verifies[0].verify_loc_token, "T1");
        assert_eq!(recorded.verifies[1].verify_loc_token, "T2");
        assert_eq!(recorded.verifies[0].session_cookie, "S1");
    }

    #[tokio::test]
    async fn caller_token_is_not_overridden() {
        let (mut session, recorded) = session(ok_register());
        session.register(None).await.expect("register");
        session
            .verify_location("tdg", Location::new(1.0, 2.0), Some("MINE"))
            .await
            .expect("verify");
        let recorded = recorded.lock().unwrap();
        assert!(recorded.token_fetches.is_empty());
        assert_eq!(recorded.verifies[0].verify_loc_token, "MINE");
    }

    #[tokio::test]
    async fn empty_token_server_uri_fails_before_send() {
        let (mut session, recorded) = session(RegisterClientReply {
            token_server_uri: String::new(),
            ..ok_register()
        });
        session.register(None).await.expect("register");
        let err = session
            .verify_location("tdg", Location::new(1.0, 2.0), None)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(recorded.lock().unwrap().verifies.is_empty());
    }

    #[tokio::test]
    async fn find_cloudlet_uses_cookie_and_keeps_port_order() {
        let (mut session, recorded) = session(ok_register());
        session.register(None).await.expect("register");
        let reply = session
            .find_cloudlet("", Location::new(1.0, 2.0))
            .await
            .expect("find");
        assert_eq!(session.phase(), SessionPhase::CloudletFound);
        assert_eq!(reply.ports.len(), 2);
        assert_eq!(reply.ports[0].public_path, "/a");
        assert_eq!(reply.ports[1].proto, LProto::Udp);
        assert_eq!(reply.ports[1].internal_port, 53);
        assert_eq!(reply.ports[1].public_port, 5353);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.finds[0].session_cookie, "S1");
        assert_eq!(recorded.finds[0].carrier_name, "tdg");
        assert!(recorded.token_fetches.is_empty());
    }

    #[tokio::test]
    async fn app_inst_list_failure_is_protocol_error() {
        let (mut session, _) = session(ok_register());
        session.register(None).await.expect("register");
        let err = session
            .get_app_inst_list("tdg", Location::new(1.0, 2.0))
            .await
            .unwrap_err();
        assert!(matches!(err, DmeError::Protocol { .. }));
    }

    #[tokio::test]
    async fn reset_requires_registering_again() {
        let (mut session, _) = session(ok_register());
        session.register(None).await.expect("register");
        session.reset();
        assert_eq!(session.phase(), SessionPhase::Fresh);
        assert!(session
            .find_cloudlet("tdg", Location::new(1.0, 2.0))
            .await
            .unwrap_err()
            .is_configuration());
    }

    #[tokio::test]
    async fn failed_reregister_keeps_previous_session() {
        let (mut session, _) = session(ok_register());
        session.register(None).await.expect("register");
        session
            .find_cloudlet("tdg", Location::new(1.0, 2.0))
            .await
            .expect("find");

        *session.transport().register_reply.lock().unwrap() = RegisterClientReply {
            status: ReplyStatus::Success,
            session_cookie: String::new(),
            token_server_uri: "https://other/x".into(),
            ..ok_register()
        };
        let err = session.register(None).await.unwrap_err();
        assert!(matches!(err, DmeError::Protocol { code: -1, .. }));
        let state = session.state().expect("state kept");
        assert_eq!(state.session_cookie(), "S1");
        assert_eq!(state.token_server_uri(), "https://ts/x");
        assert_eq!(session.phase(), SessionPhase::CloudletFound);
    }

    #[tokio::test]
    async fn not_found_cloudlet_is_protocol_error() {
        let (mut session, _) = session(ok_register());
        session.register(None).await.expect("register");
        *session.transport().find_reply.lock().unwrap() = FindCloudletReply {
            status: FindStatus::NotFound,
            ..FindCloudletReply::default()
        };
        let err = session
            .find_cloudlet("tdg", Location::new(1.0, 2.0))
            .await
            .unwrap_err();
        assert!(matches!(err, DmeError::Protocol { code: -1, .. }));
        assert_eq!(session.phase(), SessionPhase::Registered);

        *session.transport().find_reply.lock().unwrap() = FindCloudletReply::default();
        assert!(session
            .find_cloudlet("tdg", Location::new(1.0, 2.0))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn blank_carrier_name_falls_back_to_default() {
        let (mut session, recorded) = session(ok_register());
        session.register(None).await.expect("register");
        session
            .find_cloudlet("  ", Location::new(1.0, 2.0))
            .await
            .expect("find");
        session
            .verify_location(" att ", Location::new(1.0, 2.0), Some("MINE"))
            .await
            .expect("verify");
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.finds[0].carrier_name, "tdg");
        assert_eq!(recorded.verifies[0].carrier_name, "att");
    }

    #[tokio::test]
    async fn fqdn_list_and_group_calls_carry_session_cookie() {
        let (mut session, recorded) = session(ok_register());
        assert!(session.get_fqdn_list().await.unwrap_err().is_configuration());
        assert!(session
            .add_user_to_group(1, DlgCommType::Secure, "hello")
            .await
            .unwrap_err()
            .is_configuration());

        session.register(None).await.expect("register");
        let list = session.get_fqdn_list().await.expect("fqdn list");
        assert_eq!(list.status, FqdnListStatus::Success);
        let group = session
            .add_user_to_group(42, DlgCommType::Secure, "hello")
            .await
            .expect("group");
        assert_eq!(group.group_cookie, "G42");
        match session.add_user_to_group(0, DlgCommType::Open, "").await {
            Err(DmeError::Protocol { code, .. }) => assert_eq!(code, 7),
            other => panic!("unexpected result {other:?}"),
        }

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.cookies_seen, vec!["S1"]);
        assert_eq!(recorded.groups.len(), 2);
        assert_eq!(recorded.groups[0].session_cookie, "S1");
        assert_eq!(recorded.groups[0].lg_id, 42);
        assert_eq!(recorded.groups[0].comm_type, DlgCommType::Secure);
        assert_eq!(recorded.groups[0].user_data, "hello");
    }
}
