//! Asynchronous client for the distributed match engine (DME).
//!
//! The client registers with the DME, fetches a short-lived carrier token from
//! the token server's redirect, verifies the device location with it, and
//! finds the nearest cloudlet serving the application:
//!
//! ```no_run
//! # async fn run() -> dme_client::DmeResult<()> {
//! use dme_client::{
//!     DmeConfig, EdgeDiscoverySession, Location, RestTransport, TlsCredentials, TokenAcquirer,
//! };
//!
//! let config = DmeConfig::default();
//! let credentials = TlsCredentials::default();
//! let transport = RestTransport::for_carrier(&config, "tdg", &credentials)?;
//! let tokens = TokenAcquirer::from_credentials(&credentials, config.request_timeout)?;
//! let mut session = EdgeDiscoverySession::new(transport, tokens, config);
//!
//! session.register(None).await?;
//! session.verify_location("tdg", Location::now(37.459609, -122.149349), None).await?;
//! let cloudlet = session.find_cloudlet("tdg", Location::now(37.459609, -122.149349)).await?;
//! println!("{}", cloudlet.fqdn);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod header;
pub mod location;
pub mod messages;
pub mod session;
pub mod tls;
pub mod token;
pub mod transport;

pub use config::{AppIdentity, DmeConfig};
pub use error::{DmeError, DmeResult};
pub use header::{extract_redirect_param, trim_eol, TokenCollector, CARRIER_TOKEN_KEY};
pub use location::{Location, Timestamp};
pub use messages::*;
pub use session::{EdgeDiscoverySession, SessionPhase, SessionState};
pub use tls::TlsCredentials;
pub use token::{CarrierToken, HttpRedirectFetcher, RedirectFetcher, RedirectResponse, TokenAcquirer};
pub use transport::{BinaryRpcTransport, DmeMethod, RestTransport, TransportClient};
