use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use dme_client::Location;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(
    name = "dme-sample",
    version,
    about = "Register with a match engine, verify location and find the nearest cloudlet"
)]
pub struct Cli {
    /// Carrier whose DME is contacted; also sent as CarrierName.
    #[arg(long)]
    pub carrier: Option<String>,

    /// Explicit DME endpoint; derived from the carrier when omitted.
    #[arg(long)]
    pub dme_url: Option<String>,

    /// Wire protocol used to talk to the DME.
    #[arg(long, value_enum)]
    pub wire: Option<Wire>,

    #[arg(long)]
    pub auth_token: Option<String>,

    /// PEM bundle of trusted roots.
    #[arg(long)]
    pub ca_cert: Option<PathBuf>,

    #[arg(long)]
    pub client_cert: Option<PathBuf>,

    #[arg(long)]
    pub client_key: Option<PathBuf>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long, default_value_t = 37.459609, allow_negative_numbers = true)]
    pub lat: f64,

    #[arg(long, default_value_t = -122.149349, allow_negative_numbers = true)]
    pub long: f64,

    /// Also query the carrier location and the app instance list.
    #[arg(long)]
    pub extended: bool,
}

impl Cli {
    /// A fresh fix at the configured coordinates, taken at call time.
    pub fn location(&self) -> Location {
        Location::now(self.lat, self.long)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wire {
    #[default]
    Rest,
    Rpc,
}
