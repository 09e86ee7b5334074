mod cli;
mod config;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use dme_client::config::{parse_base_url, DEFAULT_REST_PORT, DEFAULT_RPC_PORT};
use dme_client::{
    BinaryRpcTransport, EdgeDiscoverySession, RestTransport, TokenAcquirer, TransportClient,
};
use tracing::info;

use crate::cli::{Cli, Wire};
use crate::config::SampleConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let cfg = SampleConfig::from_env().merge_cli(&cli);
    telemetry::init_tracing(&cfg.log_filter);

    let dme_config = cfg.dme_config();
    let credentials = cfg.load_credentials()?;
    let tokens = TokenAcquirer::from_credentials(&credentials, dme_config.request_timeout)
        .context("token fetcher")?;
    let port = match cfg.wire {
        Wire::Rest => DEFAULT_REST_PORT,
        Wire::Rpc => DEFAULT_RPC_PORT,
    };
    let base_url = match &cfg.dme_url {
        Some(raw) => parse_base_url(raw)?,
        None => dme_config.dme_base_url(&cfg.carrier_name, port)?,
    };
    info!(wire = ?cfg.wire, dme = %base_url, carrier = %cfg.carrier_name, "starting dme sample");

    let timeout = dme_config.request_timeout;
    match cfg.wire {
        Wire::Rest => {
            let transport = RestTransport::new(base_url, &credentials, timeout)?;
            let session = EdgeDiscoverySession::new(transport, tokens, dme_config);
            run(session, &cfg, &cli).await
        }
        Wire::Rpc => {
            let transport = BinaryRpcTransport::new(base_url, &credentials, timeout)?;
            let session = EdgeDiscoverySession::new(transport, tokens, dme_config);
            run(session, &cfg, &cli).await
        }
    }
}

async fn run<T: TransportClient>(
    mut session: EdgeDiscoverySession<T>,
    cfg: &SampleConfig,
    cli: &Cli,
) -> Result<()> {
    let carrier = cfg.carrier_name.as_str();

    let registered = session
        .register(cfg.auth_token.as_deref())
        .await
        .context("register client")?;
    println!("register: {:?}", registered.status);

    let verified = session
        .verify_location(carrier, cli.location(), None)
        .await
        .context("verify location")?;
    println!(
        "verify location: tower={:?} gps={:?} accuracy_km={}",
        verified.tower_status, verified.gps_location_status, verified.gps_location_accuracy_km
    );

    let cloudlet = session
        .find_cloudlet(carrier, cli.location())
        .await
        .context("find cloudlet")?;
    println!("find cloudlet: {:?} fqdn={}", cloudlet.status, cloudlet.fqdn);
    for port in &cloudlet.ports {
        println!(
            "  {:?} internal={} public={} path={}",
            port.proto, port.internal_port, port.public_port, port.public_path
        );
    }

    if cli.extended {
        let network = session
            .get_location(carrier)
            .await
            .context("get location")?;
        println!(
            "carrier location: {:?} lat={} long={}",
            network.status, network.network_location.latitude, network.network_location.longitude
        );

        let instances = session
            .get_app_inst_list(carrier, cli.location())
            .await
            .context("get app instance list")?;
        for cloudlet in &instances.cloudlets {
            println!(
                "cloudlet {} ({} km): {} app instance(s)",
                cloudlet.cloudlet_name,
                cloudlet.distance,
                cloudlet.app_instances.len()
            );
        }
    }
    Ok(())
}
