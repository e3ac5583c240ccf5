#![forbid(unsafe_code)]
//! Run with:
//! cargo run --bin tagram-server -- <PORT>

use clap::{Parser, value_parser};
use std::net::IpAddr;
use tagram::{Banner, BindMode, Endpoint, NetworkInterface, Result, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tagram-server", version, about = "Answers tag-delimited commands over UDP", long_about = None)]
pub struct Parameters {
    /// UDP port to listen on.
    #[arg(value_name = "PORT")]
    pub port: u16,

    /// Bind to this address only instead of every interface.
    #[arg(short = 'b', long = "bind", value_name = "IP", conflicts_with = "network_interface")]
    pub bind: Option<IpAddr>,

    /// Bind to the addresses of this interface and show its IP in the banner.
    #[arg(
        short = 'i',
        long = "interface",
        value_name = "IFACE",
        value_parser = value_parser!(NetworkInterface)
    )]
    pub network_interface: Option<NetworkInterface>,

    /// Log level used when RUST_LOG is not set (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Parameters {
    fn bind_mode(&self) -> BindMode {
        match (self.bind, &self.network_interface) {
            (Some(ip), _) => BindMode::Specific(ip),
            (None, Some(_)) => BindMode::PreferInterface,
            (None, None) => BindMode::BindAll,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let params = Parameters::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&params.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let iface = params.network_interface.as_ref();
    let endpoint = Endpoint::open(params.bind_mode(), params.port, iface).await?;

    let banner = Banner::collect(endpoint.local_addr()?, iface);
    println!("\n{banner}\n");

    let summary = Server::new(endpoint).run().await;
    info!(served = summary.served, "Server is powered off");

    Ok(())
}
