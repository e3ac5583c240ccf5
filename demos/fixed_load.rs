#![forbid(unsafe_code)]
//! Serves on a fixed port with a synthetic load source, handy on hosts
//! without `/proc/loadavg`.
//!
//! Run with:
//! cargo run --example fixed_load
//!
//! Then, from another shell:
//! cargo run --bin tagram-client -- 127.0.0.1 5353 '<loadavg/>'

use std::net::{IpAddr, Ipv4Addr};
use tagram::{BindMode, Endpoint, LoadAverage, Result, Server};
use tracing::info;

fn synthetic() -> Result<LoadAverage> {
    Ok(LoadAverage {
        one: 0.42,
        five: 0.21,
        fifteen: 0.07,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let endpoint =
        Endpoint::open(BindMode::Specific(IpAddr::V4(Ipv4Addr::LOCALHOST)), 5353, None).await?;
    info!("Listening on {}", endpoint.local_addr()?);

    let summary = Server::with_load_source(endpoint, synthetic).run().await;
    info!("Served {} requests", summary.served);

    Ok(())
}
