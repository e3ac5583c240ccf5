#![forbid(unsafe_code)]
//! Run with:
//! cargo run --bin tagram-client -- <HOST> <PORT> '<echo>hello</echo>'

use clap::Parser;
use tagram::{Client, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tagram-client", version, about = "Sends one request to a tagram server", long_about = None)]
pub struct Parameters {
    /// Server host name or IP address.
    #[arg(value_name = "HOST")]
    pub host: String,

    /// Server UDP port.
    #[arg(value_name = "PORT")]
    pub port: u16,

    /// Request to send. Read from stdin when omitted.
    #[arg(value_name = "REQUEST")]
    pub request: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let params = Parameters::parse();

    let request = match params.request {
        Some(request) => request,
        None => prompt("Enter a request: ").await?,
    };

    let client = Client::connect(&params.host, params.port).await?;
    println!("Sending the following message to {}:\n{}", client.server(), request);

    let reply = client.request(&request).await?;
    println!("Response from server:\n{reply}");

    Ok(())
}

/// Reads one line from stdin, without its line terminator.
async fn prompt(message: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(message.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
