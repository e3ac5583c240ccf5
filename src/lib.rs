#![forbid(unsafe_code)]
//! # tagram
//! `tagram` is a tiny request/response service over UDP. Every datagram carries one
//! tag-delimited command and is answered with exactly one tag-delimited reply.
//!
//! | Request | Reply |
//! |---|---|
//! | `<echo>TEXT</echo>` | `<reply>TEXT</reply>` |
//! | `<loadavg/>` | `<replyLoadAvg>L1:L5:L15</replyLoadAvg>` or `<error>unable to obtain load average</error>` |
//! | `<shutdown/>` | `<replyShutDown>Server is shutting down</replyShutDown>`, then the server stops |
//! | anything else | `<error>unknown format</error>` |
//!
//! Requests are handled strictly one at a time. There is no retransmission,
//! ordering or authentication layer on top of the datagram transport.
//!
//! # Example
//!
//! ```rust,no_run
//! use tagram::{BindMode, Endpoint, Result, Server};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<()> {
//!     tracing_subscriber::fmt()
//!         .with_max_level(tracing::Level::INFO)
//!         .init();
//!
//!     let endpoint = Endpoint::open(BindMode::BindAll, 5000, None).await?;
//!     let summary = Server::new(endpoint).run().await;
//!     println!("served {} requests", summary.served);
//!
//!     Ok(())
//! }
//! ```
mod client;
mod command;
mod error;
mod handler;
mod load;
mod network;
mod server;
mod transport;

pub use client::{Client, RECEIVE_TIMEOUT};
pub use command::{Command, parse};
pub use error::{Error, Result};
pub use handler::{Control, Reply, Response, handle};
pub use load::{LoadAverage, LoadSource, SystemLoad};
pub use network::{Banner, BindMode, NetworkInterface};
pub use server::{Server, State, Summary};
pub use transport::{Endpoint, MAX_DATAGRAM, Request, Transport};
