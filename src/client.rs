#[cfg(feature = "tracing")]
use tracing::debug;

use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    time::Duration,
};
use tokio::{
    net::{UdpSocket, lookup_host},
    time::timeout,
};

use crate::{Error, MAX_DATAGRAM, Result};

/// How long [`Client::receive_reply`] waits before giving up.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Sends requests to a server and waits for the matching reply.
///
/// There is no retransmission: a lost request or reply surfaces as
/// [`Error::Timeout`].
pub struct Client {
    socket: UdpSocket,
    server: SocketAddr,
    timeout: Duration,
}

impl Client {
    /// Resolves `host` and binds an ephemeral local socket of the same family.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let server = lookup_host((host, port))
            .await
            .map_err(|_| Error::HostNotFound(host.to_string()))?
            .next()
            .ok_or_else(|| Error::HostNotFound(host.to_string()))?;

        let local = match server {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(local).await?;

        Ok(Self {
            socket,
            server,
            timeout: RECEIVE_TIMEOUT,
        })
    }

    /// Overrides [`RECEIVE_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Sends one request datagram. Does not wait for the reply.
    pub async fn send_request(&self, request: &str) -> Result<()> {
        #[cfg(feature = "tracing")]
        debug!("Sending {:?} to {}", request, self.server);

        self.socket.send_to(request.as_bytes(), self.server).await?;
        Ok(())
    }

    /// Waits for one reply datagram.
    ///
    /// NUL padding and surrounding whitespace are trimmed.
    pub async fn receive_reply(&self) -> Result<String> {
        let mut buffer = [0u8; MAX_DATAGRAM];
        let (byte_count, _) = timeout(self.timeout, self.socket.recv_from(&mut buffer))
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        Ok(decode_reply(&buffer[..byte_count]))
    }

    /// Sends `request` and waits for its reply.
    pub async fn request(&self, request: &str) -> Result<String> {
        self.send_request(request).await?;
        self.receive_reply().await
    }
}

fn decode_reply(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).trim().to_string()
}
