use async_trait::async_trait;
use std::{io::Result, net::SocketAddr};
use tokio::net::UdpSocket;
use tokio_util::bytes::{Bytes, BytesMut};

use crate::{
    BindMode, NetworkInterface,
    network::{bind_udp_socket, resolve_addrs},
};

/// Largest datagram the server reads or writes.
///
/// Longer requests are truncated by the receive buffer, longer replies on send.
pub const MAX_DATAGRAM: usize = 256;

/// One received datagram and the peer that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub payload: Bytes,
    pub peer: SocketAddr,
}

/// Datagram I/O used by the dispatch loop.
///
/// [`Endpoint`] is the UDP implementation. Anything that can hand out
/// requests and accept replies one at a time can drive the loop.
#[async_trait]
pub trait Transport: Send {
    /// Waits for the next datagram.
    async fn receive(&mut self) -> Result<Request>;

    /// Sends `reply` to `peer`.
    async fn send(&mut self, reply: &[u8], peer: SocketAddr) -> Result<()>;

    /// Releases the transport. The default simply drops it.
    fn close(self)
    where
        Self: Sized,
    {
    }
}

/// A bound UDP socket with a fixed-size receive buffer.
pub struct Endpoint {
    socket: UdpSocket,
    buffer: BytesMut,
}

impl Endpoint {
    /// Binds a socket for `port` according to `mode`.
    ///
    /// Candidate addresses are tried in order; the first successful bind wins.
    /// `iface` is only consulted for [`BindMode::PreferInterface`].
    pub async fn open(
        mode: BindMode,
        port: u16,
        iface: Option<&NetworkInterface>,
    ) -> crate::Result<Self> {
        let addrs = resolve_addrs(mode, port, iface);
        let socket = bind_udp_socket(&addrs)?;
        Ok(Self::from_socket(socket))
    }

    /// Wraps an already bound socket.
    pub fn from_socket(socket: UdpSocket) -> Self {
        let mut buffer = BytesMut::with_capacity(MAX_DATAGRAM);
        buffer.resize(MAX_DATAGRAM, 0);
        Self { socket, buffer }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl Transport for Endpoint {
    async fn receive(&mut self) -> Result<Request> {
        let (byte_count, peer) = self.socket.recv_from(&mut self.buffer).await?;
        Ok(Request {
            payload: Bytes::copy_from_slice(&self.buffer[..byte_count]),
            peer,
        })
    }

    async fn send(&mut self, reply: &[u8], peer: SocketAddr) -> Result<()> {
        let len = reply.len().min(MAX_DATAGRAM);
        self.socket.send_to(&reply[..len], peer).await?;
        Ok(())
    }
}
