#[cfg(feature = "tracing")]
use tracing::{error, info, warn};

use getifaddrs::{Address, getifaddrs, if_nametoindex};
use socket2::{Domain, Protocol, Socket, Type};
use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    str::FromStr,
};
use tokio::net::UdpSocket;

use crate::{Error, Result};

/// Strategies for choosing the address the server binds to.
#[derive(Debug, Clone, Copy, Default)]
pub enum BindMode {
    /// Bind to the addresses of the given [`NetworkInterface`], first match wins.
    PreferInterface,
    /// Bind to `0.0.0.0`, falling back to `::`. This is the default strategy.
    #[default]
    BindAll,
    /// Bind to a specific, manually provided IP address.
    Specific(IpAddr),
}

/// Represents a local network interface and its associated addresses.
#[derive(Debug, Clone)]
pub struct NetworkInterface {
    /// System name (e.g., "eth0", "lo").
    pub name: String,
    /// OS interface index.
    pub index: u32,
    /// List of assigned IPv4 addresses.
    pub inet: Vec<Ipv4Addr>,
    /// List of assigned IPv6 addresses.
    pub inet6: Vec<Ipv6Addr>,
}

impl NetworkInterface {
    /// Picks the first interface carrying a non-loopback IPv4 address.
    ///
    /// Falls back to `lo` on hosts with nothing but loopback configured.
    pub fn primary() -> Result<Self> {
        let name = getifaddrs()?
            .find(|iface| matches!(iface.address, Address::V4(ref v4) if !v4.address.is_loopback()))
            .map(|iface| iface.name);

        match name {
            Some(name) => Self::from_str(&name),
            None => Self::from_str("lo"),
        }
    }

    /// The address shown to operators: first IPv4, else first IPv6.
    pub fn display_ip(&self) -> Option<IpAddr> {
        self.inet
            .first()
            .map(|ip| IpAddr::V4(*ip))
            .or_else(|| self.inet6.first().map(|ip| IpAddr::V6(*ip)))
    }
}

/// Resolves a [`NetworkInterface`] by its system name.
///
/// Implementing [`FromStr`] lets `clap` parse interface names directly
/// through `value_parser!()`.
impl FromStr for NetworkInterface {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInterfaceName("Empty name provided".into()));
        }

        let index = if_nametoindex(name)?;
        let mut information = Self {
            name: name.to_string(),
            index,
            inet: vec![],
            inet6: vec![],
        };

        for iface in getifaddrs()? {
            if iface.name == name {
                match iface.address {
                    Address::V4(v4) => information.inet.push(v4.address),
                    Address::V6(v6) => information.inet6.push(v6.address),
                    Address::Mac(_) => {}
                }
            }
        }

        if information.inet.is_empty() && information.inet6.is_empty() {
            return Err(Error::InterfaceNotFound(name.to_string()));
        }

        Ok(information)
    }
}

/// Host identification printed once the server is bound.
#[derive(Debug, Clone)]
pub struct Banner {
    pub hostname: String,
    pub ip: IpAddr,
    pub port: u16,
}

impl Banner {
    /// Collects the host name and an operator-facing IP for `local`.
    ///
    /// The IP is taken from `iface` when given, otherwise from
    /// [`NetworkInterface::primary`]; if neither yields an address the bound
    /// address itself is shown.
    pub fn collect(local: SocketAddr, iface: Option<&NetworkInterface>) -> Self {
        let hostname = hostname::get()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|_| "localhost".to_string());

        let ip = match iface {
            Some(iface) => iface.display_ip(),
            None => NetworkInterface::primary()
                .ok()
                .and_then(|iface| iface.display_ip()),
        }
        .unwrap_or(local.ip());

        Self {
            hostname,
            ip,
            port: local.port(),
        }
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Host Name        : {}", self.hostname)?;
        writeln!(f, "Host IP Address  : {}", self.ip)?;
        write!(f, "Host Port Number : {}", self.port)
    }
}

// Socket Helpers
pub(crate) fn resolve_addrs(
    mode: BindMode,
    port: u16,
    iface: Option<&NetworkInterface>,
) -> Vec<SocketAddr> {
    match mode {
        BindMode::Specific(ip) => vec![SocketAddr::new(ip, port)],
        BindMode::BindAll => vec![
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
            SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port),
        ],
        BindMode::PreferInterface => {
            let mut addrs = Vec::new();
            if let Some(iface) = iface {
                for ip in &iface.inet {
                    addrs.push(SocketAddr::new(IpAddr::V4(*ip), port));
                }
                for ip in &iface.inet6 {
                    addrs.push(SocketAddr::new(IpAddr::V6(*ip), port));
                }
            }
            if addrs.is_empty() {
                #[cfg(feature = "tracing")]
                warn!(
                    "No interface addresses available. Falling back to wildcard 0.0.0.0:{}",
                    port
                );
                addrs.push(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
            }
            addrs
        }
    }
}

/// Binds one UDP socket on the first address of `addrs` that accepts it.
pub(crate) fn bind_udp_socket(addrs: &[SocketAddr]) -> Result<UdpSocket> {
    for addr in addrs {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

        socket.set_reuse_address(true)?;

        apply_recv_buffer(&socket, udp_recvbuf_size(), addr);

        if addr.is_ipv6() {
            socket.set_only_v6(true)?;
        }

        match socket.bind(&((*addr).into())) {
            Ok(()) => {
                socket.set_nonblocking(true)?;

                #[cfg(feature = "tracing")]
                info!("UDP endpoint bound on {}", addr);

                return Ok(UdpSocket::from_std(socket.into())?);
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                error!("Failed to bind {}: {:?}", addr, e);

                #[cfg(not(feature = "tracing"))]
                let _ = e;
            }
        }
    }

    Err(Error::NoAddrAvailable)
}

/// Sets `SO_RCVBUF` when a size is configured. Returns whether it was applied.
///
/// A refused size is logged and the socket keeps the kernel default.
fn apply_recv_buffer(socket: &Socket, size: Option<usize>, addr: &SocketAddr) -> bool {
    let Some(size) = size else {
        return false;
    };

    match socket.set_recv_buffer_size(size) {
        Ok(()) => true,
        Err(e) => {
            #[cfg(feature = "tracing")]
            warn!("Failed to set SO_RCVBUF to {} on {}: {:?}", size, addr, e);

            #[cfg(not(feature = "tracing"))]
            let _ = (e, addr);

            false
        }
    }
}

/// Returns the optional UDP receive buffer size (`SO_RCVBUF`) to apply.
///
/// Read from the `UDP_RCVBUF` environment variable, then from the kernel
/// default on Linux.
fn udp_recvbuf_size() -> Option<usize> {
    let sys_path = if cfg!(target_os = "linux") {
        Some("/proc/sys/net/core/rmem_default")
    } else {
        None
    };
    env_or_sys("UDP_RCVBUF", sys_path)
}

/// Reads a value from either an environment variable or a sysctl file.
fn env_or_sys(env_key: &str, sys_path: Option<&str>) -> Option<usize> {
    std::env::var(env_key)
        .ok()
        .and_then(|v| v.parse().ok())
        .or_else(|| sys_path.and_then(read_sys_default))
}

/// Reads a kernel default value from the given sysctl file, trimming whitespace and parsing it as `usize`.
fn read_sys_default(path: &str) -> Option<usize> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
}
