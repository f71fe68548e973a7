//! Socket utilities: the multicast socket builder and the interface resolver.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use crate::conn::{MDNS_MULTICAST_IPV4, MDNS_PORT};
use crate::error::{Error, Result};

/// A builder for UDP sockets suitable for mDNS.
///
/// The resulting socket is bound to the published mDNS listen address,
/// configured with `SO_REUSEADDR` (and `SO_REUSEPORT` where available), set
/// non-blocking for async use, and joined to the 224.0.0.251 multicast group
/// on every IPv4 interface.
///
/// ```rust,no_run
/// use mdns::MulticastSocket;
///
/// let std_socket = MulticastSocket::new().into_std()?;
/// // For tokio:
/// // let socket = tokio::net::UdpSocket::from_std(std_socket)?;
/// # Ok::<(), mdns::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MulticastSocket {
    multicast_local_ipv4: Option<Ipv4Addr>,
    multicast_local_port: Option<u16>,
    interface: Option<Ipv4Addr>,
}

impl MulticastSocket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the local address the socket binds to.
    pub fn with_multicast_local_ipv4(mut self, multicast_local_ipv4: Ipv4Addr) -> Self {
        self.multicast_local_ipv4 = Some(multicast_local_ipv4);
        self
    }

    /// Overrides the local port the socket binds to.
    pub fn with_multicast_local_port(mut self, multicast_local_port: u16) -> Self {
        self.multicast_local_port = Some(multicast_local_port);
        self
    }

    /// Restricts the multicast group join to a single network interface.
    ///
    /// If not set, the group is joined on every IPv4 interface; partial join
    /// failures are tolerated as long as at least one succeeds.
    pub fn with_interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = Some(interface);
        self
    }

    /// Builds the configured `std::net::UdpSocket`.
    ///
    /// # Errors
    ///
    /// Socket creation, option, and bind failures surface as
    /// [`Error::Io`]. If the multicast group cannot be joined on any
    /// interface, [`Error::ErrJoiningMulticastGroup`] is returned.
    pub fn into_std(self) -> Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

        // Allow other mDNS responders on the same host.
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
        socket.set_reuse_port(true)?;

        socket.set_nonblocking(true)?;

        let multicast_local_ip = if let Some(multicast_local_ipv4) = self.multicast_local_ipv4 {
            IpAddr::V4(multicast_local_ipv4)
        } else if cfg!(target_os = "linux") {
            IpAddr::V4(Ipv4Addr::new(224, 0, 0, 0))
        } else {
            // Binding a multicast-range address doesn't work on Mac/Win,
            // only 0.0.0.0 works fine, even 127.0.0.1 doesn't work.
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        };

        let multicast_local_port = self.multicast_local_port.unwrap_or(MDNS_PORT);
        let multicast_local_addr = SocketAddr::new(multicast_local_ip, multicast_local_port);

        socket.bind(&multicast_local_addr.into())?;

        if let Some(iface) = self.interface {
            socket
                .join_multicast_v4(&MDNS_MULTICAST_IPV4, &iface)
                .map_err(|_| Error::ErrJoiningMulticastGroup)?;
        } else {
            let mut joined = 0;
            for iface in if_addrs::get_if_addrs()? {
                let IpAddr::V4(ip) = iface.ip() else {
                    continue;
                };
                match socket.join_multicast_v4(&MDNS_MULTICAST_IPV4, &ip) {
                    Ok(()) => joined += 1,
                    Err(err) => {
                        log::debug!(
                            "failed to join multicast group on interface {}: {err}",
                            iface.name
                        );
                    }
                }
            }
            if joined == 0 {
                return Err(Error::ErrJoiningMulticastGroup);
            }
        }

        Ok(socket.into())
    }
}

// interface_for_remote picks the local IPv4 address the kernel would source
// when sending to remote. A transient UDP socket is connected to the peer (no
// datagrams are transmitted) and its local endpoint read back.
pub(crate) fn interface_for_remote(remote: SocketAddr) -> Result<Ipv4Addr> {
    let local = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| {
            socket.connect(remote)?;
            socket.local_addr()
        })
        .map_err(|err| {
            log::debug!("failed to get local interface to talk to peer {remote}: {err}");
            Error::ErrInvalidParameter
        })?;

    match local.ip() {
        IpAddr::V4(ip) => Ok(ip),
        IpAddr::V6(_) => Err(Error::ErrInvalidParameter),
    }
}
