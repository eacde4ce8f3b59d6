//! RTP/RTCP socket pair setup for one media session
//!
//! A media session is the pair of UDP sockets carrying one media kind of a
//! stream: RTP data on an even port, RTCP control on the next odd port. The
//! sockets are configured with `socket2` (reuse-address and group membership
//! for multicast receive, wildcard bind for unicast receive), switched to
//! non-blocking mode, and handed to tokio for readiness-driven reads.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;

use crate::error::NetworkError;

/// The RTP + RTCP socket pair for one media kind of a stream.
///
/// Invariant: a constructed session always owns both sockets. Construction
/// failures release anything opened so far before returning; dropping the
/// session closes both sockets.
#[derive(Debug)]
pub struct MediaSession {
    /// Data socket, bound to the even RTP port
    pub rtp: UdpSocket,
    /// Control socket, bound to RTP port + 1
    pub rtcp: UdpSocket,
    rtp_port: u16,
}

impl MediaSession {
    /// Open the socket pair for `ip` with RTP on `rtp_port`.
    ///
    /// `rtp_port` must be even; RTCP always lands on `rtp_port + 1`. A
    /// multicast `ip` joins the group on the wildcard interface; any other
    /// address binds the wildcard for unicast receive.
    pub fn connect(ip: Ipv4Addr, rtp_port: u16) -> Result<Self, NetworkError> {
        if rtp_port % 2 != 0 {
            return Err(NetworkError::OddRtpPort(rtp_port));
        }

        let rtp = open_socket(ip, rtp_port)?;
        let rtcp = open_socket(ip, rtp_port + 1)?;

        tracing::debug!(%ip, rtp_port, "media session connected");
        Ok(Self {
            rtp,
            rtcp,
            rtp_port,
        })
    }

    /// The even data port this session listens on
    pub fn rtp_port(&self) -> u16 {
        self.rtp_port
    }
}

/// Open one receive socket on `port`, multicast-joined or wildcard-bound.
fn open_socket(ip: Ipv4Addr, port: u16) -> Result<UdpSocket, NetworkError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| NetworkError::SocketSetup(e.to_string()))?;

    let multicast = ip.is_multicast();
    if multicast {
        socket
            .set_reuse_address(true)
            .map_err(|e| NetworkError::SocketSetup(e.to_string()))?;
    }

    // Readiness multiplexing relies on reads never blocking the loop.
    socket
        .set_nonblocking(true)
        .map_err(|e| NetworkError::SocketSetup(e.to_string()))?;

    let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&bind_addr.into()).map_err(|e| {
        tracing::error!(%ip, port, error = %e, "socket bind failed");
        NetworkError::BindFailed {
            port,
            reason: e.to_string(),
        }
    })?;

    if multicast {
        socket
            .join_multicast_v4(&ip, &Ipv4Addr::UNSPECIFIED)
            .map_err(|e| {
                tracing::error!(group = %ip, port, error = %e, "multicast join failed");
                NetworkError::MulticastJoinFailed {
                    group: ip,
                    reason: e.to_string(),
                }
            })?;
    }

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(|e| NetworkError::SocketSetup(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Find an even port whose odd sibling is also free.
    fn free_even_port() -> u16 {
        for _ in 0..32 {
            let probe = std::net::UdpSocket::bind(("127.0.0.1", 0)).unwrap();
            let port = probe.local_addr().unwrap().port() & !1;
            drop(probe);
            if port == 0 {
                continue;
            }
            let rtp = std::net::UdpSocket::bind(("0.0.0.0", port));
            let rtcp = std::net::UdpSocket::bind(("0.0.0.0", port + 1));
            if rtp.is_ok() && rtcp.is_ok() {
                return port;
            }
        }
        panic!("no free even/odd port pair found");
    }

    #[tokio::test]
    async fn odd_port_is_rejected_before_any_socket() {
        let err = MediaSession::connect(Ipv4Addr::LOCALHOST, 5005).unwrap_err();
        assert!(matches!(err, NetworkError::OddRtpPort(5005)));
    }

    #[tokio::test]
    async fn unicast_pair_binds_both_ports() {
        let port = free_even_port();
        let session = MediaSession::connect(Ipv4Addr::LOCALHOST, port).unwrap();
        assert_eq!(session.rtp_port(), port);
        assert_eq!(session.rtp.local_addr().unwrap().port(), port);
        assert_eq!(session.rtcp.local_addr().unwrap().port(), port + 1);
    }

    #[tokio::test]
    async fn bound_port_pair_is_released_on_drop() {
        let port = free_even_port();
        {
            let _session = MediaSession::connect(Ipv4Addr::LOCALHOST, port).unwrap();
            assert!(std::net::UdpSocket::bind(("0.0.0.0", port)).is_err());
        }
        assert!(std::net::UdpSocket::bind(("0.0.0.0", port)).is_ok());
    }

    #[tokio::test]
    async fn multicast_connect_joins_or_fails_cleanly() {
        let port = free_even_port();
        match MediaSession::connect(Ipv4Addr::new(239, 255, 12, 34), port) {
            Ok(session) => assert_eq!(session.rtp_port(), port),
            // Hosts without a multicast-capable interface refuse the join;
            // the ports must be released again either way.
            Err(e) => {
                assert!(matches!(e, NetworkError::MulticastJoinFailed { .. }));
                assert!(std::net::UdpSocket::bind(("0.0.0.0", port)).is_ok());
            }
        }
    }
}
