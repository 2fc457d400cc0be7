//! sACN / E1.31 receiver (spec.md §4.3): binds with `SO_REUSEADDR`/`SO_REUSEPORT`
//! where available, joins the universe's multicast group on every non-loopback
//! interface, or falls back to unicast when multicast is disabled.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use log::warn;
use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;

use crate::descriptors::InputFilter;
use crate::engine::Engine;
use crate::error::TransportError;
use crate::transport::input::filter;
use crate::universe::Frame;

pub struct SacnReceiver {
    socket: Arc<UdpSocket>,
}

impl SacnReceiver {
    pub async fn bind(wire_universe: u16, multicast: bool) -> Result<Self, TransportError> {
        let addr = SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED), sacn_proto::PORT);
        let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, None)
            .map_err(|source| TransportError::BindFailed { addr: addr.to_string(), source })?;
        let _ = socket2.set_reuse_address(true);
        #[cfg(unix)]
        let _ = socket2.set_reuse_port(true);
        socket2
            .set_nonblocking(true)
            .map_err(|source| TransportError::BindFailed { addr: addr.to_string(), source })?;
        socket2
            .bind(&addr.into())
            .map_err(|source| TransportError::BindFailed { addr: addr.to_string(), source })?;

        let std_socket: std::net::UdpSocket = socket2.into();
        let socket = UdpSocket::from_std(std_socket)
            .map_err(|source| TransportError::BindFailed { addr: addr.to_string(), source })?;

        if multicast {
            let group = sacn_proto::multicast_group(wire_universe);
            for iface in filter::local_ipv4_addrs() {
                let _ = socket.join_multicast_v4(group, iface);
            }
            // Always attempt the unspecified interface too, for single-homed hosts.
            let _ = socket.join_multicast_v4(group, Ipv4Addr::UNSPECIFIED);
        }

        Ok(Self { socket: Arc::new(socket) })
    }

    pub async fn run(self, engine: Engine, universe: u32, wire_universe: u16, filter_cfg: InputFilter) {
        let local_addrs = filter::local_ipv4_addrs();
        let mut buf = [0u8; 2048];
        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(err) => {
                    warn!("sacn receive error: {}", err);
                    continue;
                }
            };

            let source = match peer.ip() {
                std::net::IpAddr::V4(v4) => v4,
                std::net::IpAddr::V6(_) => continue,
            };
            if !filter::accepts(&filter_cfg, source, &local_addrs) {
                continue;
            }

            let packet = match sacn_proto::decode_data_packet(&buf[..len]) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if packet.universe != wire_universe {
                continue;
            }

            engine.handle_input_frame(universe, Frame(packet.data));
        }
    }
}
