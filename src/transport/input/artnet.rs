//! Art-Net receiver (spec.md §4.3). Binds UDP 6454, accepts broadcast or
//! unicast, filters, and invokes the engine's `handle_input_frame`.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use log::warn;
use tokio::net::UdpSocket;

use crate::descriptors::InputFilter;
use crate::engine::Engine;
use crate::error::TransportError;
use crate::transport::input::filter;
use crate::universe::Frame;

pub struct ArtnetReceiver {
    socket: Arc<UdpSocket>,
}

impl ArtnetReceiver {
    pub async fn bind(bind_ip: Ipv4Addr) -> Result<Self, TransportError> {
        let addr = SocketAddr::new(std::net::IpAddr::V4(bind_ip), artnet_proto::PORT);
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::BindFailed { addr: addr.to_string(), source })?;
        Ok(Self { socket: Arc::new(socket) })
    }

    /// Runs until the engine/universe is torn down; spawn as its own task.
    pub async fn run(self, engine: Engine, universe: u32, wire_universe: u16, filter_cfg: InputFilter) {
        let local_addrs = filter::local_ipv4_addrs();
        let mut buf = [0u8; 2048];
        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(err) => {
                    warn!("artnet receive error: {}", err);
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

            let packet = match artnet_proto::decode_art_dmx(&buf[..len]) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if packet.port_address != wire_universe {
                continue;
            }

            engine.handle_input_frame(universe, Frame(packet.data));
        }
    }
}
