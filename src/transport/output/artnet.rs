//! Art-Net sender (spec.md §4.2). Shares a UDP socket per `(target_ip, port)`
//! via [`super::registry::SocketRegistry`]; throttles to `target_fps` and
//! refreshes idle universes every `keepalive_interval`.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use tokio::net::UdpSocket;
use tokio::sync::Mutex as AsyncMutex;

use crate::descriptors::TransportStatus;
use crate::transport::output::registry::{SocketKey, SocketRegistry};
use crate::transport::OutputTransport;

pub struct ArtnetOutput {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    wire_universe: u16,
    artnet_net: u8,
    artnet_subnet: u8,
    sequence: AtomicU8,
    packet_count: AtomicU64,
    degraded: std::sync::atomic::AtomicBool,
    last_send: AsyncMutex<Option<tokio::time::Instant>>,
}

impl ArtnetOutput {
    pub async fn bind(
        registry: &SocketRegistry,
        target_ip: Ipv4Addr,
        broadcast: bool,
        wire_universe: u16,
        artnet_net: u8,
        artnet_subnet: u8,
    ) -> Result<Self, crate::error::TransportError> {
        let key = SocketKey {
            protocol: "artnet-out",
            bind_addr: SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        };
        let socket = registry
            .get_or_bind(key, move |s| s.set_broadcast(broadcast).map(|_| ()))
            .await?;

        Ok(Self {
            socket,
            target: SocketAddr::new(std::net::IpAddr::V4(target_ip), artnet_proto::PORT),
            wire_universe,
            artnet_net,
            artnet_subnet,
            sequence: AtomicU8::new(0),
            packet_count: AtomicU64::new(0),
            degraded: std::sync::atomic::AtomicBool::new(false),
            last_send: AsyncMutex::new(None),
        })
    }

    /// Idle keep-alive: refresh even without changes every 2 seconds (§4.2).
    pub async fn should_refresh(&self, keepalive: Duration) -> bool {
        let mut last = self.last_send.lock().await;
        match *last {
            Some(t) if t.elapsed() < keepalive => false,
            _ => {
                *last = Some(tokio::time::Instant::now());
                true
            }
        }
    }
}

#[async_trait::async_trait]
impl OutputTransport for ArtnetOutput {
    async fn send(&self, frame: &[u8; 512]) {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1).max(1);
        let port_address = ((self.artnet_net as u16) << 8)
            | ((self.artnet_subnet as u16) << 4)
            | (self.wire_universe & 0xF);
        let packet = artnet_proto::encode_art_dmx(seq, port_address, frame);

        match self.socket.send_to(&packet, self.target).await {
            Ok(_) => {
                self.packet_count.fetch_add(1, Ordering::Relaxed);
                self.degraded.store(false, Ordering::Relaxed);
            }
            Err(err) => {
                warn!("artnet send to {} failed: {}", self.target, err);
                self.degraded.store(true, Ordering::Relaxed);
            }
        }
    }

    fn status(&self) -> TransportStatus {
        TransportStatus {
            running: true,
            bind_address: self.socket.local_addr().ok().map(|a| a.to_string()),
            wire_universe: Some(self.wire_universe),
            packet_count: self.packet_count.load(Ordering::Relaxed),
            last_sequence: Some(self.sequence.load(Ordering::Relaxed)),
            degraded: self.degraded.load(Ordering::Relaxed),
        }
    }
}
