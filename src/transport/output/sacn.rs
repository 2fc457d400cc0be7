//! sACN / E1.31 sender (spec.md §4.2): unicast or multicast, one socket per
//! destination shared through the registry, same FPS/keepalive contract as
//! the Art-Net sender.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use tokio::net::UdpSocket;
use tokio::sync::Mutex as AsyncMutex;

use crate::descriptors::TransportStatus;
use crate::error::TransportError;
use crate::transport::output::registry::{SocketKey, SocketRegistry};
use crate::transport::OutputTransport;

pub enum SacnDestination {
    Multicast { universe: u16 },
    Unicast { addr: Ipv4Addr },
}

pub struct SacnOutput {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    wire_universe: u16,
    cid: [u8; 16],
    source_name: String,
    priority: u8,
    sequence: AtomicU8,
    packet_count: AtomicU64,
    degraded: std::sync::atomic::AtomicBool,
    last_send: AsyncMutex<Option<tokio::time::Instant>>,
}

impl SacnOutput {
    pub async fn bind(
        registry: &SocketRegistry,
        destination: SacnDestination,
        wire_universe: u16,
        cid: [u8; 16],
        source_name: String,
        priority: u8,
    ) -> Result<Self, crate::error::TransportError> {
        let key = SocketKey {
            protocol: "sacn-out",
            bind_addr: SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        };
        let socket = registry.get_or_bind(key, |_| Ok(())).await?;

        let target = match destination {
            SacnDestination::Multicast { universe } => {
                let group = sacn_proto::multicast_group(universe);
                socket
                    .join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)
                    .map_err(|source| TransportError::BindFailed { addr: group.to_string(), source })?;
                SocketAddr::new(std::net::IpAddr::V4(group), sacn_proto::PORT)
            }
            SacnDestination::Unicast { addr } => SocketAddr::new(std::net::IpAddr::V4(addr), sacn_proto::PORT),
        };

        Ok(Self {
            socket,
            target,
            wire_universe,
            cid,
            source_name,
            priority,
            sequence: AtomicU8::new(0),
            packet_count: AtomicU64::new(0),
            degraded: std::sync::atomic::AtomicBool::new(false),
            last_send: AsyncMutex::new(None),
        })
    }

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
impl OutputTransport for SacnOutput {
    async fn send(&self, frame: &[u8; 512]) {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let packet = sacn_proto::encode_data_packet(
            &self.cid,
            &self.source_name,
            self.priority,
            seq,
            self.wire_universe,
            frame,
        );

        match self.socket.send_to(&packet, self.target).await {
            Ok(_) => {
                self.packet_count.fetch_add(1, Ordering::Relaxed);
                self.degraded.store(false, Ordering::Relaxed);
            }
            Err(err) => {
                warn!("sacn send to {} failed: {}", self.target, err);
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
