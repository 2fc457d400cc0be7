//! Output and input transports (spec.md §4.2, §4.3).
//!
//! Grounded in the teacher's `ArtNetManager` socket-lifecycle style
//! (`artnet.rs`): a shared socket, a sequence counter, a rebind-on-config-change
//! pattern. Ported from blocking `std::net::UdpSocket` + threads to
//! `tokio::net::UdpSocket` + tasks per spec.md §5's cooperative task model.

pub mod input;
pub mod output;

use crate::descriptors::TransportStatus;

/// Shared behavior every output sender exposes to the façade (§4.2: "a
/// sender's `send(frame)` must be infallible from the caller's perspective").
#[async_trait::async_trait]
pub trait OutputTransport: Send + Sync {
    async fn send(&self, frame: &[u8; 512]);
    fn status(&self) -> TransportStatus;
}
