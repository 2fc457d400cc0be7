//! Shared UDP socket reuse, keyed by `(protocol, target)` (spec.md §4.2, §9:
//! "use Arc-like reference counting; never double-close"). Grounded in the
//! teacher's `ArtNetManager` single-socket lifecycle, generalized to many
//! destinations sharing one registry instead of one manager owning one socket.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Weak};

use tokio::net::UdpSocket;

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketKey {
    pub protocol: &'static str,
    pub bind_addr: SocketAddr,
}

#[derive(Default)]
pub struct SocketRegistry {
    sockets: Mutex<HashMap<SocketKey, Weak<UdpSocket>>>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing socket for `key` if any sender still holds it,
    /// otherwise binds a fresh one. Letting the last `Arc` drop naturally
    /// closes the underlying fd — no explicit close bookkeeping needed.
    pub async fn get_or_bind(
        &self,
        key: SocketKey,
        configure: impl FnOnce(&UdpSocket) -> std::io::Result<()>,
    ) -> Result<Arc<UdpSocket>, TransportError> {
        if let Some(existing) = self.sockets.lock().unwrap().get(&key).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let socket = UdpSocket::bind(key.bind_addr)
            .await
            .map_err(|source| TransportError::BindFailed { addr: key.bind_addr.to_string(), source })?;
        configure(&socket).map_err(|source| TransportError::BindFailed { addr: key.bind_addr.to_string(), source })?;

        let socket = Arc::new(socket);
        self.sockets.lock().unwrap().insert(key, Arc::downgrade(&socket));
        Ok(socket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reuses_socket_while_a_strong_ref_is_held() {
        let registry = SocketRegistry::new();
        let key = SocketKey { protocol: "mock", bind_addr: "127.0.0.1:0".parse().unwrap() };
        let a = registry.get_or_bind(key, |_| Ok(())).await.unwrap();
        let b = registry.get_or_bind(key, |_| Ok(())).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
