//! In-memory output transport for tests and the "no transport configured"
//! state: records the last frame sent, logs at debug level.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use log::debug;

use crate::descriptors::TransportStatus;
use crate::transport::OutputTransport;

#[derive(Default)]
pub struct MockOutput {
    last_frame: Mutex<Option<[u8; 512]>>,
    packet_count: AtomicU64,
    wire_universe: Option<u16>,
}

impl MockOutput {
    pub fn new(wire_universe: Option<u16>) -> Self {
        Self {
            last_frame: Mutex::new(None),
            packet_count: AtomicU64::new(0),
            wire_universe,
        }
    }

    pub fn last_frame(&self) -> Option<[u8; 512]> {
        *self.last_frame.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl OutputTransport for MockOutput {
    async fn send(&self, frame: &[u8; 512]) {
        debug!("mock output received frame ({} bytes)", frame.len());
        *self.last_frame.lock().unwrap() = Some(*frame);
        self.packet_count.fetch_add(1, Ordering::Relaxed);
    }

    fn status(&self) -> TransportStatus {
        TransportStatus {
            running: true,
            bind_address: None,
            wire_universe: self.wire_universe,
            packet_count: self.packet_count.load(Ordering::Relaxed),
            last_sequence: None,
            degraded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_last_frame_and_counts_packets() {
        let mock = MockOutput::new(Some(1));
        let mut frame = [0u8; 512];
        frame[0] = 200;
        mock.send(&frame).await;
        assert_eq!(mock.last_frame().unwrap()[0], 200);
        assert_eq!(mock.status().packet_count, 1);
    }
}
