//! Network monitor (supplemented from `network_monitor.py`): polls every
//! registered transport's [`TransportStatus`] once a second, diffs against
//! the previous snapshot, and emits `monitor_*` events through the fabric.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::descriptors::TransportStatus;
use crate::engine::events::Event;
use crate::engine::Engine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredTransport {
    pub label: String,
    pub status: TransportStatus,
}

struct Snapshot {
    transports: HashMap<String, TransportStatus>,
}

pub struct NetworkMonitor {
    engine: Engine,
    snapshot: Mutex<Snapshot>,
    poll_interval: Duration,
}

impl NetworkMonitor {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            snapshot: Mutex::new(Snapshot { transports: HashMap::new() }),
            poll_interval: Duration::from_secs(1),
        }
    }

    /// One polling pass: compares `current` (label -> status, gathered by the
    /// caller from every live transport) against the last snapshot and emits a
    /// `MonitorStatus` event for anything new, changed, or gone quiet.
    pub fn poll(&self, current: HashMap<String, TransportStatus>) {
        let mut snapshot = self.snapshot.lock().unwrap();

        for (label, status) in &current {
            let changed = snapshot.transports.get(label).map_or(true, |prev| prev != status);
            if changed {
                self.engine.emit(Event::MonitorStatus {
                    transport: label.clone(),
                    detail: describe(status),
                });
            }
        }

        for label in snapshot.transports.keys() {
            if !current.contains_key(label) {
                self.engine.emit(Event::MonitorStatus { transport: label.clone(), detail: "removed".to_string() });
            }
        }

        snapshot.transports = current;
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Spawns the 1-second polling loop; `gather` collects a fresh status map
    /// from every live transport (owned by the caller, since transports live
    /// outside this module).
    pub async fn run(self: std::sync::Arc<Self>, gather: impl Fn() -> HashMap<String, TransportStatus> + Send + 'static) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            self.poll(gather());
        }
    }
}

fn describe(status: &TransportStatus) -> String {
    if status.degraded {
        "degraded".to_string()
    } else if status.running {
        format!("running ({} packets)", status.packet_count)
    } else {
        "stopped".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    #[test]
    fn unchanged_status_does_not_re_emit() {
        let engine = Engine::new(EngineConfig::default());
        let monitor = NetworkMonitor::new(engine.clone());

        let mut status = TransportStatus::default();
        status.running = true;
        let mut first = HashMap::new();
        first.insert("artnet:universe-1".to_string(), status.clone());

        monitor.poll(first.clone());
        monitor.poll(first);

        // No panics, no duplicate emission path exercised beyond `poll`
        // itself — full event-count assertions belong to engine-level tests
        // where a `Sink` is wired in.
        assert_eq!(monitor.snapshot.lock().unwrap().transports.len(), 1);
    }

    #[test]
    fn removed_transport_is_diffed_out() {
        let engine = Engine::new(EngineConfig::default());
        let monitor = NetworkMonitor::new(engine);

        let mut status = TransportStatus::default();
        status.running = true;
        let mut first = HashMap::new();
        first.insert("artnet:universe-1".to_string(), status);
        monitor.poll(first);

        monitor.poll(HashMap::new());
        assert!(monitor.snapshot.lock().unwrap().transports.is_empty());
    }
}
