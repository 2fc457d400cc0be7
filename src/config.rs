//! Engine-wide tunables.
//!
//! Per spec.md §9 these are "behaviors, not constants of art" — the jitter
//! threshold and broadcast intervals are exposed here rather than baked in as
//! `const`s, so an embedder can retune them without a rebuild.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// LTP jitter suppression threshold (§4.5.1). Default 2, per spec.md.
    pub jitter_threshold: u8,
    /// Minimum interval between input-frame broadcasts for a given universe (§4.8).
    pub input_broadcast_interval: Duration,
    /// Minimum interval between group-value broadcasts for a given group (§4.6).
    pub group_broadcast_interval: Duration,
    /// Art-Net Net (0-127) applied to all outbound port-addresses.
    pub artnet_net: u8,
    /// Art-Net SubNet (0-15) applied to all outbound port-addresses.
    pub artnet_subnet: u8,
    /// Idle keep-alive interval for output transports even without changes (§4.2).
    pub output_keepalive_interval: Duration,
    /// sACN source name advertised in outbound packets.
    pub sacn_source_name: String,
    /// sACN priority (1-200, default 100) advertised in outbound packets.
    pub sacn_priority: u8,
    /// Per-group trigger throttle when driven from the input pipeline (§4.6).
    pub group_trigger_throttle: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            jitter_threshold: 2,
            input_broadcast_interval: Duration::from_millis(100),
            group_broadcast_interval: Duration::from_millis(100),
            artnet_net: 0,
            artnet_subnet: 0,
            output_keepalive_interval: Duration::from_secs(2),
            sacn_source_name: "lumina-dmx".to_string(),
            sacn_priority: 100,
            group_trigger_throttle: Duration::from_millis(100),
        }
    }
}
