//! Output/input descriptors and passthrough configuration (spec.md §3).

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    Htp,
    Ltp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassthroughMode {
    Off,
    ViewOnly,
    FadersOutput,
    OutputOnly,
}

impl PassthroughMode {
    pub fn reaches_output(self) -> bool {
        matches!(self, Self::FadersOutput | Self::OutputOnly)
    }

    pub fn reaches_ui(self) -> bool {
        matches!(self, Self::ViewOnly | Self::FadersOutput)
    }

    pub fn is_active(self) -> bool {
        !matches!(self, Self::Off)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PassthroughConfig {
    pub mode: PassthroughMode,
    pub merge: MergeMode,
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self {
            mode: PassthroughMode::Off,
            merge: MergeMode::Htp,
        }
    }
}

/// Inclusive 1-indexed channel range `[start..=end] ⊆ [1..=512]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub start: u16,
    pub end: u16,
}

impl ChannelRange {
    pub const FULL: ChannelRange = ChannelRange {
        start: 1,
        end: 512,
    };

    pub fn contains(&self, channel: u16) -> bool {
        channel >= self.start && channel <= self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtNetConfig {
    pub target_ip: Ipv4Addr,
    pub broadcast: bool,
    pub wire_universe: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SacnConfig {
    pub target_ip: Option<Ipv4Addr>,
    pub multicast: bool,
    pub wire_universe: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum OutputProtocol {
    Artnet(ArtNetConfig),
    Sacn(SacnConfig),
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub id: u32,
    pub universe: u32,
    pub protocol: OutputProtocol,
    pub target_fps: u32,
    pub enabled: bool,
    /// Stable priority ordering among multiple outputs on one universe.
    pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InputProtocol {
    Artnet(ArtNetConfig),
    Sacn(SacnConfig),
    Midi { device: String },
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputFilter {
    pub ignore_self: bool,
    pub source_ip: Option<Ipv4Addr>,
    pub ignore_ip: Option<Ipv4Addr>,
}

impl Default for InputFilter {
    fn default() -> Self {
        Self {
            ignore_self: true,
            source_ip: None,
            ignore_ip: None,
        }
    }
}

/// Input descriptor — identity is the owning universe (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDescriptor {
    pub universe: u32,
    pub protocol: InputProtocol,
    pub channel_range: ChannelRange,
    pub filter: InputFilter,
    pub passthrough: PassthroughConfig,
}

impl InputDescriptor {
    pub fn none(universe: u32) -> Self {
        Self {
            universe,
            protocol: InputProtocol::None,
            channel_range: ChannelRange::FULL,
            filter: InputFilter::default(),
            passthrough: PassthroughConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStatus {
    pub running: bool,
    pub bind_address: Option<String>,
    pub wire_universe: Option<u16>,
    pub packet_count: u64,
    pub last_sequence: Option<u8>,
    pub degraded: bool,
}

impl Default for TransportStatus {
    fn default() -> Self {
        Self {
            running: false,
            bind_address: None,
            wire_universe: None,
            packet_count: 0,
            last_sequence: None,
            degraded: false,
        }
    }
}
