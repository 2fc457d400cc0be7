//! Universe frame (§4.1) and per-universe runtime state (§3 "Universe").

use serde::{Deserialize, Serialize};

pub const NUM_CHANNELS: usize = 512;

/// A 512-slot DMX frame. Channels are addressed 1-indexed at the API boundary
/// and clamped rather than rejected — there is no invariant beyond the
/// per-slot range (spec.md §4.1).
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Frame(#[serde(with = "serde_bytes_array")] pub [u8; NUM_CHANNELS]);

impl Frame {
    pub const fn zeroed() -> Self {
        Self([0u8; NUM_CHANNELS])
    }

    /// Clamp a 1-indexed channel number into `0..512`, or `None` if it falls
    /// outside `1..=512` entirely (rather than wrapping).
    fn index(channel: u16) -> Option<usize> {
        if (1..=NUM_CHANNELS as u16).contains(&channel) {
            Some(channel as usize - 1)
        } else {
            None
        }
    }

    /// Clamp and write a single slot. Out-of-range channels are silently
    /// ignored (spec.md §4.1: "channels outside 1..=512 ... are silently
    /// clamped").
    pub fn set(&mut self, channel: u16, value: u8) {
        if let Some(i) = Self::index(channel) {
            self.0[i] = value;
        }
    }

    pub fn get(&self, channel: u16) -> u8 {
        Self::index(channel).map(|i| self.0[i]).unwrap_or(0)
    }

    /// Replace all 512 slots. `values` shorter than 512 leaves the remainder
    /// untouched; longer is truncated.
    pub fn set_all(&mut self, values: &[u8]) {
        let n = values.len().min(NUM_CHANNELS);
        self.0[..n].copy_from_slice(&values[..n]);
    }

    pub fn get_all(&self) -> &[u8; NUM_CHANNELS] {
        &self.0
    }

    pub fn blackout(&mut self) {
        self.0 = [0u8; NUM_CHANNELS];
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame(..{} bytes..)", NUM_CHANNELS)
    }
}

/// serde helper: `[u8; 512]` has no built-in `Serialize`/`Deserialize` impl.
mod serde_bytes_array {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 512], serializer: S) -> Result<S::Ok, S::Error> {
        bytes.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 512], D::Error> {
        let vec = Vec::<u8>::deserialize(deserializer)?;
        let mut out = [0u8; 512];
        if vec.len() != 512 {
            return Err(D::Error::custom(format!(
                "expected 512 bytes, got {}",
                vec.len()
            )));
        }
        out.copy_from_slice(&vec);
        Ok(out)
    }
}

/// Per-universe runtime state: the four parallel value tracks described in
/// spec.md §3. `output` is the last composed frame; `local` and `input` are
/// never mutated by the merge itself, only by local writes / input arrival.
#[derive(Debug, Clone)]
pub struct UniverseRuntime {
    pub id: u32,
    pub active: bool,
    pub output: Frame,
    pub local: Frame,
    pub input: Frame,
    pub last_applied_input: Frame,
}

impl UniverseRuntime {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            active: true,
            output: Frame::zeroed(),
            local: Frame::zeroed(),
            input: Frame::zeroed(),
            last_applied_input: Frame::zeroed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_channels_silently() {
        let mut f = Frame::zeroed();
        f.set(0, 255);
        f.set(513, 255);
        assert_eq!(f.get_all(), &[0u8; 512]);
    }

    #[test]
    fn set_and_get_roundtrip() {
        let mut f = Frame::zeroed();
        f.set(1, 10);
        f.set(512, 20);
        assert_eq!(f.get(1), 10);
        assert_eq!(f.get(512), 20);
    }

    #[test]
    fn blackout_zeroes_every_slot() {
        let mut f = Frame::zeroed();
        f.set_all(&[255u8; 512]);
        f.blackout();
        assert_eq!(f.get_all(), &[0u8; 512]);
    }
}
