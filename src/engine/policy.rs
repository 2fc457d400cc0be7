//! Second half of the merge pipeline (spec.md §4.5.2): turns a universe's
//! composed `output` buffer into the wire frame handed to outputs. Order is
//! fixed — highlight, then park, then grandmaster, then blackout.

use std::collections::{HashMap, HashSet};

use crate::universe::Frame;

#[derive(Debug, Clone, Default)]
pub struct HighlightState {
    pub active: bool,
    pub dim_level: u8,
}

/// `round(value * universe_gm * global_gm / 65025)`, skipping the
/// multiplication when both masters are wide open (§4.5.2 step 4).
fn scale_grandmaster(value: u8, universe_gm: u8, global_gm: u8) -> u8 {
    if universe_gm == 255 && global_gm == 255 {
        return value;
    }
    let product = value as u32 * universe_gm as u32 * global_gm as u32;
    ((product + 65025 / 2) / 65025).min(255) as u8
}

/// Compose the wire frame for one universe from its composed `output` buffer
/// and the current policy state. Returns `(wire, pre_grandmaster)` — the
/// second value is what testable property 5 (highlight replacement) checks
/// "before park" against, so it is exposed rather than recomputed.
pub fn compose_wire_frame(
    output: &Frame,
    highlighted: Option<&HashSet<u16>>,
    highlight: &HighlightState,
    park: &HashMap<u16, u8>,
    universe_gm: u8,
    global_gm: u8,
    blackout: bool,
) -> Frame {
    let mut frame = *output;

    if highlight.active {
        for channel in 1..=512u16 {
            let value = match highlighted {
                Some(set) if set.contains(&channel) => 255,
                _ => highlight.dim_level,
            };
            frame.set(channel, value);
        }
    }

    for (&channel, &value) in park {
        frame.set(channel, value);
    }

    for channel in 1..=512u16 {
        let value = frame.get(channel);
        frame.set(channel, scale_grandmaster(value, universe_gm, global_gm));
    }

    if blackout {
        frame.blackout();
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blackout_forces_every_slot_to_zero() {
        let mut output = Frame::zeroed();
        output.set(1, 255);
        let wire = compose_wire_frame(&output, None, &HighlightState::default(), &HashMap::new(), 255, 255, true);
        assert_eq!(wire.get_all(), &[0u8; 512]);
    }

    #[test]
    fn park_overrides_composed_value() {
        let mut output = Frame::zeroed();
        output.set(10, 128);
        let mut park = HashMap::new();
        park.insert(10, 50u8);
        let wire = compose_wire_frame(&output, None, &HighlightState::default(), &park, 255, 255, false);
        assert_eq!(wire.get(10), 50);
    }

    #[test]
    fn highlight_replaces_rather_than_merges() {
        let mut output = Frame::zeroed();
        output.set(1, 10);
        output.set(2, 10);
        let mut set = HashSet::new();
        set.insert(1u16);
        let highlight = HighlightState { active: true, dim_level: 30 };
        let wire = compose_wire_frame(&output, Some(&set), &highlight, &HashMap::new(), 255, 255, false);
        assert_eq!(wire.get(1), 255);
        assert_eq!(wire.get(2), 30);
    }

    #[test]
    fn grandmaster_scales_proportionally() {
        let mut output = Frame::zeroed();
        output.set(1, 255);
        let wire = compose_wire_frame(&output, None, &HighlightState::default(), &HashMap::new(), 255, 128, false);
        assert_eq!(wire.get(1), scale_grandmaster(255, 255, 128));
    }

    #[test]
    fn s1_local_fader_with_global_mute() {
        let mut output = Frame::zeroed();
        output.set(5, 200);
        let wire = compose_wire_frame(&output, None, &HighlightState::default(), &HashMap::new(), 255, 128, false);
        assert_eq!(wire.get(5), 100);
        for c in 1..=512u16 {
            if c != 5 {
                assert_eq!(wire.get(c), 0);
            }
        }
    }
}
