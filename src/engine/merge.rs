//! First half of the merge pipeline (spec.md §4.5.1): composing local fader
//! state and input passthrough into a universe's `output` buffer. Group
//! contributions are composed by [`crate::groups::GroupEngine`] and applied by
//! the caller the same way a direct write would be.

use std::collections::HashMap;

use crate::descriptors::{ChannelRange, MergeMode};
use crate::universe::Frame;

/// Direct (unmapped) passthrough over a contiguous channel range.
pub fn apply_direct_passthrough(
    output: &mut Frame,
    local: &Frame,
    input: &Frame,
    last_applied: &mut Frame,
    range: ChannelRange,
    mode: MergeMode,
    jitter_threshold: u8,
) {
    for channel in range.start..=range.end {
        let in_value = input.get(channel);
        match mode {
            MergeMode::Htp => {
                let local_value = local.get(channel);
                output.set(channel, local_value.max(in_value));
                last_applied.set(channel, in_value);
            }
            MergeMode::Ltp => {
                let prior = last_applied.get(channel);
                let delta = (in_value as i16 - prior as i16).unsigned_abs() as u8;
                if in_value == 0 || delta > jitter_threshold {
                    output.set(channel, in_value);
                    last_applied.set(channel, in_value);
                }
            }
        }
    }
}

/// Mapped passthrough: only the slots present in `touched` were actually
/// routed here (§4.4 selective application) — everything else in `output`
/// keeps its prior value.
pub fn apply_mapped_passthrough(
    output: &mut Frame,
    local: &Frame,
    last_applied: &mut Frame,
    touched: &HashMap<u16, u8>,
    mode: MergeMode,
    jitter_threshold: u8,
) {
    for (&channel, &in_value) in touched {
        match mode {
            MergeMode::Htp => {
                let local_value = local.get(channel);
                output.set(channel, local_value.max(in_value));
                last_applied.set(channel, in_value);
            }
            MergeMode::Ltp => {
                let prior = last_applied.get(channel);
                let delta = (in_value as i16 - prior as i16).unsigned_abs() as u8;
                if in_value == 0 || delta > jitter_threshold {
                    output.set(channel, in_value);
                    last_applied.set(channel, in_value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn htp_merge_keeps_the_higher_value() {
        let mut output = Frame::zeroed();
        let mut local = Frame::zeroed();
        local.set(1, 150);
        let mut input = Frame::zeroed();
        input.set(1, 200);
        let mut last_applied = Frame::zeroed();

        apply_direct_passthrough(&mut output, &local, &input, &mut last_applied, ChannelRange::FULL, MergeMode::Htp, 2);
        assert_eq!(output.get(1), 200);
    }

    #[test]
    fn ltp_suppresses_small_jitter_but_not_zero() {
        let mut output = Frame::zeroed();
        let local = Frame::zeroed();
        let mut last_applied = Frame::zeroed();
        last_applied.set(1, 100);

        let mut input = Frame::zeroed();
        input.set(1, 101);
        apply_direct_passthrough(&mut output, &local, &input, &mut last_applied, ChannelRange::FULL, MergeMode::Ltp, 2);
        assert_eq!(output.get(1), 0);

        let mut input = Frame::zeroed();
        input.set(1, 103);
        apply_direct_passthrough(&mut output, &local, &input, &mut last_applied, ChannelRange::FULL, MergeMode::Ltp, 2);
        assert_eq!(output.get(1), 103);

        let input = Frame::zeroed();
        apply_direct_passthrough(&mut output, &local, &input, &mut last_applied, ChannelRange::FULL, MergeMode::Ltp, 2);
        assert_eq!(output.get(1), 0);
    }
}
