//! Channel mapping table (spec.md §4.4).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::descriptors::ChannelRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedBehavior {
    Passthrough,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MappingDestination {
    Channel(u32, u16),
    UniverseMaster(u32),
    GlobalMaster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingEntry {
    pub src_universe: u32,
    pub src_channel: u16,
}

/// The result of routing one source universe's raw input frame through the
/// active mapping configuration (spec.md §4.4 + §4.5.1 "Mapped" passthrough).
/// Only slots that actually received a mapped value or an unmapped-passthrough
/// value are present — this is what makes application selective.
#[derive(Debug, Default)]
pub struct RoutedInput {
    /// destination universe -> (channel -> value), touched slots only.
    pub per_universe: HashMap<u32, HashMap<u16, u8>>,
    pub universe_master: Vec<(u32, u8)>,
    pub global_master: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    forward: HashMap<(u32, u16), Vec<MappingDestination>>,
    /// Channel->channel entries only, per spec.md §3.
    reverse: HashMap<(u32, u16), (u32, u16)>,
    pub unmapped_behavior: UnmappedBehavior,
    /// Destination channel slots protected from unmapped-passthrough overwrite.
    mapped_destination_slots: HashSet<(u32, u16)>,
}

impl MappingTable {
    /// Load a new configuration, clearing the old one (spec.md §4.4: "Loading
    /// a configuration clears the old maps and indexes the new one").
    pub fn replace(
        &mut self,
        entries: impl IntoIterator<Item = (MappingEntry, Vec<MappingDestination>)>,
        unmapped_behavior: UnmappedBehavior,
    ) {
        self.forward.clear();
        self.reverse.clear();
        self.mapped_destination_slots.clear();
        self.unmapped_behavior = unmapped_behavior;

        for (src, destinations) in entries {
            let key = (src.src_universe, src.src_channel);
            for dest in &destinations {
                if let MappingDestination::Channel(du, dc) = dest {
                    self.reverse.insert((*du, *dc), key);
                    self.mapped_destination_slots.insert((*du, *dc));
                }
            }
            self.forward.insert(key, destinations);
        }
    }

    pub fn source_for(&self, dst_universe: u32, dst_channel: u16) -> Option<(u32, u16)> {
        self.reverse.get(&(dst_universe, dst_channel)).copied()
    }

    pub fn destinations_for(&self, src_universe: u32, src_channel: u16) -> Option<&[MappingDestination]> {
        self.forward
            .get(&(src_universe, src_channel))
            .map(|v| v.as_slice())
    }

    pub fn is_mapped_destination(&self, universe: u32, channel: u16) -> bool {
        self.mapped_destination_slots.contains(&(universe, channel))
    }

    /// `(dst_universe, dst_channel) -> (src_universe, src_channel)` pairs, for
    /// callers that need to walk every channel->channel mapping entry (used
    /// to compute which destination channels are currently input-controlled).
    pub(crate) fn reverse_entries(&self) -> impl Iterator<Item = (&(u32, u16), &(u32, u16))> {
        self.reverse.iter()
    }

    /// Route one universe's raw input frame. `src_universe` is both the
    /// source of unmapped passthrough and a possible `Channel` destination
    /// itself (fan-in/out is allowed).
    pub fn route(
        &self,
        src_universe: u32,
        src_frame: &[u8; 512],
        input_range: ChannelRange,
    ) -> RoutedInput {
        let mut routed = RoutedInput::default();

        for slot in 1..=512u16 {
            let value = src_frame[slot as usize - 1];
            let key = (src_universe, slot);

            if let Some(destinations) = self.forward.get(&key) {
                for dest in destinations {
                    match dest {
                        MappingDestination::Channel(du, dc) => {
                            routed.per_universe.entry(*du).or_default().insert(*dc, value);
                        }
                        MappingDestination::UniverseMaster(u) => {
                            routed.universe_master.push((*u, value));
                        }
                        MappingDestination::GlobalMaster => {
                            routed.global_master.push(value);
                        }
                    }
                }
                continue;
            }

            if self.unmapped_behavior == UnmappedBehavior::Passthrough
                && input_range.contains(slot)
                && !self.mapped_destination_slots.contains(&(src_universe, slot))
            {
                // Unmapped zero outside the range would wipe local fader
                // values, so zero-suppression only applies here, not to
                // mapped slots (those propagate zero deliberately).
                routed
                    .per_universe
                    .entry(src_universe)
                    .or_default()
                    .insert(slot, value);
            }
        }

        routed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_destination_protected_from_unmapped_passthrough() {
        let mut table = MappingTable::default();
        table.replace(
            [(
                MappingEntry {
                    src_universe: 1,
                    src_channel: 1,
                },
                vec![MappingDestination::Channel(1, 5)],
            )],
            UnmappedBehavior::Passthrough,
        );

        let mut frame = [0u8; 512];
        frame[0] = 200; // channel 1 -> mapped to channel 5
        frame[4] = 77; // channel 5 has no entry but IS a mapped destination

        let routed = table.route(1, &frame, ChannelRange::FULL);
        let dest = &routed.per_universe[&1];
        assert_eq!(dest.get(&5), Some(&200));
        // Channel 5 in the source frame must not unmapped-passthrough onto
        // itself since it's a protected mapped destination slot.
        assert!(!dest.contains_key(&5) || dest[&5] == 200);
    }

    #[test]
    fn unmapped_passthrough_only_within_range() {
        let table = MappingTable::default();
        let mut frame = [0u8; 512];
        frame[10] = 99;
        let range = ChannelRange { start: 1, end: 5 };
        let routed = table.route(2, &frame, range);
        assert!(!routed.per_universe.contains_key(&2) || !routed.per_universe[&2].contains_key(&11));
    }
}
