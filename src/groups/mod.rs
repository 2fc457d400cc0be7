//! Group engine (spec.md §4.6): proportional/follow/color_mixer master-to-member
//! fan-out, with HTP merge across groups sharing a member channel.
//!
//! Grounded in `DMXInterface._apply_group` / `load_groups`
//! (`examples/original_source/backend/dmx_interface.py`). The split here
//! differs from the source on purpose: `GroupEngine` only computes *what*
//! to write (`Write` values, HTP-resolved); applying them to universe state,
//! checking park, and emitting events is the caller's job (`engine::Engine`),
//! matching the "explicit owned engine struct" redesign note in spec.md §9.

pub mod color;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use color::{color_role_to_value, hsl_to_rgb, ColorRole, Hsl};

pub type GroupId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    Proportional,
    Follow,
    ColorMixer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "target_type", rename_all = "snake_case")]
pub enum MemberTarget {
    Channel {
        universe: u32,
        channel: u16,
        #[serde(default = "default_base_value")]
        base_value: u8,
        color_role: Option<ColorRole>,
    },
    UniverseMaster {
        universe: u32,
    },
    GlobalMaster,
}

fn default_base_value() -> u8 {
    255
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub mode: GroupMode,
    pub enabled: bool,
    /// A real fader this group is driven by, if any (spec.md §4.5.3 reverse routing).
    pub physical_master: Option<(u32, u16)>,
    pub master_value: u8,
    pub members: Vec<MemberTarget>,
    pub color_state: Hsl,
}

impl Group {
    pub fn new(id: GroupId, name: impl Into<String>, mode: GroupMode) -> Self {
        Self {
            id,
            name: name.into(),
            mode,
            enabled: true,
            physical_master: None,
            master_value: 0,
            members: Vec::new(),
            color_state: Hsl::default(),
        }
    }
}

/// A side-effect-free description of one channel write a group wants to make.
/// The caller resolves park/blackout and actually mutates universe state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    Channel { universe: u32, channel: u16, value: u8 },
    UniverseMaster { universe: u32, value: u8 },
    GlobalMaster { value: u8 },
}

#[derive(Debug, Default)]
pub struct GroupEngine {
    groups: HashMap<GroupId, Group>,
    /// HTP contribution table: member channel -> (group -> last value it wrote).
    contributions: HashMap<(u32, u16), HashMap<GroupId, u8>>,
    /// Physical-master channel -> groups it drives (spec.md §4.5.3).
    master_to_groups: HashMap<(u32, u16), Vec<GroupId>>,
    last_broadcast: HashMap<GroupId, (Instant, u8)>,
}

impl GroupEngine {
    /// Replace the whole configuration (spec.md §4.6: "loading clears prior
    /// contributions so stale groups can't keep a channel pinned high").
    pub fn load(&mut self, groups: impl IntoIterator<Item = Group>) {
        self.groups.clear();
        self.contributions.clear();
        self.master_to_groups.clear();

        for group in groups {
            if let Some(master) = group.physical_master {
                self.master_to_groups.entry(master).or_default().push(group.id);
            }
            self.groups.insert(group.id, group);
        }
    }

    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn get_mut(&mut self, id: GroupId) -> Option<&mut Group> {
        self.groups.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn insert(&mut self, group: Group) {
        if let Some(master) = group.physical_master {
            self.master_to_groups.entry(master).or_default().push(group.id);
        }
        self.groups.insert(group.id, group);
    }

    pub fn remove(&mut self, id: GroupId) -> Option<Group> {
        let removed = self.groups.remove(&id);
        self.master_to_groups.retain(|_, ids| {
            ids.retain(|g| *g != id);
            !ids.is_empty()
        });
        for group_map in self.contributions.values_mut() {
            group_map.remove(&id);
        }
        removed
    }

    /// Groups whose physical master is this channel (§4.5.3: a fader move
    /// resolves here before ordinary HTP/LTP merge).
    pub fn groups_driven_by(&self, universe: u32, channel: u16) -> &[GroupId] {
        self.master_to_groups
            .get(&(universe, channel))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Recompute every member write for `group_id` at `master_value`, storing
    /// this group's HTP contribution per member channel and returning the
    /// HTP-resolved writes across *all* groups sharing those channels.
    pub fn apply_from_master(&mut self, group_id: GroupId, master_value: u8) -> Vec<Write> {
        let Some(group) = self.groups.get_mut(&group_id) else {
            return Vec::new();
        };
        if !group.enabled {
            return Vec::new();
        }
        group.master_value = master_value;

        if group.mode == GroupMode::ColorMixer {
            return self.apply_color_mixer(group_id, master_value);
        }

        let mode = group.mode;
        let mut writes = Vec::new();
        let mut touched = Vec::new();

        for member in group.members.clone() {
            match member {
                MemberTarget::Channel { universe, channel, base_value, .. } => {
                    let value = match mode {
                        GroupMode::Follow => master_value,
                        GroupMode::Proportional => {
                            ((base_value as u32 * master_value as u32) + 127) / 255
                        }
                        GroupMode::ColorMixer => unreachable!(),
                    } as u8;

                    let key = (universe, channel);
                    self.contributions
                        .entry(key)
                        .or_default()
                        .insert(group_id, value);
                    touched.push(key);
                }
                MemberTarget::UniverseMaster { universe } => {
                    writes.push(Write::UniverseMaster { universe, value: master_value });
                }
                MemberTarget::GlobalMaster => {
                    writes.push(Write::GlobalMaster { value: master_value });
                }
            }
        }

        for key in touched {
            let htp_value = self
                .contributions
                .get(&key)
                .map(|m| m.values().copied().max().unwrap_or(0))
                .unwrap_or(0);
            writes.push(Write::Channel {
                universe: key.0,
                channel: key.1,
                value: htp_value,
            });
        }

        writes
    }

    fn apply_color_mixer(&mut self, group_id: GroupId, brightness: u8) -> Vec<Write> {
        let group = self.groups.get(&group_id).expect("checked by caller");
        let (r, g, b) = hsl_to_rgb(group.color_state);

        let mut writes = Vec::new();
        for member in &group.members {
            if let MemberTarget::Channel { universe, channel, color_role: Some(role), .. } = member {
                let raw = color_role_to_value(*role, r, g, b);
                let value = ((raw as u32 * brightness as u32) + 127) / 255;
                let value = value as u8;
                writes.push(Write::Channel {
                    universe: *universe,
                    channel: *channel,
                    value,
                });
            }
        }
        writes
    }

    /// Update a color_mixer group's stored HSL and reapply at its current
    /// master value. No-op (returns `None`) if the group isn't color_mixer.
    pub fn set_color_state(&mut self, group_id: GroupId, hsl: Hsl) -> Option<Vec<Write>> {
        let group = self.groups.get_mut(&group_id)?;
        if group.mode != GroupMode::ColorMixer {
            return None;
        }
        group.color_state = hsl;
        let master_value = group.master_value;
        Some(self.apply_color_mixer(group_id, master_value))
    }

    /// Broadcast throttle (§4.6: 100ms per group, only on an actual value
    /// change within the window). Returns `true` if the caller should emit.
    pub fn should_broadcast(&mut self, group_id: GroupId, value: u8, interval: Duration, now: Instant) -> bool {
        match self.last_broadcast.get(&group_id) {
            Some((last_at, last_value)) if *last_value == value && now.duration_since(*last_at) < interval => false,
            _ => {
                self.last_broadcast.insert(group_id, (now, value));
                true
            }
        }
    }
}

/// Reverse-routing: a fader move on a group's physical master channel
/// recomputes the master value from the member's own moved value (§4.5.3).
///
/// `follow` groups hand the member value straight back; `proportional` groups
/// invert the forward formula against the member's base value.
pub fn reverse_master_value(mode: GroupMode, base_value: u8, member_value: u8) -> u8 {
    match mode {
        GroupMode::Follow => member_value,
        GroupMode::Proportional => {
            if base_value == 0 {
                0
            } else {
                (255u32 * member_value as u32 / base_value as u32).min(255) as u8
            }
        }
        GroupMode::ColorMixer => member_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_member(universe: u32, channel: u16, base_value: u8) -> MemberTarget {
        MemberTarget::Channel {
            universe,
            channel,
            base_value,
            color_role: None,
        }
    }

    #[test]
    fn proportional_scales_by_base_value() {
        let mut engine = GroupEngine::default();
        let mut group = Group::new(1, "dimmers", GroupMode::Proportional);
        group.members.push(channel_member(1, 1, 200));
        engine.load([group]);

        let writes = engine.apply_from_master(1, 128);
        assert_eq!(
            writes,
            vec![Write::Channel { universe: 1, channel: 1, value: ((200u32 * 128 + 127) / 255) as u8 }]
        );
    }

    #[test]
    fn htp_resolves_across_two_groups_sharing_a_channel() {
        let mut engine = GroupEngine::default();
        let mut g1 = Group::new(1, "a", GroupMode::Follow);
        g1.members.push(channel_member(1, 1, 255));
        let mut g2 = Group::new(2, "b", GroupMode::Follow);
        g2.members.push(channel_member(1, 1, 255));
        engine.load([g1, g2]);

        engine.apply_from_master(1, 50);
        let writes = engine.apply_from_master(2, 200);
        assert_eq!(writes, vec![Write::Channel { universe: 1, channel: 1, value: 200 }]);

        let writes = engine.apply_from_master(2, 10);
        assert_eq!(writes, vec![Write::Channel { universe: 1, channel: 1, value: 50 }]);
    }

    #[test]
    fn color_mixer_scales_role_value_by_brightness() {
        let mut engine = GroupEngine::default();
        let mut group = Group::new(1, "wash", GroupMode::ColorMixer);
        group.color_state = Hsl { h: 0.0, s: 100.0, l: 50.0 };
        group.members.push(MemberTarget::Channel {
            universe: 1,
            channel: 1,
            base_value: 255,
            color_role: Some(ColorRole::Red),
        });
        engine.load([group]);

        let writes = engine.apply_from_master(1, 128);
        assert_eq!(writes, vec![Write::Channel { universe: 1, channel: 1, value: (255u32 * 128 / 255) as u8 }]);
    }

    #[test]
    fn reverse_proportional_inverts_forward_formula() {
        assert_eq!(reverse_master_value(GroupMode::Proportional, 200, 100), (255u32 * 100 / 200) as u8);
        assert_eq!(reverse_master_value(GroupMode::Follow, 200, 77), 77);
    }
}
