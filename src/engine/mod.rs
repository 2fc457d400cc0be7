//! The DMX interface façade (spec.md §4.8): the single owned engine struct
//! the redesign note in §9 calls for, replacing the source repo's
//! module-level singleton. An embedder constructs one `Engine`, clones its
//! `Arc` handle into each input/output transport task, and drives everything
//! else through the entry points below.
//!
//! Grounded on the teacher's `Arc<Mutex<Inner>>` pattern for shared mutable
//! engine state (compare `ArtNetManager`/`HostAudioState`): transports run as
//! independent tasks, all state mutation happens behind one lock on whichever
//! task currently holds it, matching spec.md §5's single-task-mutates-state
//! model without requiring a dedicated executor thread.

pub mod events;
pub mod merge;
pub mod policy;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::config::EngineConfig;
use crate::descriptors::{ChannelRange, InputDescriptor, InputProtocol, OutputDescriptor};
use crate::error::EngineError;
use crate::groups::{reverse_master_value, Group, GroupEngine, GroupId, GroupMode, Write as GroupWrite};
use crate::mapping::{MappingDestination, MappingTable, UnmappedBehavior};
use crate::universe::{Frame, UniverseRuntime};
use events::{Event, Fabric, Scope, Sink, SourceTag};
use policy::HighlightState;

#[derive(Debug, Clone, Default)]
struct HighlightSets {
    global: HighlightState,
    channels: HashMap<u32, HashSet<u16>>,
}

pub(crate) struct EngineInner {
    config: EngineConfig,
    universes: HashMap<u32, UniverseRuntime>,
    outputs: HashMap<u32, OutputDescriptor>,
    inputs: HashMap<u32, InputDescriptor>,
    mapping: MappingTable,
    mapping_enabled: bool,
    groups: GroupEngine,
    park: HashMap<u32, HashMap<u16, u8>>,
    highlight: HighlightSets,
    global_grandmaster: u8,
    universe_grandmaster: HashMap<u32, u8>,
    blackout_active: bool,
    pre_blackout: HashMap<u32, Frame>,
    input_bypass: bool,
    source_tags: HashMap<u32, HashMap<u16, SourceTag>>,
    fabric: Fabric,
}

impl EngineInner {
    fn new(config: EngineConfig) -> Self {
        let fabric = Fabric::new(config.input_broadcast_interval, config.group_broadcast_interval);
        Self {
            config,
            universes: HashMap::new(),
            outputs: HashMap::new(),
            inputs: HashMap::new(),
            mapping: MappingTable::default(),
            mapping_enabled: false,
            groups: GroupEngine::default(),
            park: HashMap::new(),
            highlight: HighlightSets::default(),
            global_grandmaster: 255,
            universe_grandmaster: HashMap::new(),
            blackout_active: false,
            pre_blackout: HashMap::new(),
            input_bypass: false,
            source_tags: HashMap::new(),
            fabric,
        }
    }

    fn universe_mut(&mut self, id: u32) -> &mut UniverseRuntime {
        self.universes.entry(id).or_insert_with(|| UniverseRuntime::new(id))
    }

    fn universe_gm(&self, id: u32) -> u8 {
        *self.universe_grandmaster.get(&id).unwrap_or(&255)
    }

    fn tag_channel(&mut self, universe: u32, channel: u16, tag: SourceTag) {
        self.source_tags.entry(universe).or_default().insert(channel, tag);
    }

    /// The set of channels in `universe` currently under live input control —
    /// used both for scene-recall filtering (§4.7 step 2) and for rejecting
    /// user writes to input-controlled slots (§4.5.3).
    fn input_controlled_channels(&self, universe: u32) -> HashSet<u16> {
        let mut set = HashSet::new();
        if self.input_bypass {
            return set;
        }

        if let Some(desc) = self.inputs.get(&universe) {
            if desc.passthrough.mode.reaches_output() && !matches!(desc.protocol, InputProtocol::None) {
                if self.mapping_enabled {
                    for channel in desc.channel_range.start..=desc.channel_range.end {
                        if self.mapping.destinations_for(universe, channel).is_some()
                            || self.mapping.unmapped_behavior == UnmappedBehavior::Passthrough
                        {
                            set.insert(channel);
                        }
                    }
                } else {
                    for channel in desc.channel_range.start..=desc.channel_range.end {
                        set.insert(channel);
                    }
                }
            }
        }

        if self.mapping_enabled {
            for (&(dst_u, dst_c), &(src_u, src_c)) in self.mapping.reverse_entries() {
                if dst_u != universe {
                    continue;
                }
                if let Some(src_desc) = self.inputs.get(&src_u) {
                    if src_desc.passthrough.mode.reaches_output()
                        && !matches!(src_desc.protocol, InputProtocol::None)
                        && src_desc.channel_range.contains(src_c)
                    {
                        set.insert(dst_c);
                    }
                }
            }
        }

        set
    }

    fn is_input_controlled(&self, universe: u32, channel: u16) -> bool {
        self.input_controlled_channels(universe).contains(&channel)
    }

    /// Groups (by Channel member) that contain `(universe, channel)`, along
    /// with that member's base value, restricted to enabled groups.
    fn enabled_groups_containing_member(&self, universe: u32, channel: u16) -> Vec<(GroupId, u8)> {
        let mut hits = Vec::new();
        for group in self.groups.iter() {
            if !group.enabled {
                continue;
            }
            for member in &group.members {
                if let crate::groups::MemberTarget::Channel { universe: mu, channel: mc, base_value, .. } = member {
                    if *mu == universe && *mc == channel {
                        hits.push((group.id, *base_value));
                    }
                }
            }
        }
        hits
    }

    /// Core single-channel write with park / group-reverse / input-control
    /// rejection (§4.5.3, §4.8). Returns the event to emit, if any.
    fn write_channel(&mut self, universe: u32, channel: u16, value: u8, source: SourceTag) -> Event {
        if let Some(locked) = self.park.get(&universe).and_then(|m| m.get(&channel)).copied() {
            return Event::ParkReject { universe, channel, value: locked };
        }

        if matches!(source, SourceTag::Local | SourceTag::User(_)) {
            let member_groups = self.enabled_groups_containing_member(universe, channel);
            if !member_groups.is_empty() {
                if member_groups.len() > 1 {
                    let current = self.universe_mut(universe).output.get(channel);
                    return Event::GroupReject { universe, channel, value: current };
                }
                let (group_id, base_value) = member_groups[0];
                if let Some(group) = self.groups.get(group_id) {
                    if let Some(master) = group.physical_master {
                        if self.is_input_controlled(master.0, master.1) {
                            let current = self.universe_mut(universe).output.get(channel);
                            return Event::GroupReject { universe, channel, value: current };
                        }
                    }
                    let mode = group.mode;
                    let new_master = reverse_master_value(mode, base_value, value);
                    return self.apply_group_master(group_id, new_master, true);
                }
            }

            if self.is_input_controlled(universe, channel) {
                let current = self.universe_mut(universe).output.get(channel);
                return Event::ParkReject { universe, channel, value: current };
            }
        }

        let uni = self.universe_mut(universe);
        uni.output.set(channel, value);
        if matches!(source, SourceTag::Local | SourceTag::User(_)) {
            uni.local.set(channel, value);
        }
        self.tag_channel(universe, channel, source);
        Event::ChannelChange { universe, channel, value, source }
    }

    /// Apply a new master value to `group_id` through the group engine,
    /// writing every resulting slot via the ordinary write path (so park
    /// still wins) and, if `write_physical_master` is set and the group has
    /// one, writing that channel too with `group_reverse`.
    fn apply_group_master(&mut self, group_id: GroupId, master_value: u8, write_physical_master: bool) -> Event {
        let physical_master = self.groups.get(group_id).and_then(|g| g.physical_master);
        let writes = self.groups.apply_from_master(group_id, master_value);
        self.apply_group_writes(&writes);

        if write_physical_master {
            if let Some((mu, mc)) = physical_master {
                let uni = self.universe_mut(mu);
                uni.output.set(mc, master_value);
                self.tag_channel(mu, mc, SourceTag::GroupReverse);
            }
        }

        Event::GroupValueChanged { group_id, value: master_value, source: SourceTag::Group }
    }

    fn apply_group_writes(&mut self, writes: &[GroupWrite]) {
        for write in writes {
            match *write {
                GroupWrite::Channel { universe, channel, value } => {
                    if self.park.get(&universe).and_then(|m| m.get(&channel)).is_some() {
                        continue;
                    }
                    let uni = self.universe_mut(universe);
                    uni.output.set(channel, value);
                    self.tag_channel(universe, channel, SourceTag::Group);
                }
                GroupWrite::UniverseMaster { universe, value } => {
                    self.universe_grandmaster.insert(universe, value);
                }
                GroupWrite::GlobalMaster { value } => {
                    self.global_grandmaster = value;
                }
            }
        }
    }

    fn emit_wire(&mut self, universe: u32) -> Frame {
        let gm = self.global_grandmaster;
        let ugm = self.universe_gm(universe);
        let blackout = self.blackout_active;
        let park = self.park.get(&universe).cloned().unwrap_or_default();
        let highlighted = self.highlight.channels.get(&universe);
        let highlight = self.highlight.global.clone();
        let uni = self.universe_mut(universe);
        policy::compose_wire_frame(&uni.output, highlighted, &highlight, &park, ugm, gm, blackout)
    }
}

/// The owned engine handle. Cheap to clone; every clone shares the same
/// locked state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Mutex<EngineInner>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EngineInner::new(config))),
        }
    }

    pub fn subscribe(&self, sink: Box<dyn Sink>) {
        self.inner.lock().unwrap().fabric.subscribe(sink);
    }

    pub fn config(&self) -> EngineConfig {
        self.inner.lock().unwrap().config.clone()
    }

    pub fn ensure_universe(&self, universe: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.universe_mut(universe);
    }

    pub fn wire_frame(&self, universe: u32) -> Frame {
        let mut inner = self.inner.lock().unwrap();
        inner.emit_wire(universe)
    }

    pub fn output_frame(&self, universe: u32) -> Frame {
        let mut inner = self.inner.lock().unwrap();
        inner.universe_mut(universe).output
    }

    // ---- §4.8 façade entry points ----

    pub fn set_channel(&self, universe: u32, channel: u16, value: u8, source: SourceTag) {
        let mut inner = self.inner.lock().unwrap();
        let event = inner.write_channel(universe, channel, value, source);
        inner.fabric.emit(event);
    }

    pub fn set_channels(&self, universe: u32, values: &[(u16, u8)], source: SourceTag) {
        let mut inner = self.inner.lock().unwrap();
        for &(channel, value) in values {
            let event = inner.write_channel(universe, channel, value, source);
            inner.fabric.emit(event);
        }
        let frame = inner.universe_mut(universe).output;
        inner.fabric.emit(Event::Values { universe, values: frame });
    }

    /// Write without a per-channel broadcast (§4.8: used by scene fades).
    /// Park/group-reverse rejection still applies but rejection events are
    /// swallowed — the caller (scene engine) already accounted for
    /// input-controlled channels before computing targets.
    pub fn set_channels_silent(&self, universe: u32, values: &[(u16, u8)], source: SourceTag) {
        let mut inner = self.inner.lock().unwrap();
        for &(channel, value) in values {
            if inner.park.get(&universe).and_then(|m| m.get(&channel)).is_some() {
                continue;
            }
            let uni = inner.universe_mut(universe);
            uni.output.set(channel, value);
            if matches!(source, SourceTag::Local | SourceTag::User(_)) {
                uni.local.set(channel, value);
            }
            inner.tag_channel(universe, channel, source);
        }
    }

    pub fn blackout(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.blackout_active {
            return;
        }
        let universes: Vec<u32> = inner.universes.keys().copied().collect();
        for u in universes {
            let uni = inner.universe_mut(u);
            inner.pre_blackout.insert(u, uni.output);
            uni.output.blackout();
        }
        inner.blackout_active = true;
        inner.fabric.emit(Event::Blackout { active: true });
    }

    pub fn release_blackout(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.blackout_active {
            return;
        }
        let restore: Vec<(u32, Frame)> = inner.pre_blackout.drain().collect();
        for (u, frame) in restore {
            inner.universe_mut(u).output = frame;
        }
        inner.blackout_active = false;
        inner.fabric.emit(Event::Blackout { active: false });
    }

    /// §4.8: releasing bypass force-zeroes local values within each active
    /// input's range so fresh input wins the first HTP comparison, and clears
    /// group throttles so groups re-emit immediately.
    pub fn set_input_bypass(&self, on: bool) {
        let mut inner = self.inner.lock().unwrap();
        let was_on = inner.input_bypass;
        inner.input_bypass = on;
        if was_on && !on {
            let ranges: Vec<(u32, ChannelRange)> = inner
                .inputs
                .values()
                .filter(|d| d.passthrough.mode.is_active())
                .map(|d| (d.universe, d.channel_range))
                .collect();
            for (universe, range) in ranges {
                let uni = inner.universe_mut(universe);
                for channel in range.start..=range.end {
                    uni.local.set(channel, 0);
                }
            }
            let group_ids: Vec<GroupId> = inner.groups.iter().map(|g| g.id).collect();
            for id in group_ids {
                inner.fabric.clear_group_throttle(id);
            }
        }
    }

    pub fn set_global_grandmaster(&self, value: u8) {
        let mut inner = self.inner.lock().unwrap();
        inner.global_grandmaster = value;
        inner.fabric.emit(Event::GrandmasterChanged { scope: Scope::Global, value });
    }

    pub fn set_universe_grandmaster(&self, universe: u32, value: u8) {
        let mut inner = self.inner.lock().unwrap();
        inner.universe_grandmaster.insert(universe, value);
        inner
            .fabric
            .emit(Event::GrandmasterChanged { scope: Scope::Universe(universe), value });
    }

    pub fn park_channel(&self, universe: u32, channel: u16, value: u8) {
        let mut inner = self.inner.lock().unwrap();
        inner.park.entry(universe).or_default().insert(channel, value);
        inner.fabric.emit(Event::ParkUpdate { universe, channel, value: Some(value), parked: true });
    }

    pub fn unpark_channel(&self, universe: u32, channel: u16) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(m) = inner.park.get_mut(&universe) {
            m.remove(&channel);
        }
        inner.fabric.emit(Event::ParkUpdate { universe, channel, value: None, parked: false });
    }

    pub fn start_highlight(&self, universe: u32, channels: &[u16], dim_level: u8) {
        let mut inner = self.inner.lock().unwrap();
        inner.highlight.global.active = true;
        inner.highlight.global.dim_level = dim_level;
        inner.highlight.channels.insert(universe, channels.iter().copied().collect());
        inner.fabric.emit(Event::HighlightUpdate { universe, active: true, dim_level });
    }

    pub fn add_to_highlight(&self, universe: u32, channel: u16) {
        let mut inner = self.inner.lock().unwrap();
        inner.highlight.channels.entry(universe).or_default().insert(channel);
        let dim_level = inner.highlight.global.dim_level;
        inner.fabric.emit(Event::HighlightUpdate { universe, active: true, dim_level });
    }

    pub fn remove_from_highlight(&self, universe: u32, channel: u16) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(set) = inner.highlight.channels.get_mut(&universe) {
            set.remove(&channel);
        }
        let dim_level = inner.highlight.global.dim_level;
        let active = inner.highlight.global.active;
        inner.fabric.emit(Event::HighlightUpdate { universe, active, dim_level });
    }

    pub fn stop_highlight(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.highlight.global.active = false;
        inner.highlight.channels.clear();
        inner.fabric.emit(Event::HighlightUpdate { universe: 0, active: false, dim_level: 0 });
    }

    pub fn set_channel_mapping(
        &self,
        entries: Vec<(crate::mapping::MappingEntry, Vec<MappingDestination>)>,
        unmapped_behavior: UnmappedBehavior,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.mapping.replace(entries, unmapped_behavior);
        inner.mapping_enabled = true;
        inner.fabric.emit(Event::PatchesChanged);
    }

    pub fn add_group(&self, group: Group) {
        let mut inner = self.inner.lock().unwrap();
        inner.groups.insert(group);
        inner.fabric.emit(Event::GroupsChanged);
    }

    pub fn update_group(&self, group: Group) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.groups.get(group.id).is_none() {
            return Err(EngineError::UnknownGroup(group.id));
        }
        inner.groups.insert(group);
        inner.fabric.emit(Event::GroupsChanged);
        Ok(())
    }

    pub fn remove_group(&self, group_id: GroupId) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.groups.remove(group_id).is_none() {
            return Err(EngineError::UnknownGroup(group_id));
        }
        inner.fabric.emit(Event::GroupsChanged);
        Ok(())
    }

    pub fn apply_group_direct(&self, group_id: GroupId, master_value: u8) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.groups.get(group_id).is_none() {
            return Err(EngineError::UnknownGroup(group_id));
        }
        let event = inner.apply_group_master(group_id, master_value, true);
        let now = Instant::now();
        inner.fabric.emit_group_value(group_id, master_value, event, now);
        Ok(())
    }

    pub fn set_group_color(&self, group_id: GroupId, hsl: crate::groups::color::Hsl) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(writes) = inner.groups.set_color_state(group_id, hsl) else {
            return Err(EngineError::UnknownGroup(group_id));
        };
        inner.apply_group_writes(&writes);
        inner.fabric.emit(Event::GroupValueChanged { group_id, value: inner.groups.get(group_id).map(|g| g.master_value).unwrap_or(0), source: SourceTag::Group });
        Ok(())
    }

    /// Register an input descriptor (the associated transport is spawned by
    /// the caller; this only wires the descriptor into the merge pipeline).
    pub fn set_input(&self, descriptor: InputDescriptor) {
        let mut inner = self.inner.lock().unwrap();
        let universe = descriptor.universe;
        inner.universe_mut(universe);
        inner.inputs.insert(universe, descriptor);
        inner.fabric.emit(Event::PatchesChanged);
    }

    pub fn set_output(&self, descriptor: OutputDescriptor) {
        let mut inner = self.inner.lock().unwrap();
        inner.universe_mut(descriptor.universe);
        inner.outputs.insert(descriptor.id, descriptor);
        inner.fabric.emit(Event::PatchesChanged);
    }

    /// Entry point for transport input callbacks (spec.md §4.3/§4.5.1),
    /// invoked from the main task after draining the receiver queue.
    pub fn handle_input_frame(&self, universe: u32, frame: Frame) {
        let mut inner = self.inner.lock().unwrap();
        inner.universe_mut(universe).input = frame;

        let Some(desc) = inner.inputs.get(&universe).cloned() else {
            return;
        };
        if !desc.passthrough.mode.is_active() {
            return;
        }

        if desc.passthrough.mode.reaches_ui() {
            let values: Vec<Option<u8>> = (1..=512u16).map(|c| Some(frame.get(c))).collect();
            inner.fabric.emit_input_frame(universe, Event::InputToUi { universe, values }, Instant::now());
        }

        if !desc.passthrough.mode.reaches_output() {
            return;
        }

        let jitter = inner.config.jitter_threshold;
        let mode = desc.passthrough.merge;

        let touched_universes: Vec<u32>;
        if inner.mapping_enabled {
            let routed = inner.mapping.route(universe, frame.get_all(), desc.channel_range);
            touched_universes = routed.per_universe.keys().copied().collect();

            for (dst_universe, touched) in &routed.per_universe {
                let mut last_applied = inner.universe_mut(*dst_universe).last_applied_input;
                let mut output = inner.universe_mut(*dst_universe).output;
                let local = inner.universe_mut(*dst_universe).local;
                merge::apply_mapped_passthrough(&mut output, &local, &mut last_applied, touched, mode, jitter);
                let uni = inner.universe_mut(*dst_universe);
                uni.output = output;
                uni.last_applied_input = last_applied;
                for &channel in touched.keys() {
                    inner.tag_channel(*dst_universe, channel, SourceTag::Input);
                }
            }
            for (u, v) in routed.universe_master {
                inner.universe_grandmaster.insert(u, v);
            }
            if let Some(&v) = routed.global_master.last() {
                inner.global_grandmaster = v;
            }
        } else {
            let mut last_applied = inner.universe_mut(universe).last_applied_input;
            let mut output = inner.universe_mut(universe).output;
            let local = inner.universe_mut(universe).local;
            merge::apply_direct_passthrough(&mut output, &local, &frame, &mut last_applied, desc.channel_range, mode, jitter);
            let uni = inner.universe_mut(universe);
            uni.output = output;
            uni.last_applied_input = last_applied;
            for channel in desc.channel_range.start..=desc.channel_range.end {
                inner.tag_channel(universe, channel, SourceTag::Input);
            }
            touched_universes = vec![universe];
        }

        // Master triggering from the input pipeline (§4.6): any physical
        // master channel touched by this frame re-applies its group(s).
        for mu in touched_universes {
            for channel in 1..=512u16 {
                let group_ids = inner.groups.groups_driven_by(mu, channel).to_vec();
                if group_ids.is_empty() {
                    continue;
                }
                let value = inner.universe_mut(mu).output.get(channel);
                for group_id in group_ids {
                    let event = inner.apply_group_master(group_id, value, false);
                    let now = Instant::now();
                    inner.fabric.emit_group_value(group_id, value, event, now);
                }
            }
        }

        let frame = inner.universe_mut(universe).output;
        inner.fabric.emit(Event::Values { universe, values: frame });
    }

    pub fn status_snapshot(&self, universe: u32) -> Option<Frame> {
        let mut inner = self.inner.lock().unwrap();
        inner.universes.get(&universe).map(|_| inner.universe_mut(universe).output)
    }

    pub(crate) fn with_inner<R>(&self, f: impl FnOnce(&mut EngineInner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner)
    }

    /// Pushes an event onto the broadcast fabric directly, for ambient
    /// subsystems (the network monitor, MIDI feedback) that have no channel
    /// write of their own to report.
    pub fn emit(&self, event: Event) {
        self.inner.lock().unwrap().emit_event(event);
    }
}

impl EngineInner {
    /// Used by the scene engine (§4.7) to compute the input-controlled
    /// filter set and to drive group restoration without re-deriving the
    /// same bookkeeping Engine's public methods already hold.
    pub(crate) fn scene_input_controlled(&self, universe: u32) -> HashSet<u16> {
        self.input_controlled_channels(universe)
    }

    pub(crate) fn scene_group_master_input_controlled(&self, group_id: GroupId) -> bool {
        self.groups
            .get(group_id)
            .and_then(|g| g.physical_master)
            .map(|(u, c)| self.is_input_controlled(u, c))
            .unwrap_or(false)
    }

    pub(crate) fn groups_physical_master(&self, group_id: GroupId) -> Option<(u32, u16)> {
        self.groups.get(group_id).and_then(|g| g.physical_master)
    }

    /// Member channels of a group, for the scene engine to exclude from a
    /// recall's direct channel writes when the group's physical master is
    /// under live input control (§4.7 input filtering extends to members).
    pub(crate) fn scene_group_member_channels(&self, group_id: GroupId) -> Vec<(u32, u16)> {
        self.groups
            .get(group_id)
            .map(|g| {
                g.members
                    .iter()
                    .filter_map(|m| match m {
                        crate::groups::MemberTarget::Channel { universe, channel, .. } => {
                            Some((*universe, *channel))
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn tag_channel_pub(&mut self, universe: u32, channel: u16, tag: SourceTag) {
        self.tag_channel(universe, channel, tag);
    }

    pub(crate) fn emit_event(&mut self, event: Event) {
        self.fabric.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::MemberTarget;

    fn channel_member(universe: u32, channel: u16, base_value: u8) -> MemberTarget {
        MemberTarget::Channel { universe, channel, base_value, color_role: None }
    }

    #[test]
    fn s4_proportional_group() {
        let engine = Engine::new(EngineConfig::default());
        let mut group = Group::new(1, "dimmers", GroupMode::Proportional);
        group.members.push(channel_member(1, 10, 255));
        group.members.push(channel_member(1, 11, 128));
        engine.add_group(group);

        engine.apply_group_direct(1, 255).unwrap();
        let frame = engine.output_frame(1);
        assert_eq!(frame.get(10), 255);
        assert_eq!(frame.get(11), 128);

        engine.apply_group_direct(1, 128).unwrap();
        let frame = engine.output_frame(1);
        assert_eq!(frame.get(10), 128);
        assert_eq!(frame.get(11), ((128u32 * 128 + 127) / 255) as u8);
    }

    #[test]
    fn s5_park_overrides_group() {
        let engine = Engine::new(EngineConfig::default());
        let mut group = Group::new(1, "dimmers", GroupMode::Proportional);
        group.members.push(channel_member(1, 10, 255));
        group.members.push(channel_member(1, 11, 128));
        engine.add_group(group);
        engine.park_channel(1, 10, 50);

        engine.apply_group_direct(1, 255).unwrap();
        let frame = engine.output_frame(1);
        assert_eq!(frame.get(11), 128);
        let wire = engine.wire_frame(1);
        assert_eq!(wire.get(10), 50);
    }

    #[test]
    fn reverse_routing_rejects_ambiguous_member() {
        let engine = Engine::new(EngineConfig::default());
        let mut g1 = Group::new(1, "a", GroupMode::Follow);
        g1.members.push(channel_member(1, 5, 255));
        let mut g2 = Group::new(2, "b", GroupMode::Follow);
        g2.members.push(channel_member(1, 5, 255));
        engine.add_group(g1);
        engine.add_group(g2);

        engine.set_channel(1, 5, 77, SourceTag::Local);
        let frame = engine.output_frame(1);
        assert_eq!(frame.get(5), 0);
    }

    #[test]
    fn park_rejects_user_write() {
        let engine = Engine::new(EngineConfig::default());
        engine.park_channel(1, 1, 42);
        engine.set_channel(1, 1, 200, SourceTag::Local);
        let wire = engine.wire_frame(1);
        assert_eq!(wire.get(1), 42);
    }

    #[test]
    fn blackout_then_release_restores_prior_frame() {
        let engine = Engine::new(EngineConfig::default());
        engine.set_channel(1, 1, 200, SourceTag::Local);
        engine.blackout();
        assert_eq!(engine.wire_frame(1).get_all(), &[0u8; 512]);
        engine.release_blackout();
        assert_eq!(engine.output_frame(1).get(1), 200);
    }
}
