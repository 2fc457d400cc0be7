//! The broadcast fabric (spec.md §4.8, §6, §9: "deliver events through the
//! queue and drain on the main task" rather than a re-entrant callback list).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::universe::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    Universe(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Local,
    Input,
    Group,
    User(u32),
    SceneRecall,
    RemoteApi,
    Midi,
    GroupReverse,
    ParkReject,
    GroupReject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ChannelChange { universe: u32, channel: u16, value: u8, source: SourceTag },
    Values { universe: u32, values: Frame },
    /// `-1` sentinel per spec.md §6 is modeled as `Option<u8>` over the wire slot.
    InputToUi { universe: u32, values: Vec<Option<u8>> },
    Blackout { active: bool },
    GroupValueChanged { group_id: u32, value: u8, source: SourceTag },
    GroupsChanged,
    GridsChanged,
    ScenesChanged,
    PatchesChanged,
    GrandmasterChanged { scope: Scope, value: u8 },
    ActiveSceneChanged { scene_id: Option<u32> },
    ParkUpdate { universe: u32, channel: u16, value: Option<u8>, parked: bool },
    HighlightUpdate { universe: u32, active: bool, dim_level: u8 },
    MidiActivity { device: String, detail: String },
    MonitorStatus { transport: String, detail: String },
    ParkReject { universe: u32, channel: u16, value: u8 },
    GroupReject { universe: u32, channel: u16, value: u8 },
}

impl Event {
    /// Rejection events are never throttled (§4.8: "the UI depends on them for
    /// correctness").
    fn is_rejection(&self) -> bool {
        matches!(self, Event::ParkReject { .. } | Event::GroupReject { .. })
    }
}

pub trait Sink: Send {
    fn send(&mut self, event: Event);
}

impl<F: FnMut(Event) + Send> Sink for F {
    fn send(&mut self, event: Event) {
        self(event)
    }
}

/// Fan-out point with per-universe/per-group rate limiting. Sinks are drained
/// in registration order on the main task; nothing here suspends.
pub struct Fabric {
    sinks: Vec<Box<dyn Sink>>,
    last_input_broadcast: HashMap<u32, Instant>,
    last_group_broadcast: HashMap<u32, (Instant, u8)>,
    input_interval: Duration,
    group_interval: Duration,
}

impl Fabric {
    pub fn new(input_interval: Duration, group_interval: Duration) -> Self {
        Self {
            sinks: Vec::new(),
            last_input_broadcast: HashMap::new(),
            last_group_broadcast: HashMap::new(),
            input_interval,
            group_interval,
        }
    }

    pub fn subscribe(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    fn deliver(&mut self, event: Event) {
        for sink in &mut self.sinks {
            sink.send(event.clone());
        }
    }

    /// Unconditional emit, bypassing rate limiting entirely (channel changes,
    /// structural events, rejections).
    pub fn emit(&mut self, event: Event) {
        self.deliver(event);
    }

    /// Input-frame broadcast, throttled to one per universe per
    /// `input_interval` (§4.8).
    pub fn emit_input_frame(&mut self, universe: u32, event: Event, now: Instant) {
        if let Some(last) = self.last_input_broadcast.get(&universe) {
            if now.duration_since(*last) < self.input_interval {
                return;
            }
        }
        self.last_input_broadcast.insert(universe, now);
        self.deliver(event);
    }

    /// Group-value broadcast, throttled per group and suppressed on an
    /// unchanged value within the window (§4.6, §4.8).
    pub fn emit_group_value(&mut self, group_id: u32, value: u8, event: Event, now: Instant) {
        if let Some((last, last_value)) = self.last_group_broadcast.get(&group_id) {
            if *last_value == value && now.duration_since(*last) < self.group_interval {
                return;
            }
        }
        self.last_group_broadcast.insert(group_id, (now, value));
        self.deliver(event);
    }

    pub fn clear_group_throttle(&mut self, group_id: u32) {
        self.last_group_broadcast.remove(&group_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn capturing_sink() -> (Box<dyn Sink>, Arc<Mutex<Vec<Event>>>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let captured_clone = captured.clone();
        let sink: Box<dyn Sink> = Box::new(move |e: Event| captured_clone.lock().unwrap().push(e));
        (sink, captured)
    }

    #[test]
    fn rejection_events_are_never_throttled() {
        let mut fabric = Fabric::new(Duration::from_millis(100), Duration::from_millis(100));
        let (sink, captured) = capturing_sink();
        fabric.subscribe(sink);

        fabric.emit(Event::ParkReject { universe: 1, channel: 1, value: 5 });
        fabric.emit(Event::ParkReject { universe: 1, channel: 1, value: 5 });
        assert_eq!(captured.lock().unwrap().len(), 2);
    }

    #[test]
    fn group_broadcast_suppressed_on_unchanged_value_within_window() {
        let mut fabric = Fabric::new(Duration::from_millis(100), Duration::from_millis(100));
        let (sink, captured) = capturing_sink();
        fabric.subscribe(sink);
        let now = Instant::now();

        fabric.emit_group_value(1, 100, Event::GroupValueChanged { group_id: 1, value: 100, source: SourceTag::Group }, now);
        fabric.emit_group_value(1, 100, Event::GroupValueChanged { group_id: 1, value: 100, source: SourceTag::Group }, now);
        assert_eq!(captured.lock().unwrap().len(), 1);

        fabric.emit_group_value(1, 101, Event::GroupValueChanged { group_id: 1, value: 101, source: SourceTag::Group }, now);
        assert_eq!(captured.lock().unwrap().len(), 2);
    }
}
