//! Routes MIDI CC/note messages into the engine (spec.md §4.3, §6): CC
//! mappings synthesize a per-universe input frame; note triggers fire
//! blackout/group/scene actions directly, bypassing the channel map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::engine::Engine;
use crate::midi::{self, CcMapping, MidiMessage, NoteAction, NoteTrigger};
use crate::universe::Frame;

/// Invoked for note triggers whose action can't be resolved inside the
/// transport layer alone (scene recall needs `SceneEngine`).
pub trait NoteTriggerSink: Send + Sync {
    fn on_scene_trigger(&self, scene_id: u32);
}

struct RouterState {
    cc_mappings: Vec<CcMapping>,
    note_triggers: Vec<NoteTrigger>,
    /// universe id -> required source device (None = accept any device).
    universes: HashMap<u32, Option<String>>,
    buffers: HashMap<u32, Frame>,
}

pub struct MidiRouter {
    engine: Engine,
    state: Mutex<RouterState>,
    scene_sink: Option<Arc<dyn NoteTriggerSink>>,
}

impl MidiRouter {
    pub fn new(engine: Engine, scene_sink: Option<Arc<dyn NoteTriggerSink>>) -> Self {
        Self {
            engine,
            state: Mutex::new(RouterState {
                cc_mappings: Vec::new(),
                note_triggers: Vec::new(),
                universes: HashMap::new(),
                buffers: HashMap::new(),
            }),
            scene_sink,
        }
    }

    pub fn load_cc_mappings(&self, mappings: Vec<CcMapping>) {
        self.state.lock().unwrap().cc_mappings = mappings.into_iter().filter(|m| m.enabled).collect();
    }

    pub fn load_note_triggers(&self, triggers: Vec<NoteTrigger>) {
        self.state.lock().unwrap().note_triggers = triggers.into_iter().filter(|t| t.enabled).collect();
    }

    /// Registers `universe` as receiving MIDI input, optionally scoped to one
    /// source device (`None` accepts every connected device).
    pub fn enable_universe(&self, universe: u32, device: Option<String>) {
        let mut state = self.state.lock().unwrap();
        state.universes.insert(universe, device);
        state.buffers.entry(universe).or_insert_with(|| Frame([0u8; 512]));
    }

    pub fn disable_universe(&self, universe: u32) {
        let mut state = self.state.lock().unwrap();
        state.universes.remove(&universe);
        state.buffers.remove(&universe);
    }

    pub fn handle_message(&self, message: MidiMessage) {
        match message {
            MidiMessage::ControlChange { device, channel, control, value } => {
                self.handle_cc(&device, channel, control, value);
            }
            MidiMessage::NoteOn { device, channel, note, velocity } => {
                self.handle_note(&device, channel, note, velocity > 0);
            }
            MidiMessage::NoteOff { device, channel, note, .. } => {
                self.handle_note(&device, channel, note, false);
            }
        }
    }

    fn handle_cc(&self, device: &str, channel: u8, control: u8, value: u8) {
        let dmx_value = midi::midi_to_dmx(value);
        let mut state = self.state.lock().unwrap();
        let targets: Vec<u16> = midi::resolve_cc_targets(&state.cc_mappings, channel, control, device).collect();
        if targets.is_empty() {
            return;
        }

        let universes: Vec<u32> = state
            .universes
            .iter()
            .filter(|(_, dev)| dev.as_deref().map_or(true, |d| d == device))
            .map(|(u, _)| *u)
            .collect();

        for universe in universes {
            if let Some(buffer) = state.buffers.get_mut(&universe) {
                for &input_channel in &targets {
                    if (1..=512).contains(&input_channel) {
                        buffer.0[(input_channel - 1) as usize] = dmx_value;
                    }
                }
                let frame = *buffer;
                self.engine.handle_input_frame(universe, frame);
            }
        }
    }

    fn handle_note(&self, device: &str, channel: u8, note: u8, on: bool) {
        let state = self.state.lock().unwrap();
        let actions: Vec<NoteAction> =
            midi::resolve_note_triggers(&state.note_triggers, channel, note, device).map(|t| t.action).collect();
        drop(state);

        for action in actions {
            match action {
                NoteAction::Blackout => {
                    if on {
                        self.engine.blackout();
                    } else {
                        self.engine.release_blackout();
                    }
                }
                NoteAction::Group { group_id } => {
                    if on {
                        let _ = self.engine.apply_group_direct(group_id, 255);
                    }
                }
                NoteAction::Scene { scene_id } => {
                    if on {
                        if let Some(sink) = &self.scene_sink {
                            sink.on_scene_trigger(scene_id);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn router() -> MidiRouter {
        MidiRouter::new(Engine::new(EngineConfig::default()), None)
    }

    #[test]
    fn cc_message_writes_mapped_channel_into_universe() {
        let router = router();
        router.load_cc_mappings(vec![CcMapping {
            cc_number: 1,
            midi_channel: -1,
            input_channel: 5,
            device_name: None,
            enabled: true,
        }]);
        router.enable_universe(1, None);
        router.handle_message(MidiMessage::ControlChange {
            device: "nanoKONTROL".to_string(),
            channel: 0,
            control: 1,
            value: 127,
        });
        let frame = router.engine.output_frame(1);
        assert_eq!(frame.0[4], 255);
    }
}
