//! MIDI input/output (spec.md §4.3/§6, supplemented from
//! `midi_handler.py`/`dmx_interface.py`'s MIDI feedback functions): CC/note
//! ingestion, learn mode, and motorized-fader/LED feedback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use log::warn;
use midir::{MidiInput as MidirInput, MidiInputConnection, MidiOutput as MidirOutput, MidiOutputConnection};

/// `round(v * 255 / 127)`.
pub fn midi_to_dmx(value: u8) -> u8 {
    ((value as u32 * 255 + 63) / 127).min(255) as u8
}

/// DMX -> MIDI is the fast inverse used for feedback: `v >> 1`.
pub fn dmx_to_midi(value: u8) -> u8 {
    value >> 1
}

#[derive(Debug, Clone, PartialEq)]
pub enum MidiMessage {
    ControlChange { device: String, channel: u8, control: u8, value: u8 },
    NoteOn { device: String, channel: u8, note: u8, velocity: u8 },
    NoteOff { device: String, channel: u8, note: u8, velocity: u8 },
}

/// A CC -> input-channel mapping. `midi_channel = -1` means "any channel".
#[derive(Debug, Clone)]
pub struct CcMapping {
    pub cc_number: u8,
    pub midi_channel: i8,
    pub input_channel: u16,
    pub device_name: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteAction {
    Scene { scene_id: u32 },
    Blackout,
    Group { group_id: u32 },
}

#[derive(Debug, Clone)]
pub struct NoteTrigger {
    pub note: u8,
    pub midi_channel: i8,
    pub action: NoteAction,
    pub device_name: Option<String>,
    pub enabled: bool,
}

fn channel_matches(mapping_channel: i8, incoming: u8) -> bool {
    mapping_channel == -1 || mapping_channel as u16 == incoming as u16
}

fn device_matches(mapping_device: &Option<String>, incoming: &str) -> bool {
    mapping_device.as_deref().map_or(true, |d| d == incoming)
}

/// Find the input channels a CC message should drive, per `_handle_midi_cc_input`.
pub fn resolve_cc_targets<'a>(
    mappings: &'a [CcMapping],
    channel: u8,
    control: u8,
    device: &str,
) -> impl Iterator<Item = u16> + 'a {
    let device = device.to_string();
    mappings.iter().filter_map(move |m| {
        if !m.enabled || m.cc_number != control {
            return None;
        }
        if !channel_matches(m.midi_channel, channel) {
            return None;
        }
        if !device_matches(&m.device_name, &device) {
            return None;
        }
        Some(m.input_channel)
    })
}

pub fn resolve_note_triggers<'a>(
    triggers: &'a [NoteTrigger],
    channel: u8,
    note: u8,
    device: &str,
) -> impl Iterator<Item = &'a NoteTrigger> {
    let device = device.to_string();
    triggers.iter().filter(move |t| {
        t.enabled
            && t.note == note
            && channel_matches(t.midi_channel, channel)
            && device_matches(&t.device_name, &device)
    })
}

#[derive(Default)]
struct LearnState {
    active: bool,
    last: Option<MidiMessage>,
}

/// One open input device; multiple may run concurrently (spec §4.3 multi-device
/// support). Holds the connection alive for its lifetime.
pub struct MidiInputDevice {
    _connection: MidiInputConnection<()>,
    device_name: String,
}

pub struct MidiInput {
    learn: Mutex<LearnState>,
    messages_received: AtomicU64,
}

impl Default for MidiInput {
    fn default() -> Self {
        Self { learn: Mutex::new(LearnState::default()), messages_received: AtomicU64::new(0) }
    }
}

impl MidiInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_devices() -> Vec<String> {
        match MidirInput::new("lumina-dmx-list") {
            Ok(input) => input.ports().iter().filter_map(|p| input.port_name(p).ok()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Opens `device_name` and forwards every decoded message to `on_message`.
    /// The connection is dropped (and the device closed) when the returned
    /// handle is dropped.
    pub fn connect(
        self: &std::sync::Arc<Self>,
        device_name: &str,
        on_message: impl Fn(MidiMessage) + Send + 'static,
    ) -> Result<MidiInputDevice, crate::error::TransportError> {
        let midi_in = MidirInput::new("lumina-dmx-in")
            .map_err(|e| crate::error::TransportError::Midi(e.to_string()))?;
        let ports = midi_in.ports();
        let port = ports
            .iter()
            .find(|p| midi_in.port_name(p).map(|n| n == device_name).unwrap_or(false))
            .ok_or_else(|| crate::error::TransportError::Midi(format!("device not found: {device_name}")))?;

        let device = device_name.to_string();
        let this = self.clone();
        let connection = midi_in
            .connect(
                port,
                "lumina-dmx-in-port",
                move |_stamp, raw, _| {
                    if let Some(msg) = decode_message(&device, raw) {
                        this.messages_received.fetch_add(1, Ordering::Relaxed);
                        if this.learn.lock().unwrap().active {
                            this.learn.lock().unwrap().last = Some(msg.clone());
                        }
                        on_message(msg);
                    }
                },
                (),
            )
            .map_err(|e| crate::error::TransportError::Midi(e.to_string()))?;

        Ok(MidiInputDevice { _connection: connection, device_name: device_name.to_string() })
    }

    pub fn start_learn(&self) {
        let mut state = self.learn.lock().unwrap();
        state.active = true;
        state.last = None;
    }

    pub fn stop_learn(&self) {
        self.learn.lock().unwrap().active = false;
    }

    pub fn last_message(&self) -> Option<MidiMessage> {
        self.learn.lock().unwrap().last.clone()
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }
}

impl MidiInputDevice {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

fn decode_message(device: &str, raw: &[u8]) -> Option<MidiMessage> {
    if raw.is_empty() {
        return None;
    }
    let status = raw[0] & 0xF0;
    let channel = raw[0] & 0x0F;
    match status {
        0xB0 if raw.len() >= 3 => Some(MidiMessage::ControlChange {
            device: device.to_string(),
            channel,
            control: raw[1],
            value: raw[2],
        }),
        0x90 if raw.len() >= 3 => {
            if raw[2] == 0 {
                Some(MidiMessage::NoteOff { device: device.to_string(), channel, note: raw[1], velocity: 0 })
            } else {
                Some(MidiMessage::NoteOn { device: device.to_string(), channel, note: raw[1], velocity: raw[2] })
            }
        }
        0x80 if raw.len() >= 3 => {
            Some(MidiMessage::NoteOff { device: device.to_string(), channel, note: raw[1], velocity: raw[2] })
        }
        _ => None,
    }
}

pub struct MidiOutput {
    connection: Mutex<Option<MidiOutputConnection>>,
    messages_sent: AtomicU64,
}

impl Default for MidiOutput {
    fn default() -> Self {
        Self { connection: Mutex::new(None), messages_sent: AtomicU64::new(0) }
    }
}

impl MidiOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, device_name: &str) -> Result<(), crate::error::TransportError> {
        let midi_out = MidirOutput::new("lumina-dmx-out")
            .map_err(|e| crate::error::TransportError::Midi(e.to_string()))?;
        let ports = midi_out.ports();
        let port = ports
            .iter()
            .find(|p| midi_out.port_name(p).map(|n| n == device_name).unwrap_or(false))
            .ok_or_else(|| crate::error::TransportError::Midi(format!("device not found: {device_name}")))?;
        let connection = midi_out
            .connect(port, "lumina-dmx-out-port")
            .map_err(|e| crate::error::TransportError::Midi(e.to_string()))?;
        *self.connection.lock().unwrap() = Some(connection);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.lock().unwrap().is_some()
    }

    fn send(&self, bytes: &[u8]) {
        let mut guard = self.connection.lock().unwrap();
        if let Some(conn) = guard.as_mut() {
            if let Err(err) = conn.send(bytes) {
                warn!("midi send failed: {}", err);
            } else {
                self.messages_sent.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn send_cc(&self, channel: u8, control: u8, value: u8) {
        self.send(&[0xB0 | (channel & 0x0F), control & 0x7F, value.min(127)]);
    }

    pub fn send_note_on(&self, channel: u8, note: u8, velocity: u8) {
        self.send(&[0x90 | (channel & 0x0F), note & 0x7F, velocity.min(127)]);
    }

    pub fn send_note_off(&self, channel: u8, note: u8) {
        self.send(&[0x80 | (channel & 0x0F), note & 0x7F, 0]);
    }
}

/// `send_midi_channel_value`: reverse-lookup any CC mapping targeting this
/// input channel and mirror the value back as a CC message.
pub fn send_channel_value_feedback(output: &MidiOutput, mappings: &[CcMapping], channel: u16, value: u8) {
    for mapping in mappings {
        if !mapping.enabled || mapping.input_channel != channel {
            continue;
        }
        let midi_channel = if mapping.midi_channel == -1 { 0 } else { mapping.midi_channel as u8 };
        output.send_cc(midi_channel, mapping.cc_number, dmx_to_midi(value));
    }
}

/// `send_midi_scene_active`: note on for the newly active scene, note off for
/// the previous one.
pub fn send_scene_active_feedback(output: &MidiOutput, triggers: &[NoteTrigger], scene_id: u32, active: bool) {
    for trigger in triggers {
        if !trigger.enabled || trigger.action != (NoteAction::Scene { scene_id }) {
            continue;
        }
        let midi_channel = if trigger.midi_channel == -1 { 0 } else { trigger.midi_channel as u8 };
        if active {
            output.send_note_on(midi_channel, trigger.note, 127);
        } else {
            output.send_note_off(midi_channel, trigger.note);
        }
    }
}

/// `_send_midi_blackout_feedback`.
pub fn send_blackout_feedback(output: &MidiOutput, triggers: &[NoteTrigger], active: bool) {
    for trigger in triggers {
        if !trigger.enabled || trigger.action != NoteAction::Blackout {
            continue;
        }
        let midi_channel = if trigger.midi_channel == -1 { 0 } else { trigger.midi_channel as u8 };
        if active {
            output.send_note_on(midi_channel, trigger.note, 127);
        } else {
            output.send_note_off(midi_channel, trigger.note);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midi_to_dmx_scales_full_range() {
        assert_eq!(midi_to_dmx(0), 0);
        assert_eq!(midi_to_dmx(127), 255);
        assert_eq!(midi_to_dmx(64), 128);
    }

    #[test]
    fn dmx_to_midi_is_fast_halve() {
        assert_eq!(dmx_to_midi(255), 127);
        assert_eq!(dmx_to_midi(0), 0);
        assert_eq!(dmx_to_midi(128), 64);
    }

    #[test]
    fn cc_mapping_respects_any_channel_wildcard() {
        let mappings = vec![CcMapping {
            cc_number: 7,
            midi_channel: -1,
            input_channel: 10,
            device_name: None,
            enabled: true,
        }];
        let targets: Vec<u16> = resolve_cc_targets(&mappings, 3, 7, "controller").collect();
        assert_eq!(targets, vec![10]);
    }

    #[test]
    fn cc_mapping_device_filter_excludes_other_devices() {
        let mappings = vec![CcMapping {
            cc_number: 7,
            midi_channel: -1,
            input_channel: 10,
            device_name: Some("faderfox".to_string()),
            enabled: true,
        }];
        let targets: Vec<u16> = resolve_cc_targets(&mappings, 0, 7, "other").collect();
        assert!(targets.is_empty());
    }

    #[test]
    fn decodes_note_on_with_zero_velocity_as_note_off() {
        let msg = decode_message("dev", &[0x90, 60, 0]).unwrap();
        assert!(matches!(msg, MidiMessage::NoteOff { note: 60, .. }));
    }
}
