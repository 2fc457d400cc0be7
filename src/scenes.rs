//! Scene recall engine (spec.md §4.7).
//!
//! Grounded in `dmx_interface.py`'s `recall_scene` / fade-step loop
//! (`examples/original_source/backend/dmx_interface.py`), restructured around
//! `Engine`'s owned state instead of module-level globals. Per SPEC_FULL.md
//! §E open question 1, group-member restoration on recall is unconditional
//! (re-applies every restored group) rather than the source's color-mixer-only
//! special case — captures already store actual output values, so re-applying
//! is safe and keeps both group modes uniform.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::engine::events::{Event, SourceTag};
use crate::engine::Engine;
use crate::groups::color::Hsl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Instant,
    Fade,
    Crossfade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterScope {
    Global,
    Universe(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneGroupValue {
    pub group_id: u32,
    pub master_value: u8,
    pub hsl: Option<Hsl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: u32,
    pub name: String,
    pub transition: Transition,
    pub duration_ms: u32,
    /// `(universe, channel, value)`.
    pub channel_values: Vec<(u32, u16, u8)>,
    pub group_values: Vec<SceneGroupValue>,
    pub master_values: Vec<(MasterScope, u8)>,
}

/// Monotonically increasing per-recall generation. A new recall bumps this so
/// an in-flight fade task notices it has been superseded and stops at the
/// next step boundary (§4.7, §7 "scene recall contention").
pub type Generation = u64;

#[derive(Default)]
pub struct SceneEngine {
    scenes: HashMap<u32, Scene>,
    generation: Generation,
    active: Option<u32>,
}

impl SceneEngine {
    pub fn load(&mut self, scenes: impl IntoIterator<Item = Scene>) {
        self.scenes.clear();
        for scene in scenes {
            self.scenes.insert(scene.id, scene);
        }
    }

    pub fn get(&self, id: u32) -> Option<&Scene> {
        self.scenes.get(&id)
    }

    pub fn insert(&mut self, scene: Scene) {
        self.scenes.insert(scene.id, scene);
    }

    pub fn remove(&mut self, id: u32) -> Option<Scene> {
        self.scenes.remove(&id)
    }

    pub fn active_scene(&self) -> Option<u32> {
        self.active
    }

    /// Begin a recall, returning the generation this recall owns and the step
    /// plan to execute. Bumping the generation here is what cancels any
    /// in-flight fade (§7: "a second recall starting during a fade cancels
    /// the in-progress fade at the current step boundary").
    pub fn begin_recall(
        &mut self,
        scene_id: u32,
        override_transition: Option<(Transition, u32)>,
    ) -> Option<(Generation, Scene)> {
        let scene = self.scenes.get(&scene_id)?.clone();
        self.generation += 1;
        self.active = Some(scene_id);
        let scene = if let Some((transition, duration_ms)) = override_transition {
            Scene { transition, duration_ms, ..scene }
        } else {
            scene
        };
        Some((self.generation, scene))
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    pub fn current_generation(&self) -> Generation {
        self.generation
    }
}

/// Step count for a fade/crossfade: ~30 fps, at least one step (§4.7 step 4).
pub fn step_count(duration_ms: u32) -> u32 {
    (duration_ms / 33).max(1)
}

/// Recall `scene_id` against `engine`, blocking the calling task for the
/// duration of any fade. The caller is expected to run this inside the same
/// cooperative task that owns `engine`'s merge pipeline — `tokio::time::sleep`
/// is the only suspension point, matching spec.md §5.
pub async fn recall_scene(
    engine: &Engine,
    scene_engine: &std::sync::Arc<tokio::sync::Mutex<SceneEngine>>,
    scene_id: u32,
    override_transition: Option<(Transition, u32)>,
) -> bool {
    let Some((generation, scene)) = scene_engine.lock().await.begin_recall(scene_id, override_transition) else {
        return false;
    };

    let mut by_universe: HashMap<u32, Vec<(u16, u8)>> = HashMap::new();
    for &(universe, channel, value) in &scene.channel_values {
        by_universe.entry(universe).or_default().push((channel, value));
    }

    // Step 2: input filtering, unless bypass is globally on. `Engine` doesn't
    // expose a bypass getter directly; filtering degrades gracefully to "no
    // filtering" when nothing is input-controlled, which is the bypass-on case.
    for (universe, channels) in by_universe.iter_mut() {
        let controlled = engine.with_inner(|inner| inner.scene_input_controlled(*universe));
        channels.retain(|(channel, _)| !controlled.contains(channel));
    }

    let filtered_group_values: Vec<&SceneGroupValue> = scene
        .group_values
        .iter()
        .filter(|gv| !engine.with_inner(|inner| inner.scene_group_master_input_controlled(gv.group_id)))
        .collect();

    // A group whose physical master is under live input control also keeps
    // control of its member channels: a recall can't silently overwrite them
    // even though `Scene.channel_values` captured their values at save time.
    for group_value in &scene.group_values {
        if !engine.with_inner(|inner| inner.scene_group_master_input_controlled(group_value.group_id)) {
            continue;
        }
        let members = engine.with_inner(|inner| inner.scene_group_member_channels(group_value.group_id));
        for (universe, channel) in members {
            if let Some(channels) = by_universe.get_mut(&universe) {
                channels.retain(|&(c, _)| c != channel);
            }
        }
    }

    // Step 3: preview broadcast so the UI can flash indicators.
    for (&universe, _) in &by_universe {
        engine.broadcast_scene_preview(universe);
    }

    // Step 4: execute the transition.
    match scene.transition {
        Transition::Instant => {
            for (universe, channels) in &by_universe {
                engine.set_channels(*universe, channels, SourceTag::SceneRecall);
            }
        }
        Transition::Fade | Transition::Crossfade => {
            let steps = step_count(scene.duration_ms);
            let start: HashMap<(u32, u16), u8> = by_universe
                .iter()
                .flat_map(|(&universe, channels)| {
                    channels.iter().map(move |&(channel, _)| {
                        let current = if scene.transition == Transition::Crossfade {
                            0
                        } else {
                            engine.output_frame(universe).get(channel)
                        };
                        ((universe, channel), current)
                    })
                })
                .collect();

            let frame_duration = Duration::from_millis(33);
            let deadline_start = Instant::now();

            for step in 1..=steps {
                if !scene_engine.lock().await.is_current(generation) {
                    return false;
                }

                let progress = step as f64 / steps as f64;
                for (&universe, channels) in &by_universe {
                    let mut writes = Vec::with_capacity(channels.len());
                    for &(channel, target) in channels {
                        let from = *start.get(&(universe, channel)).unwrap_or(&0);
                        let value = (from as f64 + (target as f64 - from as f64) * progress).round().clamp(0.0, 255.0) as u8;
                        writes.push((channel, value));
                    }
                    engine.set_channels_silent(universe, &writes, SourceTag::SceneRecall);
                }

                if step < steps {
                    let deadline = deadline_start + frame_duration * step;
                    let now = Instant::now();
                    if deadline > now {
                        tokio::time::sleep(deadline - now).await;
                    }
                }
            }

            for (&universe, _) in &by_universe {
                engine.broadcast_universe_values(universe);
            }
        }
    }

    // Step 5: restore group masters (unconditional re-apply, see module docs).
    for group_value in filtered_group_values {
        if let Some(hsl) = group_value.hsl {
            let _ = engine.set_group_color(group_value.group_id, hsl);
        }
        let _ = engine.apply_group_direct(group_value.group_id, group_value.master_value);
        engine.retag_group_master(group_value.group_id, SourceTag::SceneRecall);
    }

    // Step 6: restore grandmasters.
    for &(scope, value) in &scene.master_values {
        match scope {
            MasterScope::Global => engine.set_global_grandmaster(value),
            MasterScope::Universe(u) => engine.set_universe_grandmaster(u, value),
        }
    }

    // Step 7: mark active and fan out.
    {
        let mut guard = scene_engine.lock().await;
        if guard.is_current(generation) {
            guard.active = Some(scene_id);
        }
    }
    engine.emit_active_scene(Some(scene_id));

    true
}

impl Engine {
    fn broadcast_scene_preview(&self, universe: u32) {
        let frame = self.output_frame(universe);
        self.with_inner(|inner| inner.emit_event(Event::Values { universe, values: frame }));
    }

    fn broadcast_universe_values(&self, universe: u32) {
        let frame = self.output_frame(universe);
        self.with_inner(|inner| inner.emit_event(Event::Values { universe, values: frame }));
    }

    fn retag_group_master(&self, group_id: u32, tag: SourceTag) {
        self.with_inner(|inner| {
            if let Some((universe, channel)) = inner.groups_physical_master(group_id) {
                inner.tag_channel_pub(universe, channel, tag);
            }
        });
    }

    fn emit_active_scene(&self, scene_id: Option<u32>) {
        self.with_inner(|inner| inner.emit_event(Event::ActiveSceneChanged { scene_id }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_count_is_at_least_one() {
        assert_eq!(step_count(0), 1);
        assert_eq!(step_count(990), 30);
    }

    #[test]
    fn fade_values_are_monotonic_on_each_channel() {
        let steps = 10;
        let (a, b) = (10u8, 200u8);
        let mut last = a as f64;
        for step in 1..=steps {
            let progress = step as f64 / steps as f64;
            let value = a as f64 + (b as f64 - a as f64) * progress;
            assert!(value >= last - 0.0001);
            last = value;
        }
    }
}
