//! lumina-dmx: a multi-universe DMX512 lighting control engine.
//!
//! [`engine::Engine`] is the merge pipeline (channel writes, park, groups,
//! grandmasters, blackout); [`scenes`] layers recall/fade on top; [`transport`]
//! carries frames to and from Art-Net, sACN, and MIDI; [`persistence`] loads
//! and saves everything in between. [`App`] is the composition root an
//! embedder actually builds.

pub mod config;
pub mod descriptors;
pub mod engine;
pub mod error;
pub mod groups;
pub mod mapping;
pub mod midi;
pub mod monitor;
pub mod persistence;
pub mod scenes;
pub mod transport;
pub mod universe;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, PersistenceError, TransportError};

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;

use descriptors::{InputDescriptor, InputProtocol, OutputDescriptor, OutputProtocol};
use midi::{MidiInput, MidiInputDevice, MidiMessage, MidiOutput};
use monitor::NetworkMonitor;
use persistence::Store;
use scenes::SceneEngine;
use transport::input::midi::{MidiRouter, NoteTriggerSink};
use transport::output::registry::SocketRegistry;
use transport::output::sacn::SacnDestination;
use transport::output::{ArtnetOutput, MockOutput, SacnOutput};
use transport::input::{ArtnetReceiver, SacnReceiver};
use transport::OutputTransport;

/// Wires scene-triggering note actions (§4.3/§6) back to the scene engine:
/// the transport layer can't drive a fade on its own, since fades need
/// `SceneEngine`'s generation counter.
struct SceneTriggerSink {
    engine: Engine,
    scenes: Arc<AsyncMutex<SceneEngine>>,
}

impl NoteTriggerSink for SceneTriggerSink {
    fn on_scene_trigger(&self, scene_id: u32) {
        let engine = self.engine.clone();
        let scenes = self.scenes.clone();
        tokio::spawn(async move {
            scenes::recall_scene(&engine, &scenes, scene_id, None).await;
        });
    }
}

/// The composition root. One engine, one scene engine, one persistence
/// handle, and the ambient subsystems (sockets, MIDI, the network monitor)
/// an embedder wires input/output descriptors into.
pub struct App {
    pub engine: Engine,
    pub scenes: Arc<AsyncMutex<SceneEngine>>,
    pub store: Arc<Store>,
    pub sockets: Arc<SocketRegistry>,
    pub midi_input: Arc<MidiInput>,
    pub midi_output: Arc<MidiOutput>,
    pub midi_router: Arc<MidiRouter>,
    pub monitor: Arc<NetworkMonitor>,
    outputs: Arc<Mutex<HashMap<u32, Arc<dyn OutputTransport>>>>,
}

impl App {
    /// Connects the database, loads every persisted entity into the engine's
    /// runtime state (spec.md §7), and wires the ambient subsystems. Does not
    /// spawn any transport task on its own — call [`App::spawn_input`] /
    /// [`App::spawn_output`] once descriptors are known.
    pub async fn bootstrap(db_path: &Path, config: EngineConfig) -> Result<Self, PersistenceError> {
        let store = Store::connect(db_path).await?;
        let state = store.load_all().await;

        let engine = Engine::new(config);
        for group in state.groups {
            engine.add_group(group);
        }
        if state.mapping_enabled {
            engine.set_channel_mapping(state.mapping_entries, state.unmapped_behavior);
        }
        for (universe, channel, value) in state.parked {
            engine.park_channel(universe, channel, value);
        }

        let scenes = Arc::new(AsyncMutex::new(SceneEngine::default()));
        scenes.lock().await.load(state.scenes);

        let scene_sink: Arc<dyn NoteTriggerSink> =
            Arc::new(SceneTriggerSink { engine: engine.clone(), scenes: scenes.clone() });
        let midi_router = Arc::new(MidiRouter::new(engine.clone(), Some(scene_sink)));
        midi_router.load_cc_mappings(state.cc_mappings);
        midi_router.load_note_triggers(state.note_triggers);

        Ok(Self {
            monitor: Arc::new(NetworkMonitor::new(engine.clone())),
            engine,
            scenes,
            store: Arc::new(store),
            sockets: Arc::new(SocketRegistry::new()),
            midi_input: Arc::new(MidiInput::new()),
            midi_output: Arc::new(MidiOutput::new()),
            midi_router,
            outputs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Registers an input descriptor with the engine and, for networked
    /// protocols, spawns its receiver task. MIDI inputs only register the
    /// universe with the router — opening the device itself is a separate
    /// step ([`App::connect_midi_device`]) since one device can feed several
    /// universes.
    pub async fn spawn_input(&self, descriptor: InputDescriptor) -> Result<(), TransportError> {
        let universe = descriptor.universe;
        let filter = descriptor.filter.clone();
        self.engine.set_input(descriptor.clone());

        match descriptor.protocol {
            InputProtocol::Artnet(cfg) => {
                let receiver = ArtnetReceiver::bind(Ipv4Addr::UNSPECIFIED).await?;
                let engine = self.engine.clone();
                tokio::spawn(receiver.run(engine, universe, cfg.wire_universe, filter));
            }
            InputProtocol::Sacn(cfg) => {
                let receiver = SacnReceiver::bind(cfg.wire_universe, cfg.multicast).await?;
                let engine = self.engine.clone();
                tokio::spawn(receiver.run(engine, universe, cfg.wire_universe, filter));
            }
            InputProtocol::Midi { device } => {
                self.midi_router.enable_universe(universe, Some(device));
            }
            InputProtocol::None => {}
        }
        Ok(())
    }

    /// Registers an output descriptor and spawns its render-frame pump: every
    /// `1000 / target_fps` ms it reads the universe's current wire frame
    /// (park/grandmaster/highlight/blackout already composed, §4.1) and sends
    /// it. The sender is also kept in `outputs` for [`App::spawn_monitor`].
    pub async fn spawn_output(&self, descriptor: OutputDescriptor) -> Result<(), TransportError> {
        let id = descriptor.id;
        let universe = descriptor.universe;
        let fps = descriptor.target_fps.max(1);
        self.engine.set_output(descriptor.clone());

        let engine_cfg = self.engine.config();
        let sender: Arc<dyn OutputTransport> = match descriptor.protocol {
            OutputProtocol::Artnet(cfg) => Arc::new(
                ArtnetOutput::bind(
                    &self.sockets,
                    cfg.target_ip,
                    cfg.broadcast,
                    cfg.wire_universe,
                    engine_cfg.artnet_net,
                    engine_cfg.artnet_subnet,
                )
                .await?,
            ),
            OutputProtocol::Sacn(cfg) => {
                let destination = if cfg.multicast {
                    SacnDestination::Multicast { universe: cfg.wire_universe }
                } else {
                    SacnDestination::Unicast { addr: cfg.target_ip.unwrap_or(Ipv4Addr::UNSPECIFIED) }
                };
                Arc::new(
                    SacnOutput::bind(
                        &self.sockets,
                        destination,
                        cfg.wire_universe,
                        *uuid::Uuid::new_v4().as_bytes(),
                        engine_cfg.sacn_source_name.clone(),
                        engine_cfg.sacn_priority,
                    )
                    .await?,
                )
            }
            OutputProtocol::Mock => Arc::new(MockOutput::new(None)),
        };

        self.outputs.lock().unwrap().insert(id, sender.clone());

        let engine = self.engine.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(1000 / fps as u64));
            loop {
                ticker.tick().await;
                let frame = engine.wire_frame(universe);
                sender.send(frame.get_all()).await;
            }
        });

        Ok(())
    }

    /// Opens a MIDI input device and routes every decoded message into
    /// `midi_router`. The returned handle must be kept alive for as long as
    /// the device should stay connected.
    pub fn connect_midi_device(&self, device_name: &str) -> Result<MidiInputDevice, TransportError> {
        let router = self.midi_router.clone();
        self.midi_input
            .connect(device_name, move |message: MidiMessage| router.handle_message(message))
    }

    /// Spawns the 1-second network-status poll (spec.md §C), gathering
    /// `status()` from every registered output transport.
    pub fn spawn_monitor(&self) {
        let outputs = self.outputs.clone();
        let monitor = self.monitor.clone();
        tokio::spawn(async move {
            monitor
                .run(move || {
                    outputs
                        .lock()
                        .unwrap()
                        .iter()
                        .map(|(id, transport)| (format!("output:{id}"), transport.status()))
                        .collect()
                })
                .await;
        });
    }
}
