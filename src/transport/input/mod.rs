pub mod artnet;
pub mod filter;
pub mod midi;
pub mod sacn;

pub use artnet::ArtnetReceiver;
pub use midi::MidiRouter;
pub use sacn::SacnReceiver;
