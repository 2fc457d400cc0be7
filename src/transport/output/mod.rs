pub mod artnet;
pub mod mock;
pub mod registry;
pub mod sacn;

pub use artnet::ArtnetOutput;
pub use mock::MockOutput;
pub use sacn::SacnOutput;
