//! Rapier world and bevy integration for the drop simulator.

pub mod plugin;
pub mod world;

pub use plugin::{Carrier, DropSimPlugin, ModelLoads, SimSettings, TransformRegistry};
pub use world::RapierDropWorld;
