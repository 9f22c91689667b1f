//! Simulation core of the drop simulator.
//!
//! This crate provides:
//! - The simulation controller and its state machine
//! - The kinematic bounce integrator
//! - The rigid-body world seam (implemented in `drop_physics`)
//! - Exclusive model attachment with ticketed async loads
//! - Derived display metrics and notices
//! - JSON configuration
//!
//! Nothing here spawns entities or renders. The controller talks to the render
//! side through [`SceneGraph`] and to asset loading through [`ModelLoader`].

pub mod attachment;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod kinematic;
pub mod loader;
pub mod metrics;
pub mod scene;
pub mod state;
pub mod timer;
pub mod world;

pub use attachment::{
    ArbiterState, AttachmentArbiter, AttachmentConfig, CompletionOutcome, ModelSlot,
    RequestOutcome, RetentionPolicy, SlotProfile,
};
pub use config::{BodySize, RigidBodyConfig, SimConfig, CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH};
pub use controller::{ControllerPhase, FrameSummary, SimulationController};
pub use error::{ConfigError, SimError, SimResult};
pub use event::SimEvent;
pub use kinematic::{advance, BounceRule, KinematicParams, KinematicState, KinematicStep};
pub use loader::{
    load_channel, LoadCompletion, LoadError, LoadInbox, LoadQueue, LoadRequest, LoadSender,
    LoadTicket, LoadedModel, ModelLoader,
};
pub use metrics::{
    compute_final_velocity, DisplayMetrics, MetricsMode, Notice, NoticeBoard, NoticeLevel,
};
pub use scene::{MirrorNode, SceneCommand, SceneCommandBuffer, SceneGraph, SceneMirror, TransformId};
pub use state::{GravityPreset, SimulationMode, SimulationState};
pub use timer::{AutoStopTimer, StopToken};
pub use world::{BodySnapshot, BodySync, RigidBodyWorld};
