//! Simulation controller.
//!
//! Owns the [`SimulationState`], the active integrator and the attachment
//! arbiter. External callers only ever [`submit`](SimulationController::submit)
//! events; the frame loop calls [`frame`](SimulationController::frame) once per
//! display refresh, which drains load completions and queued events, polls the
//! auto-stop deadline and, while running, advances the integrator and pushes
//! the result to the carrier transform.
//!
//! ## Usage
//!
//! ```ignore
//! let mut scene = SceneCommandBuffer::new();
//! let mut loads = LoadQueue::default();
//! let mut controller = SimulationController::new(SimConfig::default(), None, &mut scene)?;
//!
//! controller.submit(SimEvent::Start)?;
//! controller.frame(time.elapsed(), &mut scene, &mut loads);
//! let metrics = controller.metrics();
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use bevy::log::{debug, info, warn};
use bevy::math::Vec3;
use bevy::prelude::Resource;

use crate::attachment::{AttachmentArbiter, CompletionOutcome};
use crate::config::SimConfig;
use crate::error::{ConfigError, SimResult};
use crate::event::SimEvent;
use crate::kinematic::{self, KinematicState};
use crate::loader::{load_channel, LoadInbox, LoadSender, ModelLoader};
use crate::metrics::{
    compute_final_velocity, DisplayMetrics, MetricsMode, NoticeBoard, NoticeLevel,
};
use crate::scene::{SceneGraph, TransformId};
use crate::state::{GravityPreset, SimulationMode, SimulationState};
use crate::timer::{AutoStopTimer, StopToken};
use crate::world::RigidBodyWorld;

/// Top-level run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Idle,
    Running,
}

/// What happened during one [`SimulationController::frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameSummary {
    pub events_applied: usize,
    pub loads_completed: usize,
    pub stepped: bool,
    pub auto_stopped: bool,
}

enum Integrator {
    Kinematic(KinematicState),
    RigidBody(Box<dyn RigidBodyWorld>),
}

#[derive(Resource)]
pub struct SimulationController {
    config: SimConfig,
    state: SimulationState,
    integrator: Integrator,
    arbiter: AttachmentArbiter,
    carrier: TransformId,
    queue: VecDeque<SimEvent>,
    timer: AutoStopTimer,
    metrics: DisplayMetrics,
    /// Final velocity captured at the start transition
    start_final_velocity: f32,
    notices: NoticeBoard,
    load_sender: LoadSender,
    inbox: LoadInbox,
}

impl SimulationController {
    /// Build a controller and its carrier transform.
    ///
    /// Rigid-body mode needs `world`; kinematic mode ignores it.
    pub fn new(
        config: SimConfig,
        world: Option<Box<dyn RigidBodyWorld>>,
        scene: &mut dyn SceneGraph,
    ) -> SimResult<Self> {
        config.validate()?;
        let mut state = SimulationState::new(&config);

        let carrier = scene.create_transform();
        scene.set_rotation_z(carrier, 0.0);
        scene.set_opacity(carrier, 1.0);

        let integrator = match (config.mode, world) {
            (SimulationMode::Kinematic, world) => {
                if world.is_some() {
                    debug!("Kinematic mode ignores the supplied rigid-body world");
                }
                Integrator::Kinematic(KinematicState::at_rest(state.position.y))
            }
            (SimulationMode::RigidBody, Some(mut world)) => {
                world.link_visual(carrier);
                world.set_gravity(state.gravity());
                world.set_mass(state.mass);
                world.reset(state.origin());
                state.position = world.falling_body().position;
                Integrator::RigidBody(world)
            }
            (SimulationMode::RigidBody, None) => {
                return Err(ConfigError::InvalidValue {
                    field: "mode",
                    reason: "rigid-body mode requires a physics world".into(),
                }
                .into());
            }
        };

        scene.set_position(carrier, state.position);
        let arbiter = AttachmentArbiter::new(carrier, config.attachment.clone());
        let (load_sender, inbox) = load_channel();
        let metrics = DisplayMetrics::placeholder(state.gravity());

        info!(
            "Simulation controller ready: {:?} mode, {} gravity, release height {}",
            state.mode,
            state.preset.label(),
            state.release_height
        );

        Ok(Self {
            config,
            state,
            integrator,
            arbiter,
            carrier,
            queue: VecDeque::new(),
            timer: AutoStopTimer::default(),
            metrics,
            start_final_velocity: 0.0,
            notices: NoticeBoard::default(),
            load_sender,
            inbox,
        })
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn metrics(&self) -> &DisplayMetrics {
        &self.metrics
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn arbiter(&self) -> &AttachmentArbiter {
        &self.arbiter
    }

    /// Render transform of the falling object.
    pub fn carrier(&self) -> TransformId {
        self.carrier
    }

    pub fn phase(&self) -> ControllerPhase {
        if self.state.running {
            ControllerPhase::Running
        } else {
            ControllerPhase::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Half-extents of the carrier's box.
    pub fn carrier_half_extents(&self) -> Vec3 {
        match &self.integrator {
            Integrator::Kinematic(_) => Vec3::splat(self.config.kinematic.rest_y),
            Integrator::RigidBody(world) => world.body_half_extents(),
        }
    }

    /// Deadline of the pending auto-stop, if armed.
    pub fn auto_stop_deadline(&self) -> Option<Duration> {
        self.timer.deadline()
    }

    /// Where model loaders deliver completions.
    pub fn load_sender(&self) -> LoadSender {
        self.load_sender.clone()
    }

    /// Validate and queue an event for the next frame.
    pub fn submit(&mut self, event: SimEvent) -> SimResult<()> {
        if let Err(err) = event.validate() {
            warn!("Rejected {:?}: {}", event, err);
            self.notices
                .push(NoticeLevel::Warning, format!("Rejected input: {}", err));
            return Err(err.into());
        }
        self.queue.push_back(event);
        Ok(())
    }

    /// Queue a preset change by name (`earth`, `space`, ...).
    pub fn submit_preset_name(&mut self, name: &str) -> SimResult<()> {
        match name.parse::<GravityPreset>() {
            Ok(preset) => self.submit(SimEvent::SelectPreset(preset)),
            Err(err) => {
                warn!("{}", err);
                self.notices
                    .push(NoticeLevel::Warning, format!("Rejected input: {}", err));
                Err(err.into())
            }
        }
    }

    /// Run one frame. `now` is wall-clock time since startup.
    pub fn frame(
        &mut self,
        now: Duration,
        scene: &mut dyn SceneGraph,
        loader: &mut dyn ModelLoader,
    ) -> FrameSummary {
        let mut summary = FrameSummary::default();

        for completion in self.inbox.drain() {
            summary.loads_completed += 1;
            match self.arbiter.complete(completion, scene) {
                CompletionOutcome::Attached(slot) => {
                    self.notices
                        .push(NoticeLevel::Info, format!("Model {} attached", slot));
                }
                CompletionOutcome::Failed(err) => {
                    self.notices.push(NoticeLevel::Warning, err.to_string());
                }
                CompletionOutcome::Stale(_) => {}
            }
        }

        while let Some(event) = self.queue.pop_front() {
            summary.events_applied += 1;
            self.apply(event, now, scene, loader);
        }

        if let Some(token) = self.timer.poll(now) {
            summary.auto_stopped = self.fire_auto_stop(token);
        }

        if self.state.running {
            self.step(scene);
            summary.stepped = true;
        }

        summary
    }

    /// Stop the run if `token` belongs to the current deadline. Stale tokens
    /// from a cancelled or superseded run are ignored.
    pub fn fire_auto_stop(&mut self, token: StopToken) -> bool {
        if !self.timer.is_current(token) || !self.state.running {
            debug!("Ignoring stale auto-stop {:?}", token);
            return false;
        }
        self.state.running = false;
        let message = format!("Run stopped at height {:.2} m", self.metrics.height);
        info!("Simulation auto-stopped: {}", message);
        self.notices.push(NoticeLevel::Info, message);
        true
    }

    fn apply(
        &mut self,
        event: SimEvent,
        now: Duration,
        scene: &mut dyn SceneGraph,
        loader: &mut dyn ModelLoader,
    ) {
        match event {
            SimEvent::Start => self.start(now),
            SimEvent::Reset => self.reset(scene),
            SimEvent::SelectPreset(preset) => self.select_preset(preset),
            SimEvent::SetHeight(height) => self.set_height(height, scene),
            SimEvent::SetMass(mass) => self.set_mass(mass),
            SimEvent::SelectModel(slot) => {
                self.arbiter.request(slot, scene, loader);
            }
        }
    }

    fn start(&mut self, now: Duration) {
        if self.state.running {
            debug!("Start ignored, already running");
            return;
        }
        self.state.running = true;
        self.timer.cancel();
        if self.state.mode == SimulationMode::Kinematic {
            if let Some(ms) = self.config.auto_stop_ms {
                self.timer.arm(now, Duration::from_millis(ms));
            }
        }
        self.start_final_velocity =
            compute_final_velocity(self.state.gravity(), self.state.position.y);
        info!(
            "Simulation started from height {:.2} under {} gravity",
            self.state.position.y,
            self.state.preset.label()
        );
    }

    fn reset(&mut self, scene: &mut dyn SceneGraph) {
        self.timer.cancel();
        self.state.reset_to_origin();
        self.rewind_integrator();
        self.push_pose(scene);
        self.start_final_velocity = 0.0;
        self.metrics = DisplayMetrics::placeholder(self.state.gravity());
        info!("Simulation reset to height {:.2}", self.state.release_height);
    }

    /// Put the integrator back at the origin without touching `running`.
    fn rewind_integrator(&mut self) {
        let origin = self.state.origin();
        match &mut self.integrator {
            Integrator::Kinematic(k) => *k = KinematicState::at_rest(origin.y),
            Integrator::RigidBody(world) => {
                world.reset(origin);
                self.state.position = world.falling_body().position;
            }
        }
    }

    fn select_preset(&mut self, preset: GravityPreset) {
        self.state.preset = preset;
        let gravity = preset.acceleration();
        if let Integrator::RigidBody(world) = &mut self.integrator {
            world.set_gravity(gravity);
        }
        self.metrics.gravity = gravity;
        info!("Gravity preset {} ({} m/s^2)", preset.label(), gravity);
    }

    fn set_height(&mut self, height: f32, scene: &mut dyn SceneGraph) {
        self.state.release_height = height;
        if self.state.running {
            debug!("Release height {} applies at next reset", height);
            return;
        }
        self.state.position = self.state.origin();
        self.state.velocity = Vec3::ZERO;
        self.state.angle = 0.0;
        self.rewind_integrator();
        self.push_pose(scene);
        self.metrics.height = self.state.position.y;
    }

    fn set_mass(&mut self, mass: f32) {
        self.state.mass = mass;
        if let Integrator::RigidBody(world) = &mut self.integrator {
            world.set_mass(mass);
        }
        debug!("Mass set to {}", mass);
    }

    fn step(&mut self, scene: &mut dyn SceneGraph) {
        let dt = self.config.fixed_timestep;
        let gravity = self.state.gravity();

        match &mut self.integrator {
            Integrator::Kinematic(k) => {
                let step = kinematic::advance(*k, gravity, &self.config.kinematic, dt);
                *k = step.state;
                self.state.position.y = k.height;
                self.state.velocity = Vec3::new(0.0, k.velocity, 0.0);
                scene.set_position(self.carrier, self.state.position);
            }
            Integrator::RigidBody(world) => {
                world.step(dt);
                for sync in world.sync_transforms() {
                    scene.set_position(sync.transform, sync.position);
                    scene.set_rotation_z(sync.transform, sync.angle);
                }
                let body = world.falling_body();
                self.state.position = body.position;
                self.state.angle = body.angle;
                self.state.velocity = body.linear_velocity;
            }
        }

        self.refresh_metrics(dt);
    }

    fn refresh_metrics(&mut self, dt: f32) {
        let gravity = self.state.gravity();
        let height = self.state.position.y;
        let instantaneous_velocity = match self.state.mode {
            SimulationMode::Kinematic => self.state.velocity.y.abs() / dt,
            SimulationMode::RigidBody => self.state.velocity.length(),
        };
        let final_velocity = match self.config.metrics_mode {
            MetricsMode::Continuous => compute_final_velocity(gravity, self.state.release_height),
            MetricsMode::StartOnly => self.start_final_velocity,
        };

        self.metrics = DisplayMetrics {
            height: if height.is_nan() { 0.0 } else { height.max(0.0) },
            instantaneous_velocity,
            final_velocity,
            gravity,
        };
    }

    fn push_pose(&self, scene: &mut dyn SceneGraph) {
        scene.set_position(self.carrier, self.state.position);
        scene.set_rotation_z(self.carrier, self.state.angle);
    }
}
