use std::time::Duration;

use bevy::math::Vec3;
use drop_core::{
    compute_final_velocity, ArbiterState, BodySize, GravityPreset, LoadCompletion, LoadQueue,
    LoadedModel, ModelSlot, RigidBodyConfig, SceneCommandBuffer, SceneMirror, SimConfig,
    SimEvent, SimulationController, SimulationMode,
};
use drop_physics::RapierDropWorld;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FRAME: Duration = Duration::from_micros(16_667);

struct Session {
    controller: SimulationController,
    scene: SceneCommandBuffer,
    mirror: SceneMirror,
    loads: LoadQueue,
    now: Duration,
}

impl Session {
    fn kinematic(config: SimConfig) -> Self {
        let mut scene = SceneCommandBuffer::new();
        let controller = SimulationController::new(config, None, &mut scene).unwrap();
        Self::from_parts(controller, scene)
    }

    fn rigid(config: SimConfig) -> Self {
        let config = SimConfig {
            mode: SimulationMode::RigidBody,
            rigid_body: RigidBodyConfig {
                body_size: BodySize::Fixed {
                    half_width: 0.5,
                    half_height: 0.5,
                },
                ..Default::default()
            },
            ..config
        };
        let world = RapierDropWorld::new(
            &config.rigid_body,
            config.initial_preset.acceleration(),
            config.mass,
            Vec3::new(0.0, config.release_height, 0.0),
        )
        .unwrap();
        let mut scene = SceneCommandBuffer::new();
        let controller =
            SimulationController::new(config, Some(Box::new(world)), &mut scene).unwrap();
        Self::from_parts(controller, scene)
    }

    fn from_parts(controller: SimulationController, scene: SceneCommandBuffer) -> Self {
        let mut session = Self {
            controller,
            scene,
            mirror: SceneMirror::default(),
            loads: LoadQueue::default(),
            now: Duration::ZERO,
        };
        session.flush();
        session
    }

    fn frame(&mut self) -> bool {
        self.now += FRAME;
        let summary = self
            .controller
            .frame(self.now, &mut self.scene, &mut self.loads);
        self.flush();
        summary.auto_stopped
    }

    fn send(&mut self, event: SimEvent) {
        self.controller.submit(event).unwrap();
        self.frame();
    }

    fn flush(&mut self) {
        let commands: Vec<_> = self.scene.drain().collect();
        self.mirror.apply_all(&commands);
    }
}

#[test]
fn test_kinematic_drop_from_three_meters() {
    let mut session = Session::kinematic(SimConfig::default());
    session.send(SimEvent::Start);

    let mut frames = 1;
    while !session.frame() {
        frames += 1;
        assert!(frames < 200, "Auto-stop should fire about two seconds in");
    }
    assert!((119..=123).contains(&frames), "stopped after {} frames", frames);

    let metrics = *session.controller.metrics();
    assert!((metrics.final_velocity - 7.672).abs() < 0.01);
    assert_eq!(metrics.gravity, 9.81);
    assert!(metrics.height >= 0.0);

    // Bounced at least once and never sank below the ground
    let carrier = session.mirror.node(session.controller.carrier()).unwrap();
    assert!(carrier.position.y > 0.0);
    assert!(!session.controller.is_running());
}

#[test]
fn test_final_velocity_tracks_release_height() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..16 {
        let height: f32 = rng.gen_range(0.5..10.0);
        let mut session = Session::kinematic(SimConfig::default());
        session.send(SimEvent::SetHeight(height));
        session.send(SimEvent::Start);
        session.frame();

        let expected = compute_final_velocity(9.81, height);
        let actual = session.controller.metrics().final_velocity;
        assert!((actual - expected).abs() < 1e-4, "h = {}: {} vs {}", height, actual, expected);
    }
}

#[test]
fn test_rigid_body_preset_switch_mid_fall() {
    let mut session = Session::rigid(SimConfig {
        release_height: 8.0,
        ..Default::default()
    });
    session.send(SimEvent::Start);
    for _ in 0..9 {
        session.frame();
    }
    let before = session.controller.state().clone();

    session.controller.submit_preset_name("space").unwrap();
    session.frame();
    let after = session.controller.state();

    assert_eq!(after.preset, GravityPreset::Reduced);
    assert!(after.position.y < before.position.y, "Body keeps falling");
    let gain = before.velocity.y - after.velocity.y;
    assert!(
        (gain - 5.76 / 60.0).abs() < 2e-3,
        "Velocity gain under reduced gravity: {}",
        gain
    );
    assert_eq!(session.controller.metrics().gravity, 5.76);
}

#[test]
fn test_rigid_body_reset_then_restart() {
    let mut session = Session::rigid(SimConfig::default());
    session.send(SimEvent::Start);
    for _ in 0..120 {
        session.frame();
    }
    session.send(SimEvent::Reset);

    let state = session.controller.state();
    assert_eq!(state.position, Vec3::new(0.0, 3.0, 0.0));
    assert_eq!(state.velocity, Vec3::ZERO);
    let carrier = session.mirror.node(session.controller.carrier()).unwrap();
    assert_eq!(carrier.position, Vec3::new(0.0, 3.0, 0.0));
    assert_eq!(carrier.rotation_z, 0.0);

    session.send(SimEvent::Start);
    let v = session.controller.state().velocity.y;
    assert!((v + 9.81 / 60.0).abs() < 1e-3, "first step after reset: {}", v);
    // Rigid-body runs have no auto-stop
    assert_eq!(session.controller.auto_stop_deadline(), None);
}

#[test]
fn test_model_switch_race_shows_only_latest() {
    let mut session = Session::kinematic(SimConfig::default());
    session.send(SimEvent::SelectModel(Some(ModelSlot::A)));
    session.send(SimEvent::SelectModel(Some(ModelSlot::B)));
    let requests: Vec<_> = session.loads.drain().collect();
    assert_eq!(requests.len(), 2);

    // B lands first, then A arrives late
    let sender = session.controller.load_sender();
    let deliver = |index: usize, session: &mut Session| {
        let request = &requests[index];
        let id = session.scene.allocate_id();
        sender.complete(LoadCompletion {
            ticket: request.ticket,
            slot: request.slot,
            result: Ok(LoadedModel {
                scene: id,
                identity: request.path.clone(),
            }),
        });
        session.frame();
        id
    };
    let b = deliver(1, &mut session);
    let a = deliver(0, &mut session);

    let carrier = session.controller.carrier();
    assert_eq!(session.mirror.visible_children(carrier), vec![b]);
    assert_eq!(session.mirror.node(a).map(|n| n.visible), Some(false));
    assert_eq!(
        session.controller.arbiter().state(),
        ArbiterState::Attached(ModelSlot::B)
    );
    assert_eq!(session.mirror.node(carrier).map(|n| n.opacity), Some(0.0));

    // Clearing restores the carrier and reselecting A reuses the retained load
    session.send(SimEvent::SelectModel(None));
    assert!(session.mirror.visible_children(carrier).is_empty());
    assert_eq!(session.mirror.node(carrier).map(|n| n.opacity), Some(1.0));

    session.send(SimEvent::SelectModel(Some(ModelSlot::A)));
    assert!(session.loads.is_empty());
    assert_eq!(session.mirror.visible_children(carrier), vec![a]);
}

#[test]
fn test_tall_body_released_low_starts_on_the_ground() {
    let config = SimConfig {
        mode: SimulationMode::RigidBody,
        release_height: 0.5,
        rigid_body: RigidBodyConfig {
            body_size: BodySize::Fixed {
                half_width: 0.5,
                half_height: 1.0,
            },
            ..Default::default()
        },
        ..Default::default()
    };
    let world = RapierDropWorld::new(&config.rigid_body, 9.81, 1.0, Vec3::new(0.0, 0.5, 0.0))
        .unwrap();
    let mut scene = SceneCommandBuffer::new();
    let controller = SimulationController::new(config, Some(Box::new(world)), &mut scene).unwrap();
    let mut session = Session::from_parts(controller, scene);

    let carrier = session.controller.carrier();
    assert_eq!(session.controller.state().position.y, 1.0);
    assert_eq!(session.mirror.node(carrier).unwrap().position.y, 1.0);

    session.send(SimEvent::Start);
    for _ in 0..30 {
        session.frame();
    }
    session.send(SimEvent::Reset);
    assert_eq!(session.controller.state().position, Vec3::new(0.0, 1.0, 0.0));
    assert_eq!(session.mirror.node(carrier).unwrap().position.y, 1.0);
}
