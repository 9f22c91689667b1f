use bevy::log::{debug, info};
use bevy::math::Vec3;
use drop_core::{
    BodySize, BodySnapshot, BodySync, RigidBodyConfig, RigidBodyWorld, SimResult, TransformId,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rapier3d::prelude as rapier;
use rapier::nalgebra::{UnitQuaternion, Vector3};

/// Rapier world holding a static ground plane at y = 0 and one dynamic box
/// constrained to the x/y plane.
pub struct RapierDropWorld {
    pub gravity: Vector3<f32>,
    pub integration_parameters: rapier::IntegrationParameters,
    pub physics_pipeline: rapier::PhysicsPipeline,
    pub island_manager: rapier::IslandManager,
    pub broad_phase: rapier::DefaultBroadPhase,
    pub narrow_phase: rapier::NarrowPhase,
    pub rigid_body_set: rapier::RigidBodySet,
    pub collider_set: rapier::ColliderSet,
    pub impulse_joint_set: rapier::ImpulseJointSet,
    pub multibody_joint_set: rapier::MultibodyJointSet,
    pub ccd_solver: rapier::CCDSolver,
    body: rapier::RigidBodyHandle,
    collider: rapier::ColliderHandle,
    half_extents: Vec3,
    initial_angvel: f32,
    visual: Option<TransformId>,
}

impl RapierDropWorld {
    /// Build the world with the falling body at `origin`. The origin is
    /// lifted so the body never starts inside the ground.
    pub fn new(
        config: &RigidBodyConfig,
        gravity: f32,
        mass: f32,
        origin: Vec3,
    ) -> SimResult<Self> {
        config.validate()?;
        drop_core::config::validate_mass(mass)?;

        let half_extents = pick_half_extents(config);
        let origin = above_ground(origin, half_extents);
        let mut rigid_body_set = rapier::RigidBodySet::new();
        let mut collider_set = rapier::ColliderSet::new();

        // Ground (fixed half-space, surface at y = 0)
        let ground_handle = rigid_body_set.insert(rapier::RigidBodyBuilder::fixed());
        collider_set.insert_with_parent(
            rapier::ColliderBuilder::halfspace(Vector3::y_axis()).friction(config.friction),
            ground_handle,
            &mut rigid_body_set,
        );

        let body = rapier::RigidBodyBuilder::dynamic()
            .translation(Vector3::new(origin.x, origin.y, origin.z))
            .angvel(Vector3::new(0.0, 0.0, config.angular_velocity))
            .enabled_translations(true, true, false)
            .enabled_rotations(false, false, true)
            .linear_damping(config.linear_damping)
            .angular_damping(config.angular_damping)
            .can_sleep(config.allow_sleep)
            .build();
        let body = rigid_body_set.insert(body);
        if let Some(b) = rigid_body_set.get_mut(body) {
            let activation = b.activation_mut();
            activation.normalized_linear_threshold = config.sleep_speed_limit;
            activation.angular_threshold = config.sleep_angular_limit;
            activation.time_until_sleep = config.sleep_time_limit;
        }

        let collider = rapier::ColliderBuilder::cuboid(
            half_extents.x,
            half_extents.y,
            half_extents.z,
        )
        .mass(mass)
        .restitution(config.restitution)
        .friction(config.friction);
        let collider = collider_set.insert_with_parent(collider, body, &mut rigid_body_set);

        info!(
            "Rapier world ready: body half-extents {:?}, mass {}",
            half_extents, mass
        );

        Ok(Self {
            gravity: Vector3::new(0.0, -gravity, 0.0),
            integration_parameters: rapier::IntegrationParameters::default(),
            physics_pipeline: rapier::PhysicsPipeline::new(),
            island_manager: rapier::IslandManager::new(),
            broad_phase: rapier::DefaultBroadPhase::new(),
            narrow_phase: rapier::NarrowPhase::new(),
            rigid_body_set,
            collider_set,
            impulse_joint_set: rapier::ImpulseJointSet::new(),
            multibody_joint_set: rapier::MultibodyJointSet::new(),
            ccd_solver: rapier::CCDSolver::new(),
            body,
            collider,
            half_extents,
            initial_angvel: config.angular_velocity,
            visual: None,
        })
    }

    pub fn collider_mass(&self) -> Option<f32> {
        self.collider_set.get(self.collider).map(|c| c.mass())
    }
}

fn above_ground(origin: Vec3, half_extents: Vec3) -> Vec3 {
    Vec3::new(origin.x, origin.y.max(half_extents.y), origin.z)
}

fn pick_half_extents(config: &RigidBodyConfig) -> Vec3 {
    match config.body_size {
        BodySize::Fixed {
            half_width,
            half_height,
        } => Vec3::new(half_width, half_height, config.half_depth),
        BodySize::Random { min, max } => {
            let mut rng = match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            Vec3::new(
                rng.gen_range(min..max),
                rng.gen_range(min..max),
                config.half_depth,
            )
        }
    }
}

impl RigidBodyWorld for RapierDropWorld {
    fn link_visual(&mut self, transform: TransformId) {
        self.visual = Some(transform);
    }

    fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }

    fn sync_transforms(&self) -> Vec<BodySync> {
        let Some(transform) = self.visual else {
            return Vec::new();
        };
        let body = self.falling_body();
        vec![BodySync {
            transform,
            position: body.position,
            angle: body.angle,
        }]
    }

    fn falling_body(&self) -> BodySnapshot {
        let Some(body) = self.rigid_body_set.get(self.body) else {
            return BodySnapshot::default();
        };
        let pos = body.translation();
        let vel = body.linvel();
        BodySnapshot {
            position: Vec3::new(pos.x, pos.y, pos.z),
            angle: body.rotation().euler_angles().2,
            linear_velocity: Vec3::new(vel.x, vel.y, vel.z),
            angular_velocity: body.angvel().z,
        }
    }

    fn body_half_extents(&self) -> Vec3 {
        self.half_extents
    }

    fn set_gravity(&mut self, gravity: f32) {
        self.gravity = Vector3::new(0.0, -gravity, 0.0);
        if let Some(body) = self.rigid_body_set.get_mut(self.body) {
            body.wake_up(true);
        }
        debug!("Rapier gravity set to {}", gravity);
    }

    fn set_mass(&mut self, mass: f32) {
        if let Some(collider) = self.collider_set.get_mut(self.collider) {
            collider.set_mass(mass);
        }
        if let Some(body) = self.rigid_body_set.get_mut(self.body) {
            body.wake_up(true);
        }
    }

    fn reset(&mut self, origin: Vec3) {
        let origin = above_ground(origin, self.half_extents);
        let Some(body) = self.rigid_body_set.get_mut(self.body) else {
            return;
        };
        body.set_translation(Vector3::new(origin.x, origin.y, origin.z), false);
        body.set_rotation(UnitQuaternion::identity(), false);
        body.set_linvel(Vector3::zeros(), false);
        body.set_angvel(Vector3::new(0.0, 0.0, self.initial_angvel), false);
        body.reset_forces(false);
        body.reset_torques(false);

        // Re-inserting the collider drops cached contacts and their
        // warm-start impulses.
        if let Some(collider) = self.collider_set.remove(
            self.collider,
            &mut self.island_manager,
            &mut self.rigid_body_set,
            false,
        ) {
            self.collider =
                self.collider_set
                    .insert_with_parent(collider, self.body, &mut self.rigid_body_set);
        }

        if let Some(body) = self.rigid_body_set.get_mut(self.body) {
            body.wake_up(true);
        }
        debug!("Rapier body reset to {:?}", origin);
    }
}
