//! Seam to the rigid-body world used in rigid-body mode.

use bevy::math::Vec3;

use crate::scene::TransformId;

/// Pose of a body linked to a render transform, after a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySync {
    pub transform: TransformId,
    pub position: Vec3,
    /// Rotation about z
    pub angle: f32,
}

/// Kinematic state of the falling body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodySnapshot {
    pub position: Vec3,
    pub angle: f32,
    pub linear_velocity: Vec3,
    pub angular_velocity: f32,
}

/// A physics world with one static ground and one falling body.
///
/// The world is authoritative: after every [`step`](Self::step) the caller
/// copies [`sync_transforms`](Self::sync_transforms) into the render side.
pub trait RigidBodyWorld: Send + Sync {
    /// Tag the falling body as the one driving `transform`.
    fn link_visual(&mut self, transform: TransformId);
    fn step(&mut self, dt: f32);
    fn sync_transforms(&self) -> Vec<BodySync>;
    fn falling_body(&self) -> BodySnapshot;
    /// Half-extents of the falling body's box.
    fn body_half_extents(&self) -> Vec3;
    /// Downward gravity magnitude.
    fn set_gravity(&mut self, gravity: f32);
    fn set_mass(&mut self, mass: f32);
    /// Put the falling body back at `origin` with no motion and no solver
    /// state carried over.
    fn reset(&mut self, origin: Vec3);
}
