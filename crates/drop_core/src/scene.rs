//! Seam to the render-side scene graph.
//!
//! The core never touches render entities directly. It talks to a
//! [`SceneGraph`], and the frame loop's implementation is a
//! [`SceneCommandBuffer`] that records [`SceneCommand`]s for the render side to
//! apply after the simulation step. [`SceneMirror`] replays those commands into
//! plain per-transform state.

use std::collections::BTreeMap;

use bevy::math::Vec3;
use bevy::prelude::Resource;

/// Opaque id of a render transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransformId(pub u64);

/// Scene-graph operations the simulation needs.
pub trait SceneGraph {
    fn create_transform(&mut self) -> TransformId;
    fn set_position(&mut self, transform: TransformId, position: Vec3);
    fn set_rotation_z(&mut self, transform: TransformId, angle: f32);
    fn set_scale(&mut self, transform: TransformId, scale: f32);
    fn set_visible(&mut self, transform: TransformId, visible: bool);
    fn attach_child(&mut self, parent: TransformId, child: TransformId);
    fn set_opacity(&mut self, transform: TransformId, opacity: f32);
    /// Drop the transform and everything it owns.
    fn release(&mut self, transform: TransformId);
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    Create(TransformId),
    SetPosition(TransformId, Vec3),
    SetRotationZ(TransformId, f32),
    SetScale(TransformId, f32),
    SetVisible(TransformId, bool),
    AttachChild { parent: TransformId, child: TransformId },
    SetOpacity(TransformId, f32),
    Release(TransformId),
}

impl SceneCommand {
    /// Transform the command mutates.
    pub fn target(&self) -> TransformId {
        match *self {
            SceneCommand::Create(id)
            | SceneCommand::SetPosition(id, _)
            | SceneCommand::SetRotationZ(id, _)
            | SceneCommand::SetScale(id, _)
            | SceneCommand::SetVisible(id, _)
            | SceneCommand::SetOpacity(id, _)
            | SceneCommand::Release(id) => id,
            SceneCommand::AttachChild { child, .. } => child,
        }
    }
}

/// Records scene commands until the render side drains them.
#[derive(Resource, Debug, Default)]
pub struct SceneCommandBuffer {
    next_id: u64,
    commands: Vec<SceneCommand>,
}

impl SceneCommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id for a transform created outside the simulation, such as
    /// the root of a loaded model. No `Create` command is recorded.
    pub fn allocate_id(&mut self) -> TransformId {
        let id = TransformId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn commands(&self) -> &[SceneCommand] {
        &self.commands
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, SceneCommand> {
        self.commands.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl SceneGraph for SceneCommandBuffer {
    fn create_transform(&mut self) -> TransformId {
        let id = self.allocate_id();
        self.commands.push(SceneCommand::Create(id));
        id
    }

    fn set_position(&mut self, transform: TransformId, position: Vec3) {
        self.commands.push(SceneCommand::SetPosition(transform, position));
    }

    fn set_rotation_z(&mut self, transform: TransformId, angle: f32) {
        self.commands.push(SceneCommand::SetRotationZ(transform, angle));
    }

    fn set_scale(&mut self, transform: TransformId, scale: f32) {
        self.commands.push(SceneCommand::SetScale(transform, scale));
    }

    fn set_visible(&mut self, transform: TransformId, visible: bool) {
        self.commands.push(SceneCommand::SetVisible(transform, visible));
    }

    fn attach_child(&mut self, parent: TransformId, child: TransformId) {
        self.commands.push(SceneCommand::AttachChild { parent, child });
    }

    fn set_opacity(&mut self, transform: TransformId, opacity: f32) {
        self.commands.push(SceneCommand::SetOpacity(transform, opacity));
    }

    fn release(&mut self, transform: TransformId) {
        self.commands.push(SceneCommand::Release(transform));
    }
}

/// Local state of one mirrored transform.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorNode {
    pub position: Vec3,
    pub rotation_z: f32,
    pub scale: f32,
    pub visible: bool,
    pub opacity: f32,
    pub parent: Option<TransformId>,
}

impl Default for MirrorNode {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation_z: 0.0,
            scale: 1.0,
            visible: true,
            opacity: 1.0,
            parent: None,
        }
    }
}

/// Plain-data replay of a command stream.
///
/// Transforms first seen in a non-`Create` command (loaded model roots) are
/// created on demand.
#[derive(Debug, Clone, Default)]
pub struct SceneMirror {
    nodes: BTreeMap<TransformId, MirrorNode>,
}

impl SceneMirror {
    pub fn apply(&mut self, command: &SceneCommand) {
        match *command {
            SceneCommand::Create(id) => {
                self.nodes.entry(id).or_default();
            }
            SceneCommand::SetPosition(id, position) => self.node_mut(id).position = position,
            SceneCommand::SetRotationZ(id, angle) => self.node_mut(id).rotation_z = angle,
            SceneCommand::SetScale(id, scale) => self.node_mut(id).scale = scale,
            SceneCommand::SetVisible(id, visible) => self.node_mut(id).visible = visible,
            SceneCommand::AttachChild { parent, child } => {
                self.nodes.entry(parent).or_default();
                self.node_mut(child).parent = Some(parent);
            }
            SceneCommand::SetOpacity(id, opacity) => self.node_mut(id).opacity = opacity,
            SceneCommand::Release(id) => {
                self.nodes.remove(&id);
                for node in self.nodes.values_mut() {
                    if node.parent == Some(id) {
                        node.parent = None;
                    }
                }
            }
        }
    }

    pub fn apply_all<'a>(&mut self, commands: impl IntoIterator<Item = &'a SceneCommand>) {
        for command in commands {
            self.apply(command);
        }
    }

    pub fn node(&self, id: TransformId) -> Option<&MirrorNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: TransformId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Children of `parent` that are currently visible.
    pub fn visible_children(&self, parent: TransformId) -> Vec<TransformId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parent == Some(parent) && node.visible)
            .map(|(id, _)| *id)
            .collect()
    }

    fn node_mut(&mut self, id: TransformId) -> &mut MirrorNode {
        self.nodes.entry(id).or_default()
    }
}
