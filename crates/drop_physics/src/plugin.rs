use std::collections::{BTreeSet, HashMap};

use bevy::prelude::*;
use drop_core::{
    LoadCompletion, LoadError, LoadQueue, LoadRequest, LoadSender, LoadedModel, SceneCommand,
    SceneCommandBuffer, SceneGraph, SceneMirror, SimConfig, SimEvent, SimulationController,
    SimulationMode, TransformId,
};

use crate::world::RapierDropWorld;

/// Runs the drop simulation inside a bevy app.
///
/// Frame order: forward panel events, report finished model loads, advance
/// the controller, start requested loads, apply scene commands.
pub struct DropSimPlugin {
    pub config: SimConfig,
}

impl Plugin for DropSimPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(SimSettings(self.config.clone()))
            .init_resource::<SceneCommandBuffer>()
            .init_resource::<LoadQueue>()
            .init_resource::<TransformRegistry>()
            .add_message::<SimEvent>()
            .add_systems(Startup, setup_simulation)
            .add_systems(
                Update,
                (
                    forward_sim_events,
                    poll_model_loads,
                    advance_simulation,
                    dispatch_model_loads,
                    apply_scene_commands,
                )
                    .chain(),
            );
    }
}

#[derive(Resource, Clone)]
pub struct SimSettings(pub SimConfig);

/// Maps scene transform ids to entities and keeps the last applied state.
#[derive(Resource, Default)]
pub struct TransformRegistry {
    entities: HashMap<TransformId, Entity>,
    mirror: SceneMirror,
}

impl TransformRegistry {
    pub fn bind(&mut self, id: TransformId, entity: Entity) {
        self.entities.insert(id, entity);
    }

    pub fn entity(&self, id: TransformId) -> Option<Entity> {
        self.entities.get(&id).copied()
    }
}

struct PendingLoad {
    request: LoadRequest,
    id: TransformId,
    handle: Handle<Scene>,
}

/// Model loads in flight on the asset server.
#[derive(Resource)]
pub struct ModelLoads {
    sender: LoadSender,
    pending: Vec<PendingLoad>,
}

impl ModelLoads {
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

/// Marks the carrier's render entity.
#[derive(Component)]
pub struct Carrier;

fn setup_simulation(
    mut commands: Commands,
    settings: Res<SimSettings>,
    mut scene: ResMut<SceneCommandBuffer>,
    mut registry: ResMut<TransformRegistry>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let config = settings.0.clone();

    let world: Option<Box<dyn drop_core::RigidBodyWorld>> = match config.mode {
        SimulationMode::Kinematic => None,
        SimulationMode::RigidBody => {
            let origin = Vec3::new(0.0, config.release_height, 0.0);
            match RapierDropWorld::new(
                &config.rigid_body,
                config.initial_preset.acceleration(),
                config.mass,
                origin,
            ) {
                Ok(world) => Some(Box::new(world)),
                Err(err) => {
                    error!("Failed to build physics world: {}", err);
                    return;
                }
            }
        }
    };

    let controller = match SimulationController::new(config, world, scene.as_mut()) {
        Ok(controller) => controller,
        Err(err) => {
            error!("Failed to start simulation: {}", err);
            return;
        }
    };

    // Ground visual, top face at y = 0
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(20.0, 1.0, 20.0))),
        MeshMaterial3d(materials.add(Color::srgb(0.3, 0.5, 0.3))),
        Transform::from_xyz(0.0, -0.5, 0.0),
    ));

    let half = controller.carrier_half_extents();
    let carrier = commands
        .spawn((
            Mesh3d(meshes.add(Cuboid::new(half.x * 2.0, half.y * 2.0, half.z * 2.0))),
            MeshMaterial3d(materials.add(Color::srgb(0.8, 0.2, 0.2))),
            Transform::from_translation(controller.state().position),
            Carrier,
        ))
        .id();
    registry.bind(controller.carrier(), carrier);

    commands.spawn((
        DirectionalLight {
            illuminance: 10000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -0.5, 0.5, 0.0)),
    ));

    commands.insert_resource(ModelLoads {
        sender: controller.load_sender(),
        pending: Vec::new(),
    });
    commands.insert_resource(controller);
}

fn forward_sim_events(
    mut events: MessageReader<SimEvent>,
    controller: Option<ResMut<SimulationController>>,
) {
    let Some(mut controller) = controller else {
        events.clear();
        return;
    };
    for event in events.read() {
        if let Err(err) = controller.submit(*event) {
            debug!("Dropped {:?}: {}", event, err);
        }
    }
}

fn advance_simulation(
    time: Res<Time<Real>>,
    controller: Option<ResMut<SimulationController>>,
    mut scene: ResMut<SceneCommandBuffer>,
    mut loads: ResMut<LoadQueue>,
) {
    let Some(mut controller) = controller else {
        return;
    };
    let summary = controller.frame(time.elapsed(), scene.as_mut(), loads.as_mut());
    if summary.auto_stopped {
        info!("Run finished at height {:.2}", controller.state().position.y);
    }
}

fn dispatch_model_loads(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut queue: ResMut<LoadQueue>,
    mut scene: ResMut<SceneCommandBuffer>,
    mut registry: ResMut<TransformRegistry>,
    loads: Option<ResMut<ModelLoads>>,
) {
    let Some(mut loads) = loads else {
        return;
    };
    for request in queue.drain() {
        let handle: Handle<Scene> =
            asset_server.load(GltfAssetLabel::Scene(0).from_asset(request.path.clone()));
        let id = scene.allocate_id();
        let entity = commands
            .spawn((SceneRoot(handle.clone()), Transform::default(), Visibility::Hidden))
            .id();
        registry.bind(id, entity);
        debug!("Loading {} for slot {} as {:?}", request.path, request.slot, id);
        loads.pending.push(PendingLoad {
            request,
            id,
            handle,
        });
    }
}

fn poll_model_loads(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut registry: ResMut<TransformRegistry>,
    loads: Option<ResMut<ModelLoads>>,
) {
    let Some(mut loads) = loads else {
        return;
    };
    let ModelLoads { sender, pending } = loads.as_mut();

    pending.retain(|load| {
        let result = if asset_server.is_loaded_with_dependencies(&load.handle) {
            Ok(LoadedModel {
                scene: load.id,
                identity: load.request.path.clone(),
            })
        } else if let Some(bevy::asset::LoadState::Failed(err)) =
            asset_server.get_load_state(&load.handle)
        {
            if let Some(entity) = registry.entities.remove(&load.id) {
                commands.entity(entity).despawn();
            }
            Err(LoadError {
                path: load.request.path.clone(),
                reason: err.to_string(),
            })
        } else {
            return true;
        };

        let delivered = sender.complete(LoadCompletion {
            ticket: load.request.ticket,
            slot: load.request.slot,
            result,
        });
        if !delivered {
            warn!("Dropped load completion for {}", load.request.path);
        }
        false
    });
}

fn apply_scene_commands(
    mut commands: Commands,
    mut scene: ResMut<SceneCommandBuffer>,
    mut registry: ResMut<TransformRegistry>,
    material_handles: Query<&MeshMaterial3d<StandardMaterial>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if scene.is_empty() {
        return;
    }
    let registry = registry.as_mut();
    let mut touched = BTreeSet::new();

    for command in scene.drain() {
        registry.mirror.apply(&command);
        match command {
            SceneCommand::Create(id) => {
                if !registry.entities.contains_key(&id) {
                    let entity = commands.spawn((Transform::default(), Visibility::default())).id();
                    registry.entities.insert(id, entity);
                }
            }
            SceneCommand::AttachChild { parent, child } => {
                if let (Some(p), Some(c)) = (registry.entity(parent), registry.entity(child)) {
                    commands.entity(p).add_child(c);
                }
                touched.insert(child);
            }
            SceneCommand::SetOpacity(id, opacity) => {
                let handle = registry
                    .entity(id)
                    .and_then(|e| material_handles.get(e).ok());
                if let Some(handle) = handle {
                    if let Some(mut material) = materials.get_mut(&handle.0) {
                        apply_opacity(&mut material, opacity);
                    }
                }
            }
            SceneCommand::Release(id) => {
                if let Some(entity) = registry.entities.remove(&id) {
                    commands.entity(entity).despawn();
                }
                touched.remove(&id);
            }
            other => {
                touched.insert(other.target());
            }
        }
    }

    for id in touched {
        let (Some(node), Some(entity)) = (registry.mirror.node(id), registry.entity(id)) else {
            continue;
        };
        let transform = Transform {
            translation: node.position,
            rotation: Quat::from_rotation_z(node.rotation_z),
            scale: Vec3::splat(node.scale),
        };
        let visibility = if node.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        commands.entity(entity).insert((transform, visibility));
    }
}

fn apply_opacity(material: &mut StandardMaterial, opacity: f32) {
    material.base_color.set_alpha(opacity);
    material.alpha_mode = if opacity < 1.0 {
        AlphaMode::Blend
    } else {
        AlphaMode::Opaque
    };
}
