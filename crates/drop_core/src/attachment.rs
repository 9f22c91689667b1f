//! Exclusive model attachment on the carrier object.
//!
//! At most one optional model is parented to the carrier and visible at any
//! time. Requests hide the currently shown model before anything else happens,
//! and loads resolve asynchronously. Every load carries a [`LoadTicket`], and
//! only the ticket the arbiter is still waiting on may make a model visible.
//! Completions for superseded tickets are attached hidden (or released) so a
//! late callback can never resurrect a model the viewer moved away from.

use std::fmt;

use bevy::log::{debug, info, warn};
use bevy::math::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::loader::{
    LoadCompletion, LoadError, LoadRequest, LoadTicket, LoadedModel, ModelLoader,
};
use crate::scene::{SceneGraph, TransformId};

/// One of the attachable models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelSlot {
    A,
    B,
    C,
    D,
}

impl ModelSlot {
    pub const ALL: [ModelSlot; 4] = [ModelSlot::A, ModelSlot::B, ModelSlot::C, ModelSlot::D];

    pub const fn index(self) -> usize {
        match self {
            ModelSlot::A => 0,
            ModelSlot::B => 1,
            ModelSlot::C => 2,
            ModelSlot::D => 3,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ModelSlot::A => "A",
            ModelSlot::B => "B",
            ModelSlot::C => "C",
            ModelSlot::D => "D",
        }
    }
}

impl fmt::Display for ModelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What happens to a model's handle when it is hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep hidden models parented to the carrier and reuse them.
    #[default]
    Retain,
    /// Release hidden models; the next request loads them again.
    ReleaseOnHide,
}

/// Per-slot asset and placement relative to the carrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotProfile {
    pub asset_path: String,
    pub offset: [f32; 3],
    pub scale: f32,
}

impl SlotProfile {
    pub fn offset(&self) -> Vec3 {
        Vec3::from_array(self.offset)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    /// Indexed by [`ModelSlot::index`]
    pub slots: [SlotProfile; 4],
    pub retention: RetentionPolicy,
    /// Carrier mesh opacity while a model is shown
    pub carrier_opacity_with_model: f32,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            slots: [
                SlotProfile {
                    asset_path: "models/slot_a.glb".into(),
                    offset: [0.0, -0.5, 0.0],
                    scale: 0.5,
                },
                SlotProfile {
                    asset_path: "models/slot_b.glb".into(),
                    offset: [0.0, -0.5, 0.0],
                    scale: 1.0,
                },
                SlotProfile {
                    asset_path: "models/slot_c.glb".into(),
                    offset: [0.0, 0.0, 0.0],
                    scale: 0.01,
                },
                SlotProfile {
                    asset_path: "models/slot_d.glb".into(),
                    offset: [0.0, -0.4, 0.1],
                    scale: 0.25,
                },
            ],
            retention: RetentionPolicy::Retain,
            carrier_opacity_with_model: 0.0,
        }
    }
}

impl AttachmentConfig {
    pub fn profile(&self, slot: ModelSlot) -> &SlotProfile {
        &self.slots[slot.index()]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for slot in ModelSlot::ALL {
            let profile = self.profile(slot);
            if profile.asset_path.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "attachment.slots.asset_path",
                    reason: format!("slot {} has no asset path", slot),
                });
            }
            if !(profile.scale.is_finite() && profile.scale > 0.0) {
                return Err(ConfigError::InvalidValue {
                    field: "attachment.slots.scale",
                    reason: format!("slot {} scale must be > 0, got {}", slot, profile.scale),
                });
            }
            if profile.offset.iter().any(|c| !c.is_finite()) {
                return Err(ConfigError::InvalidValue {
                    field: "attachment.slots.offset",
                    reason: format!("slot {} offset must be finite", slot),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.carrier_opacity_with_model) {
            return Err(ConfigError::InvalidValue {
                field: "attachment.carrier_opacity_with_model",
                reason: format!("must be in [0, 1], got {}", self.carrier_opacity_with_model),
            });
        }
        Ok(())
    }
}

/// Arbiter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArbiterState {
    #[default]
    Empty,
    Loading(ModelSlot),
    Attached(ModelSlot),
}

/// What a [`AttachmentArbiter::request`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A new load was issued
    Loading(LoadTicket),
    /// A load for this slot was already outstanding
    AwaitingLoad(LoadTicket),
    /// A retained model was shown again without loading
    Reattached,
    /// The slot was already attached
    Unchanged,
    /// The attachment was cleared
    Cleared,
}

/// What a [`AttachmentArbiter::complete`] call did.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Attached(ModelSlot),
    /// The model arrived for a slot that is no longer wanted and stays hidden
    Stale(ModelSlot),
    Failed(LoadError),
}

#[derive(Debug, Clone, Default)]
struct SlotRecord {
    model: Option<LoadedModel>,
    pending: Option<LoadTicket>,
}

/// State machine for the carrier's optional model.
#[derive(Debug)]
pub struct AttachmentArbiter {
    carrier: TransformId,
    config: AttachmentConfig,
    state: ArbiterState,
    target: Option<ModelSlot>,
    slots: [SlotRecord; 4],
    next_ticket: u64,
}

impl AttachmentArbiter {
    pub fn new(carrier: TransformId, config: AttachmentConfig) -> Self {
        Self {
            carrier,
            config,
            state: ArbiterState::Empty,
            target: None,
            slots: Default::default(),
            next_ticket: 0,
        }
    }

    pub fn state(&self) -> ArbiterState {
        self.state
    }

    /// Slot the viewer asked for last.
    pub fn target(&self) -> Option<ModelSlot> {
        self.target
    }

    /// Slot whose model is currently shown.
    pub fn attached(&self) -> Option<ModelSlot> {
        match self.state {
            ArbiterState::Attached(slot) => Some(slot),
            _ => None,
        }
    }

    pub fn pending_ticket(&self, slot: ModelSlot) -> Option<LoadTicket> {
        self.slots[slot.index()].pending
    }

    /// Loaded handle kept for `slot`, shown or not.
    pub fn model(&self, slot: ModelSlot) -> Option<&LoadedModel> {
        self.slots[slot.index()].model.as_ref()
    }

    pub fn config(&self) -> &AttachmentConfig {
        &self.config
    }

    /// Select `slot`, or clear the attachment with `None`.
    pub fn request(
        &mut self,
        slot: Option<ModelSlot>,
        scene: &mut dyn SceneGraph,
        loader: &mut dyn ModelLoader,
    ) -> RequestOutcome {
        let Some(slot) = slot else {
            self.hide_attached(scene);
            if let ArbiterState::Loading(pending) = self.state {
                debug!("Model {} no longer wanted while loading", pending);
            }
            self.target = None;
            self.state = ArbiterState::Empty;
            return RequestOutcome::Cleared;
        };

        if self.state == ArbiterState::Attached(slot) {
            return RequestOutcome::Unchanged;
        }

        self.hide_attached(scene);
        self.target = Some(slot);

        if let Some(model) = self.slots[slot.index()].model.clone() {
            self.show(slot, &model, scene);
            return RequestOutcome::Reattached;
        }

        self.state = ArbiterState::Loading(slot);
        if let Some(ticket) = self.slots[slot.index()].pending {
            return RequestOutcome::AwaitingLoad(ticket);
        }

        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;
        self.slots[slot.index()].pending = Some(ticket);
        let path = self.config.profile(slot).asset_path.clone();
        info!("Loading model {} from {} ({:?})", slot, path, ticket);
        loader.load(LoadRequest { ticket, slot, path });
        RequestOutcome::Loading(ticket)
    }

    /// Handle a finished load.
    pub fn complete(
        &mut self,
        completion: LoadCompletion,
        scene: &mut dyn SceneGraph,
    ) -> CompletionOutcome {
        let LoadCompletion {
            ticket,
            slot,
            result,
        } = completion;
        let index = slot.index();

        if self.slots[index].pending != Some(ticket) {
            // Superseded or unknown ticket: nothing waits on it.
            return match result {
                Ok(model) => {
                    debug!("Discarding orphaned load {:?} for model {}", ticket, slot);
                    scene.set_visible(model.scene, false);
                    scene.release(model.scene);
                    CompletionOutcome::Stale(slot)
                }
                Err(err) => CompletionOutcome::Failed(err),
            };
        }
        self.slots[index].pending = None;

        let model = match result {
            Ok(model) => model,
            Err(err) => {
                warn!("Model {} failed to load: {}", slot, err);
                if self.state == ArbiterState::Loading(slot) {
                    self.state = ArbiterState::Empty;
                    self.target = None;
                }
                return CompletionOutcome::Failed(err);
            }
        };

        let profile = self.config.profile(slot);
        scene.set_visible(model.scene, false);
        scene.attach_child(self.carrier, model.scene);
        scene.set_position(model.scene, profile.offset());
        scene.set_scale(model.scene, profile.scale);

        if self.target == Some(slot) {
            self.slots[index].model = Some(model.clone());
            self.show(slot, &model, scene);
            info!("Model {} attached ({})", slot, model.identity);
            CompletionOutcome::Attached(slot)
        } else {
            debug!("Model {} arrived after it was deselected, keeping it hidden", slot);
            match self.config.retention {
                RetentionPolicy::Retain => self.slots[index].model = Some(model),
                RetentionPolicy::ReleaseOnHide => scene.release(model.scene),
            }
            CompletionOutcome::Stale(slot)
        }
    }

    fn show(&mut self, slot: ModelSlot, model: &LoadedModel, scene: &mut dyn SceneGraph) {
        scene.set_visible(model.scene, true);
        scene.set_opacity(self.carrier, self.config.carrier_opacity_with_model);
        self.state = ArbiterState::Attached(slot);
    }

    fn hide_attached(&mut self, scene: &mut dyn SceneGraph) {
        let ArbiterState::Attached(slot) = self.state else {
            return;
        };
        let record = &mut self.slots[slot.index()];
        if let Some(model) = record.model.as_ref() {
            scene.set_visible(model.scene, false);
            if self.config.retention == RetentionPolicy::ReleaseOnHide {
                scene.release(model.scene);
                record.model = None;
            }
        }
        scene.set_opacity(self.carrier, 1.0);
        self.state = ArbiterState::Empty;
    }
}
