//! Control panel for the drop simulator.
//!
//! Widgets only ever write [`SimEvent`]s. Everything shown is read back from
//! the [`SimulationController`] on the next frame.

use bevy::prelude::*;
use bevy_mod_imgui::prelude::*;
use drop_core::{
    ArbiterState, ControllerPhase, DisplayMetrics, GravityPreset, ModelSlot, NoticeLevel,
    SimEvent, SimulationController,
};
use drop_physics::ModelLoads;

pub const MIN_HEIGHT: f32 = 0.5;
pub const MAX_HEIGHT: f32 = 10.0;
pub const MIN_MASS: f32 = 0.1;
pub const MAX_MASS: f32 = 10.0;

pub struct ControlPanelPlugin;

impl Plugin for ControlPanelPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(bevy_mod_imgui::ImguiPlugin::default())
            .add_systems(Update, imgui_ui);
    }
}

/// Slider values, seeded from the controller on the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelState {
    pub height: f32,
    pub mass: f32,
}

impl PanelState {
    pub fn from_controller(controller: &SimulationController) -> Self {
        let state = controller.state();
        Self {
            height: state.release_height.clamp(MIN_HEIGHT, MAX_HEIGHT),
            mass: state.mass.clamp(MIN_MASS, MAX_MASS),
        }
    }
}

/// Model the radio buttons show as checked. Read every frame so a failed
/// load falls back to the slot the arbiter actually wants.
pub fn selected_model(controller: &SimulationController) -> Option<ModelSlot> {
    controller.arbiter().target()
}

/// Text rows of the results window.
pub fn metric_lines(metrics: &DisplayMetrics) -> [String; 4] {
    [
        format!("Height: {:.2} m", metrics.height),
        format!("Velocity: {:.2} m/s", metrics.instantaneous_velocity),
        format!("Final velocity: {:.2} m/s", metrics.final_velocity),
        format!("Gravity: {:.2} m/s^2", metrics.gravity),
    ]
}

pub fn attachment_label(state: ArbiterState) -> String {
    match state {
        ArbiterState::Empty => "Model: none".to_string(),
        ArbiterState::Loading(slot) => format!("Model: loading {}", slot),
        ArbiterState::Attached(slot) => format!("Model: {}", slot),
    }
}

fn imgui_ui(
    mut context: NonSendMut<ImguiContext>,
    controller: Option<Res<SimulationController>>,
    loads: Option<Res<ModelLoads>>,
    mut panel: Local<Option<PanelState>>,
    mut events: MessageWriter<SimEvent>,
) {
    let Some(controller) = controller else {
        return;
    };
    let panel = panel.get_or_insert_with(|| PanelState::from_controller(&controller));
    let ui = context.ui();

    ui.window("Simulation")
        .size([320.0, 300.0], Condition::FirstUseEver)
        .position([10.0, 10.0], Condition::FirstUseEver)
        .build(|| {
            let phase = match controller.phase() {
                ControllerPhase::Idle => "Idle",
                ControllerPhase::Running => "Running",
            };
            ui.text(format!("State: {}", phase));
            ui.separator();

            if ui.button("Start") {
                events.write(SimEvent::Start);
            }
            ui.same_line();
            if ui.button("Reset") {
                events.write(SimEvent::Reset);
            }

            ui.separator();
            ui.text("Gravity");
            for preset in GravityPreset::ALL {
                ui.same_line();
                if ui.radio_button_bool(preset.label(), controller.state().preset == preset) {
                    events.write(SimEvent::SelectPreset(preset));
                }
            }

            if ui.slider("Height (m)", MIN_HEIGHT, MAX_HEIGHT, &mut panel.height) {
                events.write(SimEvent::SetHeight(panel.height));
            }
            if ui.slider("Mass (kg)", MIN_MASS, MAX_MASS, &mut panel.mass) {
                events.write(SimEvent::SetMass(panel.mass));
            }

            ui.separator();
            ui.text("Model");
            let selected = selected_model(&controller);
            if ui.radio_button_bool("None", selected.is_none()) {
                events.write(SimEvent::SelectModel(None));
            }
            for slot in ModelSlot::ALL {
                ui.same_line();
                if ui.radio_button_bool(slot.label(), selected == Some(slot)) {
                    events.write(SimEvent::SelectModel(Some(slot)));
                }
            }
            ui.text(attachment_label(controller.arbiter().state()));
            if let Some(loads) = loads.as_ref().filter(|l| l.in_flight() > 0) {
                ui.text(format!("Loads in flight: {}", loads.in_flight()));
            }
        });

    ui.window("Results")
        .size([320.0, 220.0], Condition::FirstUseEver)
        .position([10.0, 320.0], Condition::FirstUseEver)
        .build(|| {
            for line in metric_lines(controller.metrics()) {
                ui.text(line);
            }
            if !controller.notices().is_empty() {
                ui.separator();
                for notice in controller.notices().iter() {
                    let color = match notice.level {
                        NoticeLevel::Info => [0.8, 0.8, 0.8, 1.0],
                        NoticeLevel::Warning => [1.0, 0.6, 0.2, 1.0],
                    };
                    ui.text_colored(color, &notice.message);
                }
            }
        });
}
