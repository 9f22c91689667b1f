use bevy::prelude::*;
use drop_core::SimConfig;
use drop_panel::ControlPanelPlugin;
use drop_physics::DropSimPlugin;

fn main() {
    let path = SimConfig::resolve_path();
    let config = match SimConfig::load_or_default(&path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid config {}: {}", path.display(), err);
            std::process::exit(1);
        }
    };

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Drop Simulator".into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(DropSimPlugin { config })
        .add_plugins(ControlPanelPlugin)
        // Dark background
        .insert_resource(ClearColor(Color::srgb(0.05, 0.05, 0.08)))
        .add_systems(Startup, setup)
        .run();
}

fn setup(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(2.0, 5.0, 10.0).looking_at(Vec3::new(0.0, 1.5, 0.0), Vec3::Y),
    ));
}
