//! Control panel.
//!
//! Edits [`Settings`] in place; behaviour and view changes apply on the next
//! frame, spawn radius applies on the next reseed. Buttons come back as
//! [`Command`]s so they go through the same path as key presses.

use egui::Ui;

use crate::config::{DofConfig, DofMode, RenderMode, Settings, SimConfig, SimParam, ViewConfig, WorldConfig};
use crate::orchestrator::{Command, RunState};
use crate::palette::Palette;

/// Read-only state shown in the panel.
#[derive(Debug, Clone)]
pub struct UiStatus {
    pub fps: f32,
    pub steps: u64,
    pub agents: usize,
    pub run_state: RunState,
    pub render_mode: RenderMode,
    pub auto_rotate: bool,
    pub controller: bool,
}

/// Draw the panel and return the commands its buttons issued.
pub fn control_panel(ctx: &egui::Context, settings: &mut Settings, status: &UiStatus) -> Vec<Command> {
    let mut commands = Vec::new();

    egui::Window::new("Physarum")
        .default_width(300.0)
        .resizable(true)
        .show(ctx, |ui| {
            render_status(ui, status, &mut commands);
            ui.separator();

            ui.collapsing("Behaviour", |ui| render_behaviour_panel(ui, &mut settings.sim));
            ui.collapsing("Seeding", |ui| render_seeding_panel(ui, &mut settings.world, &mut commands));
            ui.collapsing("Depth of Field", |ui| render_dof_panel(ui, &mut settings.dof));
            ui.collapsing("View", |ui| render_view_panel(ui, &mut settings.view));
        });

    commands
}

fn render_status(ui: &mut Ui, status: &UiStatus, commands: &mut Vec<Command>) {
    ui.label(format!("{:.0} fps  |  step {}  |  {} agents", status.fps, status.steps, status.agents));
    if status.controller {
        ui.label(egui::RichText::new("External controller connected").small().weak());
    }

    ui.horizontal(|ui| {
        let pause_label = match status.run_state {
            RunState::Simulating => "Pause",
            RunState::Paused => "Resume",
        };
        if ui.button(pause_label).clicked() {
            commands.push(Command::TogglePause);
        }
        if ui.button("Reseed").clicked() {
            commands.push(Command::Reseed);
        }
    });

    ui.horizontal(|ui| {
        let mut dof = status.render_mode == RenderMode::DepthOfField;
        if ui.checkbox(&mut dof, "Depth of field").changed() {
            commands.push(Command::ToggleDepthOfField);
        }
        let mut rotate = status.auto_rotate;
        if ui.checkbox(&mut rotate, "Auto-rotate").changed() {
            commands.push(Command::ToggleAutoRotate);
        }
    });

    ui.label(
        egui::RichText::new("F1 panel · F2 reseed · F3 depth of field · F4 rotate · Space pause")
            .small()
            .weak(),
    );
}

fn render_behaviour_panel(ui: &mut Ui, sim: &mut SimConfig) {
    for param in SimParam::ALL {
        let (lo, hi) = param.range();
        ui.add(egui::Slider::new(param.field(sim), lo..=hi).text(param.label()));
    }

    ui.separator();

    ui.checkbox(&mut sim.collision, "Collision")
        .on_hover_text("Refuse moves into cells already holding enough agents");
    ui.add_enabled(
        sim.collision,
        egui::Slider::new(&mut sim.occupancy_threshold, 1..=8).text("Agents per cell"),
    );
}

fn render_seeding_panel(ui: &mut Ui, world: &mut WorldConfig, commands: &mut Vec<Command>) {
    let (lo, hi) = world.spawn_radius_range();
    ui.add(egui::Slider::new(&mut world.spawn_radius, lo..=hi).text("Spawn radius"))
        .on_hover_text("Applied on the next reseed");
    if ui.button("Reseed now").clicked() {
        commands.push(Command::Reseed);
    }
}

fn render_dof_panel(ui: &mut Ui, dof: &mut DofConfig) {
    egui::ComboBox::from_label("Mode")
        .selected_text(dof.mode.label())
        .show_ui(ui, |ui| {
            for mode in DofMode::ALL {
                ui.selectable_value(&mut dof.mode, mode, mode.label());
            }
        });

    ui.add(
        egui::Slider::new(&mut dof.aperture, 0.0..=2.0)
            .text("Aperture")
            .logarithmic(true),
    );
    ui.add(egui::Slider::new(&mut dof.focal_distance, 1.0..=1000.0).text("Focal distance"));
    ui.add(egui::Slider::new(&mut dof.focal_depth, 0.0..=200.0).text("Focal depth"));
    ui.add(egui::Slider::new(&mut dof.sample_weight, 0.01..=10.0).text("Sample weight"));
    ui.add(egui::Slider::new(&mut dof.iterations, 1..=64).text("Iterations"));
    ui.add(egui::Slider::new(&mut dof.break_distance, 0.5..=64.0).text("Break distance"))
        .on_hover_text("Longest pair segment drawn; ray saturation in trail mode");
}

fn render_view_panel(ui: &mut Ui, view: &mut ViewConfig) {
    egui::ComboBox::from_label("Palette")
        .selected_text(view.palette.label())
        .show_ui(ui, |ui| {
            for palette in Palette::ALL {
                ui.selectable_value(&mut view.palette, palette, palette.label());
            }
        });

    ui.add(
        egui::Slider::new(&mut view.intensity, 0.01..=5.0)
            .text("Intensity")
            .logarithmic(true),
    );
    ui.add(egui::Slider::new(&mut view.slice_count, 8..=512).text("Volume slices"));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> UiStatus {
        UiStatus {
            fps: 60.0,
            steps: 10,
            agents: 100,
            run_state: RunState::Simulating,
            render_mode: RenderMode::Standard,
            auto_rotate: false,
            controller: false,
        }
    }

    #[test]
    fn test_panel_runs_headless() {
        let ctx = egui::Context::default();
        let mut settings = Settings::default();
        let mut commands = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            commands = control_panel(ctx, &mut settings, &status());
        });
        assert!(commands.is_empty());
        assert_eq!(settings, Settings::default());
    }
}
