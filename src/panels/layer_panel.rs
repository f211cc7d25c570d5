use egui::Color32;

use crate::command::Command;
use crate::control::LayerControl;

/// One overlay line of the panel
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayRow {
    pub id: String,
    pub label: String,
    pub visible: bool,
    pub opacity: f32,
    pub loading: bool,
    pub filtered: bool,
    pub error: Option<String>,
}

/// Overlays sharing a group, or the ungrouped ones (`id == None`)
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSection {
    pub id: Option<String>,
    pub label: String,
    pub visible: bool,
    pub opacity: f32,
    pub overlays: Vec<OverlayRow>,
}

/// Snapshot of everything the panel draws, taken once per frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelModel {
    /// (id, label) pairs in configuration order
    pub bases: Vec<(String, String)>,
    pub base_id: Option<String>,
    pub sections: Vec<GroupSection>,
}

impl PanelModel {
    pub fn from_control(control: &LayerControl) -> Self {
        let bases = control
            .bases()
            .iter()
            .map(|base| (base.id.clone(), base.label.clone()))
            .collect();

        let mut sections: Vec<GroupSection> = Vec::new();
        for config in control.overlays() {
            let state = control.overlay_state(&config.id).unwrap_or_default();
            let row = OverlayRow {
                loading: control.is_loading(&config.id),
                filtered: control.is_filtered(&config.id),
                error: control.overlay_error(&config.id),
                id: config.id,
                label: config.label,
                visible: state.visible,
                opacity: state.opacity,
            };
            match sections.iter_mut().find(|section| section.id == config.group) {
                Some(section) => section.overlays.push(row),
                None => {
                    let group = config.group.as_deref().and_then(|id| control.group_state(id));
                    sections.push(GroupSection {
                        label: config
                            .group
                            .as_deref()
                            .map(|id| control.group_label(id))
                            .unwrap_or_else(|| "Overlays".to_owned()),
                        id: config.group,
                        visible: group.is_some_and(|g| g.visible),
                        opacity: group.map_or(1.0, |g| g.opacity),
                        overlays: vec![row],
                    });
                }
            }
        }

        Self {
            bases,
            base_id: control.base_id(),
            sections,
        }
    }

    pub fn overlay(&self, id: &str) -> Option<&OverlayRow> {
        self.sections
            .iter()
            .flat_map(|section| section.overlays.iter())
            .find(|row| row.id == id)
    }
}

/// Draws the control as a left side panel
pub fn show_layer_panel(ctx: &egui::Context, model: &PanelModel) -> Vec<Command> {
    let mut commands = Vec::new();
    egui::SidePanel::left("layer_panel")
        .resizable(true)
        .default_width(240.0)
        .show(ctx, |ui| {
            commands = layer_panel(ui, model);
        });
    commands
}

/// Draws base styles and overlays, returning what the user asked for
pub fn layer_panel(ui: &mut egui::Ui, model: &PanelModel) -> Vec<Command> {
    let mut commands = Vec::new();

    ui.heading("Base");
    for (id, label) in &model.bases {
        let selected = model.base_id.as_deref() == Some(id.as_str());
        if ui.radio(selected, label.as_str()).clicked() && !selected {
            commands.push(Command::SetBase(id.clone()));
        }
    }

    ui.separator();
    ui.heading("Overlays");
    egui::ScrollArea::vertical().show(ui, |ui| {
        for section in &model.sections {
            match &section.id {
                Some(group_id) => {
                    egui::CollapsingHeader::new(section.label.as_str())
                        .id_salt(group_id)
                        .default_open(true)
                        .show(ui, |ui| {
                            group_controls(ui, group_id, section, &mut commands);
                            for row in &section.overlays {
                                overlay_row(ui, row, &mut commands);
                            }
                        });
                }
                None => {
                    for row in &section.overlays {
                        overlay_row(ui, row, &mut commands);
                    }
                }
            }
        }
    });

    ui.separator();
    if ui.button("Clear memory").clicked() {
        commands.push(Command::ClearMemory);
    }
    commands
}

fn group_controls(ui: &mut egui::Ui, group_id: &str, section: &GroupSection, commands: &mut Vec<Command>) {
    ui.horizontal(|ui| {
        let mut visible = section.visible;
        if ui.checkbox(&mut visible, "All").changed() {
            commands.push(Command::ToggleGroup {
                group_id: group_id.to_owned(),
                visible,
            });
        }
        let mut opacity = section.opacity;
        if ui.add(egui::Slider::new(&mut opacity, 0.0..=1.0)).changed() {
            commands.push(Command::SetGroupOpacity {
                group_id: group_id.to_owned(),
                opacity,
            });
        }
    });
}

fn overlay_row(ui: &mut egui::Ui, row: &OverlayRow, commands: &mut Vec<Command>) {
    ui.horizontal(|ui| {
        let mut visible = row.visible;
        let label = if row.filtered {
            format!("{} (out of zoom)", row.label)
        } else {
            row.label.clone()
        };
        if ui.add_enabled(!row.loading, egui::Checkbox::new(&mut visible, label)).changed() {
            commands.push(Command::ToggleOverlay {
                id: row.id.clone(),
                visible,
            });
        }
        if row.loading {
            ui.spinner();
        }
    });

    if let Some(error) = &row.error {
        ui.horizontal(|ui| {
            ui.colored_label(Color32::RED, error.as_str());
            if ui.small_button("Retry").clicked() {
                commands.push(Command::Retry(row.id.clone()));
            }
        });
    } else if row.visible {
        let mut opacity = row.opacity;
        if ui.add(egui::Slider::new(&mut opacity, 0.0..=1.0).text("opacity")).changed() {
            commands.push(Command::SetOverlayOpacity {
                id: row.id.clone(),
                opacity,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BaseStyle, ControlOptions, GroupConfig};
    use crate::overlay::{ContentItem, ContentKind, OverlayConfig};

    fn control() -> LayerControl {
        LayerControl::new(
            ControlOptions {
                bases: vec![
                    BaseStyle::new("streets", "Streets", "streets.json"),
                    BaseStyle::new("dark", "Dark", "dark.json"),
                ],
                overlays: vec![
                    OverlayConfig::new("rivers", "Rivers", vec![ContentItem::new("rivers-line", ContentKind::Line)])
                        .with_group("water"),
                    OverlayConfig::new("roads", "Roads", vec![ContentItem::new("roads-line", ContentKind::Line)])
                        .visible(true),
                    OverlayConfig::new("lakes", "Lakes", vec![ContentItem::new("lakes-fill", ContentKind::Fill)])
                        .with_group("water"),
                ],
                groups: vec![GroupConfig {
                    id: "water".into(),
                    label: "Hydrography".into(),
                }],
                ..Default::default()
            },
            None,
        )
    }

    #[test]
    fn test_model_sections() {
        let model = PanelModel::from_control(&control());
        assert_eq!(model.base_id.as_deref(), Some("streets"));
        assert_eq!(model.bases.len(), 2);
        assert_eq!(model.sections.len(), 2);

        let water = &model.sections[0];
        assert_eq!(water.id.as_deref(), Some("water"));
        assert_eq!(water.label, "Hydrography");
        let ids: Vec<_> = water.overlays.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec!["rivers", "lakes"]);

        assert_eq!(model.sections[1].id, None);
        let roads = model.overlay("roads").unwrap();
        assert!(roads.visible);
        assert!(!roads.loading);
        assert_eq!(roads.error, None);
    }

    #[test]
    fn test_panel_draws_without_input() {
        let model = PanelModel::from_control(&control());
        let ctx = egui::Context::default();
        let mut commands = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            commands = show_layer_panel(ctx, &model);
        });
        assert!(commands.is_empty());
    }
}
