//! Main application state: a finished analysis report and how it is browsed

use crate::ui::{show_heatmap, show_line_figure, show_topomap, Tab, UiState};
use eeg_processing::{AnalysisReport, LineFigure};

pub struct EegApp {
    report: AnalysisReport,
    /// Loss and accuracy curves, computed once
    training: Option<(LineFigure, LineFigure)>,
    pub ui_state: UiState,
}

impl EegApp {
    pub fn new(report: AnalysisReport) -> Self {
        let training = report.decoding.as_ref().and_then(|d| d.training_curves());
        Self { report, training, ui_state: UiState::new() }
    }

    fn tabs(&self) -> Vec<(Tab, &'static str)> {
        let mut tabs = vec![(Tab::Evoked, "Evoked")];
        if self.report.comparison.is_some() {
            tabs.push((Tab::Compare, "Compare conditions"));
        }
        if self.report.tfr.is_some() {
            tabs.push((Tab::TimeFrequency, "Time-frequency"));
        }
        if self.report.topomap.is_some() {
            tabs.push((Tab::Topomap, "Topomap"));
        }
        if self.training.is_some() {
            tabs.push((Tab::Training, "Training"));
        }
        tabs
    }

    fn summary_panel(&self, ui: &mut egui::Ui) {
        let report = &self.report;
        ui.heading("Epochs");
        ui.separator();
        ui.label(format!("Events: {}", report.n_events));
        ui.label(format!(
            "Retained: {} of {} ({:.1}% dropped)",
            report.drop_log.retained,
            report.drop_log.total,
            report.drop_log.drop_percentage()
        ));
        if report.drop_log.rejected + report.drop_log.flat + report.drop_log.no_data > 0 {
            ui.label(format!(
                "Rejected {}, flat {}, outside recording {}",
                report.drop_log.rejected, report.drop_log.flat, report.drop_log.no_data
            ));
        }
        for (channel, count) in &report.drop_log.by_channel {
            ui.label(format!("  {}: {}", channel, count));
        }
        for (label, count) in &report.condition_counts {
            ui.label(format!("{}: {}", label, count));
        }

        if let Some(decoding) = &report.decoding {
            ui.separator();
            ui.heading("Decoding");
            ui.label(format!("Model: {}", decoding.model));
            ui.label(format!("Samples: {} x {} features", decoding.n_samples, decoding.n_features));
            for (class, count) in decoding.classes.iter().zip(&decoding.class_counts) {
                ui.label(format!("  {}: {}", class, count));
            }
            match &decoding.cross_validation {
                Some(cv) => {
                    ui.label(format!(
                        "CV accuracy: {:.3} ± {:.3} ({} folds)",
                        cv.mean_score(),
                        cv.std_score(),
                        cv.fold_scores.len()
                    ));
                }
                None => {
                    ui.label(format!("Validation accuracy: {:.3}", decoding.score));
                }
            }
        }

        ui.separator();
        ui.heading("Stages");
        for m in &report.metrics {
            let color = if m.success { egui::Color32::DARK_GREEN } else { egui::Color32::RED };
            ui.colored_label(color, format!("{}: {:.1} ms", m.stage, m.processing_time_us as f64 / 1000.0));
            if let Some(err) = &m.error_message {
                ui.label(format!("  {}", err));
            }
        }
    }
}

impl eframe::App for EegApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("View", |ui| {
                    ui.checkbox(&mut self.ui_state.show_summary, "Show Summary");
                    ui.checkbox(&mut self.ui_state.plot_auto_scale, "Auto-scale Y axis");
                });
                ui.separator();
                ui.label(&self.report.name);
            });
        });

        if self.ui_state.show_summary {
            egui::SidePanel::right("summary_panel")
                .resizable(true)
                .default_width(300.0)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| self.summary_panel(ui));
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                for (tab, label) in self.tabs() {
                    ui.selectable_value(&mut self.ui_state.tab, tab, label);
                }
            });

            if !self.ui_state.plot_auto_scale {
                ui.horizontal(|ui| {
                    ui.label("Y Range:");
                    ui.add(egui::DragValue::new(&mut self.ui_state.plot_y_range[0]).speed(0.1).prefix("Min: "));
                    ui.add(egui::DragValue::new(&mut self.ui_state.plot_y_range[1]).speed(0.1).prefix("Max: "));
                });
            }
            ui.separator();

            match self.ui_state.tab {
                Tab::Evoked => {
                    let figures = &self.report.evoked;
                    if figures.is_empty() {
                        ui.label("No evoked responses");
                        return;
                    }
                    let selected = self.ui_state.selected_evoked.min(figures.len() - 1);
                    egui::ComboBox::from_id_source("evoked_condition")
                        .selected_text(&figures[selected].title)
                        .show_ui(ui, |ui| {
                            for (i, fig) in figures.iter().enumerate() {
                                ui.selectable_value(&mut self.ui_state.selected_evoked, i, &fig.title);
                            }
                        });
                    show_line_figure(ui, "evoked", &figures[selected], &self.ui_state);
                }
                Tab::Compare => {
                    if let Some(fig) = &self.report.comparison {
                        show_line_figure(ui, "compare", fig, &self.ui_state);
                    }
                }
                Tab::TimeFrequency => {
                    if let Some(fig) = &self.report.tfr {
                        show_heatmap(ui, fig);
                    }
                }
                Tab::Topomap => {
                    if let Some(fig) = &self.report.topomap {
                        show_topomap(ui, fig);
                    }
                }
                Tab::Training => {
                    if let Some((loss, accuracy)) = &self.training {
                        ui.columns(2, |columns| {
                            show_line_figure(&mut columns[0], "loss", loss, &self.ui_state);
                            show_line_figure(&mut columns[1], "accuracy", accuracy, &self.ui_state);
                        });
                    }
                }
            }
        });
    }
}
