//! Figure rendering and UI state

use eeg_processing::{HeatmapFigure, LineFigure, TopomapFigure};
use egui::{Color32, Pos2, Rect, Sense, Stroke, Vec2};
use egui_plot::{Corner, Legend, Line, Plot, PlotPoints, VLine};

/// Views of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Evoked,
    Compare,
    TimeFrequency,
    Topomap,
    Training,
}

/// UI state management
#[derive(Debug)]
pub struct UiState {
    pub tab: Tab,
    pub show_summary: bool,
    /// Condition shown on the evoked tab
    pub selected_evoked: usize,
    pub plot_auto_scale: bool,
    pub plot_y_range: [f64; 2],
}

impl UiState {
    pub fn new() -> Self {
        Self {
            tab: Tab::Evoked,
            show_summary: true,
            selected_evoked: 0,
            plot_auto_scale: true,
            plot_y_range: [-10.0, 10.0],
        }
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

const PALETTE: [Color32; 8] = [
    Color32::from_rgb(31, 119, 180),
    Color32::from_rgb(255, 127, 14),
    Color32::from_rgb(44, 160, 44),
    Color32::from_rgb(214, 39, 40),
    Color32::from_rgb(148, 103, 189),
    Color32::from_rgb(140, 86, 75),
    Color32::from_rgb(227, 119, 194),
    Color32::from_rgb(127, 127, 127),
];

/// Line plot of every series in the figure
pub fn show_line_figure(ui: &mut egui::Ui, id: &str, figure: &LineFigure, state: &UiState) {
    ui.heading(&figure.title);

    let plot = Plot::new(id)
        .legend(Legend::default().position(Corner::RightTop))
        .x_axis_label(figure.x_label.clone())
        .y_axis_label(figure.y_label.clone())
        .allow_zoom(true)
        .allow_drag(true);

    let plot = if state.plot_auto_scale {
        plot
    } else {
        plot.include_y(state.plot_y_range[0]).include_y(state.plot_y_range[1])
    };

    plot.show(ui, |plot_ui| {
        for (i, series) in figure.series.iter().enumerate() {
            let points: PlotPoints = series.x.iter().zip(&series.y).map(|(&x, &y)| [x, y]).collect();
            plot_ui.line(
                Line::new(points)
                    .color(PALETTE[i % PALETTE.len()])
                    .name(&series.label),
            );
        }
        for &x in &figure.markers {
            plot_ui.vline(VLine::new(x).color(Color32::GRAY));
        }
    });
}

/// Position of `value` within `[lo, hi]`, clamped to [0, 1]
pub fn normalize(value: f64, lo: f64, hi: f64) -> f32 {
    if !(hi > lo) {
        return 0.5;
    }
    ((value - lo) / (hi - lo)).clamp(0.0, 1.0) as f32
}

/// Blue-white-red diverging colormap over [0, 1]
pub fn diverging(t: f32) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    let lerp = |a: f32, b: f32, s: f32| (a + (b - a) * s).round() as u8;
    if t < 0.5 {
        let s = t / 0.5;
        Color32::from_rgb(lerp(33.0, 247.0, s), lerp(102.0, 247.0, s), lerp(172.0, 247.0, s))
    } else {
        let s = (t - 0.5) / 0.5;
        Color32::from_rgb(lerp(247.0, 178.0, s), lerp(247.0, 24.0, s), lerp(247.0, 43.0, s))
    }
}

/// Range symmetric around zero, so zero maps to white
fn symmetric(range: Option<(f64, f64)>) -> (f64, f64) {
    let (lo, hi) = range.unwrap_or((-1.0, 1.0));
    let m = lo.abs().max(hi.abs());
    (-m, m)
}

fn colorbar(ui: &mut egui::Ui, label: &str, lo: f64, hi: f64) {
    ui.horizontal(|ui| {
        ui.label(format!("{:.3}", lo));
        let (rect, _) = ui.allocate_exact_size(Vec2::new(200.0, 12.0), Sense::hover());
        let painter = ui.painter_at(rect);
        let steps = 50;
        let w = rect.width() / steps as f32;
        for i in 0..steps {
            let x = rect.left() + i as f32 * w;
            let cell = Rect::from_min_size(Pos2::new(x, rect.top()), Vec2::new(w + 0.5, rect.height()));
            painter.rect_filled(cell, 0.0, diverging(i as f32 / (steps - 1) as f32));
        }
        ui.label(format!("{:.3}", hi));
        ui.label(label);
    });
}

/// Frequency x time image, low frequencies at the bottom
pub fn show_heatmap(ui: &mut egui::Ui, figure: &HeatmapFigure) {
    ui.heading(&figure.title);
    let (lo, hi) = symmetric(figure.value_range());
    colorbar(ui, &figure.colorbar_label, lo, hi);

    let (n_freqs, n_times) = figure.values.dim();
    if n_freqs == 0 || n_times == 0 {
        ui.label("Empty time-frequency map");
        return;
    }

    let size = Vec2::new(ui.available_width(), (ui.available_height() - 40.0).max(200.0));
    let (rect, response) = ui.allocate_exact_size(size, Sense::hover());
    let painter = ui.painter_at(rect);
    let cell = Vec2::new(rect.width() / n_times as f32, rect.height() / n_freqs as f32);

    for ((f, t), &value) in figure.values.indexed_iter() {
        let min = Pos2::new(
            rect.left() + t as f32 * cell.x,
            rect.bottom() - (f + 1) as f32 * cell.y,
        );
        let color = if value.is_finite() { diverging(normalize(value, lo, hi)) } else { Color32::BLACK };
        painter.rect_filled(Rect::from_min_size(min, cell + Vec2::splat(0.5)), 0.0, color);
    }

    // Stimulus onset
    if let (Some(&first), Some(&last)) = (figure.times.first(), figure.times.last()) {
        if first < 0.0 && last > 0.0 {
            let x = rect.left() + rect.width() * normalize(0.0, first, last);
            painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], Stroke::new(1.0, Color32::BLACK));
        }
    }

    if let Some(pos) = response.hover_pos() {
        let t = (((pos.x - rect.left()) / cell.x) as usize).min(n_times - 1);
        let f = (((rect.bottom() - pos.y) / cell.y) as usize).min(n_freqs - 1);
        response.on_hover_text(format!(
            "{:.3} s, {:.1} Hz: {:.4}",
            figure.times[t], figure.freqs[f], figure.values[[f, t]]
        ));
    }
}

/// Interpolated scalp map with sensor markers, nose up
pub fn show_topomap(ui: &mut egui::Ui, figure: &TopomapFigure) {
    ui.heading(&figure.title);
    let (lo, hi) = symmetric(figure.value_range());
    colorbar(ui, "", lo, hi);

    let n = figure.resolution();
    let side = ui.available_width().min(ui.available_height() - 40.0).max(200.0);
    let (rect, _) = ui.allocate_exact_size(Vec2::splat(side), Sense::hover());
    let painter = ui.painter_at(rect);
    let cell = side / n as f32;

    // Grid rows run from y = -1 at the bottom to y = 1 at the top
    for ((row, col), &value) in figure.grid.indexed_iter() {
        if !value.is_finite() {
            continue;
        }
        let min = Pos2::new(rect.left() + col as f32 * cell, rect.bottom() - (row + 1) as f32 * cell);
        painter.rect_filled(
            Rect::from_min_size(min, Vec2::splat(cell + 0.5)),
            0.0,
            diverging(normalize(value, lo, hi)),
        );
    }

    let center = rect.center();
    let radius = side / 2.0;
    painter.circle_stroke(center, radius, Stroke::new(2.0, Color32::DARK_GRAY));
    painter.line_segment(
        [
            Pos2::new(center.x - 0.1 * radius, rect.top()),
            Pos2::new(center.x, rect.top() - 0.08 * radius),
        ],
        Stroke::new(2.0, Color32::DARK_GRAY),
    );
    painter.line_segment(
        [
            Pos2::new(center.x, rect.top() - 0.08 * radius),
            Pos2::new(center.x + 0.1 * radius, rect.top()),
        ],
        Stroke::new(2.0, Color32::DARK_GRAY),
    );

    for (name, pos) in figure.names.iter().zip(&figure.positions) {
        let p = Pos2::new(center.x + pos[0] as f32 * radius, center.y - pos[1] as f32 * radius);
        painter.circle_filled(p, 3.0, Color32::BLACK);
        painter.text(
            p + Vec2::new(0.0, -10.0),
            egui::Align2::CENTER_CENTER,
            name,
            egui::FontId::proportional(11.0),
            Color32::BLACK,
        );
    }
}
