//! Panel renderers. Each draws into a [`Ui`] already placed inside its panel
//! frame and returns the hovered grid cell, if it has a grid.

use anyhow::{Result, bail, ensure};
use vello::kurbo::{Affine, BezPath, Circle, Point, Rect, RoundedRect, Stroke};
use vello::peniko::Fill;

use super::state::{
    HeatmapState, HoverSettings, MAX_EPOCHS, MAX_GRID_SIDE, MAX_IMAGE_SIDE, ModelConfig,
    ScrollState, WeightMapState,
};
use crate::compositor::{ChannelSelection, Compositor, VectorSource};
use crate::grid_view::{GridLayout, HoveredCell, gray};
use crate::inspector::HoverDisplay;
use crate::model::{Dataset, DecayFunction, Model, TrainingParams};
use crate::scale::{ContrastWindow, DEGENERATE_INTENSITY, DataRange, INTENSITY_MAX};
use crate::theme::Theme;
use crate::training::{MetricsLog, TrainingSession};
use crate::widgets::{Ui, format_number};

const MIN_TABLE_COLUMN: f64 = 56.0;
const MAX_FEATURE_WEIGHT: f64 = 2.0;

/// Model changes requested by a panel, applied after the panel pass.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action {
    Reinitialize { width: usize, height: usize, seed: u64 },
    Train(TrainingParams),
}

/// Read-only view of the frame shared by all panels.
pub(crate) struct PanelContext<'a> {
    pub model: &'a dyn Model,
    pub feature_names: &'a [String],
    pub session: Option<&'a TrainingSession>,
    pub metrics: &'a MetricsLog,
    pub has_dataset: bool,
}

impl PanelContext<'_> {
    fn is_training(&self) -> bool {
        self.session.is_some()
    }
}

pub(crate) fn model_control(
    ui: &mut Ui,
    ctx: &PanelContext,
    config: &mut ModelConfig,
    actions: &mut Vec<Action>,
) -> Result<()> {
    let training = ctx.is_training();
    ui.set_enabled(!training);

    ui.stepper("Width", &mut config.width, 1..=MAX_GRID_SIDE);
    ui.stepper("Height", &mut config.height, 1..=MAX_GRID_SIDE);
    ui.stepper_u64("Seed", &mut config.seed);
    if ui.button("Reinitialize") {
        actions.push(Action::Reinitialize {
            width: config.width,
            height: config.height,
            seed: config.seed,
        });
    }
    ui.separator();

    let params = &mut config.params;
    let mut epochs = params.epochs as f64;
    if ui.slider("Epochs", &mut epochs, 1.0..=MAX_EPOCHS as f64) {
        params.epochs = epochs.round().max(1.0) as usize;
    }
    ui.slider("Learning rate", &mut params.learning_rate, 0.001..=1.0);
    ui.slider("Rate decay", &mut params.learning_rate_decay, 0.1..=100.0);
    let max_sigma = config.width.max(config.height) as f64;
    ui.slider("Sigma", &mut params.sigma, 0.1..=max_sigma.max(1.0));
    ui.slider("Sigma decay", &mut params.sigma_decay, 0.1..=100.0);

    let labels = DecayFunction::ALL.map(DecayFunction::label);
    let mut selected = DecayFunction::ALL
        .iter()
        .position(|d| *d == params.decay)
        .unwrap_or(0);
    if ui.choice("Decay", &mut selected, &labels) {
        params.decay = DecayFunction::ALL.get(selected).copied().unwrap_or_default();
    }

    ui.set_enabled(!training && ctx.has_dataset);
    if ui.button("Train") {
        actions.push(Action::Train(config.params));
    }
    ui.set_enabled(true);

    match ctx.session {
        Some(session) => {
            let since = session.started_at.format("%H:%M:%S");
            ui.label_value("Status", &format!("Training since {since}"));
            ui.label_value(
                "Epochs",
                &format!("{} / {}", ctx.metrics.len(), session.params.epochs),
            );
        }
        None => {
            ui.label_value("Status", "Idle");
            ui.label_value("Epochs", &ctx.metrics.len().to_string());
        }
    }
    if !ctx.has_dataset {
        ui.small_label("No dataset loaded; training is disabled");
    }
    Ok(())
}

pub(crate) fn settings(ui: &mut Ui, ctx: &PanelContext, hover: &mut HoverSettings) -> Result<()> {
    let labels = HoverDisplay::ALL.map(HoverDisplay::label);
    let mut selected = HoverDisplay::ALL
        .iter()
        .position(|d| *d == hover.display)
        .unwrap_or(0);
    if ui.choice("Hover display", &mut selected, &labels) {
        hover.display = HoverDisplay::ALL.get(selected).copied().unwrap_or_default();
    }
    ui.stepper("Image width", &mut hover.shape.width, 0..=MAX_IMAGE_SIDE);
    ui.stepper("Image height", &mut hover.shape.height, 0..=MAX_IMAGE_SIDE);
    ui.small_label(&format!(
        "{} pixels, vector length {}",
        hover.shape.pixel_count(),
        ctx.model.vector_len()
    ));
    Ok(())
}

pub(crate) fn dataset_table(
    ui: &mut Ui,
    dataset: Option<&(dyn Dataset + '_)>,
    scroll: &mut ScrollState,
) -> Result<()> {
    let Some(dataset) = dataset else {
        ui.label("No dataset loaded");
        return Ok(());
    };
    let rows = dataset.row_count();
    let features = dataset.feature_count();
    ui.label_value("Rows", &format!("{rows} x {features} features"));

    let area = ui.remaining();
    let shown_cols = features.min(((area.width() / MIN_TABLE_COLUMN).floor() as usize).max(1));
    if shown_cols == 0 {
        return Ok(());
    }
    let col_w = area.width() / shown_cols as f64;
    let row_h = ui.theme.layout.row_height;
    let size = ui.theme.text.small;
    let secondary = ui.theme.text_secondary();
    let primary = ui.theme.text();

    let header = ui.allocate(row_h);
    for c in 0..shown_cols {
        let name = dataset.feature_name(c).unwrap_or("?");
        let x0 = header.x0 + c as f64 * col_w;
        let cell = Rect::new(x0, header.y0, x0 + col_w - 4.0, header.y1);
        ui.text_in(cell, name, secondary, size);
    }

    let body = ui.remaining();
    let visible = (body.height() / row_h).floor().max(0.0) as usize;
    if ui.input.wheel != 0.0 && ui.input.hovers(body) {
        scroll.scroll(ui.input.wheel, rows, visible);
    }
    scroll.clamp(rows, visible);

    for (line, r) in (scroll.offset..rows.min(scroll.offset + visible)).enumerate() {
        let Some(values) = dataset.row(r) else {
            bail!("row {r} of {rows} is missing");
        };
        let y0 = body.y0 + line as f64 * row_h;
        for (c, v) in values.iter().take(shown_cols).enumerate() {
            let x0 = body.x0 + c as f64 * col_w;
            let cell = Rect::new(x0, y0, x0 + col_w - 4.0, y0 + row_h);
            ui.text_in(cell, &format_number(*v), primary, size);
        }
    }
    Ok(())
}

pub(crate) fn feature_weights(
    ui: &mut Ui,
    dataset: Option<&mut (dyn Dataset + '_)>,
    scroll: &mut ScrollState,
) -> Result<()> {
    let Some(dataset) = dataset else {
        ui.label("No dataset loaded");
        return Ok(());
    };
    let count = dataset.feature_count();
    if count == 0 {
        ui.label("Dataset has no features");
        return Ok(());
    }

    let area = ui.remaining();
    let visible = ((area.height() / ui.row_pitch()).floor() as usize).max(1);
    if ui.input.wheel != 0.0 && ui.input.hovers(area) {
        scroll.scroll(ui.input.wheel, count, visible);
    }
    scroll.clamp(count, visible);

    for i in scroll.offset..count.min(scroll.offset + visible) {
        let name = dataset.feature_name(i).map_or_else(|| format!("f{i}"), str::to_string);
        let mut weight = dataset.feature_weight(i);
        if ui.slider(&name, &mut weight, 0.0..=MAX_FEATURE_WEIGHT) {
            dataset.set_feature_weight(i, weight);
        }
    }
    Ok(())
}

/// Square cells, centered horizontally in `area`.
pub(crate) fn fit_surface(area: Rect, cols: usize, rows: usize) -> Rect {
    if cols == 0 || rows == 0 {
        return Rect::from_origin_size(area.origin(), (0.0, 0.0));
    }
    let cell = (area.width() / cols as f64)
        .min(area.height() / rows as f64)
        .max(0.0);
    let w = cell * cols as f64;
    let x0 = area.x0 + (area.width() - w) / 2.0;
    Rect::new(x0, area.y0, x0 + w, area.y0 + cell * rows as f64)
}

fn contrast_sliders(ui: &mut Ui, window: &mut ContrastWindow) {
    let mut lower = window.lower();
    if ui.slider("Lower", &mut lower, 0.0..=INTENSITY_MAX) {
        window.set_lower(lower);
    }
    let mut upper = window.upper();
    if ui.slider("Upper", &mut upper, 0.0..=INTENSITY_MAX) {
        window.set_upper(upper);
    }
}

/// Grayscale heatmap of one value per cell through `window`.
fn heatmap(
    ui: &mut Ui,
    values: &[f64],
    cols: usize,
    rows: usize,
    window: &mut ContrastWindow,
) -> Result<Option<HoveredCell>> {
    ensure!(
        values.len() == cols * rows,
        "grid has {} values, expected {cols}x{rows}",
        values.len()
    );
    contrast_sliders(ui, window);
    let range = DataRange::from_values(values.iter().copied());
    match range {
        Some(r) => {
            let text = format!("range {} .. {}", format_number(r.min), format_number(r.max));
            ui.small_label(&text);
        }
        None => ui.small_label("no values"),
    }

    let layout = GridLayout::new(cols, rows, fit_surface(ui.remaining(), cols, rows));
    let window = *window;
    layout.draw(ui.scene, |_, _, i| {
        let level = match (range, values.get(i)) {
            (Some(r), Some(v)) => window.apply(*v, r),
            _ => DEGENERATE_INTENSITY,
        };
        gray(level)
    });
    Ok(layout.hovered(ui.input))
}

pub(crate) fn umatrix(
    ui: &mut Ui,
    ctx: &PanelContext,
    state: &mut HeatmapState,
) -> Result<Option<HoveredCell>> {
    let model = ctx.model;
    heatmap(ui, &model.umatrix(), model.width(), model.height(), &mut state.window)
}

pub(crate) fn weight_map(
    ui: &mut Ui,
    ctx: &PanelContext,
    state: &mut WeightMapState,
) -> Result<Option<HoveredCell>> {
    feature_choice(ui, "Feature", &mut state.feature, ctx.feature_names);
    let Some(feature) = state.feature else {
        ui.label("No features");
        return Ok(None);
    };
    let model = ctx.model;
    let values: Vec<f64> = (0..model.cell_count())
        .map(|i| model.weight_at(i, feature).unwrap_or(f64::NAN))
        .collect();
    heatmap(ui, &values, model.width(), model.height(), &mut state.window)
}

pub(crate) fn bmu_hits(
    ui: &mut Ui,
    ctx: &PanelContext,
    state: &mut HeatmapState,
) -> Result<Option<HoveredCell>> {
    let model = ctx.model;
    let hits: Vec<f64> = model.hits().into_iter().map(f64::from).collect();
    heatmap(ui, &hits, model.width(), model.height(), &mut state.window)
}

/// Position of sample `i` of `n` inside `plot`, newest on the right.
pub(crate) fn plot_point(i: usize, n: usize, value: f64, range: DataRange, plot: Rect) -> Point {
    let t = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.5 };
    let v = if range.is_degenerate() {
        0.5
    } else {
        ((value - range.min) / (range.max - range.min)).clamp(0.0, 1.0)
    };
    Point::new(plot.x0 + t * plot.width(), plot.y1 - v * plot.height())
}

pub(crate) fn metrics(ui: &mut Ui, ctx: &PanelContext) -> Result<()> {
    let history = ctx.metrics.snapshot();
    ui.label_value("Epochs", &history.len().to_string());
    let latest = history.last().map_or_else(|| "-".to_string(), |v| format_number(*v));
    ui.label_value("Latest", &latest);
    let range = DataRange::from_values(history.iter().copied());
    let best = range.map_or_else(|| "-".to_string(), |r| format_number(r.min));
    ui.label_value("Min", &best);

    let plot = ui.remaining();
    if plot.height() <= 0.0 {
        return Ok(());
    }
    let background = RoundedRect::from_rect(plot, 3.0);
    let fill = Theme::color(ui.theme.colors.control);
    ui.scene.fill(Fill::NonZero, Affine::IDENTITY, fill, None, &background);

    let Some(range) = range else {
        return Ok(());
    };
    let inner = plot.inset(-4.0);
    let line = Theme::color(ui.theme.colors.plot_line);
    let n = history.len();
    if n == 1 {
        let p = plot_point(0, 1, history[0], range, inner);
        ui.scene.fill(Fill::NonZero, Affine::IDENTITY, line, None, &Circle::new(p, 3.0));
        return Ok(());
    }
    let mut path = BezPath::new();
    for (i, v) in history.iter().enumerate() {
        let p = plot_point(i, n, *v, range, inner);
        if i == 0 {
            path.move_to(p);
        } else {
            path.line_to(p);
        }
    }
    ui.scene.stroke(&Stroke::new(2.0), Affine::IDENTITY, line, None, &path);
    Ok(())
}

fn feature_choice(ui: &mut Ui, label: &str, slot: &mut Option<usize>, names: &[String]) {
    match slot {
        None => ui.label_value(label, "none"),
        Some(index) => {
            let labels: Vec<&str> = names.iter().map(String::as_str).collect();
            ui.choice(label, index, &labels);
        }
    }
}

pub(crate) fn composite(
    ui: &mut Ui,
    ctx: &PanelContext,
    selection: &mut ChannelSelection,
    source: VectorSource,
) -> Result<Option<HoveredCell>> {
    for (channel, label) in ["Red", "Green", "Blue"].into_iter().enumerate() {
        if let Some(slot) = selection.channel_mut(channel) {
            feature_choice(ui, label, slot, ctx.feature_names);
        }
    }
    let model = ctx.model;
    let (cols, rows) = (model.width(), model.height());
    let compositor = Compositor::prepare(model, source, selection);
    let layout = GridLayout::new(cols, rows, fit_surface(ui.remaining(), cols, rows));
    layout.draw(ui.scene, |_, _, i| compositor.composite(model, i));
    Ok(layout.hovered(ui.input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::FrameInput;
    use crate::model::{InMemoryDataset, Som};
    use crate::text::TextStyle;
    use crate::widgets::UiMemory;
    use vello::Scene;

    struct Fixture {
        scene: Scene,
        theme: Theme,
        text: TextStyle,
        memory: UiMemory,
        input: FrameInput,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                scene: Scene::new(),
                theme: Theme::default(),
                text: TextStyle::default(),
                memory: UiMemory::default(),
                input: FrameInput::default(),
            }
        }

        fn ui(&mut self) -> Ui<'_> {
            Ui::new(
                &mut self.scene,
                &self.theme,
                &self.text,
                &self.input,
                &mut self.memory,
                "panel",
                Rect::new(0.0, 0.0, 300.0, 400.0),
            )
        }
    }

    fn context<'a>(
        model: &'a Som,
        names: &'a [String],
        metrics: &'a MetricsLog,
    ) -> PanelContext<'a> {
        PanelContext {
            model,
            feature_names: names,
            session: None,
            metrics,
            has_dataset: true,
        }
    }

    #[test]
    fn fit_surface_keeps_cells_square() {
        let area = Rect::new(0.0, 0.0, 300.0, 100.0);
        let surface = fit_surface(area, 3, 2);
        assert_eq!(surface, Rect::new(75.0, 0.0, 225.0, 100.0));
        assert_eq!(fit_surface(area, 0, 2).area(), 0.0);
    }

    #[test]
    fn plot_points_span_the_plot() {
        let plot = Rect::new(0.0, 0.0, 100.0, 50.0);
        let range = DataRange::new(1.0, 3.0);
        assert_eq!(plot_point(0, 3, 3.0, range, plot), Point::new(0.0, 0.0));
        assert_eq!(plot_point(2, 3, 1.0, range, plot), Point::new(100.0, 50.0));
        let flat = DataRange::new(2.0, 2.0);
        assert_eq!(plot_point(0, 1, 2.0, flat, plot), Point::new(50.0, 25.0));
    }

    #[test]
    fn heatmap_rejects_mismatched_grid() {
        let mut fx = Fixture::new();
        let mut window = ContrastWindow::default();
        let err = heatmap(&mut fx.ui(), &[1.0, 2.0], 3, 2, &mut window).unwrap_err();
        assert!(err.to_string().contains("expected 3x2"));
    }

    #[test]
    fn heatmap_reports_hovered_cell() {
        let som = Som::from_fn(3, 2, 1, |cell, _| cell as f64);
        let names = vec!["x".to_string()];
        let metrics = MetricsLog::default();
        let ctx = context(&som, &names, &metrics);

        let mut fx = Fixture::new();
        // The feature row, two contrast sliders and the range label take the
        // top 99px; the 3x2 grid below has 100px cells.
        fx.input.pointer_moved(Point::new(250.0, 250.0));
        let mut state = WeightMapState {
            feature: Some(0),
            window: ContrastWindow::default(),
        };
        let hovered = weight_map(&mut fx.ui(), &ctx, &mut state).unwrap();
        let cell = hovered.expect("pointer is over the grid");
        assert_eq!((cell.x, cell.y, cell.index), (2, 1, 5));
    }

    #[test]
    fn weight_map_without_features_draws_nothing() {
        let som = Som::from_fn(2, 2, 0, |_, _| 0.0);
        let metrics = MetricsLog::default();
        let ctx = context(&som, &[], &metrics);
        let mut fx = Fixture::new();
        let mut state = WeightMapState::default();
        assert_eq!(weight_map(&mut fx.ui(), &ctx, &mut state).unwrap(), None);
    }

    /// Click every row of the model panel at the label, the stepper buttons
    /// and the middle, one frame per click.
    fn click_rows(ctx: &PanelContext<'_>, config: &mut ModelConfig) -> Vec<Action> {
        let label_w = 300.0 * Theme::default().layout.label_width_frac;
        let mut all = Vec::new();
        for row in 0..20 {
            for x in [label_w + 8.0, 150.0, 290.0] {
                let mut fx = Fixture::new();
                fx.input.pointer_moved(Point::new(x, row as f64 * 26.0 + 10.0));
                fx.input.button(true);
                let mut actions = Vec::new();
                model_control(&mut fx.ui(), ctx, config, &mut actions).unwrap();
                all.extend(actions);
            }
        }
        all
    }

    #[test]
    fn train_button_requires_dataset() {
        let som = Som::from_fn(2, 2, 1, |_, _| 0.0);
        let names = vec!["x".to_string()];
        let metrics = MetricsLog::default();
        let mut config = ModelConfig::new(2, 2, 0);

        let ctx = context(&som, &names, &metrics);
        let actions = click_rows(&ctx, &mut config);
        assert!(actions.contains(&Action::Train(config.params)));
        assert!(actions.iter().any(|a| matches!(a, Action::Reinitialize { .. })));
        assert_ne!(config, ModelConfig::new(2, 2, 0));

        let no_data = PanelContext { has_dataset: false, ..context(&som, &names, &metrics) };
        let actions = click_rows(&no_data, &mut config);
        assert!(!actions.iter().any(|a| matches!(a, Action::Train(_))));
    }

    #[test]
    fn controls_are_inert_while_training() {
        let som = Som::from_fn(2, 2, 1, |_, _| 0.0);
        let names = vec!["x".to_string()];
        let metrics = MetricsLog::default();
        let session = TrainingSession {
            params: TrainingParams::default(),
            rows: 10,
            started_at: chrono::Local::now(),
        };
        let running = PanelContext {
            session: Some(&session),
            ..context(&som, &names, &metrics)
        };

        let mut config = ModelConfig::new(2, 2, 0);
        let actions = click_rows(&running, &mut config);
        assert!(actions.is_empty(), "{actions:?}");
        assert_eq!(config, ModelConfig::new(2, 2, 0));
    }

    #[test]
    fn empty_dataset_table_renders() {
        let data = InMemoryDataset::new(vec!["a".into(), "b".into()], Vec::new());
        let mut fx = Fixture::new();
        let mut scroll = ScrollState::default();
        dataset_table(&mut fx.ui(), Some(&data), &mut scroll).unwrap();
        dataset_table(&mut fx.ui(), None, &mut scroll).unwrap();
        assert_eq!(scroll.offset, 0);
    }

    #[test]
    fn feature_weight_slider_writes_dataset() {
        let mut data = InMemoryDataset::new(vec!["a".into()], vec![vec![1.0]]);
        let mut fx = Fixture::new();
        // First slider row; clicking the track start sets the weight to 0.
        let track_x = 300.0 * fx.theme.layout.label_width_frac + 1.0;
        fx.input.pointer_moved(Point::new(track_x, 10.0));
        fx.input.button(true);
        let mut scroll = ScrollState::default();
        feature_weights(&mut fx.ui(), Some(&mut data), &mut scroll).unwrap();
        assert!(data.feature_weight(0) < 0.05);
    }
}
