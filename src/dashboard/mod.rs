//! Top-level composition of the dashboard.
//!
//! [`Dashboard::render_frame`] is the only entry point the host calls. Each
//! frame it notices finished training runs, runs every panel in a fixed order,
//! draws the hover overlay last and then applies the model changes the panels
//! asked for.

mod panels;
mod state;

pub use state::{
    DashboardState, HeatmapState, HoverSettings, MAX_EPOCHS, MAX_GRID_SIDE, MAX_IMAGE_SIDE,
    ModelConfig, ScrollState, WeightMapState,
};

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use vello::Scene;
use vello::kurbo::{Affine, Rect};
use vello::peniko::Fill;
use tracing::{debug, error, info, warn};

use crate::compositor::VectorSource;
use crate::input::FrameInput;
use crate::inspector::{HoverInspector, HoverTarget, feature_names};
use crate::model::{Dataset, Model};
use crate::text::TextStyle;
use crate::theme::{LayoutTokens, Theme};
use crate::training::{TrainOutcome, TrainingCoordinator};
use crate::widgets::{Ui, UiMemory, panel_frame};

use panels::{Action, PanelContext};

/// Height of the title bar relative to a panel header.
const TITLE_BAR_SCALE: f64 = 1.5;

/// Panels in on-screen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelKind {
    ModelControl,
    Settings,
    DatasetTable,
    FeatureWeights,
    UMatrix,
    WeightMap,
    BmuHits,
    Metrics,
    FeatureValues,
    Uncertainty,
}

impl PanelKind {
    pub const ALL: [PanelKind; 10] = [
        Self::ModelControl,
        Self::Settings,
        Self::DatasetTable,
        Self::FeatureWeights,
        Self::UMatrix,
        Self::WeightMap,
        Self::BmuHits,
        Self::Metrics,
        Self::FeatureValues,
        Self::Uncertainty,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::ModelControl => "Model",
            Self::Settings => "Settings",
            Self::DatasetTable => "Dataset",
            Self::FeatureWeights => "Feature weights",
            Self::UMatrix => "U-matrix",
            Self::WeightMap => "Weight map",
            Self::BmuHits => "BMU hits",
            Self::Metrics => "Training error",
            Self::FeatureValues => "Feature values (RGB)",
            Self::Uncertainty => "Uncertainty (RGB)",
        }
    }
}

/// Columns used for `count` panels.
pub fn panel_columns(count: usize) -> usize {
    match count {
        0 | 1 => 1,
        2..=4 => 2,
        5..=9 => 3,
        _ => 4,
    }
}

/// Panel rectangles below a title bar of height `top`, filled row by row.
pub fn panel_rects(
    count: usize,
    width: f64,
    height: f64,
    top: f64,
    layout: &LayoutTokens,
) -> Vec<Rect> {
    let cols = panel_columns(count);
    let rows = count.div_ceil(cols).max(1);
    let content_top = top + layout.margin;
    let content_width = (width - 2.0 * layout.margin).max(0.0);
    let content_height = (height - content_top - layout.margin).max(0.0);
    let gaps_x = (cols as f64 - 1.0) * layout.panel_gap;
    let gaps_y = (rows as f64 - 1.0) * layout.panel_gap;
    let panel_width = ((content_width - gaps_x) / cols as f64).max(0.0);
    let panel_height = ((content_height - gaps_y) / rows as f64).max(0.0);

    (0..count)
        .map(|idx| {
            let (col, row) = (idx % cols, idx / cols);
            let x = layout.margin + col as f64 * (panel_width + layout.panel_gap);
            let y = content_top + row as f64 * (panel_height + layout.panel_gap);
            Rect::new(x, y, x + panel_width, y + panel_height)
        })
        .collect()
}

/// Last logged error per panel, so a persistent failure is logged once.
#[derive(Debug, Default)]
struct PanelErrors {
    last: HashMap<PanelKind, String>,
}

impl PanelErrors {
    /// Returns `true` when the message differs from the last one logged.
    fn record(&mut self, panel: PanelKind, err: &anyhow::Error) -> bool {
        let message = format!("{err:#}");
        if self.last.get(&panel) == Some(&message) {
            return false;
        }
        warn!(target: "dashboard", panel = panel.title(), "Panel skipped: {}", message);
        self.last.insert(panel, message);
        true
    }

    fn clear(&mut self, panel: PanelKind) {
        self.last.remove(&panel);
    }
}

pub struct Dashboard {
    theme: Theme,
    text: TextStyle,
    memory: UiMemory,
    coordinator: TrainingCoordinator,
    state: DashboardState,
    errors: PanelErrors,
}

impl Dashboard {
    pub fn new(
        coordinator: TrainingCoordinator,
        state: DashboardState,
        theme: Theme,
        text: TextStyle,
    ) -> Self {
        Self {
            theme,
            text,
            memory: UiMemory::default(),
            coordinator,
            state,
            errors: PanelErrors::default(),
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DashboardState {
        &mut self.state
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn coordinator(&self) -> &TrainingCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut TrainingCoordinator {
        &mut self.coordinator
    }

    /// Draw one frame and apply whatever the panels requested.
    ///
    /// A panic anywhere in the frame is logged and the frame is dropped; the
    /// next call starts clean.
    pub fn render_frame(
        &mut self,
        scene: &mut Scene,
        width: f64,
        height: f64,
        input: &FrameInput,
        model: &mut Arc<dyn Model>,
        dataset: Option<&mut (dyn Dataset + '_)>,
    ) {
        let viewport = Rect::new(0.0, 0.0, width, height);
        scene.fill(Fill::NonZero, Affine::IDENTITY, self.theme.background(), None, &viewport);

        let frame = catch_unwind(AssertUnwindSafe(|| {
            self.frame(scene, viewport, input, model, dataset);
        }));
        if let Err(panic) = frame {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(target: "dashboard", "Render pass panicked: {}", message);
        }
        self.memory.end_frame(input);
    }

    fn frame(
        &mut self,
        scene: &mut Scene,
        viewport: Rect,
        input: &FrameInput,
        model: &mut Arc<dyn Model>,
        mut dataset: Option<&mut (dyn Dataset + '_)>,
    ) {
        if self.coordinator.poll() {
            info!(
                target: "dashboard",
                epochs = self.coordinator.metrics().len(),
                "Training finished"
            );
        }
        self.state.clamp_selections(model.vector_len());

        let title_height = self.draw_title_bar(scene, viewport.width(), &**model);
        let rects = panel_rects(
            PanelKind::ALL.len(),
            viewport.width(),
            viewport.height(),
            title_height,
            &self.theme.layout,
        );
        let (actions, hover) =
            self.draw_panels(scene, input, &**model, dataset.as_deref_mut(), &rects);

        if let Some(target) = hover {
            let inspector = HoverInspector {
                theme: &self.theme,
                text: &self.text,
                display: self.state.hover.display,
                shape: self.state.hover.shape,
            };
            inspector.draw(scene, &**model, dataset.as_deref(), &target, viewport);
        }

        for action in actions {
            self.apply(action, model, dataset.as_deref());
        }
    }

    fn draw_title_bar(&self, scene: &mut Scene, width: f64, model: &dyn Model) -> f64 {
        let height = self.theme.layout.header_height * TITLE_BAR_SCALE;
        let bar = Rect::new(0.0, 0.0, width, height);
        let header = Theme::color(self.theme.colors.header);
        scene.fill(Fill::NonZero, Affine::IDENTITY, header, None, &bar);

        let size = self.theme.text.title * 1.3;
        let baseline = (height + size * 0.7) / 2.0;
        let margin = self.theme.layout.margin;
        self.text.draw(scene, margin, baseline, "SOM EXPLORER", self.theme.text(), size);

        let status = match self.coordinator.session() {
            Some(session) => format!(
                "{}x{} map | training {}/{}",
                model.width(),
                model.height(),
                self.coordinator.metrics().len(),
                session.params.epochs
            ),
            None => format!("{}x{} map | idle", model.width(), model.height()),
        };
        let body = self.theme.text.body;
        let w = self.text.width(&status, body);
        self.text.draw(scene, width - margin - w, baseline, &status, self.theme.text(), body);
        height
    }

    fn draw_panels(
        &mut self,
        scene: &mut Scene,
        input: &FrameInput,
        model: &dyn Model,
        mut dataset: Option<&mut (dyn Dataset + '_)>,
        rects: &[Rect],
    ) -> (Vec<Action>, Option<HoverTarget>) {
        let Self {
            theme,
            text,
            memory,
            coordinator,
            state,
            errors,
        } = self;

        let names = feature_names(model.vector_len(), dataset.as_deref());
        let ctx = PanelContext {
            model,
            feature_names: &names,
            session: coordinator.session(),
            metrics: coordinator.metrics(),
            has_dataset: dataset.is_some(),
        };

        let mut actions = Vec::new();
        let mut hover = None;
        for (kind, rect) in PanelKind::ALL.into_iter().zip(rects.iter().copied()) {
            let content = panel_frame(scene, theme, text, rect, kind.title());
            let mut ui = Ui::new(scene, theme, text, input, memory, kind.title(), content);

            let result = match kind {
                PanelKind::ModelControl => {
                    panels::model_control(&mut ui, &ctx, &mut state.config, &mut actions)
                        .map(|()| None)
                }
                PanelKind::Settings => {
                    panels::settings(&mut ui, &ctx, &mut state.hover).map(|()| None)
                }
                PanelKind::DatasetTable => {
                    panels::dataset_table(&mut ui, dataset.as_deref(), &mut state.table)
                        .map(|()| None)
                }
                PanelKind::FeatureWeights => {
                    panels::feature_weights(&mut ui, dataset.as_deref_mut(), &mut state.weights)
                        .map(|()| None)
                }
                PanelKind::UMatrix => panels::umatrix(&mut ui, &ctx, &mut state.umatrix),
                PanelKind::WeightMap => panels::weight_map(&mut ui, &ctx, &mut state.weight_map),
                PanelKind::BmuHits => panels::bmu_hits(&mut ui, &ctx, &mut state.hits),
                PanelKind::Metrics => panels::metrics(&mut ui, &ctx).map(|()| None),
                PanelKind::FeatureValues => {
                    panels::composite(&mut ui, &ctx, &mut state.feature_map, VectorSource::Weights)
                }
                PanelKind::Uncertainty => {
                    let selection = &mut state.uncertainty_map;
                    panels::composite(&mut ui, &ctx, selection, VectorSource::Sigmas)
                }
            };

            match result {
                Ok(cell) => {
                    errors.clear(kind);
                    if let Some(cell) = cell {
                        hover = Some(HoverTarget {
                            cell,
                            with_sigma: kind == PanelKind::Uncertainty,
                        });
                    }
                }
                Err(err) => {
                    errors.record(kind, &err);
                    let color = Theme::color(ui.theme.colors.warning);
                    let size = ui.theme.text.small;
                    let row = ui.row();
                    ui.text_in(row, &format!("{err:#}"), color, size);
                }
            }
        }
        (actions, hover)
    }

    fn apply(&mut self, action: Action, model: &mut Arc<dyn Model>, dataset: Option<&dyn Dataset>) {
        match action {
            Action::Train(params) => {
                let outcome = self.coordinator.request_training(model, dataset, params);
                if outcome != TrainOutcome::Started {
                    debug!(target: "dashboard", ?outcome, "Train request not started");
                }
            }
            Action::Reinitialize { width, height, seed } => {
                if self.coordinator.is_training() {
                    debug!(target: "dashboard", "Reinitialize ignored while training");
                    return;
                }
                match Arc::get_mut(model) {
                    Some(model) => {
                        model.reinitialize(width, height, seed);
                        info!(target: "dashboard", width, height, seed, "Map reinitialized");
                    }
                    None => warn!(target: "dashboard", "Map is still shared; reinitialize skipped"),
                }
            }
        }
    }
}
