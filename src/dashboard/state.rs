//! Per-panel configuration owned by the dashboard and threaded into each
//! panel renderer.

use crate::compositor::ChannelSelection;
use crate::inspector::{HoverDisplay, ImageShape};
use crate::model::TrainingParams;
use crate::scale::ContrastWindow;

pub const MAX_GRID_SIDE: usize = 64;
pub const MAX_IMAGE_SIDE: usize = 64;
pub const MAX_EPOCHS: usize = 1000;

/// Settings edited in the model-control panel. Only applied while idle.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub width: usize,
    pub height: usize,
    pub seed: u64,
    pub params: TrainingParams,
}

impl ModelConfig {
    pub fn new(width: usize, height: usize, seed: u64) -> Self {
        Self {
            width: width.clamp(1, MAX_GRID_SIDE),
            height: height.clamp(1, MAX_GRID_SIDE),
            seed,
            params: TrainingParams::default(),
        }
    }
}

/// Scroll offset of a list panel, in rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub offset: usize,
}

impl ScrollState {
    /// Apply a wheel delta (positive scrolls up) and keep at least one
    /// page visible.
    pub fn scroll(&mut self, wheel_lines: f64, total: usize, visible: usize) {
        let max = total.saturating_sub(visible);
        let delta = (-wheel_lines * 3.0).round() as i64;
        let next = (self.offset as i64 + delta).clamp(0, max as i64);
        self.offset = next as usize;
    }

    pub fn clamp(&mut self, total: usize, visible: usize) {
        self.offset = self.offset.min(total.saturating_sub(visible));
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeatmapState {
    pub window: ContrastWindow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightMapState {
    pub feature: Option<usize>,
    pub window: ContrastWindow,
}

/// Hover presentation shared by every grid panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoverSettings {
    pub display: HoverDisplay,
    pub shape: ImageShape,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub config: ModelConfig,
    pub hover: HoverSettings,
    pub table: ScrollState,
    pub weights: ScrollState,
    pub umatrix: HeatmapState,
    pub weight_map: WeightMapState,
    pub hits: HeatmapState,
    pub feature_map: ChannelSelection,
    pub uncertainty_map: ChannelSelection,
}

impl DashboardState {
    pub fn new(config: ModelConfig, feature_count: usize) -> Self {
        Self {
            config,
            hover: HoverSettings::default(),
            table: ScrollState::default(),
            weights: ScrollState::default(),
            umatrix: HeatmapState::default(),
            weight_map: WeightMapState {
                feature: feature_count.checked_sub(1).map(|_| 0),
                window: ContrastWindow::default(),
            },
            hits: HeatmapState::default(),
            feature_map: ChannelSelection::initial(feature_count),
            uncertainty_map: ChannelSelection::initial(feature_count),
        }
    }

    /// Bring every feature selection into `[0, feature_count)`, or to
    /// "none" when there are no features.
    pub fn clamp_selections(&mut self, feature_count: usize) {
        self.feature_map.clamp_to(feature_count);
        self.uncertainty_map.clamp_to(feature_count);
        self.weight_map.feature = match feature_count.checked_sub(1) {
            None => None,
            Some(last) => Some(self.weight_map.feature.unwrap_or(0).min(last)),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_clamps_grid_side() {
        let config = ModelConfig::new(0, 500, 3);
        assert_eq!((config.width, config.height), (1, MAX_GRID_SIDE));
    }

    #[test]
    fn selections_follow_feature_count() {
        let mut state = DashboardState::new(ModelConfig::new(4, 4, 0), 0);
        assert_eq!(state.weight_map.feature, None);
        assert_eq!(state.feature_map, ChannelSelection::none());

        state.clamp_selections(5);
        assert_eq!(state.weight_map.feature, Some(0));
        assert_eq!(state.uncertainty_map.channels(), [Some(0), Some(1), Some(2)]);

        state.weight_map.feature = Some(4);
        state.feature_map.blue = Some(4);
        state.clamp_selections(2);
        assert_eq!(state.weight_map.feature, Some(1));
        assert_eq!(state.feature_map.blue, Some(1));
    }

    #[test]
    fn panels_keep_independent_windows() {
        let mut state = DashboardState::new(ModelConfig::new(4, 4, 0), 3);
        state.umatrix.window.set_lower(100.0);
        assert_eq!(state.hits.window.lower(), 0.0);
        assert_eq!(state.weight_map.window.lower(), 0.0);
    }

    #[test]
    fn scroll_stays_in_bounds() {
        let mut scroll = ScrollState::default();
        scroll.scroll(-2.0, 100, 10);
        assert_eq!(scroll.offset, 6);
        scroll.scroll(10.0, 100, 10);
        assert_eq!(scroll.offset, 0);
        scroll.scroll(-100.0, 100, 10);
        assert_eq!(scroll.offset, 90);
        scroll.clamp(5, 10);
        assert_eq!(scroll.offset, 0);
    }
}
