//! Seams to the map and the data it is trained on.
//!
//! The dashboard only talks to [`Model`] and [`Dataset`]. [`Som`] and
//! [`InMemoryDataset`] are the concrete implementations the binary runs with.

mod cells;
mod dataset;
mod som;

pub use cells::AtomicCells;
pub use dataset::{DemoDataset, InMemoryDataset};
pub use som::Som;

use anyhow::Result;

use crate::scale::DataRange;
use crate::training::MetricsLog;

/// Schedule used to shrink the learning rate and neighbourhood radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecayFunction {
    #[default]
    Exponential,
    Inverse,
    Linear,
}

impl DecayFunction {
    pub const ALL: [DecayFunction; 3] = [Self::Exponential, Self::Inverse, Self::Linear];

    pub fn label(self) -> &'static str {
        match self {
            Self::Exponential => "exponential",
            Self::Inverse => "inverse",
            Self::Linear => "linear",
        }
    }

    /// Value of a parameter starting at `initial` after `epoch` of `epochs`.
    pub fn apply(self, initial: f64, decay: f64, epoch: usize, epochs: usize) -> f64 {
        let t = epoch as f64;
        let decay = decay.max(f64::EPSILON);
        let value = match self {
            Self::Exponential => initial * (-t / decay).exp(),
            Self::Inverse => initial / (1.0 + t / decay),
            Self::Linear => initial * (1.0 - t / epochs.max(1) as f64),
        };
        value.max(initial * 1e-3)
    }
}

/// Parameters captured by value when a training run is launched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingParams {
    pub epochs: usize,
    pub learning_rate: f64,
    pub learning_rate_decay: f64,
    pub sigma: f64,
    pub sigma_decay: f64,
    pub decay: DecayFunction,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 40,
            learning_rate: 0.5,
            learning_rate_decay: 10.0,
            sigma: 4.0,
            sigma_decay: 10.0,
            decay: DecayFunction::Exponential,
        }
    }
}

/// Rows and feature weights copied out of a [`Dataset`] for a training run.
///
/// The worker owns this copy, so the dashboard may keep editing the dataset's
/// weights while a run is in flight.
#[derive(Debug, Clone, Default)]
pub struct TrainingData {
    pub rows: Vec<Vec<f64>>,
    pub feature_weights: Vec<f64>,
}

impl TrainingData {
    pub fn capture(dataset: &dyn Dataset) -> Self {
        let rows = (0..dataset.row_count())
            .filter_map(|i| dataset.row(i).map(<[f64]>::to_vec))
            .collect();
        let feature_weights = (0..dataset.feature_count())
            .map(|i| dataset.feature_weight(i))
            .collect();
        Self { rows, feature_weights }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A trained (or training) grid of neuron and sigma vectors.
///
/// Readers may call any accessor while `train` runs on another thread; they
/// observe whatever element values have been written so far.
pub trait Model: Send + Sync {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    /// Length of every neuron and sigma vector.
    fn vector_len(&self) -> usize;

    fn cell_count(&self) -> usize {
        self.width() * self.height()
    }

    fn neuron(&self, index: usize) -> Option<Vec<f64>>;
    fn sigma(&self, index: usize) -> Option<Vec<f64>>;
    fn weight_at(&self, index: usize, feature: usize) -> Option<f64>;
    fn sigma_at(&self, index: usize, feature: usize) -> Option<f64>;

    /// Min/max of one feature over all current weights.
    fn weight_range(&self, feature: usize) -> Option<DataRange> {
        DataRange::from_values((0..self.cell_count()).filter_map(|i| self.weight_at(i, feature)))
    }

    /// Min/max of one feature over all current sigmas.
    fn sigma_range(&self, feature: usize) -> Option<DataRange> {
        DataRange::from_values((0..self.cell_count()).filter_map(|i| self.sigma_at(i, feature)))
    }

    /// Per-cell count of rows whose best-matching unit is that cell.
    fn hits(&self) -> Vec<u32>;

    /// Per-cell mean distance to the 4-connected neighbours.
    fn umatrix(&self) -> Vec<f64>;

    /// Run a complete training session, appending one error value per epoch.
    fn train(&self, data: &TrainingData, params: &TrainingParams, metrics: &MetricsLog)
    -> Result<()>;

    /// Replace the grid with freshly seeded weights of a new shape.
    fn reinitialize(&mut self, width: usize, height: usize, seed: u64);
}

/// Tabular data the map is trained on.
pub trait Dataset {
    fn feature_count(&self) -> usize;
    fn feature_name(&self, index: usize) -> Option<&str>;
    fn row_count(&self) -> usize;
    fn row(&self, index: usize) -> Option<&[f64]>;
    fn feature_weight(&self, index: usize) -> f64;
    fn set_feature_weight(&mut self, index: usize, weight: f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_functions_start_at_initial_and_shrink() {
        for decay in DecayFunction::ALL {
            let start = decay.apply(2.0, 5.0, 0, 20);
            let later = decay.apply(2.0, 5.0, 10, 20);
            assert!((start - 2.0).abs() < 1e-12, "{decay:?}");
            assert!(later < start, "{decay:?}");
            assert!(decay.apply(2.0, 5.0, 20, 20) > 0.0, "{decay:?}");
        }
    }

    #[test]
    fn zero_decay_does_not_divide_by_zero() {
        let v = DecayFunction::Inverse.apply(1.0, 0.0, 3, 10);
        assert!(v.is_finite());
    }

    #[test]
    fn capture_copies_rows_and_weights() {
        let mut ds = InMemoryDataset::new(
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        );
        ds.set_feature_weight(1, 0.5);
        let data = TrainingData::capture(&ds);
        assert_eq!(data.rows, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(data.feature_weights, vec![1.0, 0.5]);
    }
}
