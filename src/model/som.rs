//! Rectangular online self-organizing map.

use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Result, bail};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use super::{AtomicCells, Model, TrainingData, TrainingParams};
use crate::training::MetricsLog;

/// Neighbours further than this many radii from the BMU are not updated.
const NEIGHBOURHOOD_CUTOFF: f64 = 3.0;

/// A `width x height` grid of neurons stored row-major.
///
/// Weights, sigmas and hit counts are atomic so the render loop can read them
/// while a training run writes. Their lengths never change after construction;
/// a new shape needs [`Model::reinitialize`], which takes `&mut self`.
pub struct Som {
    width: usize,
    height: usize,
    dim: usize,
    seed: u64,
    weights: AtomicCells,
    sigmas: AtomicCells,
    hits: Box<[AtomicU32]>,
}

impl Som {
    /// Create a map with weights drawn uniformly from `[0, 1)`.
    pub fn new(width: usize, height: usize, dim: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut som = Self::from_fn(width, height, dim, |_, _| rng.r#gen::<f64>());
        som.seed = seed;
        som
    }

    /// Create a map whose weight for `(cell, feature)` is `f(cell, feature)`.
    pub fn from_fn(
        width: usize,
        height: usize,
        dim: usize,
        mut f: impl FnMut(usize, usize) -> f64,
    ) -> Self {
        let cells = width * height;
        let weights = AtomicCells::from_fn(cells * dim, |i| f(i / dim.max(1), i % dim.max(1)));
        Self {
            width,
            height,
            dim,
            seed: 0,
            weights,
            sigmas: AtomicCells::filled(cells * dim, 0.0),
            hits: (0..cells).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    fn coords(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    /// Index of the closest neuron under feature-weighted squared distance,
    /// with that distance.
    fn best_match(&self, row: &[f64], feature_weights: &[f64]) -> Option<(usize, f64)> {
        (0..self.cell_count())
            .map(|cell| {
                let base = cell * self.dim;
                let d2: f64 = row
                    .iter()
                    .zip(feature_weights)
                    .enumerate()
                    .map(|(f, (x, fw))| {
                        let w = self.weights.get(base + f).unwrap_or_default();
                        fw * (x - w) * (x - w)
                    })
                    .sum();
                (cell, d2)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn update_neighbourhood(&self, bmu: usize, row: &[f64], learning_rate: f64, radius: f64) {
        let (bx, by) = self.coords(bmu);
        let reach = (radius * NEIGHBOURHOOD_CUTOFF).ceil() as isize;
        let two_r2 = 2.0 * radius * radius;

        let x0 = (bx as isize - reach).max(0) as usize;
        let x1 = (bx as isize + reach).min(self.width as isize - 1) as usize;
        let y0 = (by as isize - reach).max(0) as usize;
        let y1 = (by as isize + reach).min(self.height as isize - 1) as usize;

        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f64 - bx as f64;
                let dy = y as f64 - by as f64;
                let influence = learning_rate * (-(dx * dx + dy * dy) / two_r2).exp();
                if influence < 1e-6 {
                    continue;
                }
                let base = (y * self.width + x) * self.dim;
                for (f, x_f) in row.iter().enumerate() {
                    let i = base + f;
                    let w = self.weights.get(i).unwrap_or_default();
                    let s = self.sigmas.get(i).unwrap_or_default();
                    let w_new = w + influence * (x_f - w);
                    self.weights.set(i, w_new);
                    self.sigmas.set(i, s + influence * ((x_f - w_new).abs() - s));
                }
            }
        }
    }

    fn recount_hits(&self, data: &TrainingData) {
        let mut counts = vec![0u32; self.cell_count()];
        for row in &data.rows {
            if let Some((bmu, _)) = self.best_match(row, &data.feature_weights) {
                counts[bmu] += 1;
            }
        }
        for (slot, count) in self.hits.iter().zip(counts) {
            slot.store(count, Ordering::Relaxed);
        }
    }
}

impl Model for Som {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn vector_len(&self) -> usize {
        self.dim
    }

    fn neuron(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.cell_count() {
            return None;
        }
        self.weights.read_range(index * self.dim, self.dim)
    }

    fn sigma(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.cell_count() {
            return None;
        }
        self.sigmas.read_range(index * self.dim, self.dim)
    }

    fn weight_at(&self, index: usize, feature: usize) -> Option<f64> {
        if index >= self.cell_count() || feature >= self.dim {
            return None;
        }
        self.weights.get(index * self.dim + feature)
    }

    fn sigma_at(&self, index: usize, feature: usize) -> Option<f64> {
        if index >= self.cell_count() || feature >= self.dim {
            return None;
        }
        self.sigmas.get(index * self.dim + feature)
    }

    fn hits(&self) -> Vec<u32> {
        self.hits.iter().map(|h| h.load(Ordering::Relaxed)).collect()
    }

    fn umatrix(&self) -> Vec<f64> {
        let neighbours = [(-1isize, 0isize), (1, 0), (0, -1), (0, 1)];
        (0..self.cell_count())
            .map(|cell| {
                let (x, y) = self.coords(cell);
                let Some(here) = self.neuron(cell) else {
                    return 0.0;
                };
                let (sum, count) = neighbours
                    .iter()
                    .filter_map(|(dx, dy)| {
                        let nx = x.checked_add_signed(*dx).filter(|&v| v < self.width)?;
                        let ny = y.checked_add_signed(*dy).filter(|&v| v < self.height)?;
                        self.neuron(ny * self.width + nx)
                    })
                    .map(|there| {
                        here.iter()
                            .zip(&there)
                            .map(|(a, b)| (a - b) * (a - b))
                            .sum::<f64>()
                            .sqrt()
                    })
                    .fold((0.0, 0usize), |(s, n), d| (s + d, n + 1));
                if count == 0 { 0.0 } else { sum / count as f64 }
            })
            .collect()
    }

    fn train(
        &self,
        data: &TrainingData,
        params: &TrainingParams,
        metrics: &MetricsLog,
    ) -> Result<()> {
        if data.is_empty() || self.cell_count() == 0 {
            return Ok(());
        }
        if data.feature_weights.len() != self.dim {
            bail!(
                "dataset has {} features but the map expects {}",
                data.feature_weights.len(),
                self.dim
            );
        }
        if let Some(bad) = data.rows.iter().position(|r| r.len() != self.dim) {
            bail!("row {} has {} values, expected {}", bad, data.rows[bad].len(), self.dim);
        }

        info!(
            target: "som",
            rows = data.rows.len(),
            cells = self.cell_count(),
            epochs = params.epochs,
            decay = params.decay.label(),
            "Training started"
        );

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..data.rows.len()).collect();

        for epoch in 0..params.epochs {
            let learning_rate = params.decay.apply(
                params.learning_rate,
                params.learning_rate_decay,
                epoch,
                params.epochs,
            );
            let radius = params
                .decay
                .apply(params.sigma, params.sigma_decay, epoch, params.epochs)
                .max(0.5);

            order.shuffle(&mut rng);
            let mut error = 0.0;
            for &i in &order {
                let row = &data.rows[i];
                if let Some((bmu, d2)) = self.best_match(row, &data.feature_weights) {
                    error += d2.sqrt();
                    self.update_neighbourhood(bmu, row, learning_rate, radius);
                }
            }
            self.recount_hits(data);

            let mean_error = error / data.rows.len() as f64;
            metrics.push(mean_error);
            debug!(
                target: "som",
                epoch,
                learning_rate,
                radius,
                error = mean_error,
                "Epoch complete"
            );
        }

        info!(target: "som", epochs = params.epochs, "Training finished");
        Ok(())
    }

    fn reinitialize(&mut self, width: usize, height: usize, seed: u64) {
        *self = Som::new(width, height, self.dim, seed);
        info!(target: "som", width, height, seed, "Map reinitialized");
    }
}
