//! In-memory tabular dataset and the generated demo datasets.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::Dataset;
use crate::text::{GLYPH_COLS, GLYPH_ROWS, glyph_bitmap};

/// Named columns of `f64` rows with an editable weight per column.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    names: Vec<String>,
    rows: Vec<Vec<f64>>,
    weights: Vec<f64>,
}

impl InMemoryDataset {
    /// Rows shorter or longer than `names` are padded with zeros or truncated.
    pub fn new(names: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        let width = names.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, 0.0);
                r
            })
            .collect();
        Self {
            weights: vec![1.0; width],
            names,
            rows,
        }
    }
}

impl Dataset for InMemoryDataset {
    fn feature_count(&self) -> usize {
        self.names.len()
    }

    fn feature_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    fn feature_weight(&self, index: usize) -> f64 {
        self.weights.get(index).copied().unwrap_or(0.0)
    }

    fn set_feature_weight(&mut self, index: usize, weight: f64) {
        if let Some(w) = self.weights.get_mut(index) {
            *w = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        }
    }
}

/// Generated datasets selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DemoDataset {
    /// Random RGB colors in `[0, 255]`.
    Colors,
    /// Noisy 5x7 digit glyphs, one pixel per feature.
    Glyphs,
    /// Start without a dataset.
    None,
}

impl DemoDataset {
    pub fn generate(self, rows: usize, seed: u64) -> Option<InMemoryDataset> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        match self {
            Self::Colors => {
                let names = ["red", "green", "blue"].map(String::from).to_vec();
                let data = (0..rows)
                    .map(|_| (0..3).map(|_| f64::from(rng.gen_range(0u8..=255))).collect())
                    .collect();
                Some(InMemoryDataset::new(names, data))
            }
            Self::Glyphs => {
                let names = (0..GLYPH_ROWS)
                    .flat_map(|r| (0..GLYPH_COLS).map(move |c| format!("px_{r}_{c}")))
                    .collect();
                let digits = b"0123456789";
                let data = (0..rows)
                    .map(|i| {
                        let bitmap = glyph_bitmap(digits[i % digits.len()]);
                        (0..GLYPH_ROWS * GLYPH_COLS)
                            .map(|p| {
                                let on = glyph_pixel(&bitmap, p / GLYPH_COLS, p % GLYPH_COLS);
                                let base = if on { 220.0 } else { 20.0 };
                                (base + rng.gen_range(-20.0..20.0_f64)).clamp(0.0, 255.0).round()
                            })
                            .collect()
                    })
                    .collect();
                Some(InMemoryDataset::new(names, data))
            }
            Self::None => None,
        }
    }

    /// Image shape the hover inspector should default to for this dataset.
    pub fn image_shape(self) -> Option<(usize, usize)> {
        match self {
            Self::Glyphs => Some((GLYPH_COLS, GLYPH_ROWS)),
            _ => None,
        }
    }
}

fn glyph_pixel(bitmap: &[u8; GLYPH_ROWS], row: usize, col: usize) -> bool {
    (bitmap[row] >> (GLYPH_COLS - 1 - col)) & 1 == 1
}
