//! Fixed-size `f64` storage that tolerates concurrent element-wise writes.

use std::sync::atomic::{AtomicU64, Ordering};

/// A boxed slice of `f64` values stored as atomic bit patterns.
///
/// Loads and stores are `Relaxed`: a reader racing the training worker sees
/// each element either before or after its update, never a torn value. The
/// length is fixed at construction.
pub struct AtomicCells {
    cells: Box<[AtomicU64]>,
}

impl AtomicCells {
    pub fn from_fn(len: usize, mut f: impl FnMut(usize) -> f64) -> Self {
        let cells = (0..len).map(|i| AtomicU64::new(f(i).to_bits())).collect();
        Self { cells }
    }

    pub fn filled(len: usize, value: f64) -> Self {
        Self::from_fn(len, |_| value)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.cells
            .get(index)
            .map(|c| f64::from_bits(c.load(Ordering::Relaxed)))
    }

    pub fn set(&self, index: usize, value: f64) {
        if let Some(c) = self.cells.get(index) {
            c.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    /// Copy out `len` consecutive values starting at `start`.
    pub fn read_range(&self, start: usize, len: usize) -> Option<Vec<f64>> {
        let end = start.checked_add(len)?;
        let slice = self.cells.get(start..end)?;
        Some(
            slice
                .iter()
                .map(|c| f64::from_bits(c.load(Ordering::Relaxed)))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn get_set_and_ranges() {
        let cells = AtomicCells::from_fn(6, |i| i as f64 * 0.5);
        assert_eq!(cells.len(), 6);
        assert_eq!(cells.get(3), Some(1.5));
        cells.set(3, -2.0);
        assert_eq!(cells.get(3), Some(-2.0));
        assert_eq!(cells.read_range(2, 3), Some(vec![1.0, -2.0, 2.0]));
        assert_eq!(cells.read_range(5, 2), None);
        assert_eq!(cells.get(6), None);
        cells.set(99, 1.0);
    }

    #[test]
    fn concurrent_writes_never_tear() {
        let cells = Arc::new(AtomicCells::filled(64, 1.0));
        let writer = {
            let cells = Arc::clone(&cells);
            std::thread::spawn(move || {
                for round in 0..2_000 {
                    let v = if round % 2 == 0 { -3.25 } else { 1.0 };
                    for i in 0..cells.len() {
                        cells.set(i, v);
                    }
                }
            })
        };
        for _ in 0..2_000 {
            for i in 0..cells.len() {
                let v = cells.get(i).unwrap();
                assert!(v == 1.0 || v == -3.25, "torn value {v}");
            }
        }
        writer.join().unwrap();
    }
}
