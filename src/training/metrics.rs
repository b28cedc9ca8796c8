//! Append-only per-epoch error history shared with the training worker.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Error values, one per completed epoch, behind a single mutex.
///
/// The worker is the only writer. Every read or append takes the lock for the
/// duration of that call only.
#[derive(Clone, Default)]
pub struct MetricsLog {
    inner: Arc<Mutex<Vec<f64>>>,
}

impl MetricsLog {
    fn lock(&self) -> MutexGuard<'_, Vec<f64>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, value: f64) {
        self.lock().push(value);
    }

    /// Consistent copy of the history at the time of the call.
    pub fn snapshot(&self) -> Vec<f64> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<f64> {
        self.lock().last().copied()
    }

    /// Only called by the coordinator before a worker is spawned.
    pub(crate) fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_reader_sees_prefixes_only() {
        let log = MetricsLog::default();
        let writer = {
            let log = log.clone();
            std::thread::spawn(move || {
                for i in 0..5_000 {
                    log.push(i as f64);
                }
            })
        };

        let mut previous_len = 0;
        while previous_len < 5_000 {
            let snap = log.snapshot();
            assert!(snap.len() >= previous_len, "history shrank");
            for (i, v) in snap.iter().enumerate() {
                assert_eq!(*v, i as f64, "history reordered");
            }
            previous_len = snap.len();
        }
        writer.join().unwrap();
        assert_eq!(log.len(), 5_000);
        assert_eq!(log.last(), Some(4_999.0));
    }

    #[test]
    fn poisoned_lock_is_still_readable() {
        let log = MetricsLog::default();
        log.push(1.5);
        let poisoner = log.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("worker died holding the lock");
        })
        .join();
        assert_eq!(log.snapshot(), vec![1.5]);
        log.push(2.5);
        assert_eq!(log.len(), 2);
    }
}
