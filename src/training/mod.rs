//! Lifecycle of background training runs.
//!
//! ```text
//! Idle ──Launched──▶ Running { session } ──WorkerFinished──▶ Idle
//! ```
//!
//! The coordinator hands a run to a blocking worker on the tokio runtime and
//! never waits for it from the render loop. Completion is noticed by
//! [`TrainingCoordinator::poll`], which the dashboard calls once per frame.

mod metrics;

pub use metrics::MetricsLog;

use std::sync::Arc;

use chrono::{DateTime, Local};
use futures_util::FutureExt;
use statig::prelude::*;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::model::{Dataset, Model, TrainingData, TrainingParams};

/// Parameters and bookkeeping of the run currently in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSession {
    pub params: TrainingParams,
    pub rows: usize,
    pub started_at: DateTime<Local>,
}

/// What happened to a "Train" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainOutcome {
    Started,
    AlreadyRunning,
    NoDataset,
    EmptyDataset,
    ShapeMismatch,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum TrainingEvent {
    Launched(TrainingSession),
    WorkerFinished,
}

#[derive(Default)]
struct TrainingMachine {
    runs_started: u64,
}

#[state_machine(
    initial = "State::idle()",
    state(derive(Debug, Clone, PartialEq))
)]
impl TrainingMachine {
    /// No worker exists; configuration may change.
    #[state]
    fn idle(&mut self, event: &TrainingEvent) -> Outcome<State> {
        match event {
            TrainingEvent::Launched(session) => {
                self.runs_started += 1;
                Transition(State::running(session.clone()))
            }
            TrainingEvent::WorkerFinished => Handled,
        }
    }

    /// A worker owns the captured parameters until it completes.
    #[state(entry_action = "enter_running", exit_action = "exit_running")]
    fn running(&mut self, event: &TrainingEvent, session: &TrainingSession) -> Outcome<State> {
        let _ = session;
        match event {
            TrainingEvent::Launched(_) => Handled,
            TrainingEvent::WorkerFinished => Transition(State::idle()),
        }
    }

    #[action]
    fn enter_running(&mut self) {
        info!(target: "training", run = self.runs_started, "Run started");
    }

    #[action]
    fn exit_running(&mut self) {
        info!(target: "training", run = self.runs_started, "Run finished");
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct TrainingCoordinator {
    runtime: Handle,
    machine: StateMachine<TrainingMachine>,
    worker: Option<JoinHandle<()>>,
    metrics: MetricsLog,
}

impl TrainingCoordinator {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            machine: TrainingMachine::default().state_machine(),
            worker: None,
            metrics: MetricsLog::default(),
        }
    }

    pub fn metrics(&self) -> &MetricsLog {
        &self.metrics
    }

    pub fn is_training(&self) -> bool {
        matches!(self.machine.state(), State::Running { .. })
    }

    pub fn session(&self) -> Option<&TrainingSession> {
        match self.machine.state() {
            State::Running { session } => Some(session),
            State::Idle {} => None,
        }
    }

    /// Launch a run unless one is already in flight or there is nothing to
    /// train on. Never blocks.
    pub fn request_training(
        &mut self,
        model: &Arc<dyn Model>,
        dataset: Option<&dyn Dataset>,
        params: TrainingParams,
    ) -> TrainOutcome {
        if self.is_training() {
            debug!(target: "training", "Train request ignored: already running");
            return TrainOutcome::AlreadyRunning;
        }
        let Some(dataset) = dataset else {
            debug!(target: "training", "Train request ignored: no dataset");
            return TrainOutcome::NoDataset;
        };
        if dataset.row_count() == 0 {
            debug!(target: "training", "Train request ignored: dataset has no rows");
            return TrainOutcome::EmptyDataset;
        }
        if dataset.feature_count() != model.vector_len() {
            warn!(
                target: "training",
                features = dataset.feature_count(),
                vector_len = model.vector_len(),
                "Train request ignored: dataset does not match the map"
            );
            return TrainOutcome::ShapeMismatch;
        }

        let data = TrainingData::capture(dataset);
        let session = TrainingSession {
            params,
            rows: data.rows.len(),
            started_at: Local::now(),
        };

        self.metrics.clear();
        self.machine.handle(&TrainingEvent::Launched(session));

        let model = Arc::clone(model);
        let metrics = self.metrics.clone();
        self.worker = Some(self.runtime.spawn_blocking(move || {
            if let Err(e) = model.train(&data, &params, &metrics) {
                error!(target: "training", "Training failed: {:#}", e);
            }
        }));
        TrainOutcome::Started
    }

    /// Notice a finished worker. Returns `true` on the frame the run ends.
    ///
    /// Safe to call from inside an async context; a finished handle is joined
    /// without entering the runtime.
    pub fn poll(&mut self) -> bool {
        let finished = self.worker.as_ref().is_some_and(JoinHandle::is_finished);
        if !finished {
            return false;
        }
        if let Some(worker) = self.worker.take() {
            self.machine.handle(&TrainingEvent::WorkerFinished);
            report(worker.now_or_never());
        }
        true
    }

    /// Block until the current run (if any) completes.
    ///
    /// Inside an async context an unfinished run cannot be awaited here; it is
    /// left detached and the coordinator returns to idle.
    pub fn wait(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.machine.handle(&TrainingEvent::WorkerFinished);
        if worker.is_finished() {
            report(worker.now_or_never());
        } else if Handle::try_current().is_ok() {
            warn!(target: "training", "Cannot block inside the runtime; run left detached");
        } else {
            info!(target: "training", "Waiting for the training run to finish");
            report(Some(self.runtime.block_on(worker)));
        }
    }
}

fn report(joined: Option<Result<(), JoinError>>) {
    match joined {
        Some(Ok(())) => {}
        Some(Err(e)) => error!(target: "training", "Training worker panicked: {}", e),
        None => warn!(target: "training", "Finished worker produced no result"),
    }
}

impl Drop for TrainingCoordinator {
    fn drop(&mut self) {
        self.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InMemoryDataset, Som};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    /// Model whose training blocks until the test releases it.
    struct GatedModel {
        calls: AtomicUsize,
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl Model for GatedModel {
        fn width(&self) -> usize {
            1
        }
        fn height(&self) -> usize {
            1
        }
        fn vector_len(&self) -> usize {
            2
        }
        fn neuron(&self, _: usize) -> Option<Vec<f64>> {
            None
        }
        fn sigma(&self, _: usize) -> Option<Vec<f64>> {
            None
        }
        fn weight_at(&self, _: usize, _: usize) -> Option<f64> {
            None
        }
        fn sigma_at(&self, _: usize, _: usize) -> Option<f64> {
            None
        }
        fn hits(&self) -> Vec<u32> {
            vec![0]
        }
        fn umatrix(&self) -> Vec<f64> {
            vec![0.0]
        }
        fn train(
            &self,
            _: &TrainingData,
            params: &TrainingParams,
            metrics: &MetricsLog,
        ) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.lock().unwrap();
            for epoch in 0..params.epochs {
                gate.recv_timeout(Duration::from_secs(5))?;
                metrics.push(epoch as f64);
            }
            Ok(())
        }
        fn reinitialize(&mut self, _: usize, _: usize, _: u64) {}
    }

    fn dataset(rows: usize) -> InMemoryDataset {
        InMemoryDataset::new(
            vec!["x".into(), "y".into()],
            (0..rows).map(|i| vec![i as f64, 1.0]).collect(),
        )
    }

    fn poll_until_idle(coordinator: &mut TrainingCoordinator) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !coordinator.poll() {
            assert!(Instant::now() < deadline, "run never finished");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn second_request_while_running_is_ignored() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let gated = Arc::new(GatedModel {
            calls: AtomicUsize::new(0),
            gate: Mutex::new(rx),
        });
        let model: Arc<dyn Model> = gated.clone();
        let data = dataset(4);
        let params = TrainingParams {
            epochs: 3,
            ..TrainingParams::default()
        };

        let mut coordinator = TrainingCoordinator::new(rt.handle().clone());
        assert!(!coordinator.is_training());
        assert_eq!(
            coordinator.request_training(&model, Some(&data), params),
            TrainOutcome::Started
        );
        assert!(coordinator.is_training());
        assert_eq!(coordinator.session().map(|s| s.rows), Some(4));
        assert_eq!(
            coordinator.request_training(&model, Some(&data), params),
            TrainOutcome::AlreadyRunning
        );
        assert!(!coordinator.poll());
        assert!(coordinator.is_training());

        for _ in 0..3 {
            tx.send(()).unwrap();
        }
        poll_until_idle(&mut coordinator);

        assert!(!coordinator.is_training());
        assert!(coordinator.session().is_none());
        assert_eq!(gated.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.metrics().snapshot(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn missing_or_empty_dataset_is_a_no_op() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let model: Arc<dyn Model> = Arc::new(Som::new(2, 2, 2, 1));
        let mut coordinator = TrainingCoordinator::new(rt.handle().clone());

        let outcome = coordinator.request_training(&model, None, TrainingParams::default());
        assert_eq!(outcome, TrainOutcome::NoDataset);

        let empty = dataset(0);
        let outcome = coordinator.request_training(&model, Some(&empty), TrainingParams::default());
        assert_eq!(outcome, TrainOutcome::EmptyDataset);

        let wrong = InMemoryDataset::new(vec!["only".into()], vec![vec![1.0]]);
        let outcome = coordinator.request_training(&model, Some(&wrong), TrainingParams::default());
        assert_eq!(outcome, TrainOutcome::ShapeMismatch);

        assert!(!coordinator.is_training());
        assert!(!coordinator.poll());
    }

    #[test]
    fn finished_run_releases_the_model() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let mut model: Arc<dyn Model> = Arc::new(Som::new(3, 3, 2, 5));
        let data = dataset(10);
        let params = TrainingParams {
            epochs: 4,
            ..TrainingParams::default()
        };
        let mut coordinator = TrainingCoordinator::new(rt.handle().clone());
        coordinator.request_training(&model, Some(&data), params);
        poll_until_idle(&mut coordinator);

        assert_eq!(coordinator.metrics().len(), 4);
        let som = Arc::get_mut(&mut model).expect("worker still holds the model");
        som.reinitialize(4, 4, 1);
        assert_eq!(model.cell_count(), 16);
    }

    #[test]
    fn poll_inside_async_context_returns_to_idle() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let model: Arc<dyn Model> = Arc::new(Som::new(3, 3, 2, 5));
        let data = dataset(10);
        let params = TrainingParams {
            epochs: 2,
            ..TrainingParams::default()
        };
        let mut coordinator = TrainingCoordinator::new(rt.handle().clone());
        rt.block_on(async {
            for _ in 0..2 {
                assert_eq!(
                    coordinator.request_training(&model, Some(&data), params),
                    TrainOutcome::Started
                );
                poll_until_idle(&mut coordinator);
                assert!(!coordinator.is_training());
                assert_eq!(coordinator.metrics().len(), 2);
            }
        });
        assert_eq!(Arc::strong_count(&model), 1);
    }

    #[test]
    fn drop_waits_for_in_flight_run() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let model: Arc<dyn Model> = Arc::new(Som::new(3, 3, 2, 5));
        let data = dataset(10);
        let params = TrainingParams {
            epochs: 3,
            ..TrainingParams::default()
        };
        let metrics = {
            let mut coordinator = TrainingCoordinator::new(rt.handle().clone());
            coordinator.request_training(&model, Some(&data), params);
            coordinator.metrics().clone()
        };
        assert_eq!(metrics.len(), 3);
        assert_eq!(Arc::strong_count(&model), 1);
    }
}
