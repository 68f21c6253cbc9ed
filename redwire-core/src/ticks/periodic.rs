use std::{future::Future, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    select,
    sync::Mutex as AsyncMutex,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

/// A target driven by a [`PeriodicTask`].
pub trait Periodic: Send + Sync + 'static {
    /// Runs one pass. Passes never overlap for one task.
    fn run_once(&self) -> impl Future<Output = ()> + Send;

    /// Whether there is nothing left to do. The task stops after a pass
    /// that leaves its target idle.
    fn is_idle(&self) -> bool;
}

#[derive(Debug, Default)]
struct TaskState {
    /// Bumped every time a loop is started.
    generation: u64,
    /// Token of the running loop, `None` while stopped.
    cancel: Option<CancellationToken>,
}

/// Runs a [`Periodic`] target at a fixed step on a tokio runtime.
///
/// Starting a running task and stopping a stopped one are no-ops. A loop
/// started while a stopped one is still inside a pass waits for that pass.
#[derive(Debug)]
pub struct PeriodicTask {
    step: Duration,
    state: Arc<Mutex<TaskState>>,
    /// Held for the length of every pass, across restarts.
    pass_gate: Arc<AsyncMutex<()>>,
}

impl PeriodicTask {
    /// Creates a stopped task firing every `step`.
    #[must_use]
    pub fn new(step: Duration) -> Self {
        Self {
            step,
            state: Arc::new(Mutex::new(TaskState::default())),
            pass_gate: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Time between passes.
    #[must_use]
    pub const fn step(&self) -> Duration {
        self.step
    }

    /// Whether a loop is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().cancel.is_some()
    }

    /// Starts driving `target` on `runtime`. The first pass runs right away,
    /// later ones every step. Returns `false` if the task was already running.
    pub fn start<T: Periodic>(&self, target: Arc<T>, runtime: &Handle) -> bool {
        let mut state = self.state.lock();
        if state.cancel.is_some() {
            return false;
        }
        state.generation += 1;
        let generation = state.generation;
        let cancel = CancellationToken::new();
        state.cancel = Some(cancel.clone());
        drop(state);

        let shared = Arc::clone(&self.state);
        let pass_gate = Arc::clone(&self.pass_gate);
        let step = self.step;
        runtime.spawn(async move {
            let mut interval = time::interval(step);
            // A slow pass pushes the schedule back instead of bursting.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let _pass = pass_gate.lock().await;
                if cancel.is_cancelled() {
                    break;
                }
                target.run_once().await;

                // Checked under the state lock so work fed while the loop
                // winds down always finds either this loop or none.
                let finished = {
                    let mut state = shared.lock();
                    if cancel.is_cancelled() {
                        true
                    } else if target.is_idle() {
                        if state.generation == generation {
                            state.cancel = None;
                        }
                        true
                    } else {
                        false
                    }
                };
                if finished {
                    break;
                }
            }
            log::debug!("Periodic task stopped after generation {generation}");
        });
        true
    }

    /// Stops the running loop. A pass in progress finishes first. Returns
    /// `false` if the task was not running.
    pub fn stop(&self) -> bool {
        match self.state.lock().cancel.take() {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const STEP: Duration = Duration::from_millis(200);

    struct Counter {
        passes: AtomicUsize,
        idle_after: usize,
    }

    impl Counter {
        fn new(idle_after: usize) -> Arc<Self> {
            Arc::new(Self {
                passes: AtomicUsize::new(0),
                idle_after,
            })
        }

        fn passes(&self) -> usize {
            self.passes.load(Ordering::SeqCst)
        }
    }

    impl Periodic for Counter {
        async fn run_once(&self) {
            self.passes.fetch_add(1, Ordering::SeqCst);
        }

        fn is_idle(&self) -> bool {
            self.passes() >= self.idle_after
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_every_step() {
        let task = PeriodicTask::new(STEP);
        let counter = Counter::new(usize::MAX);

        assert!(task.start(Arc::clone(&counter), &Handle::current()));
        time::sleep(STEP * 2 + STEP / 4).await;

        assert_eq!(counter.passes(), 3);
        assert!(task.is_running());
        assert!(task.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_idle() {
        let task = PeriodicTask::new(STEP);
        let counter = Counter::new(2);

        task.start(Arc::clone(&counter), &Handle::current());
        time::sleep(STEP * 10).await;

        assert_eq!(counter.passes(), 2);
        assert!(!task.is_running());
        assert!(!task.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let task = PeriodicTask::new(STEP);
        let counter = Counter::new(usize::MAX);

        assert!(task.start(Arc::clone(&counter), &Handle::current()));
        assert!(!task.start(Arc::clone(&counter), &Handle::current()));
        time::sleep(STEP + STEP / 4).await;

        assert_eq!(counter.passes(), 2);
        task.stop();
    }

    /// A target whose passes take longer than a step.
    #[derive(Default)]
    struct SlowPass {
        active: AtomicUsize,
        max_active: AtomicUsize,
        passes: AtomicUsize,
    }

    impl Periodic for SlowPass {
        async fn run_once(&self) {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            time::sleep(STEP + STEP / 2).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.passes.fetch_add(1, Ordering::SeqCst);
        }

        fn is_idle(&self) -> bool {
            false
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_pass_finish() {
        let task = PeriodicTask::new(STEP);
        let target = Arc::new(SlowPass::default());

        task.start(Arc::clone(&target), &Handle::current());
        time::sleep(STEP / 4).await;
        assert!(task.stop());
        assert_eq!(target.active.load(Ordering::SeqCst), 1);

        time::sleep(STEP * 5).await;
        assert_eq!(target.passes.load(Ordering::SeqCst), 1);
        assert_eq!(target.active.load(Ordering::SeqCst), 0);
        assert!(!task.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_waits_for_pass_in_flight() {
        let task = PeriodicTask::new(STEP);
        let target = Arc::new(SlowPass::default());

        task.start(Arc::clone(&target), &Handle::current());
        time::sleep(STEP / 4).await;
        assert!(task.stop());
        assert!(task.start(Arc::clone(&target), &Handle::current()));

        time::sleep(STEP * 5).await;
        assert_eq!(target.max_active.load(Ordering::SeqCst), 1);
        assert!(target.passes.load(Ordering::SeqCst) >= 2);
        assert!(task.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_then_restart() {
        let task = PeriodicTask::new(STEP);
        let counter = Counter::new(usize::MAX);

        task.start(Arc::clone(&counter), &Handle::current());
        time::sleep(STEP / 4).await;
        assert!(task.stop());
        assert!(!task.stop());

        time::sleep(STEP * 5).await;
        assert_eq!(counter.passes(), 1);

        assert!(task.start(Arc::clone(&counter), &Handle::current()));
        time::sleep(STEP / 4).await;
        assert_eq!(counter.passes(), 2);
        task.stop();
    }
}
