//! Recurring background jobs on the tokio runtime.
//!
//! Each job runs on its own interval. The first tick fires one full period
//! after spawning. All jobs stop when the handle is shut down or dropped, or
//! when a job's tick returns `false`.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub type TickFn = Box<dyn FnMut() -> bool + Send>;

pub struct TimerJob {
    pub name: &'static str,
    pub every: Duration,
    /// Returns false to stop this job
    pub tick: TickFn,
}

impl TimerJob {
    pub fn new(name: &'static str, every: Duration, tick: impl FnMut() -> bool + Send + 'static) -> Self {
        Self {
            name,
            every,
            tick: Box::new(tick),
        }
    }
}

pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Spawn every job on `runtime`.
    pub fn spawn(runtime: &Handle, jobs: Vec<TimerJob>) -> Self {
        let (stop, stop_rx) = watch::channel(false);
        let tasks = jobs
            .into_iter()
            .map(|job| runtime.spawn(run_job(job, stop_rx.clone())))
            .collect();
        Self { stop, tasks }
    }

    /// Signal every job to stop. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.stop.send(true);
    }

    /// Signal and wait for every job to finish.
    pub async fn join(mut self) {
        self.shutdown();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                log::warn!("Timer task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|t| t.is_finished())
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_job(mut job: TimerJob, mut stop: watch::Receiver<bool>) {
    if job.every.is_zero() {
        log::warn!("Timer {} has a zero interval; not started", job.name);
        return;
    }

    let mut ticker = interval(job.every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval() completes its first tick immediately
    ticker.tick().await;
    log::debug!("Timer {} started ({:?})", job.name, job.every);

    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            _ = ticker.tick() => {
                if *stop.borrow() {
                    break;
                }
                if !(job.tick)() {
                    break;
                }
            }
        }
    }

    log::debug!("Timer {} stopped", job.name);
}
