pub mod event_queue;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep_until, Instant};

use crate::config::ClockConfig;
use crate::simulator::event_queue::{ProcessId, SimClock, SimEventQueue};

pub type ProcessError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A cooperative process driven by the simulation clock. `resume` runs
/// until the process's next suspension point and returns how much virtual
/// time to sleep before the next resume.
#[async_trait]
pub trait SimProcess: Send {
    fn name(&self) -> &str;
    async fn resume(&mut self, ctx: &SimContext) -> Result<Duration, ProcessError>;
}

/// What a process sees of the clock while it runs.
#[derive(Debug, Clone, Copy)]
pub struct SimContext {
    now: Duration,
    epoch_secs: i64,
}

impl SimContext {
    pub fn new(now: Duration, epoch_secs: i64) -> Self {
        Self { now, epoch_secs }
    }

    /// Virtual time since the start of the run.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Unix timestamp, in whole seconds, for the current virtual time.
    pub fn timestamp(&self) -> i64 {
        self.epoch_secs + self.now.as_secs() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pacing {
    /// Advance as fast as processes can be resumed.
    Unthrottled,
    /// One virtual second takes `factor` real seconds. When `strict`,
    /// falling more than `factor` seconds behind is an error.
    WallClock { factor: f64, strict: bool },
}

impl Pacing {
    pub fn from_config(config: &ClockConfig) -> Self {
        if config.realtime {
            Pacing::WallClock {
                factor: config.factor,
                strict: config.strict,
            }
        } else {
            Pacing::Unthrottled
        }
    }
}

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("Simulation too slow: {behind:?} behind the wall clock")]
    TooSlow { behind: Duration },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessFailure {
    pub process: String,
    pub at_secs: f64,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClockReport {
    pub events_dispatched: u64,
    pub final_time_secs: f64,
    /// Wake-ups still pending when the horizon was reached.
    pub abandoned: usize,
    pub failures: Vec<ProcessFailure>,
}

/// Discrete-event scheduler multiplexing processes over one virtual timeline.
pub struct SimulationClock {
    queue: SimEventQueue,
    clock: SimClock,
    processes: Vec<Option<Box<dyn SimProcess>>>,
    pacing: Pacing,
    epoch_secs: i64,
}

impl SimulationClock {
    pub fn new(pacing: Pacing) -> Self {
        Self {
            queue: SimEventQueue::new(),
            clock: SimClock::new(),
            processes: Vec::new(),
            pacing,
            epoch_secs: chrono::Utc::now().timestamp(),
        }
    }

    /// Fix the Unix time that virtual time zero maps to.
    pub fn with_epoch(mut self, epoch_secs: i64) -> Self {
        self.epoch_secs = epoch_secs;
        self
    }

    /// Register a process; it is first resumed at the current virtual time.
    pub fn spawn(&mut self, process: Box<dyn SimProcess>) -> ProcessId {
        self.spawn_after(Duration::ZERO, process)
    }

    pub fn spawn_after(&mut self, delay: Duration, process: Box<dyn SimProcess>) -> ProcessId {
        let id = self.processes.len();
        tracing::debug!("Spawning process {} ({})", id, process.name());
        self.processes.push(Some(process));
        self.queue.schedule(self.clock.now() + delay, id);
        id
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Dispatch wake-ups in time order until `horizon`. Nothing scheduled at
    /// or after the horizon runs; those processes are dropped with the clock.
    /// A process that fails is logged and removed while the rest continue.
    pub async fn run(mut self, horizon: Duration) -> Result<ClockReport, ClockError> {
        let wall_start = Instant::now();
        let virtual_start = self.clock.now();
        let mut report = ClockReport::default();

        if self.queue.is_empty() {
            tracing::warn!("Simulation clock has no processes to run");
        }
        tracing::info!(
            "Simulation clock running {} processes until {:.0}s ({:?})",
            self.processes.len(),
            horizon.as_secs_f64(),
            self.pacing
        );

        while let Some(next) = self.queue.peek() {
            if next.at >= horizon {
                break;
            }
            let Some(wake) = self.queue.pop() else {
                break;
            };
            pace(self.pacing, wall_start, wake.at - virtual_start).await?;
            self.clock.advance_to(wake.at);

            let Some(process) = self.processes.get_mut(wake.process).and_then(Option::as_mut)
            else {
                continue;
            };
            let ctx = SimContext::new(wake.at, self.epoch_secs);
            report.events_dispatched += 1;

            match process.resume(&ctx).await {
                Ok(delay) => {
                    self.queue.schedule(wake.at + delay, wake.process);
                }
                Err(err) => {
                    if let Some(failed) = self.processes[wake.process].take() {
                        tracing::error!(
                            "Process {} failed at {:.1}s and was stopped: {}",
                            failed.name(),
                            wake.at.as_secs_f64(),
                            err
                        );
                        report.failures.push(ProcessFailure {
                            process: failed.name().to_string(),
                            at_secs: wake.at.as_secs_f64(),
                            error: err.to_string(),
                        });
                    }
                }
            }
        }

        self.clock.advance_to(horizon);
        report.final_time_secs = self.clock.now().as_secs_f64();
        report.abandoned = self.queue.len();
        tracing::info!(
            "Simulation reached {:.0}s after {} events ({} wake-ups abandoned, {} failed processes)",
            report.final_time_secs,
            report.events_dispatched,
            report.abandoned,
            report.failures.len()
        );
        Ok(report)
    }
}

/// Hold dispatch of an event at virtual offset `elapsed` until its wall-clock
/// deadline.
async fn pace(pacing: Pacing, wall_start: Instant, elapsed: Duration) -> Result<(), ClockError> {
    let Pacing::WallClock { factor, strict } = pacing else {
        return Ok(());
    };
    let deadline = wall_start + elapsed.mul_f64(factor);
    let now = Instant::now();
    if now < deadline {
        sleep_until(deadline).await;
        return Ok(());
    }
    let behind = now - deadline;
    if strict && behind > Duration::from_secs_f64(factor) {
        return Err(ClockError::TooSlow { behind });
    }
    if !behind.is_zero() {
        tracing::debug!("Simulation running {:?} behind the wall clock", behind);
    }
    Ok(())
}
