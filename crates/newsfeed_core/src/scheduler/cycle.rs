//! Single-flight cycle scheduler.
//!
//! # Responsibility
//! - Coalesce manual and timer triggers: a trigger that arrives while a
//!   cycle runs is dropped, not queued.
//! - Broadcast one notice per finished cycle.
//!
//! # Invariants
//! - The state returns to idle on every exit path, including a panicking
//!   runner.
//! - The state is idle before the notice for that cycle is sent.
//! - The timer never keeps the scheduler alive.

use crate::service::ingest_service::{CycleReport, IngestError};
use async_trait::async_trait;
use log::{debug, error, info};
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Buffered notices per subscriber before the oldest ones are dropped.
pub const NOTICE_CAPACITY: usize = 16;

/// Work executed for one cycle.
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn run_cycle(&self) -> Result<CycleReport, IngestError>;
}

/// Why a cycle was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Manual,
    Timer,
    Startup,
}

impl TriggerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Timer => "timer",
            Self::Startup => "startup",
        }
    }
}

impl Display for TriggerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published once per finished cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleNotice {
    Completed {
        trigger: TriggerKind,
        report: CycleReport,
    },
    Failed {
        trigger: TriggerKind,
        error: String,
    },
}

impl CycleNotice {
    pub fn trigger(&self) -> TriggerKind {
        match self {
            Self::Completed { trigger, .. } | Self::Failed { trigger, .. } => *trigger,
        }
    }

    /// Items added by the cycle; zero for a failed cycle.
    pub fn inserted_count(&self) -> usize {
        match self {
            Self::Completed { report, .. } => report.inserted,
            Self::Failed { .. } => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Externally visible scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    Idle,
    Running(TriggerKind),
}

#[derive(Debug, Clone, Copy)]
enum CycleState {
    Idle,
    Running {
        trigger: TriggerKind,
        started_at: Instant,
    },
}

struct SchedulerInner {
    state: Mutex<CycleState>,
    runner: Arc<dyn CycleRunner>,
    notices: broadcast::Sender<CycleNotice>,
    runtime: Handle,
}

/// Owns the cycle state machine and the optional periodic timer.
pub struct CycleScheduler {
    inner: Arc<SchedulerInner>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl CycleScheduler {
    /// Creates an idle scheduler; cycles run as tasks on `runtime`.
    pub fn new(runner: Arc<dyn CycleRunner>, runtime: Handle) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            inner: Arc::new(SchedulerInner {
                state: Mutex::new(CycleState::Idle),
                runner,
                notices,
                runtime,
            }),
            timer: Mutex::new(None),
        }
    }

    /// Starts a cycle unless one is already running.
    ///
    /// Returns `true` when a new cycle was started. Safe to call from any
    /// thread, inside or outside the runtime.
    pub fn trigger(&self, trigger: TriggerKind) -> bool {
        SchedulerInner::trigger(&self.inner, trigger)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CycleNotice> {
        self.inner.notices.subscribe()
    }

    pub fn status(&self) -> SchedulerStatus {
        match *self.inner.lock_state() {
            CycleState::Idle => SchedulerStatus::Idle,
            CycleState::Running { trigger, .. } => SchedulerStatus::Running(trigger),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status(), SchedulerStatus::Running(_))
    }

    /// Starts (or restarts) periodic triggering.
    ///
    /// The first tick fires one full `period` after this call. Ticks missed
    /// while the runtime was busy are skipped rather than replayed.
    pub fn start_timer(&self, period: Duration) {
        let weak: Weak<SchedulerInner> = Arc::downgrade(&self.inner);
        let handle = self.inner.runtime.spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                SchedulerInner::trigger(&inner, TriggerKind::Timer);
            }
        });

        let mut timer = self.lock_timer();
        if let Some(previous) = timer.replace(handle) {
            previous.abort();
        }
        info!(
            "event=timer_start module=scheduler status=ok period_ms={}",
            period.as_millis()
        );
    }

    /// Stops periodic triggering. A running cycle is left to finish.
    pub fn stop_timer(&self) {
        if let Some(handle) = self.lock_timer().take() {
            handle.abort();
            info!("event=timer_stop module=scheduler status=ok");
        }
    }

    pub fn has_timer(&self) -> bool {
        self.lock_timer().is_some()
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CycleScheduler {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

impl SchedulerInner {
    fn trigger(self: &Arc<Self>, trigger: TriggerKind) -> bool {
        if !self.try_begin(trigger) {
            debug!(
                "event=cycle_trigger module=scheduler status=coalesced trigger={}",
                trigger
            );
            return false;
        }

        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            inner.run(trigger).await;
        });
        true
    }

    fn try_begin(&self, trigger: TriggerKind) -> bool {
        let mut state = self.lock_state();
        match *state {
            CycleState::Running { .. } => false,
            CycleState::Idle => {
                *state = CycleState::Running {
                    trigger,
                    started_at: Instant::now(),
                };
                true
            }
        }
    }

    // The state holds plain data, so a poisoned lock is still consistent.
    fn lock_state(&self) -> MutexGuard<'_, CycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(self: Arc<Self>, trigger: TriggerKind) {
        info!(
            "event=cycle_run module=scheduler status=start trigger={}",
            trigger
        );

        let result = {
            let _idle = IdleOnDrop { inner: &self };
            let runner = Arc::clone(&self.runner);
            // A separate task turns a runner panic into a join error.
            match self
                .runtime
                .spawn(async move { runner.run_cycle().await })
                .await
            {
                Ok(result) => result.map_err(|err| err.to_string()),
                Err(err) => Err(format!("cycle task failed: {err}")),
            }
        };

        let notice = match result {
            Ok(report) => {
                info!(
                    "event=cycle_run module=scheduler status=ok trigger={} inserted={} evicted={}",
                    trigger, report.inserted, report.evicted
                );
                CycleNotice::Completed { trigger, report }
            }
            Err(error) => {
                error!(
                    "event=cycle_run module=scheduler status=error trigger={} error={}",
                    trigger, error
                );
                CycleNotice::Failed { trigger, error }
            }
        };

        // No subscribers is not an error.
        let _ = self.notices.send(notice);
    }
}

/// Returns the scheduler to idle however the cycle task exits.
struct IdleOnDrop<'a> {
    inner: &'a SchedulerInner,
}

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.lock_state();
        if let CycleState::Running { trigger, started_at } = *state {
            debug!(
                "event=cycle_state module=scheduler status=idle trigger={} duration_ms={}",
                trigger,
                started_at.elapsed().as_millis()
            );
        }
        *state = CycleState::Idle;
    }
}
