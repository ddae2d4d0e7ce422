//! Periodic synchronization with overlap prevention.
//!
//! The scheduler is `idle` until [`Scheduler::start`] arms a repeating
//! timer. On every tick it tries to claim the in-flight flag; if a pass is
//! still running the tick is dropped rather than queued. Passes run as their
//! own tasks, so [`Scheduler::stop`] only prevents future ticks and lets a
//! running pass finish.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Claim on the single pass slot. Dropping it releases the slot, including
/// when the pass panics.
#[derive(Debug)]
pub struct PassGuard {
    in_flight: Arc<AtomicBool>,
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Drives passes on a fixed interval.
#[derive(Debug)]
pub struct Scheduler {
    interval: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    in_flight: Arc<AtomicBool>,
}

impl Scheduler {
    /// Create an idle scheduler ticking every `interval` once started.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timer: Mutex::new(None),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claim the pass slot, or `None` if a pass is already running.
    #[must_use]
    pub fn try_begin(&self) -> Option<PassGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassGuard {
                in_flight: Arc::clone(&self.in_flight),
            })
    }

    /// Whether a pass currently holds the slot.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Whether the periodic timer is active.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.timer.lock().as_ref().is_some_and(is_live)
    }

    /// Arm the periodic timer.
    ///
    /// On each tick that finds the slot free, `pass` is called and the
    /// future it returns is spawned holding the slot. Returning `None` ends
    /// the timer, which is how an owner that has gone away stops it.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyArmed`] if the timer is already
    /// running and [`SchedulerError::NoRuntime`] outside a Tokio runtime.
    pub fn start<F, Fut>(&self, mut pass: F) -> Result<(), SchedulerError>
    where
        F: FnMut() -> Option<Fut> + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut timer = self.timer.lock();
        if timer.as_ref().is_some_and(is_live) {
            return Err(SchedulerError::AlreadyArmed);
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let interval = self.interval;
        let in_flight = Arc::clone(&self.in_flight);

        *timer = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of a Tokio interval fires immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                if in_flight
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    tracing::debug!("previous pass still running, skipping tick");
                    continue;
                }
                let guard = PassGuard {
                    in_flight: Arc::clone(&in_flight),
                };

                let Some(run) = pass() else {
                    break;
                };
                tokio::spawn(async move {
                    run.await;
                    drop(guard);
                });
            }
        }));

        Ok(())
    }

    /// Disarm the periodic timer. A pass that is already running continues.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotArmed`] if the timer is not running.
    pub fn stop(&self) -> Result<(), SchedulerError> {
        let handle = self
            .timer
            .lock()
            .take()
            .filter(is_live)
            .ok_or(SchedulerError::NotArmed)?;
        handle.abort();
        Ok(())
    }
}

/// A timer task ends on its own once its owner is gone.
fn is_live(handle: &JoinHandle<()>) -> bool {
    !handle.is_finished()
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}

/// Errors for scheduler misuse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// `start` called while the timer is active
    #[error("automatic synchronization already enabled")]
    AlreadyArmed,
    /// `stop` called while the timer is not active
    #[error("automatic synchronization not running")]
    NotArmed,
    /// `start` called outside a Tokio runtime
    #[error("no Tokio runtime available to drive the timer")]
    NoRuntime,
}
