//! Cancellable delayed tasks on the shared tokio worker pool
//!
//! `TaskScheduler` is a thin handle over the runtime. `TaskSlot` holds at
//! most one pending task and enforces the cancel-then-arm order used by
//! every self-rescheduling chain in a contest.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::core::clock::Clock;
use crate::core::error::{Result, SiegeError};

/// Spawns delayed callbacks on a tokio runtime
#[derive(Clone, Debug)]
pub struct TaskScheduler {
    runtime: Handle,
}

impl TaskScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Scheduler bound to the runtime of the calling thread
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| SiegeError::Runtime(e.to_string()))
    }

    /// Run `task` after `delay` on the blocking pool
    ///
    /// Callbacks persist synchronously, so they leave the async workers free.
    pub fn schedule<F>(&self, delay: std::time::Duration, task: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = tokio::task::spawn_blocking(task).await {
                tracing::error!(error = %e, "Scheduled task panicked");
            }
        });
        TaskHandle {
            abort: join.abort_handle(),
        }
    }
}

/// Handle to one scheduled task
#[derive(Clone, Debug)]
pub struct TaskHandle {
    abort: AbortHandle,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

#[derive(Debug, Default)]
struct SlotState {
    current: Option<(u64, TaskHandle)>,
    next_token: u64,
}

/// Holder of at most one live task
///
/// Every armed task gets a token. A firing task must call [`TaskSlot::complete`]
/// with its token before doing any work; a stale token means the task was
/// replaced after its timer elapsed and must do nothing.
#[derive(Debug)]
pub struct TaskSlot {
    name: &'static str,
    state: Mutex<SlotState>,
}

impl TaskSlot {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(SlotState::default()),
        }
    }

    /// Arm a task; fails if a live task is already armed
    pub fn arm<F>(
        &self,
        scheduler: &TaskScheduler,
        due: DateTime<Utc>,
        clock: &dyn Clock,
        task: F,
    ) -> Result<u64>
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let mut state = self.state.lock();
        if let Some((token, handle)) = &state.current {
            if !handle.is_finished() {
                return Err(SiegeError::Invariant(format!(
                    "{} task {} is still armed",
                    self.name, token
                )));
            }
        }
        Ok(Self::arm_locked(&mut state, scheduler, due, clock, task))
    }

    /// Cancel whatever is armed, then arm `task`
    pub fn rearm<F>(&self, scheduler: &TaskScheduler, due: DateTime<Utc>, clock: &dyn Clock, task: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let mut state = self.state.lock();
        if let Some((_, handle)) = state.current.take() {
            handle.cancel();
        }
        Self::arm_locked(&mut state, scheduler, due, clock, task)
    }

    fn arm_locked<F>(
        state: &mut SlotState,
        scheduler: &TaskScheduler,
        due: DateTime<Utc>,
        clock: &dyn Clock,
        task: F,
    ) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        state.next_token += 1;
        let token = state.next_token;
        // Past deadlines fire immediately
        let delay = (due - clock.now()).to_std().unwrap_or_default();
        let handle = scheduler.schedule(delay, move || task(token));
        state.current = Some((token, handle));
        token
    }

    /// Cancel the armed task; returns whether one was armed
    pub fn cancel(&self) -> bool {
        match self.state.lock().current.take() {
            Some((_, handle)) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Called by a firing task; clears the slot if `token` is still current
    pub fn complete(&self, token: u64) -> bool {
        let mut state = self.state.lock();
        match &state.current {
            Some((current, _)) if *current == token => {
                state.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.state
            .lock()
            .current
            .as_ref()
            .map(|(_, handle)| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn current_handle(&self) -> Option<TaskHandle> {
        self.state.lock().current.as_ref().map(|(_, h)| h.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn clock() -> ManualClock {
        ManualClock::new(Utc::now())
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_twice_fails_fast() {
        let scheduler = TaskScheduler::current().unwrap();
        let clock = clock();
        let slot = TaskSlot::new("transition");
        let due = clock.now() + Duration::hours(1);

        let first = slot.arm(&scheduler, due, &clock, |_| {}).unwrap();
        let second = slot.arm(&scheduler, due, &clock, |_| {});

        assert!(matches!(second, Err(SiegeError::Invariant(_))));
        // The original handle is untouched
        assert!(slot.is_armed());
        assert!(!slot.complete(first + 1));
        assert!(slot.complete(first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_rearm_leaves_one_live_task() {
        let scheduler = TaskScheduler::current().unwrap();
        let clock = clock();
        let slot = TaskSlot::new("transition");
        let due = clock.now() + Duration::hours(1);

        let mut handles = Vec::new();
        for _ in 0..20 {
            slot.rearm(&scheduler, due, &clock, |_| {});
            handles.push(slot.current_handle().unwrap());
        }
        tokio::task::yield_now().await;

        let (last, earlier) = handles.split_last().unwrap();
        assert!(earlier.iter().all(|h| h.is_finished()));
        assert!(!last.is_finished());
        assert!(slot.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_task_runs_once_with_current_token() {
        let scheduler = TaskScheduler::current().unwrap();
        let clock = clock();
        let slot = Arc::new(TaskSlot::new("countdown"));
        let runs = Arc::new(AtomicUsize::new(0));

        let (slot_ref, runs_ref) = (slot.clone(), runs.clone());
        slot.rearm(&scheduler, clock.now() + Duration::seconds(5), &clock, move |token| {
            if slot_ref.complete(token) {
                runs_ref.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(std::time::Duration::from_secs(6)).await;
        for _ in 0..100 {
            if runs.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::task::yield_now().await;
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!slot.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_reports_armed_state() {
        let scheduler = TaskScheduler::current().unwrap();
        let clock = clock();
        let slot = TaskSlot::new("transition");

        assert!(!slot.cancel());
        slot.rearm(&scheduler, clock.now() + Duration::minutes(1), &clock, |_| {});
        assert!(slot.cancel());
        assert!(!slot.is_armed());
    }
}
