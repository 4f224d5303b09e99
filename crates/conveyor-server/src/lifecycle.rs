//! Application lifecycle events and in-flight call tracking.
//!
//! The engine raises these events on the application monitor:
//!
//! - **Start**: `ApplicationStarting`, then `ApplicationStarted`
//! - **Stop**: `ApplicationStopPreparing`, `ApplicationStopping`, then
//!   `ApplicationStopped` once in-flight calls have drained

use crate::application::Application;
use crate::engine::CALLS_IN_FLIGHT;
use crate::events::EventDefinition;
use metrics::gauge;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Raised before the engine starts accepting calls.
pub const APPLICATION_STARTING: EventDefinition<Application> =
    EventDefinition::new("ApplicationStarting");

/// Raised once the engine accepts calls.
pub const APPLICATION_STARTED: EventDefinition<Application> =
    EventDefinition::new("ApplicationStarted");

/// Raised when a stop is requested, before anything is torn down.
pub const APPLICATION_STOP_PREPARING: EventDefinition<Application> =
    EventDefinition::new("ApplicationStopPreparing");

/// Raised once the engine refuses new calls.
pub const APPLICATION_STOPPING: EventDefinition<Application> =
    EventDefinition::new("ApplicationStopping");

/// Raised after in-flight calls have drained.
pub const APPLICATION_STOPPED: EventDefinition<Application> =
    EventDefinition::new("ApplicationStopped");

/// Lifecycle state of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Created, not started. Calls are accepted.
    Created,
    /// Started. Calls are accepted.
    Running,
    /// Stopped. Calls are refused.
    Stopped,
}

impl EngineState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Running => 1,
            Self::Stopped => 2,
        }
    }
}

/// Atomic holder of an [`EngineState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    pub(crate) fn get(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Moves from `from` to `to`. Returns `false` if the state was not `from`.
    pub(crate) fn transition(&self, from: EngineState, to: EngineState) -> bool {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Counts in-flight calls and mirrors the count in the
/// `conveyor_calls_in_flight` gauge.
#[derive(Debug, Clone, Default)]
pub struct CallTracker {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl CallTracker {
    /// Creates a tracker with no active calls.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a call. The call stays active until the guard is dropped.
    #[must_use]
    pub fn acquire(&self) -> CallGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        gauge!(CALLS_IN_FLIGHT).increment(1.0);
        CallGuard {
            active: Arc::clone(&self.active),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Returns the number of active calls.
    #[must_use]
    pub fn active_calls(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Waits until no call is active.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.notify.notified();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Marks one call as in flight.
///
/// Dropping the guard releases the call, including when the future that
/// owns it is dropped mid-call.
#[derive(Debug)]
pub struct CallGuard {
    active: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        gauge!(CALLS_IN_FLIGHT).decrement(1.0);
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_state_transitions() {
        let state = StateCell::new();
        assert_eq!(state.get(), EngineState::Created);
        assert!(state.transition(EngineState::Created, EngineState::Running));
        assert!(!state.transition(EngineState::Created, EngineState::Running));
        assert!(state.transition(EngineState::Running, EngineState::Stopped));
        assert_eq!(state.get(), EngineState::Stopped);
    }

    #[test]
    fn test_tracker_counts() {
        let tracker = CallTracker::new();
        let first = tracker.acquire();
        let second = tracker.acquire();
        assert_eq!(tracker.active_calls(), 2);

        drop(first);
        assert_eq!(tracker.active_calls(), 1);
        drop(second);
        assert_eq!(tracker.active_calls(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_immediately() {
        let tracker = CallTracker::new();
        tokio::time::timeout(Duration::from_millis(100), tracker.wait_idle())
            .await
            .expect("idle tracker should not wait");
    }

    #[tokio::test]
    async fn test_wait_idle_after_release() {
        let tracker = CallTracker::new();
        let guard = tracker.acquire();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_idle().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }
}
