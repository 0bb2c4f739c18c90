use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep_until, Instant, Sleep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Armed,
    Cancelled,
    Fired,
}

/// Deadline for the whole drain. Armed once when draining starts and never
/// rearmed; it either fires or is cancelled by a graceful exit.
#[derive(Debug)]
pub struct ForcedExitTimer {
    sleep: Pin<Box<Sleep>>,
    deadline: Instant,
    state: TimerState,
}

impl ForcedExitTimer {
    pub(crate) fn arm(grace_period: Duration) -> Self {
        let deadline = Instant::now() + grace_period;
        Self {
            sleep: Box::pin(sleep_until(deadline)),
            deadline,
            state: TimerState::Armed,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Resolves when the deadline passes. Never resolves once cancelled.
    pub async fn expired(&mut self) {
        match self.state {
            TimerState::Armed => {
                self.sleep.as_mut().await;
                self.state = TimerState::Fired;
            }
            TimerState::Fired => {}
            TimerState::Cancelled => std::future::pending::<()>().await,
        }
    }

    /// Returns false if the timer had already fired or been cancelled
    pub fn cancel(&mut self) -> bool {
        if self.state == TimerState::Armed {
            self.state = TimerState::Cancelled;
            true
        } else {
            false
        }
    }
}
