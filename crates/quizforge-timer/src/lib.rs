//! Step deadline timer for Quizforge actors.
//!
//! A game step ends either because a participant acted or because its
//! deadline passed. [`StepTimer`] holds at most one such deadline. Arming it
//! again replaces the previous deadline, and disarming drops it.
//!
//! # Integration
//!
//! The timer sits inside an actor's `tokio::select!` loop next to the
//! command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         biased;
//!         Some(cmd) = cmd_rx.recv() => { /* may re-arm or disarm */ }
//!         expiry = timer.expired() => { /* step deadline reached */ }
//!     }
//! }
//! ```
//!
//! While disarmed, [`StepTimer::expired`] pends forever, so `select!`
//! simply keeps serving the other branches.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::trace;

/// Information about a fired deadline, returned by [`StepTimer::expired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    /// Which arming fired. Starts at 1 and grows with every `arm` call.
    pub generation: u64,
    /// How far past the deadline the timer was actually polled.
    pub late_by: Duration,
}

/// A single re-armable, one-shot deadline.
#[derive(Debug, Default)]
pub struct StepTimer {
    deadline: Option<Instant>,
    generation: u64,
}

impl StepTimer {
    /// Creates a disarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deadline to `now + after`, replacing any previous one.
    pub fn arm(&mut self, after: Duration) {
        self.generation += 1;
        self.deadline = Some(Instant::now() + after);
        trace!(generation = self.generation, after_ms = after.as_millis() as u64, "step timer armed");
    }

    /// Drops the pending deadline, if any. Idempotent.
    pub fn disarm(&mut self) {
        if self.deadline.take().is_some() {
            trace!(generation = self.generation, "step timer disarmed");
        }
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// The pending deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the pending deadline. Zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// How many times the timer has been armed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Waits for the pending deadline and disarms the timer.
    ///
    /// Pends forever while disarmed. Cancel-safe: if the future is dropped
    /// before the deadline (another `select!` branch won), the deadline
    /// stays armed.
    pub async fn expired(&mut self) -> Expiry {
        let Some(deadline) = self.deadline else {
            return std::future::pending().await;
        };

        time::sleep_until(deadline).await;

        self.deadline = None;
        let late_by = Instant::now().saturating_duration_since(deadline);
        trace!(generation = self.generation, "step timer fired");
        Expiry {
            generation: self.generation,
            late_by,
        }
    }
}
