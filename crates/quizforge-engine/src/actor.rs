//! Engine actor: one Tokio task per session that owns a [`Game`].
//!
//! Actions arrive on a bounded mpsc queue and are applied strictly one at
//! a time, in arrival order. The step deadline lives in a [`StepTimer`]
//! raced against the queue. Everything the game wants delivered goes out
//! on the dispatch lane to the session registry.

use quizforge_protocol::{ClientAction, Dispatch, SessionId};
use quizforge_timer::StepTimer;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{EngineError, Game, Input, Outcome, TimerChange};

/// Handle to a running engine. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    session_id: SessionId,
    sender: mpsc::Sender<ClientAction>,
}

impl EngineHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Queues an action, waiting for room if the queue is full.
    pub async fn submit(&self, action: ClientAction) -> Result<(), EngineError> {
        self.sender
            .send(action)
            .await
            .map_err(|_| EngineError::Closed(self.session_id))
    }

    /// Queues an action without waiting.
    pub fn try_submit(&self, action: ClientAction) -> Result<(), EngineError> {
        self.sender.try_send(action).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EngineError::Busy(self.session_id),
            mpsc::error::TrySendError::Closed(_) => EngineError::Closed(self.session_id),
        })
    }

    /// `true` once the engine task has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

struct EngineActor {
    session_id: SessionId,
    game: Game,
    timer: StepTimer,
    actions: mpsc::Receiver<ClientAction>,
    dispatch: mpsc::UnboundedSender<Dispatch>,
}

impl EngineActor {
    async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "engine started");

        let opened = self.game.open(now());
        self.apply_outcome(opened);

        loop {
            let input = tokio::select! {
                biased;
                action = self.actions.recv() => match action {
                    Some(action) => Input::Action(action),
                    None => {
                        tracing::debug!(session_id = %self.session_id, "action queue closed");
                        break;
                    }
                },
                expiry = self.timer.expired() => {
                    tracing::trace!(
                        session_id = %self.session_id,
                        step = %self.game.step(),
                        late_ms = expiry.late_by.as_millis() as u64,
                        "step deadline"
                    );
                    Input::Deadline
                }
            };

            let outcome = self.game.apply(input, now());
            if !self.apply_outcome(outcome) || self.game.is_closed() {
                break;
            }
        }

        self.timer.disarm();
        tracing::info!(session_id = %self.session_id, step = %self.game.step(), "engine stopped");
    }

    /// Applies the timer change and forwards dispatches. Returns `false`
    /// once nobody is listening on the dispatch lane.
    fn apply_outcome(&mut self, outcome: Outcome) -> bool {
        match outcome.timer {
            TimerChange::Keep => {}
            TimerChange::Arm(after) => self.timer.arm(after),
            TimerChange::Disarm => self.timer.disarm(),
        }
        for dispatch in outcome.dispatches {
            if self.dispatch.send(dispatch).is_err() {
                tracing::debug!(session_id = %self.session_id, "dispatch lane closed");
                return false;
            }
        }
        true
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Spawns the engine task for one session.
///
/// `capacity` bounds the action queue. The returned [`JoinHandle`]
/// resolves when the engine stops: its queue closed, the dispatch lane
/// was dropped, or the game shut itself down.
pub fn spawn_engine(
    session_id: SessionId,
    game: Game,
    dispatch: mpsc::UnboundedSender<Dispatch>,
    capacity: usize,
) -> (EngineHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let actor = EngineActor {
        session_id,
        game,
        timer: StepTimer::new(),
        actions: rx,
        dispatch,
    };
    let task = tokio::spawn(actor.run());

    (
        EngineHandle {
            session_id,
            sender: tx,
        },
        task,
    )
}
