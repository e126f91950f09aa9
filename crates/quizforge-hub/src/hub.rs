//! Hub actor: the session registry for one game instance.
//!
//! The hub knows who is connected and how to reach them. It owns one
//! outbound queue per participant, keyed by identity, and turns every
//! [`Dispatch`] the engine emits into frames on those queues. It never
//! looks at game rules.
//!
//! ```text
//!   adapters ──Register/Unregister──▶ hub ──join/disconnect──▶ engine
//!   adapters ◀──── Arc<str> frames ── hub ◀──── Dispatch ───── engine
//! ```
//!
//! The engine → hub lane is unbounded and the hub → engine queue is
//! bounded. The engine never waits on the hub, so the two can't deadlock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use quizforge_content::Package;
use quizforge_engine::{EngineHandle, Game, Timings, spawn_engine};
use quizforge_protocol::{
    ActionKind, ClientAction, Codec, Dispatch, Identity, JsonCodec, PlayerId, Role, ServerEvent,
    SessionId,
};
use quizforge_timer::StepTimer;
use quizforge_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{HubConfig, HubError};

/// Queue of encoded frames feeding one participant's write pump.
pub type Outbound = mpsc::Sender<Arc<str>>;

/// A registered connection.
#[derive(Debug, Clone)]
pub struct Participant {
    pub identity: Identity,
    pub role: Role,
    /// The connection this registration belongs to. Unregistering with a
    /// different id is ignored.
    pub conn_id: ConnectionId,
    pub outbound: Outbound,
}

impl Participant {
    pub fn new(identity: Identity, role: Role, conn_id: ConnectionId, outbound: Outbound) -> Self {
        Self {
            identity,
            role,
            conn_id,
            outbound,
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.identity.player_id
    }
}

/// What a session was created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub name: String,
    pub password: String,
    /// Cap on non-leader participants.
    pub max_players: usize,
    pub leader: PlayerId,
    pub pack_id: String,
}

/// A snapshot of registry state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubInfo {
    pub session_id: SessionId,
    /// Registered connections, leader included.
    pub members: usize,
    /// Registered non-leader connections.
    pub players: usize,
    pub max_players: usize,
}

pub(crate) enum HubCommand {
    Register {
        participant: Participant,
        reply: oneshot::Sender<Result<(), HubError>>,
    },
    Unregister {
        player_id: PlayerId,
        conn_id: ConnectionId,
    },
    Info {
        reply: oneshot::Sender<HubInfo>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running hub. Cheap to clone.
///
/// Adapters use [`HubHandle::register`] and [`HubHandle::unregister`] for
/// membership, and submit their game actions straight to
/// [`HubHandle::engine`].
#[derive(Debug, Clone)]
pub struct HubHandle {
    session_id: SessionId,
    sender: mpsc::Sender<HubCommand>,
    engine: EngineHandle,
}

impl HubHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The session's engine queue.
    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Registers a connection under its identity.
    ///
    /// An identity that is already registered is replaced and its old
    /// outbound queue dropped. Fails with [`HubError::Full`] when a new
    /// player would exceed the cap.
    pub async fn register(&self, participant: Participant) -> Result<(), HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(HubCommand::Register {
                participant,
                reply: reply_tx,
            })
            .await
            .map_err(|_| HubError::Unavailable(self.session_id))?;
        reply_rx
            .await
            .map_err(|_| HubError::Unavailable(self.session_id))?
    }

    /// Unregisters a connection. Idempotent, and a no-op if `conn_id` has
    /// already been replaced by a newer connection.
    pub async fn unregister(&self, player_id: PlayerId, conn_id: ConnectionId) {
        let _ = self
            .sender
            .send(HubCommand::Unregister { player_id, conn_id })
            .await;
    }

    pub async fn info(&self) -> Result<HubInfo, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(HubCommand::Info { reply: reply_tx })
            .await
            .map_err(|_| HubError::Unavailable(self.session_id))?;
        reply_rx
            .await
            .map_err(|_| HubError::Unavailable(self.session_id))
    }

    /// Tells the hub to drop every participant and stop.
    pub async fn shutdown(&self) -> Result<(), HubError> {
        self.sender
            .send(HubCommand::Shutdown)
            .await
            .map_err(|_| HubError::Unavailable(self.session_id))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct HubActor {
    session_id: SessionId,
    max_players: usize,
    members: HashMap<PlayerId, Participant>,
    engine: EngineHandle,
    engine_task: JoinHandle<()>,
    commands: mpsc::Receiver<HubCommand>,
    dispatches: mpsc::UnboundedReceiver<Dispatch>,
    grace: StepTimer,
    empty_grace: Duration,
    codec: JsonCodec,
}

impl HubActor {
    async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "session started");

        // A session nobody ever registers with still goes away.
        self.grace.arm(self.empty_grace);

        loop {
            tokio::select! {
                biased;
                dispatch = self.dispatches.recv() => match dispatch {
                    Some(Dispatch::Shutdown) => {
                        tracing::info!(session_id = %self.session_id, "engine finished the session");
                        break;
                    }
                    Some(dispatch) => self.on_dispatch(dispatch).await,
                    None => {
                        tracing::debug!(session_id = %self.session_id, "engine stopped");
                        break;
                    }
                },
                cmd = self.commands.recv() => match cmd {
                    Some(HubCommand::Register { participant, reply }) => {
                        match self.on_register(participant) {
                            Ok(join) => {
                                let _ = reply.send(Ok(()));
                                self.submit(join).await;
                            }
                            Err(e) => {
                                let _ = reply.send(Err(e));
                            }
                        }
                    }
                    Some(HubCommand::Unregister { player_id, conn_id }) => {
                        if let Some(leave) = self.on_unregister(player_id, conn_id) {
                            self.submit(leave).await;
                        }
                    }
                    Some(HubCommand::Info { reply }) => {
                        let _ = reply.send(self.info());
                    }
                    Some(HubCommand::Shutdown) | None => {
                        tracing::info!(session_id = %self.session_id, "session shutting down");
                        break;
                    }
                },
                _ = self.grace.expired() => {
                    tracing::info!(session_id = %self.session_id, "session empty for too long");
                    break;
                }
            }
        }

        // Dropping the queues ends every write pump, which closes its socket.
        self.members.clear();
        self.engine_task.abort();
        tracing::info!(session_id = %self.session_id, "session stopped");
    }

    fn on_register(&mut self, participant: Participant) -> Result<ClientAction, HubError> {
        let player_id = participant.player_id();
        let conn_id = participant.conn_id;

        if let Some(stale) = self.members.get(&player_id) {
            tracing::info!(
                session_id = %self.session_id,
                %player_id,
                old_conn = %stale.conn_id,
                new_conn = %conn_id,
                "replacing connection"
            );
        } else if participant.role == Role::Player && self.player_count() >= self.max_players {
            tracing::debug!(session_id = %self.session_id, %player_id, "session full");
            return Err(HubError::Full(self.session_id));
        }

        let join = ClientAction::membership(
            ActionKind::Join,
            participant.identity.clone(),
            participant.role,
        );
        self.members.insert(player_id, participant);
        self.grace.disarm();
        tracing::info!(
            session_id = %self.session_id,
            %player_id,
            %conn_id,
            members = self.members.len(),
            "participant registered"
        );
        Ok(join)
    }

    fn on_unregister(&mut self, player_id: PlayerId, conn_id: ConnectionId) -> Option<ClientAction> {
        if self.members.get(&player_id)?.conn_id != conn_id {
            tracing::debug!(session_id = %self.session_id, %player_id, %conn_id, "stale unregister ignored");
            return None;
        }
        let participant = self.members.remove(&player_id)?;
        tracing::info!(
            session_id = %self.session_id,
            %player_id,
            %conn_id,
            members = self.members.len(),
            "participant unregistered"
        );
        Some(self.departed(participant))
    }

    async fn on_dispatch(&mut self, dispatch: Dispatch) {
        let mut dropped = Vec::new();

        match dispatch {
            Dispatch::Send { to, event } => {
                let Some(frame) = self.encode(&event) else {
                    return;
                };
                let targets: Vec<PlayerId> = self
                    .members
                    .keys()
                    .copied()
                    .filter(|id| to.includes(*id))
                    .collect();
                for player_id in targets {
                    self.deliver(player_id, Arc::clone(&frame), &mut dropped);
                }
            }
            Dispatch::Notify { player, notice } => {
                if let Some(frame) = self.encode(&ServerEvent::notice(notice)) {
                    self.deliver(player, frame, &mut dropped);
                }
            }
            Dispatch::Evict {
                player,
                expired_at,
                notice,
            } => {
                let stale = self
                    .members
                    .get(&player)
                    .is_some_and(|p| p.identity.expires_at <= expired_at);
                if !stale {
                    tracing::debug!(session_id = %self.session_id, player_id = %player, "eviction skipped, credential was renewed");
                    return;
                }
                if let Some(frame) = self.encode(&ServerEvent::notice(notice)) {
                    self.deliver(player, frame, &mut dropped);
                }
                if let Some(participant) = self.members.remove(&player) {
                    tracing::info!(session_id = %self.session_id, player_id = %player, "participant evicted");
                    dropped.push(participant);
                }
            }
            Dispatch::Shutdown => {}
        }

        for participant in dropped {
            let leave = self.departed(participant);
            self.submit(leave).await;
        }
    }

    /// Queues a frame for one participant. A full or closed queue removes
    /// the participant; the caller reports it to the engine.
    fn deliver(&mut self, player_id: PlayerId, frame: Arc<str>, dropped: &mut Vec<Participant>) {
        let Some(participant) = self.members.get(&player_id) else {
            return;
        };
        match participant.outbound.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(session_id = %self.session_id, %player_id, "slow consumer, disconnecting");
                if let Some(p) = self.members.remove(&player_id) {
                    dropped.push(p);
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(session_id = %self.session_id, %player_id, "outbound queue closed");
                if let Some(p) = self.members.remove(&player_id) {
                    dropped.push(p);
                }
            }
        }
    }

    /// Builds the disconnect action for a removed participant and starts
    /// the grace timer if nobody is left.
    fn departed(&mut self, participant: Participant) -> ClientAction {
        if self.members.is_empty() {
            self.grace.arm(self.empty_grace);
        }
        ClientAction::membership(ActionKind::Disconnect, participant.identity, participant.role)
    }

    async fn submit(&self, action: ClientAction) {
        if let Err(e) = self.engine.submit(action).await {
            tracing::debug!(session_id = %self.session_id, error = %e, "engine did not take membership change");
        }
    }

    fn encode(&self, event: &ServerEvent) -> Option<Arc<str>> {
        match self.codec.encode(event) {
            Ok(text) => Some(Arc::from(text)),
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, kind = event.kind(), error = %e, "failed to encode event");
                None
            }
        }
    }

    fn player_count(&self) -> usize {
        self.members.values().filter(|p| p.role == Role::Player).count()
    }

    fn info(&self) -> HubInfo {
        HubInfo {
            session_id: self.session_id,
            members: self.members.len(),
            players: self.player_count(),
            max_players: self.max_players,
        }
    }
}

/// Spawns a session: its engine and the hub in front of it.
///
/// The returned [`JoinHandle`] resolves when the hub stops, which also
/// stops the engine.
pub fn spawn_session(
    session_id: SessionId,
    options: &SessionOptions,
    package: Arc<Package>,
    timings: Timings,
    config: &HubConfig,
) -> (HubHandle, JoinHandle<()>) {
    let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
    let game = Game::new(package, options.leader, timings);
    let (engine, engine_task) = spawn_engine(session_id, game, dispatch_tx, config.action_capacity);

    let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
    let actor = HubActor {
        session_id,
        max_players: options.max_players,
        members: HashMap::new(),
        engine: engine.clone(),
        engine_task,
        commands: rx,
        dispatches: dispatch_rx,
        grace: StepTimer::new(),
        empty_grace: config.empty_grace,
        codec: JsonCodec,
    };
    let task = tokio::spawn(actor.run());

    (
        HubHandle {
            session_id,
            sender: tx,
            engine,
        },
        task,
    )
}
