//! The game as a pure state machine.
//!
//! [`Game::apply`] takes one input (a participant action or the step
//! deadline) plus the current wall-clock time and returns an [`Outcome`]:
//! the dispatches to deliver and what to do with the step timer. It never
//! touches a socket, a channel or a clock, which keeps every rule testable
//! with plain function calls. The actor in [`crate::spawn_engine`] is
//! only glue around it.

use std::sync::Arc;
use std::time::Duration;

use quizforge_content::{Board, ContentError, Package, QuestionKey};
use quizforge_protocol::{
    ActionKind, ChooseQuest, ClientAction, Dispatch, EventBody, GiveAnswer, Notice, PlayerId,
    Recipient, Role, ServerEvent, notices,
};

use crate::{Roster, Step, Timings};

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Something that can move the game forward.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Action(ClientAction),
    /// The current step's deadline passed.
    Deadline,
}

/// What the actor should do with its step timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerChange {
    #[default]
    Keep,
    Arm(Duration),
    Disarm,
}

/// The result of one transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub dispatches: Vec<Dispatch>,
    pub timer: TimerChange,
}

impl Outcome {
    fn push(&mut self, dispatch: Dispatch) {
        self.dispatches.push(dispatch);
    }

    fn notify(&mut self, player: PlayerId, notice: Notice) {
        self.push(Dispatch::notify(player, notice));
    }

    /// `true` if this outcome ends the session.
    pub fn is_shutdown(&self) -> bool {
        self.dispatches.iter().any(|d| matches!(d, Dispatch::Shutdown))
    }
}

/// The question currently on the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selection {
    key: QuestionKey,
    price: u32,
    /// Turn holder when the question was picked.
    chooser: Option<PlayerId>,
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// One game instance.
#[derive(Debug)]
pub struct Game {
    board: Board,
    timings: Timings,
    step: Step,
    /// Position of the round being played. `None` before the first round.
    round: Option<usize>,
    selection: Option<Selection>,
    answerer: Option<PlayerId>,
    leader: PlayerId,
    leader_nickname: Option<String>,
    roster: Roster,
    /// Unix-seconds deadline of the current step, `0` when untimed.
    deadline: i64,
}

impl Game {
    pub fn new(package: Arc<Package>, leader: PlayerId, timings: Timings) -> Self {
        Self {
            board: Board::new(package),
            timings,
            step: Step::WaitingStart,
            round: None,
            selection: None,
            answerer: None,
            leader,
            leader_nickname: None,
            roster: Roster::new(),
            deadline: 0,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn leader(&self) -> PlayerId {
        self.leader
    }

    pub fn answerer(&self) -> Option<PlayerId> {
        self.answerer
    }

    /// The round being played (0-based), if one has started.
    pub fn round(&self) -> Option<usize> {
        self.round
    }

    pub fn is_closed(&self) -> bool {
        self.step == Step::Closed
    }

    /// Opens the lobby. Call once, right after construction.
    pub fn open(&mut self, now: i64) -> Outcome {
        let mut out = Outcome::default();
        self.arm(&mut out, now, self.timings.lobby_idle);
        out
    }

    /// Applies one input.
    pub fn apply(&mut self, input: Input, now: i64) -> Outcome {
        let mut out = Outcome::default();
        if self.step == Step::Closed {
            return out;
        }
        match input {
            Input::Action(action) => self.on_action(action, now, &mut out),
            Input::Deadline => self.on_deadline(now, &mut out),
        }
        out
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    fn on_action(&mut self, action: ClientAction, now: i64, out: &mut Outcome) {
        let actor = action.actor.player_id;
        let membership = matches!(action.kind, ActionKind::Join | ActionKind::Disconnect);

        if !membership && action.actor.is_expired_at(now) {
            tracing::debug!(player_id = %actor, kind = %action.kind, "action with expired credential");
            out.push(Dispatch::Evict {
                player: actor,
                expired_at: action.actor.expires_at,
                notice: Notice::unauthorized(notices::TOKEN_EXPIRED),
            });
            return;
        }

        let member = match action.role {
            Role::Leader => actor == self.leader,
            Role::Player => membership || self.roster.contains(actor),
        };
        if !action.kind.permits(action.role) || !member {
            tracing::debug!(player_id = %actor, kind = %action.kind, role = %action.role, "permission denied");
            out.notify(actor, Notice::forbidden(notices::PERMISSION_DENIED));
            return;
        }

        match (self.step, action.kind) {
            (_, ActionKind::Join) => self.on_join(&action, out),
            (_, ActionKind::Disconnect) => self.on_disconnect(actor, action.role, now, out),

            (Step::Final, _) => out.notify(actor, Notice::conflict(notices::GAME_OVER)),

            (Step::WaitingStart, ActionKind::StartGame) => self.on_start(actor, now, out),
            (_, ActionKind::StartGame) => {
                out.notify(actor, Notice::conflict(notices::ALREADY_STARTED));
            }

            (Step::ChooseQuestion, ActionKind::ChooseQuest) => {
                self.on_choose(&action, now, out);
            }

            (Step::Getting, ActionKind::GetQuest) => self.on_claim(actor, now, out),
            (Step::Answering, ActionKind::GetQuest) => {
                out.notify(actor, Notice::conflict(notices::QUESTION_CLAIMED));
            }

            (Step::Answering, ActionKind::GiveAnswer) => self.on_give(&action, out),
            (Step::Answering, ActionKind::AcceptAnswer) => self.resolve(true, now, out),
            (Step::Answering, ActionKind::DeclineAnswer) => self.resolve(false, now, out),

            (step, kind) => {
                tracing::debug!(player_id = %actor, %kind, %step, "action not allowed in this step");
                out.notify(actor, Notice::conflict(notices::NOT_ALLOWED_NOW));
            }
        }
    }

    fn on_join(&mut self, action: &ClientAction, out: &mut Outcome) {
        let id = action.actor.player_id;
        let nickname = action.actor.login.clone();

        // Introduce everyone already present to the newcomer.
        if let Some(leader_nick) = &self.leader_nickname {
            if id != self.leader {
                out.push(Dispatch::to_player(
                    id,
                    ServerEvent::new(EventBody::Joined {
                        player_id: self.leader,
                        nickname: leader_nick.clone(),
                        role: Role::Leader,
                    }),
                ));
            }
        }
        for player in self.roster.iter().filter(|p| p.id != id) {
            out.push(Dispatch::to_player(
                id,
                ServerEvent::new(EventBody::Joined {
                    player_id: player.id,
                    nickname: player.nickname.clone(),
                    role: Role::Player,
                }),
            ));
        }

        match action.role {
            Role::Leader => self.leader_nickname = Some(nickname.clone()),
            Role::Player => {
                self.roster.add(id, &nickname);
            }
        }
        tracing::info!(player_id = %id, role = %action.role, players = self.roster.len(), "participant joined");

        out.push(Dispatch::to_all(ServerEvent::new(EventBody::Joined {
            player_id: id,
            nickname,
            role: action.role,
        })));

        self.catch_up(id, action.role, out);
    }

    /// Brings a participant who joins mid-game up to date.
    fn catch_up(&self, id: PlayerId, role: Role, out: &mut Outcome) {
        let Some(round) = self.round else {
            return;
        };
        if !self.step.shows_board() {
            return;
        }
        if let Some(r) = self.board.round(round) {
            out.push(Dispatch::to_player(
                id,
                ServerEvent::new(EventBody::Wall {
                    round_id: r.id,
                    themes: self.board.view(round),
                }),
            ));
        }
        if let Some(holder) = self.roster.turn_holder() {
            out.push(Dispatch::to_player(
                id,
                ServerEvent::new(EventBody::Turn { player_id: holder }),
            ));
        }
        if let Some(sel) = self.selection {
            if let Some(q) = self.board.find(sel.key) {
                out.push(Dispatch::to_player(
                    id,
                    ServerEvent::with_deadline(
                        EventBody::Question {
                            theme_id: sel.key.theme,
                            question_id: sel.key.question,
                            scene: q.scene.clone(),
                        },
                        self.deadline,
                    ),
                ));
                if role == Role::Leader {
                    out.push(Dispatch::to_player(id, self.answer_event(sel, q.answer.clone())));
                }
            }
        }
    }

    fn on_disconnect(&mut self, id: PlayerId, role: Role, now: i64, out: &mut Outcome) {
        match role {
            Role::Leader => {
                self.leader_nickname = None;
            }
            Role::Player => {
                let holder_before = self.roster.turn_holder();
                if self.roster.remove(id).is_none() {
                    return;
                }
                out.push(Dispatch::to_all(ServerEvent::new(EventBody::Left { player_id: id })));

                if self.step == Step::Answering && self.answerer == Some(id) {
                    // Nobody is left to judge: close the question unscored.
                    self.answerer = None;
                    self.finish_question(now, out);
                } else if self.step == Step::ChooseQuestion && holder_before == Some(id) {
                    if let Some(holder) = self.roster.turn_holder() {
                        out.push(Dispatch::to_all(ServerEvent::with_deadline(
                            EventBody::Turn { player_id: holder },
                            self.deadline,
                        )));
                    }
                }
                tracing::info!(player_id = %id, players = self.roster.len(), "player left");
                return;
            }
        }
        out.push(Dispatch::to_all(ServerEvent::new(EventBody::Left { player_id: id })));
        tracing::info!(player_id = %id, "leader left");
    }

    fn on_start(&mut self, actor: PlayerId, now: i64, out: &mut Outcome) {
        if self.roster.is_empty() {
            out.notify(actor, Notice::conflict(notices::NOT_ENOUGH_PLAYERS));
            return;
        }
        tracing::info!(players = self.roster.len(), "game started");
        self.step = Step::Greeting;
        let exp = self.arm(out, now, self.timings.greeting);
        let package = self.board.package();
        let greeting = EventBody::Greetings {
            name: package.name.clone(),
            author: package.author.clone(),
            date: package.date.clone(),
        };
        out.push(Dispatch::to_all(ServerEvent::with_deadline(greeting, exp)));
    }

    fn on_choose(&mut self, action: &ClientAction, now: i64, out: &mut Outcome) {
        let actor = action.actor.player_id;
        if self.roster.turn_holder() != Some(actor) {
            out.notify(actor, Notice::forbidden(notices::NOT_YOUR_TURN));
            return;
        }
        let body: ChooseQuest = match action.payload_as() {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(player_id = %actor, error = %e, "malformed choose_quest payload");
                return;
            }
        };
        let Some(round) = self.round else {
            tracing::warn!(step = %self.step, "choosing with no round in play");
            return;
        };
        let key = QuestionKey {
            round,
            theme: body.theme_id,
            question: body.question_id,
        };
        match self.select(key, now, out) {
            Ok(()) => {}
            Err(ContentError::AlreadyTaken(_)) => {
                out.notify(actor, Notice::conflict(notices::QUESTION_TAKEN));
            }
            Err(_) => out.notify(actor, Notice::not_found(notices::QUESTION_NOT_FOUND)),
        }
    }

    fn on_claim(&mut self, actor: PlayerId, now: i64, out: &mut Outcome) {
        self.step = Step::Answering;
        self.answerer = Some(actor);
        let exp = self.arm(out, now, self.timings.answer);
        tracing::debug!(player_id = %actor, "question claimed");
        out.push(Dispatch::to_all(ServerEvent::with_deadline(
            EventBody::TakenQuest { player_id: actor },
            exp,
        )));
    }

    fn on_give(&mut self, action: &ClientAction, out: &mut Outcome) {
        let actor = action.actor.player_id;
        if self.answerer != Some(actor) {
            out.notify(actor, Notice::forbidden(notices::NOT_ANSWERER));
            return;
        }
        let body: GiveAnswer = match action.payload_as() {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(player_id = %actor, error = %e, "malformed give_answer payload");
                return;
            }
        };
        out.push(Dispatch::to_all(ServerEvent::with_deadline(
            EventBody::AnswerGiven {
                player_id: actor,
                text: body.text,
            },
            self.deadline,
        )));
    }

    // -----------------------------------------------------------------------
    // Deadlines
    // -----------------------------------------------------------------------

    fn on_deadline(&mut self, now: i64, out: &mut Outcome) {
        tracing::debug!(step = %self.step, "step deadline reached");
        match self.step {
            Step::WaitingStart => {
                tracing::info!("lobby idle for too long, closing session");
                self.close(out);
            }
            Step::Greeting => {
                let next = self.round.map_or(0, |r| r + 1);
                if next < self.board.round_count() {
                    self.enter_round(next, now, out);
                } else {
                    self.enter_final(now, out);
                }
            }
            Step::ReadingRound => self.enter_themes(now, out),
            Step::ReadingThemes => self.enter_choose(now, out),
            Step::ChooseQuestion => {
                let auto = self.round.and_then(|r| self.board.first_available(r));
                match auto {
                    Some(key) => {
                        tracing::debug!(%key, "choose timed out, picking first unclaimed question");
                        if let Err(e) = self.select(key, now, out) {
                            tracing::warn!(error = %e, "auto-selection failed");
                            self.after_question(now, out);
                        }
                    }
                    None => self.after_question(now, out),
                }
            }
            Step::Getting => {
                tracing::debug!("nobody claimed the question");
                self.finish_question(now, out);
            }
            Step::Answering => self.resolve(false, now, out),
            Step::Final => self.close(out),
            Step::Closed => {}
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn enter_round(&mut self, round: usize, now: i64, out: &mut Outcome) {
        let Some(r) = self.board.round(round) else {
            tracing::warn!(round, "round does not exist");
            return;
        };
        let body = EventBody::ReadingRound {
            round_id: r.id,
            name: r.name.clone(),
        };
        self.round = Some(round);
        self.step = Step::ReadingRound;
        let exp = self.arm(out, now, self.timings.round_intro);
        tracing::info!(round = round + 1, "round started");
        out.push(Dispatch::to_all(ServerEvent::with_deadline(body, exp)));
    }

    fn enter_themes(&mut self, now: i64, out: &mut Outcome) {
        let Some(r) = self.round.and_then(|r| self.board.round(r)) else {
            tracing::warn!(step = %self.step, "no round in play");
            return;
        };
        let themes: Vec<String> = r.themes.iter().map(|t| t.name.clone()).collect();
        self.step = Step::ReadingThemes;
        let exp = self.arm(out, now, self.timings.reading_themes(themes.len()));
        out.push(Dispatch::to_all(ServerEvent::with_deadline(
            EventBody::ReadingThemes { themes },
            exp,
        )));
    }

    fn enter_choose(&mut self, now: i64, out: &mut Outcome) {
        let Some(round) = self.round else {
            tracing::warn!(step = %self.step, "no round in play");
            return;
        };
        if !self.board.has_available(round) {
            self.end_round(now, out);
            return;
        }
        let Some(round_id) = self.board.round(round).map(|r| r.id) else {
            return;
        };
        self.step = Step::ChooseQuestion;
        let exp = self.arm(out, now, self.timings.choose);
        out.push(Dispatch::to_all(ServerEvent::with_deadline(
            EventBody::Wall {
                round_id,
                themes: self.board.view(round),
            },
            exp,
        )));
        if let Some(holder) = self.roster.turn_holder() {
            out.push(Dispatch::to_all(ServerEvent::with_deadline(
                EventBody::Turn { player_id: holder },
                exp,
            )));
        }
    }

    /// Takes a question off the board and shows it.
    fn select(&mut self, key: QuestionKey, now: i64, out: &mut Outcome) -> Result<(), ContentError> {
        let question = self.board.take(key)?;
        let price = question.price;
        let scene = question.scene.clone();
        let answer = question.answer.clone();

        let sel = Selection {
            key,
            price,
            chooser: self.roster.turn_holder(),
        };
        self.selection = Some(sel);
        self.answerer = None;
        self.step = Step::Getting;
        let exp = self.arm(out, now, self.timings.buzz);
        tracing::debug!(%key, price, taken = self.board.taken_count(), "question selected");

        out.push(Dispatch::to_all(ServerEvent::with_deadline(
            EventBody::QuestionChosen {
                theme_id: key.theme,
                question_id: key.question,
                price,
            },
            exp,
        )));
        out.push(Dispatch::to_all(ServerEvent::with_deadline(
            EventBody::Question {
                theme_id: key.theme,
                question_id: key.question,
                scene,
            },
            exp,
        )));
        out.push(Dispatch::Send {
            to: Recipient::Player(self.leader),
            event: self.answer_event(sel, answer),
        });
        Ok(())
    }

    /// Scores the current answer and moves on.
    fn resolve(&mut self, accepted: bool, now: i64, out: &mut Outcome) {
        let (Some(answerer), Some(sel)) = (self.answerer.take(), self.selection) else {
            tracing::warn!(step = %self.step, "resolving with no answer pending");
            return;
        };
        let delta = if accepted { sel.price as i64 } else { -(sel.price as i64) };
        let body = if accepted {
            EventBody::AnswerAccepted {
                player_id: answerer,
                price: sel.price,
            }
        } else {
            EventBody::AnswerDeclined {
                player_id: answerer,
                price: sel.price,
            }
        };
        out.push(Dispatch::to_all(ServerEvent::new(body)));

        match self.roster.adjust_score(answerer, delta) {
            Some(score) => {
                tracing::debug!(player_id = %answerer, accepted, score, "answer judged");
                out.push(Dispatch::to_all(ServerEvent::new(EventBody::ScoreChanged {
                    player_id: answerer,
                    score,
                })));
            }
            None => tracing::warn!(player_id = %answerer, "answerer missing from roster"),
        }

        // A departed chooser already handed the turn to the next seat.
        if self.roster.turn_holder() == sel.chooser {
            self.roster.advance_turn();
        }
        self.finish_question(now, out);
    }

    /// Reveals the current question's answer to everyone and continues.
    fn finish_question(&mut self, now: i64, out: &mut Outcome) {
        if let Some(sel) = self.selection.take() {
            if let Some(q) = self.board.find(sel.key) {
                out.push(Dispatch::to_all(ServerEvent::new(EventBody::AnswerReveal {
                    theme_id: sel.key.theme,
                    question_id: sel.key.question,
                    answer: q.answer.clone(),
                })));
            }
        }
        self.answerer = None;
        self.after_question(now, out);
    }

    fn after_question(&mut self, now: i64, out: &mut Outcome) {
        match self.round {
            Some(round) if self.board.has_available(round) => self.enter_choose(now, out),
            _ => self.end_round(now, out),
        }
    }

    fn end_round(&mut self, now: i64, out: &mut Outcome) {
        let round = self.round.unwrap_or(0);
        if round + 1 < self.board.round_count() {
            let round_id = self.board.round(round).map_or(0, |r| r.id);
            self.step = Step::Greeting;
            let exp = self.arm(out, now, self.timings.greeting);
            tracing::info!(round = round + 1, "round finished");
            out.push(Dispatch::to_all(ServerEvent::with_deadline(
                EventBody::RoundOver {
                    round_id,
                    scores: self.roster.scores(),
                },
                exp,
            )));
        } else {
            self.enter_final(now, out);
        }
    }

    fn enter_final(&mut self, now: i64, out: &mut Outcome) {
        self.step = Step::Final;
        self.selection = None;
        self.answerer = None;
        let exp = self.arm(out, now, self.timings.final_display);
        let winner = self.roster.winner();
        tracing::info!(winner = ?winner, "game finished");
        out.push(Dispatch::to_all(ServerEvent::with_deadline(
            EventBody::Final {
                winner_id: winner,
                scores: self.roster.scores(),
            },
            exp,
        )));
    }

    fn close(&mut self, out: &mut Outcome) {
        self.step = Step::Closed;
        self.deadline = 0;
        out.timer = TimerChange::Disarm;
        out.push(Dispatch::Shutdown);
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Arms the step timer and returns the unix-seconds deadline.
    fn arm(&mut self, out: &mut Outcome, now: i64, after: Duration) -> i64 {
        out.timer = TimerChange::Arm(after);
        self.deadline = now + after.as_secs() as i64 + i64::from(after.subsec_nanos() > 0);
        self.deadline
    }

    fn answer_event(&self, sel: Selection, answer: Vec<String>) -> ServerEvent {
        ServerEvent::with_deadline(
            EventBody::Answer {
                theme_id: sel.key.theme,
                question_id: sel.key.question,
                answer,
            },
            self.deadline,
        )
    }
}
