//! Active players, their scores, and the turn order.

use std::collections::HashMap;

use quizforge_protocol::{PlayerId, ScoreEntry};

/// A player's record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub score: i64,
}

/// The active players in turn order.
///
/// Two indexes are kept: `order` maps position → identity and `positions`
/// maps identity → position. They are inverse bijections over the active
/// set after every operation ([`Roster::is_consistent`] checks this).
///
/// Players who leave are parked in `departed` with their score, so a
/// player who reconnects picks up where they left off (appended to the
/// end of the turn order).
#[derive(Debug, Default, Clone)]
pub struct Roster {
    order: Vec<PlayerId>,
    positions: HashMap<PlayerId, usize>,
    players: HashMap<PlayerId, Player>,
    departed: HashMap<PlayerId, Player>,
    turn: usize,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player at the end of the turn order.
    ///
    /// Returns `false` (and changes nothing) if the player is already
    /// active. A returning player gets their previous score back.
    pub fn add(&mut self, id: PlayerId, nickname: &str) -> bool {
        if self.positions.contains_key(&id) {
            return false;
        }
        let mut player = self.departed.remove(&id).unwrap_or(Player {
            id,
            nickname: String::new(),
            score: 0,
        });
        player.nickname = nickname.to_owned();

        self.positions.insert(id, self.order.len());
        self.order.push(id);
        self.players.insert(id, player);
        true
    }

    /// Removes a player from the turn order and returns their record.
    ///
    /// The turn stays with the same player when someone else leaves. When
    /// the turn holder leaves, the turn passes to whoever now occupies
    /// that position (wrapping to the front).
    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let pos = self.positions.remove(&id)?;
        self.order.remove(pos);
        for (i, pid) in self.order.iter().enumerate().skip(pos) {
            self.positions.insert(*pid, i);
        }

        if pos < self.turn {
            self.turn -= 1;
        }
        if self.turn >= self.order.len() {
            self.turn = 0;
        }

        let player = self.players.remove(&id)?;
        self.departed.insert(id, player.clone());
        Some(player)
    }

    /// Who picks the next question.
    pub fn turn_holder(&self) -> Option<PlayerId> {
        self.order.get(self.turn).copied()
    }

    /// Passes the turn one position forward, wrapping at the end.
    pub fn advance_turn(&mut self) {
        if !self.order.is_empty() {
            self.turn = (self.turn + 1) % self.order.len();
        }
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn position(&self, id: PlayerId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Active players in turn order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.order.iter().filter_map(|id| self.players.get(id))
    }

    /// Adds `delta` to a player's score and returns the new score.
    pub fn adjust_score(&mut self, id: PlayerId, delta: i64) -> Option<i64> {
        let player = self.players.get_mut(&id)?;
        player.score += delta;
        Some(player.score)
    }

    /// The scoreboard in turn order.
    pub fn scores(&self) -> Vec<ScoreEntry> {
        self.iter()
            .map(|p| ScoreEntry {
                player_id: p.id,
                nickname: p.nickname.clone(),
                score: p.score,
            })
            .collect()
    }

    /// Highest score wins. On a tie the earliest in turn order wins.
    pub fn winner(&self) -> Option<PlayerId> {
        let mut best: Option<&Player> = None;
        for player in self.iter() {
            if best.is_none_or(|b| player.score > b.score) {
                best = Some(player);
            }
        }
        best.map(|p| p.id)
    }

    /// Checks that both indexes describe the same active set.
    pub fn is_consistent(&self) -> bool {
        self.order.len() == self.positions.len()
            && self.order.len() == self.players.len()
            && self
                .order
                .iter()
                .enumerate()
                .all(|(i, id)| self.positions.get(id) == Some(&i) && self.players.contains_key(id))
            && (self.order.is_empty() || self.turn < self.order.len())
    }
}
