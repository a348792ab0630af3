use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::board::Tabletop;
use crate::cards::{selection_shape_is_valid, CellPos, MAX_SELECTION, MIN_SELECTION};
use crate::error::{GameError, InvalidMoveReason};
use crate::event::{CockadeAward, CommonObjectiveView, GameStartSnapshot, GameUpdate};
use crate::objectives::{
    choose_common_objectives, group_cockades, personal_cockade, personal_objective_deck,
    CommonObjective, PersonalObjective, PERSONAL_POINTS, PERSONAL_TARGETS,
};
use crate::scores::{
    build_scoreboard, sole_survivor_scoreboard, Cockade, PlayerTally, Scoreboard,
};
use crate::shelf::{Shelf, SHELF_COLS};


pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 4;

pub const PERSONAL_COCKADE_NAME: &str = "Personal Objective";
pub const FIRST_FILLER_COCKADE_NAME: &str = "Cabinet Sealed";

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Paused,
    Ended,
}

// Restartable cyclic sequence over seats. Once any shelf fills the cycle
// terminates at the next wrap to seat 0, so every remaining player in the
// round still gets their turn. Seats whose shelves are already full are
// skipped.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnCursor {
    num_players: usize,
    current: usize,
    ending: bool,
    terminated: bool,
}

impl TurnCursor {
    pub fn new(num_players: usize) -> Self {
        assert!(num_players >= 1);
        TurnCursor { num_players, current: 0, ending: false, terminated: false }
    }

    pub fn current(&self) -> usize { self.current }
    pub fn is_ending(&self) -> bool { self.ending }
    pub fn is_terminated(&self) -> bool { self.terminated }

    pub fn mark_ending(&mut self) { self.ending = true; }

    pub fn advance(&mut self, shelf_is_full: impl Fn(usize) -> bool) -> Option<usize> {
        assert!(!self.terminated);
        let start = self.current;
        let mut next = self.current;
        loop {
            next = (next + 1) % self.num_players;
            if next == 0 && self.ending {
                self.terminated = true;
                return None;
            }
            if !shelf_is_full(next) {
                self.current = next;
                return Some(next);
            }
            if next == start {
                // Everyone still in the cycle has a full shelf.
                self.terminated = true;
                return None;
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GamePlayer {
    pub username: String,
    pub shelf: Shelf,
    pub personal: PersonalObjective,
    pub tally: PlayerTally,
    pub personal_completed: bool,
}

impl GamePlayer {
    fn new(username: String, personal: PersonalObjective) -> Self {
        GamePlayer {
            username,
            shelf: Shelf::new(),
            personal,
            tally: PlayerTally::default(),
            personal_completed: false,
        }
    }
}

#[derive(Debug)]
pub enum MoveOutcome {
    Continued(GameUpdate),
    Finished(GameUpdate, Scoreboard),
}

// One running game. Owns the canonical board, shelves, objectives and turn
// cursor; all mutation goes through `apply_move`, serialized by the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameSession {
    players: Vec<GamePlayer>,
    tabletop: Tabletop,
    common: Vec<CommonObjective>,
    cursor: TurnCursor,
    status: SessionStatus,
    next_event_id: u64,
}

impl GameSession {
    pub fn new(usernames: Vec<String>, rng: &mut impl Rng) -> Self {
        let num_players = usernames.len();
        let tabletop = Tabletop::new(num_players, rng);
        let common = choose_common_objectives(num_players, rng);
        let mut deck = personal_objective_deck(rng);
        deck.shuffle(rng);
        let personals = deck.drain(..num_players).collect();
        Self::with_setup(usernames, tabletop, common, personals)
    }

    // Staged construction with a prepared board and objective set.
    pub fn with_setup(
        usernames: Vec<String>, tabletop: Tabletop, common: Vec<CommonObjective>,
        personals: Vec<PersonalObjective>,
    ) -> Self {
        let num_players = usernames.len();
        assert!((MIN_PLAYERS..=MAX_PLAYERS).contains(&num_players));
        assert_eq!(tabletop.num_players(), num_players);
        assert_eq!(common.len(), 2);
        assert_eq!(personals.len(), num_players);
        let players = usernames
            .into_iter()
            .zip(personals)
            .map(|(username, personal)| GamePlayer::new(username, personal))
            .collect();
        GameSession {
            players,
            tabletop,
            common,
            cursor: TurnCursor::new(num_players),
            status: SessionStatus::Active,
            next_event_id: 0,
        }
    }

    pub fn status(&self) -> SessionStatus { self.status }
    pub fn players(&self) -> &[GamePlayer] { &self.players }
    pub fn tabletop(&self) -> &Tabletop { &self.tabletop }

    pub fn usernames(&self) -> Vec<String> {
        self.players.iter().map(|p| p.username.clone()).collect()
    }

    pub fn player(&self, username: &str) -> Option<&GamePlayer> {
        self.players.iter().find(|p| p.username == username)
    }

    pub fn current_player(&self) -> &str { &self.players[self.cursor.current()].username }

    pub fn pause(&mut self) {
        if self.status == SessionStatus::Active {
            self.status = SessionStatus::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.status == SessionStatus::Paused {
            self.status = SessionStatus::Active;
        }
    }

    pub fn start_snapshot_for(&self, username: &str) -> GameStartSnapshot {
        let recipient = self.player(username).expect("snapshot for unknown player");
        GameStartSnapshot {
            players: self.usernames(),
            tabletop: self.tabletop.view(),
            shelves: self
                .players
                .iter()
                .map(|p| (p.username.clone(), p.shelf.clone()))
                .collect(),
            common_objectives: self
                .common
                .iter()
                .map(|objective| CommonObjectiveView {
                    kind: objective.kind,
                    current_points: objective.current_points(),
                })
                .collect(),
            personal_objective: recipient.personal.clone(),
            current_player: self.current_player().to_owned(),
            paused: self.status == SessionStatus::Paused,
        }
    }

    pub fn apply_move(
        &mut self, username: &str, positions: &[CellPos], column: u8, rng: &mut impl Rng,
    ) -> Result<MoveOutcome, GameError> {
        match self.status {
            SessionStatus::Paused => return Err(GameError::GamePaused),
            SessionStatus::Ended => return Err(GameError::GameEnded),
            SessionStatus::Active => {}
        }
        let seat = self
            .players
            .iter()
            .position(|p| p.username == username)
            .ok_or(GameError::NotYourTurn)?;
        if seat != self.cursor.current() {
            return Err(GameError::NotYourTurn);
        }
        if !(MIN_SELECTION..=MAX_SELECTION).contains(&positions.len()) {
            return Err(GameError::InvalidMove(InvalidMoveReason::SelectionSize));
        }
        if positions.iter().any(|&pos| !self.tabletop.is_pickable(pos)) {
            return Err(GameError::InvalidMove(InvalidMoveReason::NotPickable));
        }
        if !selection_shape_is_valid(positions) {
            return Err(GameError::InvalidMove(InvalidMoveReason::BadShape));
        }
        if column >= SHELF_COLS
            || self.players[seat].shelf.free_in_column(column) < positions.len()
        {
            return Err(GameError::InvalidMove(InvalidMoveReason::ColumnOverflow));
        }

        let cards = self.tabletop.take(positions);
        self.players[seat].shelf.insert_into_column(column, &cards);

        let mut completed = Vec::new();
        for objective in &mut self.common {
            if !objective.is_awarded_to(username)
                && objective.kind.is_satisfied_by(&self.players[seat].shelf)
            {
                let cockade = objective.award(username);
                self.players[seat].tally.award(cockade.clone());
                completed.push(CockadeAward {
                    username: username.to_owned(),
                    source: format!("common:{}", objective.kind.name()),
                    cockade,
                });
            }
        }
        {
            let player = &mut self.players[seat];
            if !player.personal_completed && player.personal.is_complete(&player.shelf) {
                player.personal_completed = true;
                let cockade =
                    Cockade::new(PERSONAL_COCKADE_NAME, PERSONAL_POINTS[PERSONAL_TARGETS]);
                player.tally.award(cockade.clone());
                completed.push(CockadeAward {
                    username: username.to_owned(),
                    source: "personal".to_owned(),
                    cockade,
                });
            }
            if player.shelf.is_full() && !self.cursor.is_ending() {
                self.cursor.mark_ending();
                let cockade = Cockade::new(FIRST_FILLER_COCKADE_NAME, 1);
                player.tally.award(cockade.clone());
                completed.push(CockadeAward {
                    username: username.to_owned(),
                    source: "first_filler".to_owned(),
                    cockade,
                });
            }
        }

        if self.tabletop.needs_refill() {
            self.tabletop.refill(rng);
        }

        let players = &self.players;
        let next = self.cursor.advance(|idx| players[idx].shelf.is_full());

        let event_id = self.next_event_id;
        self.next_event_id += 1;
        let update = GameUpdate {
            event_id,
            mover: username.to_owned(),
            tabletop: self.tabletop.view(),
            shelf: self.players[seat].shelf.clone(),
            completed,
            next_player: next.map(|idx| self.players[idx].username.clone()),
        };

        match next {
            Some(_) => Ok(MoveOutcome::Continued(update)),
            None => {
                let scoreboard = self.finish();
                Ok(MoveOutcome::Finished(update, scoreboard))
            }
        }
    }

    fn finish(&mut self) -> Scoreboard {
        self.status = SessionStatus::Ended;
        for player in &mut self.players {
            Self::award_end_bonuses(player);
        }
        build_scoreboard(
            self.players
                .iter()
                .map(|p| (p.username.clone(), p.tally.clone()))
                .collect(),
        )
    }

    fn award_end_bonuses(player: &mut GamePlayer) {
        if !player.personal_completed {
            if let Some(cockade) = personal_cockade(&player.shelf, &player.personal) {
                player.tally.award(cockade);
            }
        }
        for cockade in group_cockades(&player.shelf) {
            player.tally.award(cockade);
        }
    }

    // Everyone else abandoned the game. Ends immediately with the survivor on
    // top, end-of-game bonuses included.
    pub fn fast_end(&mut self, survivor: &str) -> Scoreboard {
        assert!(self.player(survivor).is_some());
        self.status = SessionStatus::Ended;
        for player in &mut self.players {
            Self::award_end_bonuses(player);
        }
        sole_survivor_scoreboard(
            self.players
                .iter()
                .map(|p| (p.username.clone(), p.tally.clone()))
                .collect(),
            survivor,
        )
    }
}
