//! Live match state machine
//!
//! A session is `NotStarted`, then `Open` while games are being played, then
//! `Closed`. Per-player tallies over finished games are kept incrementally:
//! every edit to a finished game retracts its contribution, applies the edit
//! and adds the new contribution back.

use crate::config::{RawFeeConfig, SessionConfig};
use crate::error::SessionError;
use crate::types::{Game, GameResult, Slot, SlotEntry, Tally};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    NotStarted,
    Open,
    Closed,
}

/// Whether a game already has a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Unset,
    Finished,
}

/// Running figures shown while a session is open
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningTotals {
    pub finished_games: usize,
    pub unset_games: usize,
    /// Shuttles consumed by finished games
    pub shuttles_used: u32,
    /// Sum of per-player shuttle charges, when a fee configuration is known
    pub shuttle_cost: Option<Decimal>,
    /// Sum of per-player court shares, when a fee configuration is known
    pub court_cost: Option<Decimal>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredLiveSession {
    #[serde(default)]
    status: SessionStatus,
    #[serde(default)]
    games: Vec<Game>,
}

impl From<StoredLiveSession> for LiveSession {
    fn from(stored: StoredLiveSession) -> Self {
        LiveSession::from_games(stored.status, stored.games)
    }
}

/// Games of one session while it is being played
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredLiveSession")]
pub struct LiveSession {
    status: SessionStatus,
    games: Vec<Game>,
    #[serde(skip_serializing)]
    tallies: BTreeMap<String, Tally>,
}

impl LiveSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a session, rebuilding tallies from its finished games
    pub fn from_games(status: SessionStatus, games: Vec<Game>) -> Self {
        let mut tallies = BTreeMap::new();
        for game in games.iter().filter(|g| g.is_finished()) {
            apply(&mut tallies, game);
        }
        Self { status, games, tallies }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    pub fn game(&self, index: usize) -> Option<&Game> {
        self.games.get(index)
    }

    pub fn game_state(&self, index: usize) -> Result<GameState, SessionError> {
        let game = self.games.get(index).ok_or(SessionError::GameNotFound {
            index,
            len: self.games.len(),
        })?;
        Ok(if game.is_finished() { GameState::Finished } else { GameState::Unset })
    }

    /// Tallies over finished games, keyed by player name
    pub fn tallies(&self) -> &BTreeMap<String, Tally> {
        &self.tallies
    }

    pub fn tally(&self, name: &str) -> Option<&Tally> {
        self.tallies.get(name)
    }

    pub fn open(&mut self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::NotStarted => {
                self.status = SessionStatus::Open;
                info!("Session opened with {} game(s)", self.games.len());
                Ok(())
            }
            SessionStatus::Open => Err(SessionError::AlreadyOpen),
            SessionStatus::Closed => Err(SessionError::AlreadyClosed),
        }
    }

    /// Append a game and return its index
    pub fn add_game(&mut self, game: Game) -> Result<usize, SessionError> {
        self.ensure_open()?;
        if game.is_finished() {
            apply(&mut self.tallies, &game);
        }
        self.games.push(game);
        Ok(self.games.len() - 1)
    }

    pub fn remove_game(&mut self, index: usize) -> Result<Game, SessionError> {
        self.ensure_open()?;
        self.check_index(index)?;
        let game = self.games.remove(index);
        if game.is_finished() {
            retract(&mut self.tallies, &game);
        }
        Ok(game)
    }

    pub fn set_player(
        &mut self,
        index: usize,
        slot: Slot,
        entry: Option<SlotEntry>,
    ) -> Result<(), SessionError> {
        self.edit(index, |game| game.set_slot(slot, entry))
    }

    pub fn set_shuttles(&mut self, index: usize, shuttles_used: u32) -> Result<(), SessionError> {
        self.edit(index, |game| game.shuttles_used = shuttles_used)
    }

    pub fn set_result(&mut self, index: usize, result: GameResult) -> Result<(), SessionError> {
        self.edit(index, |game| game.result = result)
    }

    /// Return a game to `Unset`, taking back what it had contributed
    pub fn clear_result(&mut self, index: usize) -> Result<(), SessionError> {
        self.set_result(index, GameResult::Unset)
    }

    /// Figures over finished games, priced when a configuration is given.
    ///
    /// A cost that overflows is reported as `None`.
    pub fn running_totals(&self, config: Option<&SessionConfig>) -> RunningTotals {
        let finished: Vec<&Game> = self.games.iter().filter(|g| g.is_finished()).collect();
        let shuttles_used =
            finished.iter().fold(0u32, |sum, game| sum.saturating_add(game.shuttles_used));
        let participant_count = self.tallies.len();

        let (shuttle_cost, court_cost) = match config {
            Some(config) => {
                let shuttle_cost = self.tallies.values().try_fold(Decimal::ZERO, |sum, t| {
                    sum.checked_add(config.shuttle_cost(t.shuttles_used)?)
                });
                let court_cost = self.tallies.values().try_fold(Decimal::ZERO, |sum, t| {
                    sum.checked_add(config.court_fee.share_for(t.games_played, participant_count)?)
                });
                (shuttle_cost, court_cost)
            }
            None => (None, None),
        };

        RunningTotals {
            finished_games: finished.len(),
            unset_games: self.games.len() - finished.len(),
            shuttles_used,
            shuttle_cost,
            court_cost,
        }
    }

    /// Close the session once every game has a result and fees validate
    pub fn close(&mut self, raw: &RawFeeConfig) -> Result<SessionConfig, SessionError> {
        self.ensure_open()?;
        if self.games.is_empty() {
            return Err(SessionError::NoGames);
        }

        let mut unset = self.games.iter().enumerate().filter(|(_, g)| !g.is_finished());
        if let Some((first_index, _)) = unset.next() {
            return Err(SessionError::UnsetGames { count: unset.count() + 1, first_index });
        }

        let config = SessionConfig::parse(raw)?;
        self.status = SessionStatus::Closed;
        info!(
            games = self.games.len(),
            players = self.tallies.len(),
            "Session closed"
        );
        Ok(config)
    }

    pub fn into_games(self) -> Vec<Game> {
        self.games
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::Open => Ok(()),
            SessionStatus::Closed => Err(SessionError::AlreadyClosed),
            SessionStatus::NotStarted => Err(SessionError::NotOpen),
        }
    }

    fn check_index(&self, index: usize) -> Result<(), SessionError> {
        if index >= self.games.len() {
            return Err(SessionError::GameNotFound { index, len: self.games.len() });
        }
        Ok(())
    }

    fn edit(&mut self, index: usize, change: impl FnOnce(&mut Game)) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.check_index(index)?;

        let Self { games, tallies, .. } = self;
        let game = &mut games[index];
        if game.is_finished() {
            retract(tallies, game);
        }
        change(game);
        if game.is_finished() {
            apply(tallies, game);
        }
        debug!(game = index, finished = game.is_finished(), "Game edited");
        Ok(())
    }
}

fn apply(tallies: &mut BTreeMap<String, Tally>, game: &Game) {
    for (name, tally) in game.tally() {
        tallies.entry(name.to_string()).or_default().add(tally);
    }
}

fn retract(tallies: &mut BTreeMap<String, Tally>, game: &Game) {
    for (name, tally) in game.tally() {
        if let Some(current) = tallies.get_mut(name) {
            current.retract(tally);
            if current.is_empty() {
                tallies.remove(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CourtFee;

    fn open_session() -> LiveSession {
        let mut session = LiveSession::new();
        session.open().unwrap();
        session
    }

    fn batch_tallies(session: &LiveSession) -> BTreeMap<String, Tally> {
        let mut tallies = BTreeMap::new();
        for game in session.games().iter().filter(|g| g.is_finished()) {
            apply(&mut tallies, game);
        }
        tallies
    }

    fn raw_config() -> RawFeeConfig {
        RawFeeConfig::new()
            .with_total_court_fee(Decimal::from(100))
            .with_shuttle_price(Decimal::from(5))
            .with_organizer_fee(Decimal::from(20))
    }

    #[test]
    fn test_status_transitions() {
        let mut session = LiveSession::new();
        assert_eq!(session.status(), SessionStatus::NotStarted);
        assert_eq!(session.add_game(Game::default()), Err(SessionError::NotOpen));

        session.open().unwrap();
        assert_eq!(session.open(), Err(SessionError::AlreadyOpen));

        session
            .add_game(Game::doubles(["P1", "P2"], ["P3", "P4"], 2, GameResult::TeamA))
            .unwrap();
        let config = session.close(&raw_config()).unwrap();
        assert_eq!(config.court_fee, CourtFee::Total(Decimal::from(100)));
        assert_eq!(session.status(), SessionStatus::Closed);

        assert_eq!(session.open(), Err(SessionError::AlreadyClosed));
        assert_eq!(session.set_shuttles(0, 4), Err(SessionError::AlreadyClosed));
    }

    #[test]
    fn test_unset_games_do_not_count_until_finished() {
        let mut session = open_session();
        let index = session
            .add_game(Game::doubles(["P1", "P2"], ["P3", "P4"], 2, GameResult::Unset))
            .unwrap();
        assert!(session.tallies().is_empty());
        assert_eq!(session.game_state(index), Ok(GameState::Unset));

        session.set_result(index, GameResult::TeamB).unwrap();
        assert_eq!(session.game_state(index), Ok(GameState::Finished));
        assert_eq!(session.tally("P3").unwrap().wins, 1);
        assert_eq!(session.tally("P1").unwrap().games_played, 1);
    }

    #[test]
    fn test_clearing_result_decrements_tallies() {
        let mut session = open_session();
        session
            .add_game(Game::doubles(["P1", "P2"], ["P3", "P4"], 2, GameResult::TeamA))
            .unwrap();
        session
            .add_game(Game::doubles(["P1", "P5"], ["P3", "P6"], 3, GameResult::Draw))
            .unwrap();
        assert_eq!(session.tally("P1").unwrap().score, 3);

        session.clear_result(1).unwrap();
        let p1 = session.tally("P1").unwrap();
        assert_eq!(p1.games_played, 1);
        assert_eq!(p1.shuttles_used, 2);
        assert_eq!(p1.score, 2);
        assert!(session.tally("P5").is_none());
        assert!(session.tally("P6").is_none());
    }

    #[test]
    fn test_edits_on_finished_game_keep_tallies_consistent() {
        let mut session = open_session();
        session
            .add_game(Game::doubles(["P1", "P2"], ["P3", "P4"], 2, GameResult::TeamA))
            .unwrap();
        session
            .add_game(Game::doubles(["P1", "P3"], ["P2", "P5"], 1, GameResult::Unset))
            .unwrap();

        session.set_shuttles(0, 5).unwrap();
        session.set_player(0, Slot::B2, Some(SlotEntry::new("P7"))).unwrap();
        session.set_result(1, GameResult::TeamB).unwrap();
        session.set_player(1, Slot::A1, None).unwrap();
        session.set_result(0, GameResult::Draw).unwrap();
        assert_eq!(session.tallies(), &batch_tallies(&session));
        assert!(session.tally("P4").is_none());
        assert_eq!(session.tally("P7").unwrap().score, 1);

        session.remove_game(0).unwrap();
        assert_eq!(session.tallies(), &batch_tallies(&session));
        assert!(session.tally("P7").is_none());
    }

    #[test]
    fn test_close_blocked_by_unset_games_and_bad_config() {
        let mut session = open_session();
        assert_eq!(session.close(&raw_config()), Err(SessionError::NoGames));

        session
            .add_game(Game::doubles(["P1", "P2"], ["P3", "P4"], 2, GameResult::TeamA))
            .unwrap();
        session
            .add_game(Game::doubles(["P1", "P2"], ["P3", "P4"], 2, GameResult::Unset))
            .unwrap();
        session
            .add_game(Game::doubles(["P1", "P2"], ["P3", "P4"], 2, GameResult::Unset))
            .unwrap();
        assert_eq!(
            session.close(&raw_config()),
            Err(SessionError::UnsetGames { count: 2, first_index: 1 })
        );

        session.set_result(1, GameResult::Draw).unwrap();
        session.set_result(2, GameResult::TeamB).unwrap();
        let missing_fee = raw_config().without_court_fee();
        assert!(matches!(
            session.close(&missing_fee),
            Err(SessionError::Config(crate::ConfigError::MissingCourtFee))
        ));
        assert_eq!(session.status(), SessionStatus::Open);
        assert!(session.close(&raw_config()).is_ok());
    }

    #[test]
    fn test_running_totals() {
        let mut session = open_session();
        session
            .add_game(Game::doubles(["P1", "P2"], ["P3", "P4"], 3, GameResult::TeamA))
            .unwrap();
        session
            .add_game(Game::doubles(["P1", "P2"], ["P3", "P4"], 2, GameResult::Unset))
            .unwrap();

        let unpriced = session.running_totals(None);
        assert_eq!(unpriced.finished_games, 1);
        assert_eq!(unpriced.unset_games, 1);
        assert_eq!(unpriced.shuttles_used, 3);
        assert_eq!(unpriced.shuttle_cost, None);

        let config = SessionConfig::parse(&raw_config()).unwrap();
        let priced = session.running_totals(Some(&config));
        assert_eq!(priced.shuttle_cost, Some(Decimal::from(60)));
        assert_eq!(priced.court_cost, Some(Decimal::from(100)));
    }

    #[test]
    fn test_serde_restores_tallies() {
        let mut session = open_session();
        session
            .add_game(Game::doubles(["P1", "P2"], ["P3", "P4"], 3, GameResult::TeamA))
            .unwrap();
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("tallies"));

        let restored: LiveSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
        assert_eq!(restored.tally("P1").unwrap().wins, 1);
    }
}
