// The resolver and event writer only talk to storage through the traits in
// this module. `PgConnection` is the production implementation; the
// in-memory store exists so the identity rules can be exercised without a
// database.

mod games_query;
#[cfg(test)]
pub mod memory;
mod postgres;
pub mod reference;

pub use games_query::{GameFilter, GameQuery, SortOrder, list_games};

use chrono::NaiveDate;
use diesel::QueryResult;
use serde::Serialize;
use std::fmt::{Display, Formatter};

use crate::models::{NewBallpark, NewPitch, NewPlayerPosition, NewTeam};

/// Quality tier of a game's data. Verified data supersedes unverified data
/// for the same business key.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Verification {
    Unverified,
    Verified,
}

impl Verification {
    pub fn is_verified(self) -> bool {
        matches!(self, Verification::Verified)
    }

    pub fn opposite(self) -> Self {
        match self {
            Verification::Unverified => Verification::Verified,
            Verification::Verified => Verification::Unverified,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ReferenceKind {
    Team,
    Ballpark,
}

/// The business key of a game, with reference codes already resolved to ids.
/// Verification status is deliberately not part of it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct GameKey {
    pub home_team_id: i64,
    pub visiting_team_id: i64,
    pub ballpark_id: i64,
    pub date: NaiveDate,
    pub daily_game_number: i32,
}

impl Display for GameKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(home team {}, visiting team {}, ballpark {}, {} game {})",
            self.home_team_id,
            self.visiting_team_id,
            self.ballpark_id,
            self.date,
            self.daily_game_number,
        )
    }
}

/// Read access to the immutable team and ballpark tables, plus the
/// insert-if-absent primitive used to seed them.
pub trait ReferenceStore {
    fn team_id(&mut self, team_code: &str) -> QueryResult<Option<i64>>;

    fn ballpark_id(&mut self, ballpark_name: &str) -> QueryResult<Option<i64>>;

    /// Returns true if the team was inserted, false if its code already existed
    fn insert_team_if_absent(&mut self, team: &NewTeam) -> QueryResult<bool>;

    /// Returns true if the ballpark was inserted, false if its name already existed
    fn insert_ballpark_if_absent(&mut self, ballpark: &NewBallpark) -> QueryResult<bool>;
}

pub trait GameStore: ReferenceStore {
    /// Ids of every game with exactly this key and status, in id order
    fn games_with_key(&mut self, key: &GameKey, verification: Verification)
    -> QueryResult<Vec<i64>>;

    /// Inserts a game unless one with the same key and status already exists.
    /// Returns `None` when the insert lost to an existing row.
    fn insert_game(&mut self, key: &GameKey, verification: Verification)
    -> QueryResult<Option<i64>>;

    /// Flips an unverified game to verified in place. Returns false if the
    /// row was not unverified by the time the update ran.
    fn promote_game(&mut self, game_id: i64) -> QueryResult<bool>;
}

pub trait EventStore {
    /// Inserts pitches, overwriting any row with the same `(game_id, pitch_no)`
    fn upsert_pitches(&mut self, pitches: &[NewPitch]) -> QueryResult<usize>;

    /// Inserts positions, overwriting any row with the same
    /// `(game_id, pitch_no, position)`
    fn upsert_player_positions(&mut self, positions: &[NewPlayerPosition])
    -> QueryResult<usize>;
}

pub trait IngestStore: GameStore + EventStore {
    /// Runs `f` in a serializable transaction, committing if it returns `Ok`
    /// and rolling back otherwise.
    fn serializable<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<diesel::result::Error>;
}
