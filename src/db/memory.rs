// In-memory store for tests.
//
// Enforces the same uniqueness rules as the Postgres schema: one game per
// business key and verification status, one pitch per `(game_id, pitch_no)`,
// one position per `(game_id, pitch_no, position)`.
//
// Every operation takes the lock independently, so concurrent callers can
// interleave between a lookup and an insert just as two database sessions
// would. Transactions are snapshot-and-restore: they roll back correctly
// for a single writer but do not isolate concurrent writers from each other.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use diesel::QueryResult;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::db::{EventStore, GameKey, GameStore, IngestStore, ReferenceStore, Verification};
use crate::models::{NewBallpark, NewPitch, NewPlayerPosition, NewTeam};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryGame {
    pub game_id: i64,
    pub key: GameKey,
    pub verification: Verification,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryPitch {
    pub pitcher_name: String,
    pub batter_name: String,
    pub inning: i32,
    pub pitch_call: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryPosition {
    pub player_name: String,
    pub position_at_release_x: Option<f64>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    next_id: i64,
    teams: BTreeMap<String, i64>,
    ballparks: BTreeMap<String, i64>,
    games: BTreeMap<i64, MemoryGame>,
    pitches: BTreeMap<(i64, i32), MemoryPitch>,
    positions: BTreeMap<(i64, i32, String), MemoryPosition>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn has_game(&self, key: &GameKey, verification: Verification) -> bool {
        self.games
            .values()
            .any(|g| &g.key == key && g.verification == verification)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_event_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panicking test thread poisons the lock; the data is still usable
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn seed_team(&self, code: &str) -> i64 {
        let mut tables = self.lock();
        if let Some(id) = tables.teams.get(code) {
            return *id;
        }
        let id = tables.allocate_id();
        tables.teams.insert(code.to_string(), id);
        id
    }

    pub fn seed_ballpark(&self, name: &str) -> i64 {
        let mut tables = self.lock();
        if let Some(id) = tables.ballparks.get(name) {
            return *id;
        }
        let id = tables.allocate_id();
        tables.ballparks.insert(name.to_string(), id);
        id
    }

    /// Inserts a game without the uniqueness check. Only for setting up
    /// states that the real schema would reject.
    pub fn force_insert_game(&self, key: GameKey, verification: Verification) -> i64 {
        let mut tables = self.lock();
        let game_id = tables.allocate_id();
        tables.games.insert(
            game_id,
            MemoryGame {
                game_id,
                key,
                verification,
            },
        );
        game_id
    }

    /// Makes every later pitch or position upsert fail like a dropped
    /// statement would.
    pub fn fail_event_writes(&self) {
        self.fail_event_writes.store(true, Ordering::SeqCst);
    }

    fn check_event_write(&self) -> QueryResult<()> {
        if self.fail_event_writes.load(Ordering::SeqCst) {
            return Err(DieselError::DatabaseError(
                DatabaseErrorKind::Unknown,
                Box::new("could not extend file: No space left on device".to_string()),
            ));
        }
        Ok(())
    }

    pub fn games(&self) -> Vec<MemoryGame> {
        self.lock().games.values().cloned().collect()
    }

    pub fn game(&self, game_id: i64) -> Option<MemoryGame> {
        self.lock().games.get(&game_id).cloned()
    }

    pub fn pitches(&self, game_id: i64) -> Vec<MemoryPitch> {
        self.lock()
            .pitches
            .iter()
            .filter(|((id, _), _)| *id == game_id)
            .map(|(_, pitch)| pitch.clone())
            .collect()
    }

    pub fn positions(&self, game_id: i64) -> Vec<MemoryPosition> {
        self.lock()
            .positions
            .iter()
            .filter(|((id, _, _), _)| *id == game_id)
            .map(|(_, position)| position.clone())
            .collect()
    }
}

impl ReferenceStore for MemoryStore {
    fn team_id(&mut self, team_code: &str) -> QueryResult<Option<i64>> {
        Ok(self.lock().teams.get(team_code).copied())
    }

    fn ballpark_id(&mut self, ballpark_name: &str) -> QueryResult<Option<i64>> {
        Ok(self.lock().ballparks.get(ballpark_name).copied())
    }

    fn insert_team_if_absent(&mut self, team: &NewTeam) -> QueryResult<bool> {
        let mut tables = self.lock();
        if tables.teams.contains_key(team.team_code) {
            return Ok(false);
        }
        let id = tables.allocate_id();
        tables.teams.insert(team.team_code.to_string(), id);
        Ok(true)
    }

    fn insert_ballpark_if_absent(&mut self, ballpark: &NewBallpark) -> QueryResult<bool> {
        let mut tables = self.lock();
        if tables.ballparks.contains_key(ballpark.ballpark_name) {
            return Ok(false);
        }
        let id = tables.allocate_id();
        tables.ballparks.insert(ballpark.ballpark_name.to_string(), id);
        Ok(true)
    }
}

impl GameStore for MemoryStore {
    fn games_with_key(
        &mut self,
        key: &GameKey,
        verification: Verification,
    ) -> QueryResult<Vec<i64>> {
        Ok(self
            .lock()
            .games
            .values()
            .filter(|g| &g.key == key && g.verification == verification)
            .map(|g| g.game_id)
            .collect())
    }

    fn insert_game(
        &mut self,
        key: &GameKey,
        verification: Verification,
    ) -> QueryResult<Option<i64>> {
        let mut tables = self.lock();
        if tables.has_game(key, verification) {
            return Ok(None);
        }
        let game_id = tables.allocate_id();
        tables.games.insert(
            game_id,
            MemoryGame {
                game_id,
                key: *key,
                verification,
            },
        );
        Ok(Some(game_id))
    }

    fn promote_game(&mut self, game_id: i64) -> QueryResult<bool> {
        let mut tables = self.lock();
        let Some(game) = tables.games.get(&game_id).cloned() else {
            return Ok(false);
        };
        // Postgres would reject this update with a unique violation
        if game.verification.is_verified() || tables.has_game(&game.key, Verification::Verified) {
            return Ok(false);
        }
        if let Some(game) = tables.games.get_mut(&game_id) {
            game.verification = Verification::Verified;
        }
        Ok(true)
    }
}

impl EventStore for MemoryStore {
    fn upsert_pitches(&mut self, pitches: &[NewPitch]) -> QueryResult<usize> {
        self.check_event_write()?;
        let mut tables = self.lock();
        for pitch in pitches {
            tables.pitches.insert(
                (pitch.game_id, pitch.pitch_no),
                MemoryPitch {
                    pitcher_name: pitch.pitcher_name.to_string(),
                    batter_name: pitch.batter_name.to_string(),
                    inning: pitch.inning,
                    pitch_call: pitch.pitch_call.map(str::to_string),
                },
            );
        }
        Ok(pitches.len())
    }

    fn upsert_player_positions(&mut self, positions: &[NewPlayerPosition]) -> QueryResult<usize> {
        self.check_event_write()?;
        let mut tables = self.lock();
        for position in positions {
            tables.positions.insert(
                (position.game_id, position.pitch_no, position.position.to_string()),
                MemoryPosition {
                    player_name: position.player_name.to_string(),
                    position_at_release_x: position.position_at_release_x,
                },
            );
        }
        Ok(positions.len())
    }
}

impl IngestStore for MemoryStore {
    fn serializable<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<diesel::result::Error>,
    {
        let snapshot = Tables::clone(&self.lock());
        let result = f(self);
        if result.is_err() {
            *self.lock() = snapshot;
        }
        result
    }
}
