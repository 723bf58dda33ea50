// Maps a file's descriptor to the one canonical game row for its business
// key. A key is in one of three states (absent, unverified, verified) and
// the resolver only ever moves it forward: absent -> created, unverified ->
// promoted in place. It never infers the daily game number and never
// chooses among duplicate rows.

use log::{info, warn};
use serde::Serialize;

use crate::db::{GameKey, GameStore, ReferenceKind, Verification};
use crate::ingest::IngestError;
use crate::ingest::metadata::GameDescriptor;

/// A pass only repeats when a concurrent writer changed the key's state
/// between our read and our write, so a small bound is plenty.
pub const MAX_RESOLVE_PASSES: usize = 3;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// No row existed for the key; a new one was inserted
    #[strum(serialize = "created")]
    Created,
    /// A row with the same key and status already existed
    #[strum(serialize = "reused")]
    Reused,
    /// A verified file upgraded the unverified row in place
    #[strum(serialize = "promoted")]
    Promoted,
    /// An unverified file arrived after the game was verified
    #[strum(serialize = "kept verified")]
    KeptVerified,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ResolvedGame {
    pub game_id: i64,
    pub resolution: Resolution,
}

fn lookup_key<S: GameStore + ?Sized>(
    store: &mut S,
    descriptor: &GameDescriptor,
) -> Result<GameKey, IngestError> {
    let unknown = |kind, code: &str| IngestError::UnknownReference {
        kind,
        code: code.to_string(),
    };

    let home_team_id = store
        .team_id(&descriptor.home_team_code)?
        .ok_or_else(|| unknown(ReferenceKind::Team, &descriptor.home_team_code))?;
    let visiting_team_id = store
        .team_id(&descriptor.visiting_team_code)?
        .ok_or_else(|| unknown(ReferenceKind::Team, &descriptor.visiting_team_code))?;
    let ballpark_id = store
        .ballpark_id(&descriptor.ballpark_name)?
        .ok_or_else(|| unknown(ReferenceKind::Ballpark, &descriptor.ballpark_name))?;

    Ok(GameKey {
        home_team_id,
        visiting_team_id,
        ballpark_id,
        date: descriptor.date,
        daily_game_number: descriptor.daily_game_number,
    })
}

/// The single game with this key and status, if any
fn unique_game<S: GameStore + ?Sized>(
    store: &mut S,
    key: &GameKey,
    verification: Verification,
) -> Result<Option<i64>, IngestError> {
    let ids = store.games_with_key(key, verification)?;
    match ids.as_slice() {
        [] => Ok(None),
        [game_id] => Ok(Some(*game_id)),
        _ => Err(IngestError::AmbiguousGame {
            key: *key,
            verification,
            count: ids.len(),
        }),
    }
}

/// One read-modify-write pass. Returns `None` if a concurrent writer got in
/// between the read and the write.
fn resolve_pass<S: GameStore + ?Sized>(
    store: &mut S,
    key: &GameKey,
    verification: Verification,
) -> Result<Option<(i64, Resolution)>, IngestError> {
    if let Some(game_id) = unique_game(store, key, verification)? {
        return Ok(Some((game_id, Resolution::Reused)));
    }

    if let Some(game_id) = unique_game(store, key, verification.opposite())? {
        return match verification {
            Verification::Verified => {
                if store.promote_game(game_id)? {
                    Ok(Some((game_id, Resolution::Promoted)))
                } else {
                    Ok(None)
                }
            }
            // Never downgrade
            Verification::Unverified => Ok(Some((game_id, Resolution::KeptVerified))),
        };
    }

    Ok(store
        .insert_game(key, verification)?
        .map(|game_id| (game_id, Resolution::Created)))
}

pub fn resolve<S: GameStore + ?Sized>(
    store: &mut S,
    descriptor: &GameDescriptor,
) -> Result<ResolvedGame, IngestError> {
    let key = lookup_key(store, descriptor)?;

    for pass in 1..=MAX_RESOLVE_PASSES {
        if let Some((game_id, resolution)) = resolve_pass(store, &key, descriptor.verification)? {
            info!("Resolved {descriptor} to game {game_id} ({resolution})");
            return Ok(ResolvedGame {
                game_id,
                resolution,
            });
        }
        warn!("Game {key} changed under us on pass {pass} of {MAX_RESOLVE_PASSES}; re-reading");
    }

    Err(IngestError::ResolveContention {
        key,
        passes: MAX_RESOLVE_PASSES,
    })
}
