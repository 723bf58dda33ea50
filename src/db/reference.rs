use std::path::Path;

use diesel::QueryResult;
use log::info;
use serde::Deserialize;
use thiserror::Error;

use crate::db::ReferenceStore;
use crate::models::{NewBallpark, NewTeam};

#[derive(Debug, Error)]
pub enum ReferenceDataError {
    #[error("Error reading reference data file {path:?}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Error decoding reference data file {path:?}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },
}

/// The ballpark reference file. Each entry names a ballpark and the team
/// that calls it home.
#[derive(Debug, Deserialize)]
pub struct ReferenceData {
    pub ballparks: Vec<BallparkEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallparkEntry {
    pub name: String,
    pub city: String,
    pub state: String,
    pub team_code: String,
    pub team_name: String,
    pub league: String,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedStats {
    pub teams_inserted: usize,
    pub ballparks_inserted: usize,
}

impl ReferenceData {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReferenceDataError> {
        let path = path.as_ref();
        let contents = std::fs::read(path).map_err(|source| ReferenceDataError::Read {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_slice(&contents).map_err(|source| ReferenceDataError::Decode {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Inserts every team and ballpark that isn't already present. Existing
/// rows are never modified, so this is safe to run on every startup.
pub fn seed_reference_data<S: ReferenceStore + ?Sized>(
    store: &mut S,
    data: &ReferenceData,
) -> QueryResult<SeedStats> {
    let mut stats = SeedStats::default();

    for entry in &data.ballparks {
        let team = NewTeam {
            team_code: &entry.team_code,
            team_name: &entry.team_name,
            league: &entry.league,
        };
        if store.insert_team_if_absent(&team)? {
            stats.teams_inserted += 1;
        }

        let ballpark = NewBallpark {
            ballpark_name: &entry.name,
            city: &entry.city,
            state: &entry.state,
        };
        if store.insert_ballpark_if_absent(&ballpark)? {
            stats.ballparks_inserted += 1;
        }
    }

    info!(
        "Seeded reference data: {} new teams, {} new ballparks ({} entries in file)",
        stats.teams_inserted,
        stats.ballparks_inserted,
        data.ballparks.len(),
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use std::io::Write;

    const REFERENCE_JSON: &str = r#"{
        "ballparks": [
            {
                "name": "ClipperMagazine",
                "city": "Lancaster",
                "state": "PA",
                "teamCode": "LAN",
                "teamName": "Lancaster Stormers",
                "league": "ALPB"
            },
            {
                "name": "RegencyFurnitureStadium",
                "city": "Waldorf",
                "state": "MD",
                "teamCode": "SMD",
                "teamName": "Southern Maryland Blue Crabs",
                "league": "ALPB"
            }
        ]
    }"#;

    #[test]
    fn seeding_twice_inserts_once() {
        let data: ReferenceData = serde_json::from_str(REFERENCE_JSON).unwrap();
        let mut store = MemoryStore::new();

        let first = seed_reference_data(&mut store, &data).unwrap();
        assert_eq!(
            first,
            SeedStats {
                teams_inserted: 2,
                ballparks_inserted: 2,
            }
        );

        let second = seed_reference_data(&mut store, &data).unwrap();
        assert_eq!(second, SeedStats::default());

        assert!(store.team_id("LAN").unwrap().is_some());
        assert!(store.ballpark_id("RegencyFurnitureStadium").unwrap().is_some());
    }

    #[test]
    fn reads_reference_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(REFERENCE_JSON.as_bytes()).unwrap();

        let data = ReferenceData::from_path(file.path()).unwrap();
        assert_eq!(data.ballparks.len(), 2);
        assert_eq!(data.ballparks[0].team_code, "LAN");
    }

    #[test]
    fn malformed_reference_file_is_a_decode_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"ballparks\": [{\"name\": 3}]}").unwrap();

        let err = ReferenceData::from_path(file.path()).unwrap_err();
        assert!(matches!(err, ReferenceDataError::Decode { .. }));
    }
}
