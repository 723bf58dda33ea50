use chrono::NaiveTime;
use diesel::QueryResult;
use itertools::Itertools;
use log::{debug, warn};

use crate::db::EventStore;
use crate::ingest::metadata::FileRows;
use crate::ingest::rows::{PitchRecord, PositionRecord};
use crate::models::{NewPitch, NewPlayerPosition};

fn parse_pitch_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S%.f").ok()
}

fn new_pitch(game_id: i64, row: &PitchRecord) -> NewPitch<'_> {
    NewPitch {
        game_id,
        pitch_no: row.pitch_no,
        pitch_uid: row.pitch_uid.as_deref(),
        pitch_time: row.time.as_deref().and_then(parse_pitch_time),
        inning: row.inning,
        top_bottom: row.top_bottom.into(),
        pa_of_inning: row.pa_of_inning,
        pitch_of_pa: row.pitch_of_pa,
        outs: row.outs,
        balls: row.balls,
        strikes: row.strikes,
        pitcher_name: &row.pitcher,
        pitcher_id: row.pitcher_id.as_deref(),
        pitcher_throws: row.pitcher_throws.as_deref(),
        pitcher_team: row.pitcher_team.as_deref(),
        batter_name: &row.batter,
        batter_id: row.batter_id.as_deref(),
        batter_side: row.batter_side.as_deref(),
        batter_team: row.batter_team.as_deref(),
        catcher_name: row.catcher.as_deref(),
        catcher_id: row.catcher_id.as_deref(),
        tagged_pitch_type: row.tagged_pitch_type.as_deref(),
        auto_pitch_type: row.auto_pitch_type.as_deref(),
        pitch_call: row.pitch_call.as_deref(),
        kor_bb: row.kor_bb.as_deref(),
        play_result: row.play_result.as_deref(),
        outs_on_play: row.outs_on_play,
        runs_scored: row.runs_scored,
        rel_speed: row.rel_speed,
        spin_rate: row.spin_rate,
        induced_vert_break: row.induced_vert_break,
        horz_break: row.horz_break,
        plate_loc_height: row.plate_loc_height,
        plate_loc_side: row.plate_loc_side,
        exit_speed: row.exit_speed,
        launch_angle: row.angle,
        direction: row.direction,
        distance: row.distance,
    }
}

// One event row per fielder who was on the field for the pitch
fn new_player_positions(game_id: i64, row: &PositionRecord) -> impl Iterator<Item = NewPlayerPosition<'_>> {
    row.fielders.iter().filter_map(move |(position, fielder)| {
        let fielder = fielder.as_ref()?;
        Some(NewPlayerPosition {
            game_id,
            pitch_no: row.pitch_no,
            pitch_uid: row.pitch_uid.as_deref(),
            inning: row.inning,
            top_bottom: row.top_bottom.into(),
            position: position.into(),
            player_name: &fielder.name,
            player_id: fielder.id.as_deref(),
            position_at_release_x: fielder.position_at_release_x,
            position_at_release_z: fielder.position_at_release_z,
        })
    })
}

/// Keeps the last of every run of rows sharing a natural key, in file order
fn last_wins<T, K, F>(rows: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + std::hash::Hash,
    F: FnMut(&T) -> K,
{
    let mut deduplicated = rows.into_iter().rev().unique_by(key).collect_vec();
    deduplicated.reverse();
    deduplicated
}

fn upsert_in_chunks<T, F>(rows: &[T], chunk_size: usize, mut upsert: F) -> QueryResult<usize>
where
    F: FnMut(&[T]) -> QueryResult<usize>,
{
    let mut written = 0;
    for chunk in rows.chunks(chunk_size.max(1)) {
        written += upsert(chunk)?;
    }
    Ok(written)
}

/// Writes a file's rows under `game_id`. Rows are keyed by pitch number
/// (and fielding position, for positioning files), so writing the same file
/// again overwrites rows in place instead of adding new ones.
pub fn write_events<S: EventStore + ?Sized>(
    store: &mut S,
    game_id: i64,
    rows: &FileRows,
    chunk_size: usize,
) -> QueryResult<usize> {
    match rows {
        FileRows::Pitches(pitches) => {
            let new_pitches = pitches.iter().map(|row| new_pitch(game_id, row)).collect_vec();
            let total = new_pitches.len();
            let new_pitches = last_wins(new_pitches, |p| p.pitch_no);
            if new_pitches.len() < total {
                warn!(
                    "Game {game_id}: {} rows repeat an earlier PitchNo; keeping the last of each",
                    total - new_pitches.len(),
                );
            }

            let written = upsert_in_chunks(&new_pitches, chunk_size, |chunk| {
                store.upsert_pitches(chunk)
            })?;
            debug!("Game {game_id}: upserted {written} pitches");
            Ok(written)
        }
        FileRows::PlayerPositions(positions) => {
            let new_positions = positions
                .iter()
                .flat_map(|row| new_player_positions(game_id, row))
                .collect_vec();
            let total = new_positions.len();
            let new_positions = last_wins(new_positions, |p| (p.pitch_no, p.position));
            if new_positions.len() < total {
                warn!(
                    "Game {game_id}: {} fielder positions repeat an earlier PitchNo; keeping the \
                    last of each",
                    total - new_positions.len(),
                );
            }

            let written = upsert_in_chunks(&new_positions, chunk_size, |chunk| {
                store.upsert_player_positions(chunk)
            })?;
            debug!("Game {game_id}: upserted {written} player positions");
            Ok(written)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::ingest::metadata::tests::{PITCH_HEADER, pitch_csv, positioning_csv};
    use crate::ingest::rows::{read_pitches, read_player_positions};

    fn pitch_rows(csv: &str) -> FileRows {
        FileRows::Pitches(read_pitches("test.csv", csv.as_bytes()).unwrap())
    }

    #[test]
    fn rewriting_a_file_does_not_duplicate_pitches() {
        let mut store = MemoryStore::new();
        let rows = pitch_rows(&pitch_csv("LAN", "LI", "2024-06-29", 25));

        assert_eq!(write_events(&mut store, 7, &rows, 10).unwrap(), 25);
        assert_eq!(write_events(&mut store, 7, &rows, 10).unwrap(), 25);

        let pitches = store.pitches(7);
        assert_eq!(pitches.len(), 25);
        assert_eq!(pitches[0].pitcher_name, "Pitcher 1");
        assert_eq!(pitches[0].pitch_call.as_deref(), Some("BallCalled"));
    }

    #[test]
    fn pitches_are_scoped_to_their_game() {
        let mut store = MemoryStore::new();
        let rows = pitch_rows(&pitch_csv("LAN", "LI", "2024-06-29", 3));

        write_events(&mut store, 1, &rows, 500).unwrap();
        write_events(&mut store, 2, &rows, 500).unwrap();

        assert_eq!(store.pitches(1).len(), 3);
        assert_eq!(store.pitches(2).len(), 3);
    }

    #[test]
    fn last_row_wins_for_a_repeated_pitch_number() {
        let mut store = MemoryStore::new();
        let csv = format!(
            "{PITCH_HEADER}\n\
            1,2024-06-29,18:00:00,Early,Batter,1,Top,BallCalled,LAN,LI,Stadium\n\
            2,2024-06-29,18:00:30,Other,Batter,1,Top,BallCalled,LAN,LI,Stadium\n\
            1,2024-06-29,18:01:00,Late,Batter,1,Top,StrikeSwinging,LAN,LI,Stadium\n"
        );

        let written = write_events(&mut store, 3, &pitch_rows(&csv), 500).unwrap();
        assert_eq!(written, 2);

        let pitches = store.pitches(3);
        assert_eq!(pitches.len(), 2);
        assert_eq!(pitches[0].pitcher_name, "Late");
        assert_eq!(pitches[0].pitch_call.as_deref(), Some("StrikeSwinging"));
    }

    #[test]
    fn positioning_rows_expand_per_occupied_position() {
        let mut store = MemoryStore::new();
        let csv = positioning_csv("LAN", "LI", 4);
        let rows = FileRows::PlayerPositions(
            read_player_positions("test_playerpositioning.csv", csv.as_bytes()).unwrap(),
        );

        // First base and shortstop are filled in on every row
        assert_eq!(write_events(&mut store, 9, &rows, 3).unwrap(), 8);
        assert_eq!(write_events(&mut store, 9, &rows, 3).unwrap(), 8);

        let positions = store.positions(9);
        assert_eq!(positions.len(), 8);
        assert!(positions.iter().any(|p| p.player_name == "Short 2"
            && p.position_at_release_x == Some(40.5)));
    }

    #[test]
    fn pitch_times_accept_fractional_seconds() {
        assert_eq!(
            parse_pitch_time("18:03:21.25"),
            NaiveTime::from_hms_milli_opt(18, 3, 21, 250)
        );
        assert_eq!(parse_pitch_time("18:03:21"), NaiveTime::from_hms_opt(18, 3, 21));
        assert_eq!(parse_pitch_time("later"), None);
    }

    #[test]
    fn zero_chunk_size_still_writes() {
        let mut store = MemoryStore::new();
        let rows = pitch_rows(&pitch_csv("LAN", "LI", "2024-06-29", 2));
        assert_eq!(write_events(&mut store, 1, &rows, 0).unwrap(), 2);
    }
}
