// Ball-tracking exports are named `<YYYYMMDD>-<Ballpark>-<N>[_<tag>]*.csv`.
// `N` is the ballpark's game ordinal for that day, which is what tells the
// halves of a double header apart. Tags mark unverified data
// (`unverified`) and positioning exports (`playerpositioning`); any other
// alphanumeric tag is a vendor marker and carries no meaning here.
//
// Everything in this module is a pure function of the file's name and
// bytes.

use std::fmt::{Display, Formatter};

use chrono::NaiveDate;
use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::db::Verification;
use crate::ingest::rows::{self, GameIdentity, PitchRecord, PositionRecord};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("File name {filename:?} is malformed: {reason}")]
    MalformedFilename { filename: String, reason: String },

    #[error("File {filename:?} has no data rows")]
    EmptyFile { filename: String },

    #[error("Row {row} of {filename:?} could not be read: {source}")]
    MalformedRow {
        filename: String,
        row: usize,
        source: csv::Error,
    },

    #[error("File {filename:?} is missing required column {column:?}")]
    MissingColumn { filename: String, column: String },

    #[error("File {filename:?} is inconsistent: {reason}")]
    InconsistentFile { filename: String, reason: String },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, strum::Display)]
pub enum FileKind {
    #[serde(rename = "pitch data")]
    #[strum(serialize = "pitch data")]
    PitchData,
    #[serde(rename = "player positioning")]
    #[strum(serialize = "player positioning")]
    PlayerPositioning,
}

/// Everything the file name alone says about a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName {
    pub date: NaiveDate,
    pub ballpark_name: String,
    pub daily_game_number: i32,
    pub verification: Verification,
    pub kind: FileKind,
}

/// The business key of the game a file belongs to, still expressed in
/// reference codes, plus what kind of file it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameDescriptor {
    pub home_team_code: String,
    pub visiting_team_code: String,
    pub ballpark_name: String,
    pub date: NaiveDate,
    pub daily_game_number: i32,
    pub verification: Verification,
    pub file_kind: FileKind,
}

impl Display for GameDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @ {} at {} on {} game {} ({} {})",
            self.visiting_team_code,
            self.home_team_code,
            self.ballpark_name,
            self.date,
            self.daily_game_number,
            self.verification,
            self.file_kind,
        )
    }
}

#[derive(Debug, Clone)]
pub enum FileRows {
    Pitches(Vec<PitchRecord>),
    PlayerPositions(Vec<PositionRecord>),
}

impl FileRows {
    pub fn len(&self) -> usize {
        match self {
            FileRows::Pitches(rows) => rows.len(),
            FileRows::PlayerPositions(rows) => rows.len(),
        }
    }
}

/// A classified file, ready to be resolved and written
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub filename: String,
    pub descriptor: GameDescriptor,
    pub rows: FileRows,
}

pub fn parse_file_name(filename: &str) -> Result<FileName, ExtractError> {
    let malformed = |reason: &str| ExtractError::MalformedFilename {
        filename: filename.to_string(),
        reason: reason.to_string(),
    };

    // Storage keys carry directories; only the last segment is the name
    let base = filename.rsplit('/').next().unwrap_or(filename);
    let stem = base
        .strip_suffix(".csv")
        .or_else(|| base.strip_suffix(".CSV"))
        .ok_or_else(|| malformed("expected a .csv extension"))?;

    let (game_part, tags) = match stem.split_once('_') {
        Some((game_part, tags)) => (game_part, Some(tags)),
        None => (stem, None),
    };

    let (date_part, rest) = game_part
        .split_once('-')
        .ok_or_else(|| malformed("expected <YYYYMMDD>-<Ballpark>-<N>"))?;
    let (ballpark_name, number_part) = rest
        .rsplit_once('-')
        .ok_or_else(|| malformed("expected <YYYYMMDD>-<Ballpark>-<N>"))?;

    if date_part.len() != 8 || !date_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("date must be eight digits (YYYYMMDD)"));
    }
    let date = NaiveDate::parse_from_str(date_part, "%Y%m%d")
        .map_err(|_| malformed("date is not a real calendar date"))?;

    if ballpark_name.is_empty() {
        return Err(malformed("ballpark is empty"));
    }

    let daily_game_number = number_part
        .parse::<i32>()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| malformed("daily game number must be a positive integer"))?;

    let mut verification = None;
    let mut kind = FileKind::PitchData;
    for tag in tags.into_iter().flat_map(|tags| tags.split('_')) {
        let tagged = match tag.to_ascii_lowercase().as_str() {
            "unverified" => Verification::Unverified,
            "verified" => Verification::Verified,
            "playerpositioning" => {
                kind = FileKind::PlayerPositioning;
                continue;
            }
            other if !other.is_empty() && other.bytes().all(|b| b.is_ascii_alphanumeric()) => {
                debug!("Ignoring tag {tag:?} in file name {filename:?}");
                continue;
            }
            _ => return Err(malformed("tags must be non-empty and alphanumeric")),
        };
        if verification.is_some_and(|seen| seen != tagged) {
            return Err(malformed("both verified and unverified tags are present"));
        }
        verification = Some(tagged);
    }
    let verification = verification.unwrap_or(Verification::Verified);

    Ok(FileName {
        date,
        ballpark_name: ballpark_name.to_string(),
        daily_game_number,
        verification,
        kind,
    })
}

fn parse_row_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%m/%d/%Y"))
        .ok()
}

/// Builds the descriptor for a file from its name and its first data row.
pub fn extract_descriptor(
    filename: &str,
    first_row: &impl GameIdentity,
) -> Result<GameDescriptor, ExtractError> {
    let name = parse_file_name(filename)?;
    let inconsistent = |reason: String| ExtractError::InconsistentFile {
        filename: filename.to_string(),
        reason,
    };

    let home_team_code = first_row.home_team().trim();
    let visiting_team_code = first_row.away_team().trim();
    if home_team_code.is_empty() || visiting_team_code.is_empty() {
        return Err(inconsistent("HomeTeam and AwayTeam must not be blank".to_string()));
    }

    if let Some(value) = first_row.date() {
        match parse_row_date(value) {
            Some(row_date) if row_date == name.date => {}
            Some(row_date) => {
                return Err(inconsistent(format!(
                    "rows are dated {row_date} but the file name says {}",
                    name.date
                )));
            }
            None => return Err(inconsistent(format!("unrecognized Date {value:?}"))),
        }
    }

    if let Some(stadium) = first_row.stadium() {
        if stadium != name.ballpark_name {
            debug!(
                "Stadium column {stadium:?} differs from file name ballpark {:?} in {filename:?}; \
                using the file name",
                name.ballpark_name,
            );
        }
    }

    Ok(GameDescriptor {
        home_team_code: home_team_code.to_string(),
        visiting_team_code: visiting_team_code.to_string(),
        ballpark_name: name.ballpark_name,
        date: name.date,
        daily_game_number: name.daily_game_number,
        verification: name.verification,
        file_kind: name.kind,
    })
}

fn describe_rows<R: GameIdentity>(
    filename: &str,
    rows: &[R],
) -> Result<GameDescriptor, ExtractError> {
    let first = rows.first().ok_or_else(|| ExtractError::EmptyFile {
        filename: filename.to_string(),
    })?;
    let descriptor = extract_descriptor(filename, first)?;

    // A file describes exactly one game
    if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| {
        row.home_team().trim() != descriptor.home_team_code
            || row.away_team().trim() != descriptor.visiting_team_code
    }) {
        return Err(ExtractError::InconsistentFile {
            filename: filename.to_string(),
            reason: format!(
                "row {} is {} @ {} but the first row is {} @ {}",
                index + 1,
                row.away_team().trim(),
                row.home_team().trim(),
                descriptor.visiting_team_code,
                descriptor.home_team_code,
            ),
        });
    }

    Ok(descriptor)
}

/// Classifies a delivered file: reads its name and rows and produces the
/// descriptor of the game it belongs to.
pub fn read_file(filename: &str, bytes: &[u8]) -> Result<ParsedFile, ExtractError> {
    let name = parse_file_name(filename)?;

    let (descriptor, rows) = match name.kind {
        FileKind::PitchData => {
            let pitches = rows::read_pitches(filename, bytes)?;
            (describe_rows(filename, &pitches)?, FileRows::Pitches(pitches))
        }
        FileKind::PlayerPositioning => {
            let positions = rows::read_player_positions(filename, bytes)?;
            (
                describe_rows(filename, &positions)?,
                FileRows::PlayerPositions(positions),
            )
        }
    };

    Ok(ParsedFile {
        filename: filename.to_string(),
        descriptor,
        rows,
    })
}
