use csv::{ReaderBuilder, StringRecord, Trim};
use enum_map::EnumMap;
use serde::Deserialize;

use crate::ingest::metadata::ExtractError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, strum::Display, strum::IntoStaticStr)]
pub enum HalfInning {
    Top,
    Bottom,
}

// strum's Display is the column prefix used by the positioning export
#[derive(Debug, Copy, Clone, Eq, PartialEq, enum_map::Enum, strum::Display, strum::IntoStaticStr)]
pub enum FieldingPosition {
    #[strum(serialize = "1B")]
    FirstBase,
    #[strum(serialize = "2B")]
    SecondBase,
    #[strum(serialize = "3B")]
    ThirdBase,
    #[strum(serialize = "SS")]
    ShortStop,
    #[strum(serialize = "LF")]
    LeftField,
    #[strum(serialize = "CF")]
    CenterField,
    #[strum(serialize = "RF")]
    RightField,
}

/// The columns every row carries that identify which game it belongs to
pub trait GameIdentity {
    fn home_team(&self) -> &str;
    fn away_team(&self) -> &str;
    fn stadium(&self) -> Option<&str>;
    fn date(&self) -> Option<&str>;
}

/// One row of a pitch data export
#[derive(Debug, Clone, Deserialize)]
pub struct PitchRecord {
    #[serde(rename = "PitchNo")]
    pub pitch_no: i32,
    #[serde(rename = "Date")]
    pub date: Option<String>,
    #[serde(rename = "Time")]
    pub time: Option<String>,
    #[serde(rename = "PAofInning", default, deserialize_with = "csv::invalid_option")]
    pub pa_of_inning: Option<i32>,
    #[serde(rename = "PitchofPA", default, deserialize_with = "csv::invalid_option")]
    pub pitch_of_pa: Option<i32>,
    #[serde(rename = "Pitcher")]
    pub pitcher: String,
    #[serde(rename = "PitcherId")]
    pub pitcher_id: Option<String>,
    #[serde(rename = "PitcherThrows")]
    pub pitcher_throws: Option<String>,
    #[serde(rename = "PitcherTeam")]
    pub pitcher_team: Option<String>,
    #[serde(rename = "Batter")]
    pub batter: String,
    #[serde(rename = "BatterId")]
    pub batter_id: Option<String>,
    #[serde(rename = "BatterSide")]
    pub batter_side: Option<String>,
    #[serde(rename = "BatterTeam")]
    pub batter_team: Option<String>,
    #[serde(rename = "Catcher")]
    pub catcher: Option<String>,
    #[serde(rename = "CatcherId")]
    pub catcher_id: Option<String>,
    #[serde(rename = "Inning")]
    pub inning: i32,
    #[serde(rename = "Top/Bottom")]
    pub top_bottom: HalfInning,
    #[serde(rename = "Outs", default, deserialize_with = "csv::invalid_option")]
    pub outs: Option<i32>,
    #[serde(rename = "Balls", default, deserialize_with = "csv::invalid_option")]
    pub balls: Option<i32>,
    #[serde(rename = "Strikes", default, deserialize_with = "csv::invalid_option")]
    pub strikes: Option<i32>,
    #[serde(rename = "TaggedPitchType")]
    pub tagged_pitch_type: Option<String>,
    #[serde(rename = "AutoPitchType")]
    pub auto_pitch_type: Option<String>,
    #[serde(rename = "PitchCall")]
    pub pitch_call: Option<String>,
    #[serde(rename = "KorBB")]
    pub kor_bb: Option<String>,
    #[serde(rename = "PlayResult")]
    pub play_result: Option<String>,
    #[serde(rename = "OutsOnPlay", default, deserialize_with = "csv::invalid_option")]
    pub outs_on_play: Option<i32>,
    #[serde(rename = "RunsScored", default, deserialize_with = "csv::invalid_option")]
    pub runs_scored: Option<i32>,
    #[serde(rename = "RelSpeed", default, deserialize_with = "csv::invalid_option")]
    pub rel_speed: Option<f64>,
    #[serde(rename = "SpinRate", default, deserialize_with = "csv::invalid_option")]
    pub spin_rate: Option<f64>,
    #[serde(rename = "InducedVertBreak", default, deserialize_with = "csv::invalid_option")]
    pub induced_vert_break: Option<f64>,
    #[serde(rename = "HorzBreak", default, deserialize_with = "csv::invalid_option")]
    pub horz_break: Option<f64>,
    #[serde(rename = "PlateLocHeight", default, deserialize_with = "csv::invalid_option")]
    pub plate_loc_height: Option<f64>,
    #[serde(rename = "PlateLocSide", default, deserialize_with = "csv::invalid_option")]
    pub plate_loc_side: Option<f64>,
    #[serde(rename = "ExitSpeed", default, deserialize_with = "csv::invalid_option")]
    pub exit_speed: Option<f64>,
    #[serde(rename = "Angle", default, deserialize_with = "csv::invalid_option")]
    pub angle: Option<f64>,
    #[serde(rename = "Direction", default, deserialize_with = "csv::invalid_option")]
    pub direction: Option<f64>,
    #[serde(rename = "Distance", default, deserialize_with = "csv::invalid_option")]
    pub distance: Option<f64>,
    #[serde(rename = "HomeTeam")]
    pub home_team: String,
    #[serde(rename = "AwayTeam")]
    pub away_team: String,
    #[serde(rename = "Stadium")]
    pub stadium: Option<String>,
    #[serde(rename = "PitchUID")]
    pub pitch_uid: Option<String>,
}

impl GameIdentity for PitchRecord {
    fn home_team(&self) -> &str {
        &self.home_team
    }

    fn away_team(&self) -> &str {
        &self.away_team
    }

    fn stadium(&self) -> Option<&str> {
        self.stadium.as_deref()
    }

    fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fielder {
    pub name: String,
    pub id: Option<String>,
    pub position_at_release_x: Option<f64>,
    pub position_at_release_z: Option<f64>,
}

/// The part of a positioning row that isn't per-fielder
#[derive(Debug, Clone, Deserialize)]
struct PositionRowHeader {
    #[serde(rename = "PitchNo")]
    pitch_no: i32,
    #[serde(rename = "PitchUID")]
    pitch_uid: Option<String>,
    #[serde(rename = "Inning")]
    inning: i32,
    #[serde(rename = "Top/Bottom")]
    top_bottom: HalfInning,
    #[serde(rename = "Date")]
    date: Option<String>,
    #[serde(rename = "HomeTeam")]
    home_team: String,
    #[serde(rename = "AwayTeam")]
    away_team: String,
    #[serde(rename = "Stadium")]
    stadium: Option<String>,
}

/// One row of a player positioning export: where each fielder stood when
/// the pitch was released.
#[derive(Debug, Clone)]
pub struct PositionRecord {
    pub pitch_no: i32,
    pub pitch_uid: Option<String>,
    pub inning: i32,
    pub top_bottom: HalfInning,
    pub date: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub stadium: Option<String>,
    pub fielders: EnumMap<FieldingPosition, Option<Fielder>>,
}

impl GameIdentity for PositionRecord {
    fn home_team(&self) -> &str {
        &self.home_team
    }

    fn away_team(&self) -> &str {
        &self.away_team
    }

    fn stadium(&self) -> Option<&str> {
        self.stadium.as_deref()
    }

    fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }
}

#[derive(Debug, Copy, Clone)]
struct FielderColumns {
    name: usize,
    id: Option<usize>,
    x: Option<usize>,
    z: Option<usize>,
}

impl FielderColumns {
    fn locate(
        filename: &str,
        headers: &StringRecord,
        position: FieldingPosition,
    ) -> Result<Self, ExtractError> {
        let find = |suffix: &str| {
            let column = format!("{position}_{suffix}");
            headers.iter().position(|h| h == column)
        };

        let name = find("Name").ok_or_else(|| ExtractError::MissingColumn {
            filename: filename.to_string(),
            column: format!("{position}_Name"),
        })?;

        Ok(Self {
            name,
            id: find("Id"),
            x: find("PositionAtReleaseX"),
            z: find("PositionAtReleaseZ"),
        })
    }

    fn read(&self, record: &StringRecord) -> Option<Fielder> {
        let cell = |index: Option<usize>| {
            index
                .and_then(|i| record.get(i))
                .filter(|value| !value.is_empty())
        };

        let name = cell(Some(self.name))?;
        Some(Fielder {
            name: name.to_string(),
            id: cell(self.id).map(str::to_string),
            position_at_release_x: cell(self.x).and_then(|v| v.parse().ok()),
            position_at_release_z: cell(self.z).and_then(|v| v.parse().ok()),
        })
    }
}

fn reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(bytes)
}

pub fn read_pitches(filename: &str, bytes: &[u8]) -> Result<Vec<PitchRecord>, ExtractError> {
    reader(bytes)
        .deserialize()
        .enumerate()
        .map(|(index, result)| {
            result.map_err(|source| ExtractError::MalformedRow {
                filename: filename.to_string(),
                row: index + 1,
                source,
            })
        })
        .collect()
}

pub fn read_player_positions(
    filename: &str,
    bytes: &[u8],
) -> Result<Vec<PositionRecord>, ExtractError> {
    let mut reader = reader(bytes);
    let headers = reader
        .headers()
        .map_err(|source| ExtractError::MalformedRow {
            filename: filename.to_string(),
            row: 0,
            source,
        })?
        .clone();

    let mut records = reader.records().enumerate().peekable();
    if records.peek().is_none() {
        // Checking columns on a file with no rows would report the wrong problem
        return Ok(Vec::new());
    }

    let mut columns = EnumMap::<FieldingPosition, Option<FielderColumns>>::default();
    for (position, slot) in columns.iter_mut() {
        *slot = Some(FielderColumns::locate(filename, &headers, position)?);
    }

    records
        .map(|(index, result)| {
            let malformed = |source| ExtractError::MalformedRow {
                filename: filename.to_string(),
                row: index + 1,
                source,
            };
            let record = result.map_err(malformed)?;
            let header: PositionRowHeader =
                record.deserialize(Some(&headers)).map_err(malformed)?;

            Ok(PositionRecord {
                pitch_no: header.pitch_no,
                pitch_uid: header.pitch_uid,
                inning: header.inning,
                top_bottom: header.top_bottom,
                date: header.date,
                home_team: header.home_team,
                away_team: header.away_team,
                stadium: header.stadium,
                fielders: EnumMap::from_fn(|position| {
                    columns[position].and_then(|c| c.read(&record))
                }),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PITCH_CSV: &str = "\
PitchNo,Date,Time,PAofInning,PitchofPA,Pitcher,PitcherId,PitcherThrows,PitcherTeam,Batter,BatterId,BatterSide,BatterTeam,Inning,Top/Bottom,Outs,Balls,Strikes,TaggedPitchType,AutoPitchType,PitchCall,RelSpeed,SpinRate,HomeTeam,AwayTeam,Stadium,PitchUID,SomeVendorColumn
1,2024-06-29,18:35:01.12,1,1,\"Smith, John\",1001,Right,LAN,\"Doe, Jane\",2002,Left,LI,1,Top,0,0,0,Fastball,Four-Seam,StrikeCalled,91.2,2250.5,LAN,LI,ClipperMagazine,abc-1,x
2,2024-06-29,18:35:20.50,1,2,\"Smith, John\",1001,Right,LAN,\"Doe, Jane\",2002,Left,LI,1,Top,0,0,1,,Slider,BallCalled,,n/a,LAN,LI,ClipperMagazine,abc-2,y
";

    #[test]
    fn reads_pitch_rows_and_ignores_unknown_columns() {
        let pitches = read_pitches("p.csv", PITCH_CSV.as_bytes()).unwrap();
        assert_eq!(pitches.len(), 2);

        let first = &pitches[0];
        assert_eq!(first.pitch_no, 1);
        assert_eq!(first.pitcher, "Smith, John");
        assert_eq!(first.top_bottom, HalfInning::Top);
        assert_eq!(first.pitch_call.as_deref(), Some("StrikeCalled"));
        assert_eq!(first.rel_speed, Some(91.2));
        assert_eq!(first.home_team, "LAN");
        assert_eq!(first.away_team, "LI");
        // Columns absent from the file come through as NULL
        assert_eq!(first.exit_speed, None);
        assert_eq!(first.catcher, None);
    }

    #[test]
    fn blank_and_unparsable_cells_become_none() {
        let pitches = read_pitches("p.csv", PITCH_CSV.as_bytes()).unwrap();
        let second = &pitches[1];
        assert_eq!(second.tagged_pitch_type, None);
        assert_eq!(second.rel_speed, None);
        assert_eq!(second.spin_rate, None);
        assert_eq!(second.strikes, Some(1));
    }

    #[test]
    fn missing_required_column_is_a_malformed_row() {
        let csv = "PitchNo,Inning,Top/Bottom,Pitcher,Batter,HomeTeam\n1,1,Top,A,B,LAN\n";
        let err = read_pitches("p.csv", csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedRow { row: 1, .. }), "{err}");
    }

    #[test]
    fn header_only_file_has_no_rows() {
        let header = PITCH_CSV.lines().next().unwrap();
        assert!(read_pitches("p.csv", header.as_bytes()).unwrap().is_empty());
        assert!(read_pitches("p.csv", b"").unwrap().is_empty());
    }

    fn positioning_header() -> String {
        let mut columns = vec![
            "PitchNo", "PitchUID", "Inning", "Top/Bottom", "Date", "HomeTeam", "AwayTeam",
            "Stadium",
        ]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
        for position in ["1B", "2B", "3B", "SS", "LF", "CF", "RF"] {
            for suffix in ["Name", "Id", "PositionAtReleaseX", "PositionAtReleaseZ"] {
                columns.push(format!("{position}_{suffix}"));
            }
        }
        columns.join(",")
    }

    #[test]
    fn reads_positioning_rows_with_one_fielder_per_position() {
        let mut fielders = vec![
            "First Baseman,11,60.5,20.1".to_string(),
            ",,,".to_string(), // nobody recorded at second
        ];
        for i in 3..=7 {
            fielders.push(format!("Fielder {i},{i},{i}.0,{i}.5"));
        }
        let csv = format!(
            "{}\n7,uid-7,2,Bottom,2024-06-29,LAN,LI,ClipperMagazine,{}\n",
            positioning_header(),
            fielders.join(","),
        );

        let rows = read_player_positions("pos.csv", csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.pitch_no, 7);
        assert_eq!(row.top_bottom, HalfInning::Bottom);
        assert_eq!(
            row.fielders[FieldingPosition::FirstBase],
            Some(Fielder {
                name: "First Baseman".to_string(),
                id: Some("11".to_string()),
                position_at_release_x: Some(60.5),
                position_at_release_z: Some(20.1),
            })
        );
        assert_eq!(row.fielders[FieldingPosition::SecondBase], None);
        assert_eq!(
            row.fielders[FieldingPosition::RightField]
                .as_ref()
                .map(|f| f.name.as_str()),
            Some("Fielder 7")
        );
    }

    #[test]
    fn positioning_file_without_fielder_columns_is_rejected() {
        let csv = "PitchNo,PitchUID,Inning,Top/Bottom,HomeTeam,AwayTeam\n1,u,1,Top,LAN,LI\n";
        let err = read_player_positions("pos.csv", csv.as_bytes()).unwrap_err();
        match err {
            ExtractError::MissingColumn { column, .. } => assert_eq!(column, "1B_Name"),
            other => panic!("unexpected error {other}"),
        }
    }
}
