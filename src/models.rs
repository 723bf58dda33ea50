use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;
use serde::Serialize;

#[derive(Insertable)]
#[diesel(table_name = crate::schema::team)]
pub struct NewTeam<'a> {
    pub team_code: &'a str,
    pub team_name: &'a str,
    pub league: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::ballpark)]
pub struct NewBallpark<'a> {
    pub ballpark_name: &'a str,
    pub city: &'a str,
    pub state: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::game)]
pub struct NewGame {
    pub home_team_id: i64,
    pub visiting_team_id: i64,
    pub ballpark_id: i64,
    pub date: NaiveDate,
    pub daily_game_number: i32,
    pub verified: bool,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::pitch)]
pub struct NewPitch<'a> {
    pub game_id: i64,
    pub pitch_no: i32,
    pub pitch_uid: Option<&'a str>,
    pub pitch_time: Option<NaiveTime>,
    pub inning: i32,
    pub top_bottom: &'a str,
    pub pa_of_inning: Option<i32>,
    pub pitch_of_pa: Option<i32>,
    pub outs: Option<i32>,
    pub balls: Option<i32>,
    pub strikes: Option<i32>,
    pub pitcher_name: &'a str,
    pub pitcher_id: Option<&'a str>,
    pub pitcher_throws: Option<&'a str>,
    pub pitcher_team: Option<&'a str>,
    pub batter_name: &'a str,
    pub batter_id: Option<&'a str>,
    pub batter_side: Option<&'a str>,
    pub batter_team: Option<&'a str>,
    pub catcher_name: Option<&'a str>,
    pub catcher_id: Option<&'a str>,
    pub tagged_pitch_type: Option<&'a str>,
    pub auto_pitch_type: Option<&'a str>,
    pub pitch_call: Option<&'a str>,
    pub kor_bb: Option<&'a str>,
    pub play_result: Option<&'a str>,
    pub outs_on_play: Option<i32>,
    pub runs_scored: Option<i32>,
    pub rel_speed: Option<f64>,
    pub spin_rate: Option<f64>,
    pub induced_vert_break: Option<f64>,
    pub horz_break: Option<f64>,
    pub plate_loc_height: Option<f64>,
    pub plate_loc_side: Option<f64>,
    pub exit_speed: Option<f64>,
    pub launch_angle: Option<f64>,
    pub direction: Option<f64>,
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::player_position)]
pub struct NewPlayerPosition<'a> {
    pub game_id: i64,
    pub pitch_no: i32,
    pub pitch_uid: Option<&'a str>,
    pub inning: i32,
    pub top_bottom: &'a str,
    pub position: &'a str,
    pub player_name: &'a str,
    pub player_id: Option<&'a str>,
    pub position_at_release_x: Option<f64>,
    pub position_at_release_z: Option<f64>,
}

/// One row of the games listing, with team and ballpark names joined in.
#[derive(Debug, Queryable, Serialize)]
pub struct GameListing {
    pub game_id: i64,
    pub home_team_code: String,
    pub home_team_name: String,
    pub visiting_team_code: String,
    pub visiting_team_name: String,
    pub ballpark_name: String,
    pub date: NaiveDate,
    pub daily_game_number: i32,
    pub verified: bool,
}
