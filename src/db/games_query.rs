use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::{PgConnection, QueryResult};

use crate::models::GameListing;
use crate::schema::{ballpark, game, team};

#[derive(Debug, Clone, PartialEq)]
pub enum GameFilter {
    HomeTeamCode(String),
    VisitingTeamCode(String),
    /// Substring match on the ballpark name
    BallparkName(String),
    Date(NaiveDate),
    Verified(bool),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameQuery {
    pub filters: Vec<GameFilter>,
    pub page: i64,
    pub limit: i64,
    pub order: SortOrder,
}

impl GameQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

pub fn list_games(conn: &mut PgConnection, query: &GameQuery) -> QueryResult<Vec<GameListing>> {
    let (home_team, visiting_team) = diesel::alias!(team as home_team, team as visiting_team);

    let mut statement = game::table
        .inner_join(home_team.on(game::home_team_id.eq(home_team.field(team::team_id))))
        .inner_join(
            visiting_team.on(game::visiting_team_id.eq(visiting_team.field(team::team_id))),
        )
        .inner_join(ballpark::table.on(game::ballpark_id.eq(ballpark::ballpark_id)))
        .select((
            game::game_id,
            home_team.field(team::team_code),
            home_team.field(team::team_name),
            visiting_team.field(team::team_code),
            visiting_team.field(team::team_name),
            ballpark::ballpark_name,
            game::date,
            game::daily_game_number,
            game::verified,
        ))
        .into_boxed();

    // Every value is bound as a parameter, never spliced into the SQL
    for filter in &query.filters {
        statement = match filter {
            GameFilter::HomeTeamCode(code) => {
                statement.filter(home_team.field(team::team_code).eq(code.clone()))
            }
            GameFilter::VisitingTeamCode(code) => {
                statement.filter(visiting_team.field(team::team_code).eq(code.clone()))
            }
            GameFilter::BallparkName(name) => {
                statement.filter(ballpark::ballpark_name.like(format!("%{name}%")))
            }
            GameFilter::Date(date) => statement.filter(game::date.eq(*date)),
            GameFilter::Verified(verified) => statement.filter(game::verified.eq(*verified)),
        };
    }

    statement = match query.order {
        SortOrder::Asc => statement.order((game::date.asc(), game::game_id.asc())),
        SortOrder::Desc => statement.order((game::date.desc(), game::game_id.desc())),
    };

    statement
        .limit(query.limit)
        .offset(query.offset())
        .load::<GameListing>(conn)
}
