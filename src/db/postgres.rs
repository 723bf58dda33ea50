use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel::{PgConnection, QueryResult};

use crate::db::{EventStore, GameKey, GameStore, IngestStore, ReferenceStore, Verification};
use crate::models::{NewBallpark, NewGame, NewPitch, NewPlayerPosition, NewTeam};

impl ReferenceStore for PgConnection {
    fn team_id(&mut self, code: &str) -> QueryResult<Option<i64>> {
        use crate::schema::team::dsl::*;

        team.filter(team_code.eq(code))
            .select(team_id)
            .first(self)
            .optional()
    }

    fn ballpark_id(&mut self, name: &str) -> QueryResult<Option<i64>> {
        use crate::schema::ballpark::dsl::*;

        ballpark
            .filter(ballpark_name.eq(name))
            .select(ballpark_id)
            .first(self)
            .optional()
    }

    fn insert_team_if_absent(&mut self, new_team: &NewTeam) -> QueryResult<bool> {
        use crate::schema::team::dsl::*;

        let inserted = diesel::insert_into(team)
            .values(new_team)
            .on_conflict(team_code)
            .do_nothing()
            .execute(self)?;

        Ok(inserted == 1)
    }

    fn insert_ballpark_if_absent(&mut self, new_ballpark: &NewBallpark) -> QueryResult<bool> {
        use crate::schema::ballpark::dsl::*;

        let inserted = diesel::insert_into(ballpark)
            .values(new_ballpark)
            .on_conflict(ballpark_name)
            .do_nothing()
            .execute(self)?;

        Ok(inserted == 1)
    }
}

impl GameStore for PgConnection {
    fn games_with_key(
        &mut self,
        key: &GameKey,
        verification: Verification,
    ) -> QueryResult<Vec<i64>> {
        use crate::schema::game::dsl::*;

        game.filter(home_team_id.eq(key.home_team_id))
            .filter(visiting_team_id.eq(key.visiting_team_id))
            .filter(ballpark_id.eq(key.ballpark_id))
            .filter(date.eq(key.date))
            .filter(daily_game_number.eq(key.daily_game_number))
            .filter(verified.eq(verification.is_verified()))
            .select(game_id)
            .order(game_id.asc())
            .load(self)
    }

    fn insert_game(
        &mut self,
        key: &GameKey,
        verification: Verification,
    ) -> QueryResult<Option<i64>> {
        use crate::schema::game::dsl::*;

        let new_game = NewGame {
            home_team_id: key.home_team_id,
            visiting_team_id: key.visiting_team_id,
            ballpark_id: key.ballpark_id,
            date: key.date,
            daily_game_number: key.daily_game_number,
            verified: verification.is_verified(),
        };

        // Under SERIALIZABLE, losing this race to a transaction that is not
        // yet visible surfaces as a serialization failure rather than an
        // empty result. That is retried a level up.
        diesel::insert_into(game)
            .values(&new_game)
            .on_conflict((
                home_team_id,
                visiting_team_id,
                ballpark_id,
                date,
                daily_game_number,
                verified,
            ))
            .do_nothing()
            .returning(game_id)
            .get_result(self)
            .optional()
    }

    fn promote_game(&mut self, id: i64) -> QueryResult<bool> {
        use crate::schema::game::dsl::*;

        let updated = diesel::update(game.filter(game_id.eq(id)).filter(verified.eq(false)))
            .set(verified.eq(true))
            .execute(self)?;

        Ok(updated == 1)
    }
}

impl EventStore for PgConnection {
    fn upsert_pitches(&mut self, pitches: &[NewPitch]) -> QueryResult<usize> {
        use crate::schema::pitch::dsl::*;

        diesel::insert_into(pitch)
            .values(pitches)
            .on_conflict((game_id, pitch_no))
            .do_update()
            .set((
                pitch_uid.eq(excluded(pitch_uid)),
                pitch_time.eq(excluded(pitch_time)),
                inning.eq(excluded(inning)),
                top_bottom.eq(excluded(top_bottom)),
                pa_of_inning.eq(excluded(pa_of_inning)),
                pitch_of_pa.eq(excluded(pitch_of_pa)),
                outs.eq(excluded(outs)),
                balls.eq(excluded(balls)),
                strikes.eq(excluded(strikes)),
                pitcher_name.eq(excluded(pitcher_name)),
                pitcher_id.eq(excluded(pitcher_id)),
                pitcher_throws.eq(excluded(pitcher_throws)),
                pitcher_team.eq(excluded(pitcher_team)),
                batter_name.eq(excluded(batter_name)),
                batter_id.eq(excluded(batter_id)),
                batter_side.eq(excluded(batter_side)),
                batter_team.eq(excluded(batter_team)),
                catcher_name.eq(excluded(catcher_name)),
                catcher_id.eq(excluded(catcher_id)),
                tagged_pitch_type.eq(excluded(tagged_pitch_type)),
                auto_pitch_type.eq(excluded(auto_pitch_type)),
                pitch_call.eq(excluded(pitch_call)),
                kor_bb.eq(excluded(kor_bb)),
                play_result.eq(excluded(play_result)),
                outs_on_play.eq(excluded(outs_on_play)),
                runs_scored.eq(excluded(runs_scored)),
                rel_speed.eq(excluded(rel_speed)),
                spin_rate.eq(excluded(spin_rate)),
                induced_vert_break.eq(excluded(induced_vert_break)),
                horz_break.eq(excluded(horz_break)),
                plate_loc_height.eq(excluded(plate_loc_height)),
                plate_loc_side.eq(excluded(plate_loc_side)),
                exit_speed.eq(excluded(exit_speed)),
                launch_angle.eq(excluded(launch_angle)),
                direction.eq(excluded(direction)),
                distance.eq(excluded(distance)),
            ))
            .execute(self)
    }

    fn upsert_player_positions(&mut self, positions: &[NewPlayerPosition]) -> QueryResult<usize> {
        use crate::schema::player_position::dsl::*;

        diesel::insert_into(player_position)
            .values(positions)
            .on_conflict((game_id, pitch_no, position))
            .do_update()
            .set((
                pitch_uid.eq(excluded(pitch_uid)),
                inning.eq(excluded(inning)),
                top_bottom.eq(excluded(top_bottom)),
                player_name.eq(excluded(player_name)),
                player_id.eq(excluded(player_id)),
                position_at_release_x.eq(excluded(position_at_release_x)),
                position_at_release_z.eq(excluded(position_at_release_z)),
            ))
            .execute(self)
    }
}

impl IngestStore for PgConnection {
    fn serializable<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<diesel::result::Error>,
    {
        self.build_transaction().serializable().run(f)
    }
}
