mod db;
mod ingest;
mod models;
#[rustfmt::skip] // This is a generated file
mod schema;
mod web;

use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::{error, info};
use rocket::fairing::{self, AdHoc};
use rocket::{Build, Rocket, launch};
use rocket_sync_db_pools::database;

use crate::db::reference::{ReferenceData, seed_reference_data};
use crate::ingest::IngestConfig;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[database("trackman")]
pub struct Db(diesel::PgConnection);

async fn run_migrations(rocket: Rocket<Build>) -> fairing::Result {
    let Some(conn) = Db::get_one(&rocket).await else {
        error!("Could not get a database connection to run migrations");
        return Err(rocket);
    };

    let result = conn
        .run(|conn| {
            conn.run_pending_migrations(MIGRATIONS)
                .map(|applied| applied.len())
                .map_err(|err| err.to_string())
        })
        .await;

    match result {
        Ok(applied) => {
            info!("Applied {applied} pending migrations");
            Ok(rocket)
        }
        Err(err) => {
            error!("Failed to apply migrations: {err}");
            Err(rocket)
        }
    }
}

async fn seed_from_file(rocket: &Rocket<Build>, config: &IngestConfig) -> Result<(), String> {
    let Some(path) = &config.reference_data else {
        info!("No reference data file configured; skipping seeding");
        return Ok(());
    };

    let data = ReferenceData::from_path(path).map_err(|err| err.to_string())?;
    let conn = Db::get_one(rocket)
        .await
        .ok_or_else(|| "Could not get a database connection to seed reference data".to_string())?;

    conn.run(move |conn| seed_reference_data(conn, &data))
        .await
        .map(|_| ())
        .map_err(|err| format!("Error seeding reference data: {err}"))
}

async fn configure_ingest(rocket: Rocket<Build>) -> fairing::Result {
    let config: IngestConfig = match rocket.figment().extract_inner("ingest") {
        Ok(config) => config,
        Err(err) if err.missing() => IngestConfig::default(),
        Err(err) => {
            error!("Invalid ingest configuration: {err}");
            return Err(rocket);
        }
    };

    if let Err(err) = seed_from_file(&rocket, &config).await {
        error!("{err}");
        return Err(rocket);
    }

    info!(
        "Ingest configured: {:?} storage, {} attempts per file",
        config.storage, config.max_attempts,
    );
    let stores = config.storage.factory();

    Ok(rocket.manage(config).manage(stores))
}

#[launch]
fn rocket() -> _ {
    rocket::build()
        .mount("/", web::routes())
        .attach(Db::fairing())
        .attach(AdHoc::try_on_ignite("Diesel migrations", run_migrations))
        .attach(AdHoc::try_on_ignite("Ingest configuration", configure_ingest))
}
