mod error;

use std::sync::Arc;

use chrono::NaiveDate;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{FromForm, Route, State, get, post, routes};
use serde::Serialize;

use crate::Db;
use crate::db::{self, GameFilter, GameQuery, SortOrder};
use crate::ingest::metadata::GameDescriptor;
use crate::ingest::{
    DeliveryNotification, IngestConfig, IngestFailure, IngestOutcome, ObjectLocation,
    ObjectStoreFactory, ingest_parsed, process_delivery,
};
use crate::models::GameListing;
use error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 1000;
/// Keeps `(page - 1) * limit` within an `i64` for every accepted limit
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

pub fn routes() -> Vec<Route> {
    routes![ingest_delivery, games]
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: usize,
}

/// The envelope every endpoint responds with
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

impl<T> ApiResponse<T> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            meta: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FailedDelivery {
    pub location: ObjectLocation,
    pub descriptor: Option<GameDescriptor>,
    pub attempts: usize,
    pub transient: bool,
    pub error: String,
}

impl From<IngestFailure> for FailedDelivery {
    fn from(failure: IngestFailure) -> Self {
        Self {
            transient: failure.is_transient(),
            error: failure.source.to_string(),
            location: failure.location,
            descriptor: failure.key,
            attempts: failure.attempts,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeliveryReport {
    pub ingested: Vec<IngestOutcome>,
    pub failed: Vec<FailedDelivery>,
}

impl DeliveryReport {
    /// 503 makes the delivery source try again later, which only helps if
    /// some failure was transient
    fn status(&self) -> Status {
        if self.failed.iter().any(|f| f.transient) {
            Status::ServiceUnavailable
        } else if !self.failed.is_empty() {
            Status::UnprocessableEntity
        } else {
            Status::Ok
        }
    }
}

#[post("/ingest", format = "json", data = "<notification>")]
async fn ingest_delivery(
    db: Db,
    notification: Json<DeliveryNotification>,
    stores: &State<Arc<dyn ObjectStoreFactory>>,
    config: &State<IngestConfig>,
) -> (Status, Json<ApiResponse<DeliveryReport>>) {
    let locations = notification.locations();
    let chunk_size = config.write_chunk_size;
    let db = &db;

    let mut report = DeliveryReport {
        ingested: Vec::new(),
        failed: Vec::new(),
    };

    // Records are independent; one bad file doesn't stop the rest
    for location in &locations {
        let result = process_delivery(stores.inner().as_ref(), config, location, move |parsed| {
            db.run(move |conn| ingest_parsed(conn, &parsed, chunk_size))
        })
        .await;

        match result {
            Ok(outcome) => report.ingested.push(outcome),
            Err(failure) => report.failed.push(failure.into()),
        }
    }

    let status = report.status();
    let response = ApiResponse {
        success: report.failed.is_empty(),
        message: format!(
            "Ingested {} of {} files",
            report.ingested.len(),
            locations.len()
        ),
        data: Some(report),
        meta: None,
    };

    (status, Json(response))
}

#[derive(Debug, Default, FromForm)]
pub struct GameQueryParams {
    home_team_code: Option<String>,
    visiting_team_code: Option<String>,
    ballpark_name: Option<String>,
    date: Option<String>,
    verified: Option<String>,
    page: Option<String>,
    limit: Option<String>,
    order: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl GameQueryParams {
    pub fn into_query(self) -> Result<GameQuery, AppError> {
        let invalid = |message: String| AppError::InvalidParameters(message);
        let mut filters = Vec::new();

        if let Some(code) = non_empty(self.home_team_code) {
            filters.push(GameFilter::HomeTeamCode(code));
        }
        if let Some(code) = non_empty(self.visiting_team_code) {
            filters.push(GameFilter::VisitingTeamCode(code));
        }
        if let Some(name) = non_empty(self.ballpark_name) {
            filters.push(GameFilter::BallparkName(name));
        }
        if let Some(date) = non_empty(self.date) {
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|_| invalid(format!("date must be YYYY-MM-DD, got {date:?}")))?;
            filters.push(GameFilter::Date(date));
        }
        if let Some(verified) = non_empty(self.verified) {
            let verified = match verified.to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => return Err(invalid(format!("verified must be true or false, got {verified:?}"))),
            };
            filters.push(GameFilter::Verified(verified));
        }

        let page = match non_empty(self.page) {
            Some(page) => page
                .parse::<i64>()
                .ok()
                .filter(|p| (1..=MAX_PAGE).contains(p))
                .ok_or_else(|| {
                    invalid(format!("page must be between 1 and {MAX_PAGE}, got {page:?}"))
                })?,
            None => 1,
        };

        let limit = match non_empty(self.limit) {
            Some(limit) => limit
                .parse::<i64>()
                .ok()
                .filter(|l| (1..=MAX_PAGE_SIZE).contains(l))
                .ok_or_else(|| {
                    invalid(format!("limit must be between 1 and {MAX_PAGE_SIZE}, got {limit:?}"))
                })?,
            None => DEFAULT_PAGE_SIZE,
        };

        let order = match non_empty(self.order) {
            Some(order) => match order.to_ascii_uppercase().as_str() {
                "ASC" => SortOrder::Asc,
                "DESC" => SortOrder::Desc,
                _ => return Err(invalid(format!("order must be ASC or DESC, got {order:?}"))),
            },
            None => SortOrder::default(),
        };

        Ok(GameQuery {
            filters,
            page,
            limit,
            order,
        })
    }
}

#[get("/games?<params..>")]
async fn games(db: Db, params: GameQueryParams) -> Result<Json<ApiResponse<Vec<GameListing>>>, AppError> {
    let query = params.into_query()?;
    let (page, limit) = (query.page, query.limit);

    let games = db.run(move |conn| db::list_games(conn, &query)).await?;

    Ok(Json(ApiResponse {
        success: true,
        message: format!("Found {} games", games.len()),
        meta: Some(PageMeta {
            page,
            limit,
            total: games.len(),
        }),
        data: Some(games),
    }))
}
