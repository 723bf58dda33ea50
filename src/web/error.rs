use log::error;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use rocket::Request;
use thiserror::Error;

use crate::web::ApiResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidParameters(String),

    #[error(transparent)]
    DbError(#[from] diesel::result::Error),
}

impl AppError {
    fn status(&self) -> Status {
        match self {
            AppError::InvalidParameters(_) => Status::BadRequest,
            AppError::DbError(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for AppError {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        error!("{:#?}", self);

        let is_debug = req.rocket().config().profile == "debug";
        let message = match &self {
            AppError::DbError(_) if !is_debug => "Database error".to_string(),
            other => other.to_string(),
        };

        (self.status(), Json(ApiResponse::<()>::failure(message))).respond_to(req)
    }
}
