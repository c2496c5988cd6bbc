use std::io::Cursor;

use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use serde_json::json;

/// Errors reported directly to the HTTP caller.
///
/// Fetch failures never appear here: the fetch endpoint answers those with
/// the fallback asset instead of an error status.
#[derive(Debug)]
pub enum ApiError {
    /// A required query parameter is missing.
    MissingParam(&'static str),
    /// The fallback asset itself could not be read.
    FallbackUnavailable,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        match self {
            ApiError::MissingParam(name) => Response::build()
                .status(Status::BadRequest)
                .sized_body(
                    None,
                    Cursor::new(format!("Missing required parameter '{}'", name)),
                )
                .ok(),
            ApiError::FallbackUnavailable => {
                let body = json!({
                    "error": "Image unavailable",
                    "message": "Neither the requested image nor the fallback asset could be served"
                })
                .to_string();

                Response::build()
                    .status(Status::ServiceUnavailable)
                    .sized_body(None, Cursor::new(body))
                    .ok()
            }
        }
    }
}
