//! HTTP surface of the catalog.

/// Album endpoints
pub mod albums;
/// Artist endpoints
pub mod artists;
/// Register, login and logout
pub mod auth;
/// Error responses
pub mod error;
/// Song endpoints
pub mod songs;
/// Payload validation
pub mod validation;

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use log::info;
use serde::Deserialize;
use serde_json::Value;

use crate::catalog::{LocalStorage, PageRequest, QueryEngine};
pub use error::ApiError;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Catalog and user storage
    pub storage: Arc<LocalStorage>,
    /// Records per list page
    pub page_size: u32,
}

impl AppState {
    /// Read side of the catalog.
    pub fn catalog(&self) -> QueryEngine {
        self.storage.catalog()
    }
}

/// `?page=` on list endpoints. Missing or unparsable means page 1.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    page: Option<String>,
}

impl PageParams {
    /// Page request using the configured page size.
    pub fn request(&self, per_page: u32) -> PageRequest {
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .unwrap_or(1);
        PageRequest::new(page, per_page)
    }
}

/// Identity from the path. Anything that does not parse as an `i64` cannot
/// name a record, so it is reported as missing.
pub(crate) fn record_id(
    path: Result<Path<i64>, PathRejection>,
    not_found: &'static str,
) -> Result<i64, ApiError> {
    path.map(|Path(id)| id).map_err(|_| ApiError::NotFound(not_found))
}

pub(crate) fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    let Json(body) = payload?;
    Ok(body)
}

/// All routes, with request logging.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/artists", get(artists::index).post(artists::store))
        .route("/artists/genre/{genre}", get(artists::by_genre))
        .route("/artists/name/{name}", get(artists::by_name))
        .route(
            "/artists/{id}",
            get(artists::show)
                .put(artists::update)
                .delete(artists::destroy),
        )
        .route("/artists/{id}/details", get(artists::details))
        .route("/albums", get(albums::index).post(albums::store))
        .route(
            "/albums/{id}",
            get(albums::show).put(albums::update).delete(albums::destroy),
        )
        .route("/albums/{id}/songs", get(albums::songs))
        .route("/songs", get(songs::index).post(songs::store))
        .route("/songs/search", get(songs::search))
        .route(
            "/songs/{id}",
            get(songs::show).put(songs::update).delete(songs::destroy),
        )
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        "{method} {path} -> {} ({:?})",
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_fall_back_to_first_page() {
        let missing = PageParams::default();
        assert_eq!(missing.request(10), PageRequest::new(1, 10));

        let garbage = PageParams {
            page: Some("abc".into()),
        };
        assert_eq!(garbage.request(10).page, 1);

        let third = PageParams {
            page: Some("3".into()),
        };
        assert_eq!(third.request(10).offset(), 20);
    }
}
