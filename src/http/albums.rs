use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde_json::Value;

use crate::catalog::entities::{Album, AlbumPatch, NewAlbum, Song};
use crate::catalog::{Page, Relation, Resource};
use crate::http::validation::Validator;
use crate::http::{ApiError, AppState, PageParams, json_body, record_id};

const NOT_FOUND: &str = "Album not found";
const YEARS: std::ops::RangeInclusive<i64> = 1900..=2100;

async fn check_artist(
    state: &AppState,
    v: &mut Validator,
    artist_id: Option<i64>,
) -> Result<(), ApiError> {
    if let Some(artist_id) = artist_id
        && !state.storage.exists(Resource::Artist, artist_id).await?
    {
        v.reject("artist_id", "The selected artist id is invalid.");
    }
    Ok(())
}

pub async fn index(
    State(state): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<Album>>, ApiError> {
    let Query(params) = params?;
    let page = state
        .catalog()
        .list(params.request(state.page_size), &[Relation::Artist])
        .await?;
    Ok(Json(page))
}

pub async fn store(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Album>), ApiError> {
    let mut v = Validator::new(json_body(payload)?);
    let title = v.required_string("title", 255);
    let year = v.nullable_integer("year", Some(YEARS));
    let artist_id = v.required_integer("artist_id", None);
    check_artist(&state, &mut v, artist_id).await?;
    let (Some(title), Some(artist_id), true) = (title, artist_id, v.is_valid()) else {
        return Err(v.into_error());
    };

    let album = state
        .storage
        .create_album(&NewAlbum {
            title,
            year: year.flatten(),
            artist_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(album)))
}

pub async fn show(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Album>, ApiError> {
    let id = record_id(id, NOT_FOUND)?;
    state
        .catalog()
        .get_by_id::<Album>(id, &[Relation::Artist])
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

pub async fn songs(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Song>>, ApiError> {
    let id = record_id(id, NOT_FOUND)?;
    let album = state
        .catalog()
        .get_by_id::<Album>(id, &[Relation::Songs])
        .await?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;
    Ok(Json(album.songs.unwrap_or_default()))
}

pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Album>, ApiError> {
    let id = record_id(id, NOT_FOUND)?;
    if !state.storage.exists(Resource::Album, id).await? {
        return Err(ApiError::NotFound(NOT_FOUND));
    }

    let mut v = Validator::new(json_body(payload)?);
    let patch = AlbumPatch {
        title: v.optional_string("title", 255),
        year: v.nullable_integer("year", Some(YEARS)),
        artist_id: v.optional_integer("artist_id", None),
    };
    check_artist(&state, &mut v, patch.artist_id).await?;
    v.finish()?;

    state
        .storage
        .update_album(id, &patch)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

pub async fn destroy(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = record_id(id, NOT_FOUND)?;
    if state.storage.delete(Resource::Album, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(NOT_FOUND))
    }
}
