use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde_json::Value;

use crate::catalog::entities::{Artist, ArtistPatch, NewArtist};
use crate::catalog::{Field, Page, Predicate, Relation, Resource};
use crate::http::validation::Validator;
use crate::http::{ApiError, AppState, PageParams, json_body, record_id};

const NOT_FOUND: &str = "Artist not found";
const NO_ARTISTS_FOR_GENRE: &str = "No artists found for this genre";

pub async fn index(
    State(state): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<Artist>>, ApiError> {
    let Query(params) = params?;
    let page = state
        .catalog()
        .list(params.request(state.page_size), &[])
        .await?;
    Ok(Json(page))
}

pub async fn store(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Artist>), ApiError> {
    let mut v = Validator::new(json_body(payload)?);
    let name = v.required_string("name", 255);
    let genre = v.nullable_string("genre", 100);
    let country = v.nullable_string("country", 100);
    let (Some(name), true) = (name, v.is_valid()) else {
        return Err(v.into_error());
    };

    let artist = state
        .storage
        .create_artist(&NewArtist {
            name,
            genre: genre.flatten(),
            country: country.flatten(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(artist)))
}

pub async fn show(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Artist>, ApiError> {
    let id = record_id(id, NOT_FOUND)?;
    state
        .catalog()
        .get_by_id::<Artist>(id, &[])
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

pub async fn details(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Artist>, ApiError> {
    let id = record_id(id, NOT_FOUND)?;
    state
        .catalog()
        .get_by_id::<Artist>(id, &[Relation::Albums])
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

pub async fn by_genre(
    State(state): State<AppState>,
    Path(genre): Path<String>,
) -> Result<Json<Vec<Artist>>, ApiError> {
    let artists: Vec<Artist> = state
        .catalog()
        .list_by_exact_field(Field::ArtistGenre, genre)
        .await?;
    if artists.is_empty() {
        return Err(ApiError::NotFound(NO_ARTISTS_FOR_GENRE));
    }
    Ok(Json(artists))
}

pub async fn by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Artist>, ApiError> {
    state
        .catalog()
        .first::<Artist>(&[Predicate::contains(Field::ArtistName, name)])
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Artist>, ApiError> {
    let id = record_id(id, NOT_FOUND)?;
    if !state.storage.exists(Resource::Artist, id).await? {
        return Err(ApiError::NotFound(NOT_FOUND));
    }

    let mut v = Validator::new(json_body(payload)?);
    let patch = ArtistPatch {
        name: v.optional_string("name", 255),
        genre: v.nullable_string("genre", 100),
        country: v.nullable_string("country", 100),
    };
    v.finish()?;

    state
        .storage
        .update_artist(id, &patch)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

pub async fn destroy(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = record_id(id, NOT_FOUND)?;
    if state.storage.delete(Resource::Artist, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(NOT_FOUND))
    }
}
