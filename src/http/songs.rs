use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::catalog::entities::{NewSong, Song, SongPatch};
use crate::catalog::{Field, Page, Predicate, Relation, Resource};
use crate::http::validation::Validator;
use crate::http::{ApiError, AppState, PageParams, json_body, record_id};

const NOT_FOUND: &str = "Song not found";
const NO_SONGS: &str = "No songs found";

async fn check_album(
    state: &AppState,
    v: &mut Validator,
    album_id: Option<i64>,
) -> Result<(), ApiError> {
    if let Some(album_id) = album_id
        && !state.storage.exists(Resource::Album, album_id).await?
    {
        v.reject("album_id", "The selected album id is invalid.");
    }
    Ok(())
}

/// `GET /songs/search` parameters; blank values are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    title: Option<String>,
    artist: Option<String>,
}

impl SearchParams {
    fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        if let Some(title) = non_blank(self.title.as_deref()) {
            predicates.push(Predicate::contains(Field::SongTitle, title));
        }
        if let Some(artist) = non_blank(self.artist.as_deref()) {
            predicates.push(Predicate::contains(Field::ArtistName, artist));
        }
        predicates
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub async fn index(
    State(state): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<Song>>, ApiError> {
    let Query(params) = params?;
    let page = state
        .catalog()
        .list(params.request(state.page_size), &[Relation::AlbumArtist])
        .await?;
    Ok(Json(page))
}

pub async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<Song>>, ApiError> {
    let Query(params) = params?;
    let songs: Vec<Song> = state
        .catalog()
        .filter(&params.predicates(), &[Relation::AlbumArtist])
        .await?;
    if songs.is_empty() {
        return Err(ApiError::NotFound(NO_SONGS));
    }
    Ok(Json(songs))
}

pub async fn store(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Song>), ApiError> {
    let mut v = Validator::new(json_body(payload)?);
    let title = v.required_string("title", 255);
    let duration = v.required_integer("duration", None);
    let album_id = v.required_integer("album_id", None);
    check_album(&state, &mut v, album_id).await?;
    let (Some(title), Some(duration), Some(album_id), true) =
        (title, duration, album_id, v.is_valid())
    else {
        return Err(v.into_error());
    };

    let song = state
        .storage
        .create_song(&NewSong {
            title,
            duration,
            album_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(song)))
}

pub async fn show(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Song>, ApiError> {
    let id = record_id(id, NOT_FOUND)?;
    state
        .catalog()
        .get_by_id::<Song>(id, &[Relation::AlbumArtist])
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Song>, ApiError> {
    let id = record_id(id, NOT_FOUND)?;
    if !state.storage.exists(Resource::Song, id).await? {
        return Err(ApiError::NotFound(NOT_FOUND));
    }

    let mut v = Validator::new(json_body(payload)?);
    let patch = SongPatch {
        title: v.optional_string("title", 255),
        // Null duration leaves the stored value alone
        duration: v.nullable_integer("duration", Some(30..=900)).flatten(),
        album_id: v.optional_integer("album_id", None),
    };
    check_album(&state, &mut v, patch.album_id).await?;
    v.finish()?;

    state
        .storage
        .update_song(id, &patch)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

pub async fn destroy(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = record_id(id, NOT_FOUND)?;
    if state.storage.delete(Resource::Song, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(NOT_FOUND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_skip_blank_values() {
        let params = SearchParams {
            title: Some("Stan".into()),
            artist: Some("  ".into()),
        };
        assert_eq!(
            params.predicates(),
            vec![Predicate::contains(Field::SongTitle, "Stan")]
        );
        assert!(SearchParams::default().predicates().is_empty());
    }
}
