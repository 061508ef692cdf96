//! Fixtures shared by the unit tests.

use tempfile::TempDir;

use crate::catalog::LocalStorage;
use crate::catalog::entities::{Album, Artist, NewAlbum, NewArtist};

/// Fresh schema in a temporary directory. Keep the `TempDir` alive for the
/// duration of the test; the database goes away with it.
pub async fn temp_storage() -> (LocalStorage, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_url = format!("sqlite:{}", dir.path().join("test.db").display());

    let storage = LocalStorage::connect(&db_url)
        .await
        .expect("Failed to open test database");
    storage
        .init_db()
        .await
        .expect("Failed to initialize test database");

    (storage, dir)
}

pub async fn seed_artist(storage: &LocalStorage, name: &str) -> Artist {
    storage
        .create_artist(&NewArtist {
            name: name.to_string(),
            genre: Some("Rap".to_string()),
            country: Some("USA".to_string()),
        })
        .await
        .expect("Failed to seed artist")
}

pub async fn seed_artist_with_genre(
    storage: &LocalStorage,
    name: &str,
    genre: Option<&str>,
) -> Artist {
    storage
        .create_artist(&NewArtist {
            name: name.to_string(),
            genre: genre.map(str::to_string),
            country: None,
        })
        .await
        .expect("Failed to seed artist")
}

pub async fn seed_album(storage: &LocalStorage, artist_id: i64, title: &str) -> Album {
    storage
        .create_album(&NewAlbum {
            title: title.to_string(),
            year: Some(2000),
            artist_id,
        })
        .await
        .expect("Failed to seed album")
}
