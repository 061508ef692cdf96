use chrono::Utc;
use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::path::PathBuf;
use std::str::FromStr;

use crate::catalog::entities::{
    Album, AlbumPatch, Artist, ArtistPatch, NewAlbum, NewArtist, NewSong, Song, SongPatch,
};
use crate::catalog::errors::Result;
use crate::catalog::query::{QueryEngine, Resource};

pub(crate) enum Table {
    Artists,
    Albums,
    Songs,
    Users,
    PersonalAccessTokens,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Artists => "artists",
            Table::Albums => "albums",
            Table::Songs => "songs",
            Table::Users => "users",
            Table::PersonalAccessTokens => "personal_access_tokens",
        }
    }
}

/// SQLite-backed persistence for the catalog and its users.
#[derive(Clone)]
pub struct LocalStorage {
    pool: SqlitePool,
}

impl LocalStorage {
    /// Open (creating if missing) the database behind `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        debug!("Opened catalog database at {database_url}");
        Ok(LocalStorage { pool })
    }

    pub fn default_url() -> String {
        let db_path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from(".")) // Fall back to the working directory
            .join("musicbox.db");
        format!("sqlite:{}", db_path.display())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Read side of the catalog.
    pub fn catalog(&self) -> QueryEngine {
        QueryEngine::new(self.pool.clone())
    }

    pub async fn init_db(&self) -> Result<()> {
        let schema = format!(
            "
            CREATE TABLE IF NOT EXISTS {artists} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                genre TEXT,
                country TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS {albums} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                year INTEGER,
                artist_id INTEGER NOT NULL REFERENCES {artists}(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS albums_artist_id_index ON {albums}(artist_id);
            CREATE TABLE IF NOT EXISTS {songs} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                duration INTEGER NOT NULL,
                album_id INTEGER NOT NULL REFERENCES {albums}(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS songs_album_id_index ON {songs}(album_id);
            CREATE TABLE IF NOT EXISTS {users} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS {tokens} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES {users}(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                token_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_used_at TEXT
            );
        ",
            artists = Table::Artists.as_str(),
            albums = Table::Albums.as_str(),
            songs = Table::Songs.as_str(),
            users = Table::Users.as_str(),
            tokens = Table::PersonalAccessTokens.as_str(),
        );
        sqlx::raw_sql(&schema).execute(&self.pool).await?;

        debug!("Successfully initialized catalog database");
        Ok(())
    }

    pub async fn exists(&self, resource: Resource, id: i64) -> Result<bool> {
        let query = format!("SELECT 1 FROM {} WHERE id = ?1 LIMIT 1;", resource.table());
        let found: Option<(i64,)> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Returns `false` when no row had that identity. Dependents go with it.
    pub async fn delete(&self, resource: Resource, id: i64) -> Result<bool> {
        let query = format!("DELETE FROM {} WHERE id = ?1;", resource.table());
        let result = sqlx::query(&query).bind(id).execute(&self.pool).await?;
        debug!("Deleted {resource:?} {id}: {} row(s)", result.rows_affected());
        Ok(result.rows_affected() > 0)
    }

    pub async fn create_artist(&self, artist: &NewArtist) -> Result<Artist> {
        let query = format!(
            "INSERT INTO {} (name, genre, country, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4) RETURNING *;",
            Table::Artists.as_str()
        );
        let created = sqlx::query_as::<_, Artist>(&query)
            .bind(&artist.name)
            .bind(&artist.genre)
            .bind(&artist.country)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        debug!("Created artist {}", created.id);
        Ok(created)
    }

    pub async fn update_artist(&self, id: i64, patch: &ArtistPatch) -> Result<Option<Artist>> {
        let mut builder = Self::update_builder(Table::Artists);
        if let Some(name) = &patch.name {
            builder.push(", name = ").push_bind(name.clone());
        }
        if let Some(genre) = &patch.genre {
            builder.push(", genre = ").push_bind(genre.clone());
        }
        if let Some(country) = &patch.country {
            builder.push(", country = ").push_bind(country.clone());
        }
        builder.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        let updated = builder
            .build_query_as::<Artist>()
            .fetch_optional(&self.pool)
            .await?;
        debug!("Updated artist {id}: found={}", updated.is_some());
        Ok(updated)
    }

    pub async fn create_album(&self, album: &NewAlbum) -> Result<Album> {
        let query = format!(
            "INSERT INTO {} (title, year, artist_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4) RETURNING *;",
            Table::Albums.as_str()
        );
        let created = sqlx::query_as::<_, Album>(&query)
            .bind(&album.title)
            .bind(album.year)
            .bind(album.artist_id)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        debug!("Created album {}", created.id);
        Ok(created)
    }

    pub async fn update_album(&self, id: i64, patch: &AlbumPatch) -> Result<Option<Album>> {
        let mut builder = Self::update_builder(Table::Albums);
        if let Some(title) = &patch.title {
            builder.push(", title = ").push_bind(title.clone());
        }
        if let Some(year) = patch.year {
            builder.push(", year = ").push_bind(year);
        }
        if let Some(artist_id) = patch.artist_id {
            builder.push(", artist_id = ").push_bind(artist_id);
        }
        builder.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        let updated = builder
            .build_query_as::<Album>()
            .fetch_optional(&self.pool)
            .await?;
        debug!("Updated album {id}: found={}", updated.is_some());
        Ok(updated)
    }

    pub async fn create_song(&self, song: &NewSong) -> Result<Song> {
        let query = format!(
            "INSERT INTO {} (title, duration, album_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4) RETURNING *;",
            Table::Songs.as_str()
        );
        let created = sqlx::query_as::<_, Song>(&query)
            .bind(&song.title)
            .bind(song.duration)
            .bind(song.album_id)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        debug!("Created song {}", created.id);
        Ok(created)
    }

    pub async fn update_song(&self, id: i64, patch: &SongPatch) -> Result<Option<Song>> {
        let mut builder = Self::update_builder(Table::Songs);
        if let Some(title) = &patch.title {
            builder.push(", title = ").push_bind(title.clone());
        }
        if let Some(duration) = patch.duration {
            builder.push(", duration = ").push_bind(duration);
        }
        if let Some(album_id) = patch.album_id {
            builder.push(", album_id = ").push_bind(album_id);
        }
        builder.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        let updated = builder
            .build_query_as::<Song>()
            .fetch_optional(&self.pool)
            .await?;
        debug!("Updated song {id}: found={}", updated.is_some());
        Ok(updated)
    }

    // Every update touches updated_at, so the SET list is never empty.
    fn update_builder(table: Table) -> QueryBuilder<'static, Sqlite> {
        let mut builder =
            QueryBuilder::new(format!("UPDATE {} SET updated_at = ", table.as_str()));
        builder.push_bind(Utc::now());
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{seed_album, seed_artist, temp_storage};

    #[tokio::test]
    async fn test_create_then_fetch_returns_equal_record() {
        let (storage, _dir) = temp_storage().await;
        let created = storage
            .create_artist(&NewArtist {
                name: "Eminem".into(),
                genre: Some("Rap".into()),
                country: Some("USA".into()),
            })
            .await
            .unwrap();

        assert_eq!(created.id, 1);
        assert_eq!(created.name, "Eminem");
        assert_eq!(created.genre.as_deref(), Some("Rap"));
        assert_eq!(created.country.as_deref(), Some("USA"));

        let fetched = storage
            .catalog()
            .get_by_id::<Artist>(created.id, &[])
            .await
            .unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn test_patch_only_changes_supplied_fields() {
        let (storage, _dir) = temp_storage().await;
        let artist = seed_artist(&storage, "Eminem").await;
        let album = seed_album(&storage, artist.id, "The Marshall Mathers LP").await;

        let patch = AlbumPatch {
            year: Some(Some(2004)),
            ..AlbumPatch::default()
        };
        let updated = storage.update_album(album.id, &patch).await.unwrap().unwrap();

        assert_eq!(updated.year, Some(2004));
        assert_eq!(updated.title, album.title);
        assert_eq!(updated.artist_id, album.artist_id);
        assert_eq!(updated.created_at, album.created_at);
    }

    #[tokio::test]
    async fn test_patch_can_clear_nullable_column() {
        let (storage, _dir) = temp_storage().await;
        let artist = seed_artist(&storage, "Eminem").await;

        let patch = ArtistPatch {
            genre: Some(None),
            ..ArtistPatch::default()
        };
        let updated = storage.update_artist(artist.id, &patch).await.unwrap().unwrap();

        assert_eq!(updated.genre, None);
        assert_eq!(updated.name, "Eminem");
        assert_eq!(updated.country, artist.country);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_none() {
        let (storage, _dir) = temp_storage().await;
        let patch = SongPatch {
            title: Some("Nope".into()),
            ..SongPatch::default()
        };
        assert!(storage.update_song(999, &patch).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_artist_cascades_to_albums_and_songs() {
        let (storage, _dir) = temp_storage().await;
        let artist = seed_artist(&storage, "Eminem").await;
        let album = seed_album(&storage, artist.id, "Encore").await;
        let song = storage
            .create_song(&NewSong {
                title: "Mockingbird".into(),
                duration: 251,
                album_id: album.id,
            })
            .await
            .unwrap();

        assert!(storage.delete(Resource::Artist, artist.id).await.unwrap());

        assert!(!storage.exists(Resource::Artist, artist.id).await.unwrap());
        assert!(!storage.exists(Resource::Album, album.id).await.unwrap());
        assert!(!storage.exists(Resource::Song, song.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_record_reports_false() {
        let (storage, _dir) = temp_storage().await;
        assert!(!storage.delete(Resource::Song, 42).await.unwrap());
    }

    #[tokio::test]
    async fn test_identities_are_not_reused() {
        let (storage, _dir) = temp_storage().await;
        let first = seed_artist(&storage, "First").await;
        storage.delete(Resource::Artist, first.id).await.unwrap();
        let second = seed_artist(&storage, "Second").await;
        assert!(second.id > first.id);
    }
}
