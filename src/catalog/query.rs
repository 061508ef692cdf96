//! Catalog Query Engine.
//!
//! Resolves read requests against one resource type: identity-ordered
//! pagination, predicate filtering and eager relation loading. Predicates on
//! fields of an ancestor resource (a song's album's artist, say) compile to
//! nested correlated `EXISTS` subqueries along the reference chain, so a row
//! matches when at least one ancestor satisfies the predicate.
//!
//! An empty result is never an error here; callers decide whether it should
//! surface as "not found". Malformed predicates and unsupported relations are
//! caller bugs and fail with [`Error::MalformedQuery`].

use async_trait::async_trait;
use futures::future::try_join_all;
use log::debug;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{FromRow, QueryBuilder, Sqlite};

use crate::catalog::entities::{Album, Artist, Song};
use crate::catalog::errors::{Error, Result};
use crate::catalog::local_storage::Table;
use crate::catalog::pagination::{Page, PageRequest};

/// The three catalog resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Artists
    Artist,
    /// Albums, each owned by one artist
    Album,
    /// Songs, each owned by one album
    Song,
}

impl Resource {
    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            Resource::Artist => Table::Artists.as_str(),
            Resource::Album => Table::Albums.as_str(),
            Resource::Song => Table::Songs.as_str(),
        }
    }

    /// Owning resource and the foreign key column pointing at it.
    pub fn parent(self) -> Option<(Resource, &'static str)> {
        match self {
            Resource::Artist => None,
            Resource::Album => Some((Resource::Artist, "artist_id")),
            Resource::Song => Some((Resource::Album, "album_id")),
        }
    }

    /// Hops from `self` up to `target`, each with the child-side foreign key.
    /// `None` when `target` is not `self` or one of its ancestors.
    fn path_to(self, target: Resource) -> Option<Vec<(Resource, &'static str)>> {
        let mut path = Vec::new();
        let mut current = self;
        while current != target {
            let (parent, foreign_key) = current.parent()?;
            path.push((parent, foreign_key));
            current = parent;
        }
        Some(path)
    }
}

/// Column types a predicate value must agree with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// TEXT column
    Text,
    /// INTEGER column
    Integer,
}

/// Every filterable column, tagged with the resource that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// `artists.id`
    ArtistId,
    /// `artists.name`
    ArtistName,
    /// `artists.genre`
    ArtistGenre,
    /// `artists.country`
    ArtistCountry,
    /// `albums.id`
    AlbumId,
    /// `albums.title`
    AlbumTitle,
    /// `albums.year`
    AlbumYear,
    /// `albums.artist_id`
    AlbumArtistId,
    /// `songs.id`
    SongId,
    /// `songs.title`
    SongTitle,
    /// `songs.duration`
    SongDuration,
    /// `songs.album_id`
    SongAlbumId,
}

impl Field {
    /// Resource that owns the column.
    pub fn resource(self) -> Resource {
        match self {
            Field::ArtistId | Field::ArtistName | Field::ArtistGenre | Field::ArtistCountry => {
                Resource::Artist
            }
            Field::AlbumId | Field::AlbumTitle | Field::AlbumYear | Field::AlbumArtistId => {
                Resource::Album
            }
            Field::SongId | Field::SongTitle | Field::SongDuration | Field::SongAlbumId => {
                Resource::Song
            }
        }
    }

    /// Column name within the owning table.
    pub fn column(self) -> &'static str {
        match self {
            Field::ArtistId | Field::AlbumId | Field::SongId => "id",
            Field::ArtistName => "name",
            Field::ArtistGenre => "genre",
            Field::ArtistCountry => "country",
            Field::AlbumTitle | Field::SongTitle => "title",
            Field::AlbumYear => "year",
            Field::AlbumArtistId => "artist_id",
            Field::SongDuration => "duration",
            Field::SongAlbumId => "album_id",
        }
    }

    /// Column type.
    pub fn field_type(self) -> FieldType {
        match self {
            Field::ArtistName
            | Field::ArtistGenre
            | Field::ArtistCountry
            | Field::AlbumTitle
            | Field::SongTitle => FieldType::Text,
            Field::ArtistId
            | Field::AlbumId
            | Field::AlbumYear
            | Field::AlbumArtistId
            | Field::SongId
            | Field::SongDuration
            | Field::SongAlbumId => FieldType::Integer,
        }
    }
}

/// How a predicate compares a column with its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Column equals the value
    Exact,
    /// Column contains the value, ignoring ASCII case. Text columns only.
    Contains,
}

/// A predicate operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Text operand
    Text(String),
    /// Integer operand
    Integer(i64),
}

impl Value {
    fn field_type(&self) -> FieldType {
        match self {
            Value::Text(_) => FieldType::Text,
            Value::Integer(_) => FieldType::Integer,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

/// Filter tree evaluated by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Compare one field, possibly on an ancestor resource
    Match {
        /// Field to compare
        field: Field,
        /// Comparison
        kind: MatchKind,
        /// Operand
        value: Value,
    },
    /// Logical AND of the children; empty matches everything
    All(Vec<Predicate>),
}

impl Predicate {
    /// `field = value`
    pub fn exact(field: Field, value: impl Into<Value>) -> Self {
        Predicate::Match {
            field,
            kind: MatchKind::Exact,
            value: value.into(),
        }
    }

    /// Case-insensitive substring match on a text field.
    pub fn contains(field: Field, needle: impl Into<String>) -> Self {
        Predicate::Match {
            field,
            kind: MatchKind::Contains,
            value: Value::Text(needle.into()),
        }
    }
}

/// Relations that can be eagerly attached to a fetched record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Album -> its artist
    Artist,
    /// Artist -> its albums
    Albums,
    /// Song -> its album
    Album,
    /// Album -> its songs
    Songs,
    /// Song -> its album, with the album's artist
    AlbumArtist,
}

/// A row type the engine can query.
#[async_trait]
pub trait Record: for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin + 'static {
    /// Resource this row belongs to.
    const RESOURCE: Resource;

    /// Attach one relation to this record.
    async fn load(&mut self, relation: Relation, engine: &QueryEngine) -> Result<()>;
}

fn unsupported(resource: Resource, relation: Relation) -> Error {
    Error::MalformedQuery(format!("{resource:?} has no {relation:?} relation"))
}

#[async_trait]
impl Record for Artist {
    const RESOURCE: Resource = Resource::Artist;

    async fn load(&mut self, relation: Relation, engine: &QueryEngine) -> Result<()> {
        match relation {
            Relation::Albums => {
                let albums = engine
                    .list_by_exact_field::<Album>(Field::AlbumArtistId, self.id)
                    .await?;
                self.albums = Some(albums);
                Ok(())
            }
            other => Err(unsupported(Self::RESOURCE, other)),
        }
    }
}

#[async_trait]
impl Record for Album {
    const RESOURCE: Resource = Resource::Album;

    async fn load(&mut self, relation: Relation, engine: &QueryEngine) -> Result<()> {
        match relation {
            Relation::Artist => {
                self.artist = engine.get_by_id::<Artist>(self.artist_id, &[]).await?;
                Ok(())
            }
            Relation::Songs => {
                let songs = engine
                    .list_by_exact_field::<Song>(Field::SongAlbumId, self.id)
                    .await?;
                self.songs = Some(songs);
                Ok(())
            }
            other => Err(unsupported(Self::RESOURCE, other)),
        }
    }
}

#[async_trait]
impl Record for Song {
    const RESOURCE: Resource = Resource::Song;

    async fn load(&mut self, relation: Relation, engine: &QueryEngine) -> Result<()> {
        match relation {
            Relation::Album => {
                self.album = engine.get_by_id::<Album>(self.album_id, &[]).await?;
                Ok(())
            }
            Relation::AlbumArtist => {
                self.album = engine
                    .get_by_id::<Album>(self.album_id, &[Relation::Artist])
                    .await?;
                Ok(())
            }
            other => Err(unsupported(Self::RESOURCE, other)),
        }
    }
}

/// Read-only query access to the catalog.
#[derive(Clone)]
pub struct QueryEngine {
    pool: SqlitePool,
}

impl QueryEngine {
    /// Engine over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        QueryEngine { pool }
    }

    /// One page of `R` in identity order. Pages past the end are empty.
    pub async fn list<R: Record>(
        &self,
        request: PageRequest,
        relations: &[Relation],
    ) -> Result<Page<R>> {
        let count_query = format!("SELECT COUNT(*) FROM {};", R::RESOURCE.table());
        let (total,): (i64,) = sqlx::query_as(&count_query)
            .fetch_one(&self.pool)
            .await?;

        let query = format!(
            "SELECT * FROM {} ORDER BY id ASC LIMIT ?1 OFFSET ?2;",
            R::RESOURCE.table()
        );
        let mut records = sqlx::query_as::<_, R>(&query)
            .bind(request.limit())
            .bind(request.offset())
            .fetch_all(&self.pool)
            .await?;
        self.load_relations(&mut records, relations).await?;

        debug!(
            "Listed {:?} page {} ({} of {total})",
            R::RESOURCE,
            request.page,
            records.len()
        );
        Ok(Page::new(
            records,
            u64::try_from(total).unwrap_or_default(),
            request,
        ))
    }

    /// Single record by identity, `None` when absent.
    pub async fn get_by_id<R: Record>(
        &self,
        id: i64,
        relations: &[Relation],
    ) -> Result<Option<R>> {
        let query = format!("SELECT * FROM {} WHERE id = ?1;", R::RESOURCE.table());
        let record = sqlx::query_as::<_, R>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match record {
            Some(mut record) => {
                for relation in relations {
                    record.load(*relation, self).await?;
                }
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// All records satisfying every predicate, in identity order.
    pub async fn filter<R: Record>(
        &self,
        predicates: &[Predicate],
        relations: &[Relation],
    ) -> Result<Vec<R>> {
        let mut builder = select_matching(R::RESOURCE, predicates)?;
        builder.push(" ORDER BY t0.id ASC");

        let mut records = builder
            .build_query_as::<R>()
            .fetch_all(&self.pool)
            .await?;
        self.load_relations(&mut records, relations).await?;

        debug!("Filtered {:?}: {} match(es)", R::RESOURCE, records.len());
        Ok(records)
    }

    /// Lowest-identity record satisfying every predicate.
    pub async fn first<R: Record>(&self, predicates: &[Predicate]) -> Result<Option<R>> {
        let mut builder = select_matching(R::RESOURCE, predicates)?;
        builder.push(" ORDER BY t0.id ASC LIMIT 1");

        let record = builder
            .build_query_as::<R>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Categorical lookup: every record whose `field` equals `value`.
    pub async fn list_by_exact_field<R: Record>(
        &self,
        field: Field,
        value: impl Into<Value> + Send,
    ) -> Result<Vec<R>> {
        self.filter::<R>(&[Predicate::exact(field, value)], &[]).await
    }

    async fn load_relations<R: Record>(
        &self,
        records: &mut [R],
        relations: &[Relation],
    ) -> Result<()> {
        // Relations in order, records concurrently
        for relation in relations {
            try_join_all(records.iter_mut().map(|record| record.load(*relation, self))).await?;
        }
        Ok(())
    }
}

fn select_matching(
    resource: Resource,
    predicates: &[Predicate],
) -> Result<QueryBuilder<'static, Sqlite>> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT t0.* FROM {} t0 WHERE ",
        resource.table()
    ));
    push_predicate(&mut builder, resource, &Predicate::All(predicates.to_vec()))?;
    Ok(builder)
}

fn push_predicate(
    builder: &mut QueryBuilder<'static, Sqlite>,
    root: Resource,
    predicate: &Predicate,
) -> Result<()> {
    match predicate {
        Predicate::All(children) if children.is_empty() => {
            builder.push("1 = 1");
        }
        Predicate::All(children) => {
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    builder.push(" AND ");
                }
                builder.push("(");
                push_predicate(builder, root, child)?;
                builder.push(")");
            }
        }
        Predicate::Match { field, kind, value } => {
            let path = root.path_to(field.resource()).ok_or_else(|| {
                Error::MalformedQuery(format!("{field:?} is not reachable from {root:?}"))
            })?;
            check_operand(*field, *kind, value)?;

            // t0 is the queried row, tN the Nth ancestor along the chain
            for (depth, (ancestor, foreign_key)) in path.iter().enumerate() {
                builder.push(format!(
                    "EXISTS (SELECT 1 FROM {table} t{inner} WHERE t{inner}.id = t{depth}.{foreign_key} AND ",
                    table = ancestor.table(),
                    inner = depth + 1,
                ));
            }
            let column = format!("t{}.{}", path.len(), field.column());
            match (kind, value) {
                (MatchKind::Exact, Value::Text(text)) => {
                    builder.push(format!("{column} = ")).push_bind(text.clone());
                }
                (MatchKind::Exact, Value::Integer(number)) => {
                    builder.push(format!("{column} = ")).push_bind(*number);
                }
                (MatchKind::Contains, Value::Text(text)) => {
                    builder
                        .push(format!("{column} LIKE "))
                        .push_bind(like_pattern(text))
                        .push(" ESCAPE '\\'");
                }
                (MatchKind::Contains, Value::Integer(_)) => {
                    return Err(Error::MalformedQuery(format!(
                        "substring match needs a text operand for {field:?}"
                    )));
                }
            }
            for _ in &path {
                builder.push(")");
            }
        }
    }
    Ok(())
}

fn check_operand(field: Field, kind: MatchKind, value: &Value) -> Result<()> {
    if kind == MatchKind::Contains && field.field_type() != FieldType::Text {
        return Err(Error::MalformedQuery(format!(
            "substring match on non-text field {field:?}"
        )));
    }
    if value.field_type() != field.field_type() {
        return Err(Error::MalformedQuery(format!(
            "{field:?} expects a {:?} operand",
            field.field_type()
        )));
    }
    Ok(())
}

/// `%needle%` with LIKE wildcards in the needle escaped by `\`.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
