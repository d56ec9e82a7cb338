//! Read-only storage traits describing the persistence seam.
//!
//! The engine never issues SQL itself; it assembles a declarative
//! [`TopicQuery`] or [`EntryQuery`] and hands it to a [`ReadStore`]
//! adapter. Two adapters ship with the crate: a Postgres one
//! (`infra::db`) and an in-memory one (`infra::memory`).

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{AuthorRecord, CategoryRecord};
use crate::domain::rows::Row;
use crate::domain::viewer::{AuthorId, CategoryId};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Opaque upstream read failure. The engine surfaces this as
    /// `EngineError::Unavailable` without partial rendering.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl StoreError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Time constraint on qualifying entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryWindow {
    /// Entries created at or after the instant (the rolling daily window).
    Since(OffsetDateTime),
    /// Entries created on the given civil date (debe's "yesterday",
    /// on-this-day's month/day match).
    OnDate { year: i32, month: u8, day: u8 },
}

/// Which categories a topic may belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryScope {
    /// No category constraint.
    Any,
    /// Topics with no category at all.
    Uncategorized,
    /// Topics in one of the given categories.
    In(Vec<CategoryId>),
    /// Topics in one of the given categories, or with no category.
    InOrUncategorized(Vec<CategoryId>),
    /// Topics in exactly this category (the generic database slug).
    Only(CategoryId),
}

/// Novice filter applied to the authors of qualifying entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoviceScope {
    /// The base filter: only non-novice authors qualify.
    Exclude,
    /// The novices list: only novice authors qualify.
    Only,
    /// No novice constraint (advanced search over whole topics).
    Any,
}

/// Wish constraint for the wishlist views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WishScope {
    /// Topics wished by anyone, ignoring wishes from the given authors.
    Anyone { exclude_authors: Vec<AuthorId> },
    /// Topics the given author has wished.
    By(AuthorId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicOrder {
    /// Latest qualifying entry timestamp, descending.
    LatestEntry,
    /// Qualifying-entry count descending (on-this-day).
    WindowCount,
    /// Count descending, then latest activity (agenda).
    WindowCountThenLatest,
    /// Wish count descending, then most recent wish (wishlist).
    WishCountThenRecent,
    /// Title ascending (search `alpha`).
    Title,
    /// Topic creation time descending (search `newer`).
    CreatedAt,
    /// Entry count descending, then creation time (search `popular`).
    CountThenCreatedAt,
}

/// Declarative topic listing. Adapters must always apply the base filter:
/// qualifying entries are non-draft, their topic not censored, and the
/// novice rule of `novices`; entries by `exclude_authors` never qualify.
/// Topics without at least one qualifying entry are absent from the result.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicQuery {
    pub window: Option<EntryWindow>,
    pub categories: CategoryScope,
    pub novices: NoviceScope,
    pub exclude_authors: Vec<AuthorId>,
    pub wished: Option<WishScope>,
    /// Case-insensitive substring match on the topic title.
    pub title_contains: Option<String>,
    /// Topic must have a qualifying entry by this username.
    pub author_username: Option<String>,
    /// Topic must have an entry favorited by this author.
    pub favorited_by: Option<AuthorId>,
    /// Topic must have an entry with a vote rate at or above this.
    pub min_entry_vote_rate: Option<f64>,
    /// Topic creation time range (advanced search).
    pub created_from: Option<OffsetDateTime>,
    pub created_to: Option<OffsetDateTime>,
    pub order: TopicOrder,
    pub limit: Option<usize>,
}

impl Default for TopicQuery {
    fn default() -> Self {
        Self {
            window: None,
            categories: CategoryScope::Any,
            novices: NoviceScope::Exclude,
            exclude_authors: Vec::new(),
            wished: None,
            title_contains: None,
            author_username: None,
            favorited_by: None,
            min_entry_vote_rate: None,
            created_from: None,
            created_to: None,
            order: TopicOrder::LatestEntry,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrder {
    CreatedAtDesc,
    VoteRateDesc,
    /// Most recent favorite time, descending (followed favorites).
    FavoritedAtDesc,
}

/// How adapters compose the `title` field of entry rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryTitle {
    /// The topic title as-is.
    Plain,
    /// `"{topic.title} (@{author.username})"`.
    WithAuthor,
    /// `"{topic.title} (#{entry.id})"`.
    WithEntryId,
}

/// Declarative entry listing. Unless `include_drafts_of` is set, adapters
/// only consider published (non-draft, non-novice-author) entries of
/// non-censored topics.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryQuery {
    pub window: Option<EntryWindow>,
    /// Restrict to entries authored by these authors.
    pub authored_by: Option<Vec<AuthorId>>,
    /// Restrict to entries favorited by these authors (within the window
    /// when one is set; ordering keys off the favorite time).
    pub favorited_by: Option<Vec<AuthorId>>,
    /// List this author's drafts instead of published entries.
    pub include_drafts_of: Option<AuthorId>,
    pub order: EntryOrder,
    pub title: EntryTitle,
    pub limit: Option<usize>,
}

impl Default for EntryQuery {
    fn default() -> Self {
        Self {
            window: None,
            authored_by: None,
            favorited_by: None,
            include_drafts_of: None,
            order: EntryOrder::CreatedAtDesc,
            title: EntryTitle::Plain,
            limit: None,
        }
    }
}

/// Read interface over stored entities. Adapters interpret the declarative
/// queries; errors are opaque and never partially rendered.
#[async_trait]
pub trait ReadStore: Send + Sync {
    async fn topics_matching(&self, query: &TopicQuery) -> Result<Vec<Row>, StoreError>;

    async fn entries_matching(&self, query: &EntryQuery) -> Result<Vec<Row>, StoreError>;

    async fn category_by_slug(&self, slug: &str) -> Result<Option<CategoryRecord>, StoreError>;

    async fn author_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AuthorRecord>, StoreError>;

    /// Number of published entries created at or after the instant. Drives
    /// the `today` refresh indicator; a bounded count, not a list.
    async fn count_entries_since(&self, at: OffsetDateTime) -> Result<u64, StoreError>;
}
