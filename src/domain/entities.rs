//! Read-only entity records mirrored from persistent storage.
//!
//! The engine never writes these; storage adapters read them and reduce
//! them to [`crate::domain::rows::Row`] streams.

use time::OffsetDateTime;

use crate::domain::viewer::{AuthorId, CategoryId};

#[derive(Debug, Clone, PartialEq)]
pub struct TopicRecord {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub created_at: OffsetDateTime,
    pub is_censored: bool,
    pub is_banned: bool,
    pub category_ids: Vec<CategoryId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryRecord {
    pub id: i64,
    pub topic_id: i64,
    pub author_id: AuthorId,
    pub created_at: OffsetDateTime,
    pub vote_rate: f64,
    pub is_draft: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorRecord {
    pub id: AuthorId,
    pub username: String,
    pub slug: String,
    pub is_novice: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub weight: i32,
    pub is_pseudo: bool,
}

/// A favorite mark an author put on an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteRecord {
    pub author_id: AuthorId,
    pub entry_id: i64,
    pub created_at: OffsetDateTime,
}

/// A wish: an author asking for entries on a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct WishRecord {
    pub topic_id: i64,
    pub author_id: AuthorId,
    pub created_at: OffsetDateTime,
}
