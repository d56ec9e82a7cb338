//! In-memory [`ReadStore`] over fixture records.
//!
//! Interprets the declarative queries the same way the Postgres adapter
//! does, so engine behavior can be tested without a database. Not intended
//! for production-sized datasets; every query is a full scan.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono_tz::Tz;
use time::OffsetDateTime;

use crate::application::repos::{
    CategoryScope, EntryOrder, EntryQuery, EntryTitle, EntryWindow, NoviceScope, ReadStore,
    StoreError, TopicOrder, TopicQuery, WishScope,
};
use crate::cache::lock::{rw_read, rw_write};
use crate::domain::entities::{
    AuthorRecord, CategoryRecord, EntryRecord, FavoriteRecord, TopicRecord, WishRecord,
};
use crate::domain::rows::Row;
use crate::domain::viewer::AuthorId;
use crate::infra::clock::civil_date;

#[derive(Debug, Default)]
struct State {
    topics: HashMap<i64, TopicRecord>,
    entries: Vec<EntryRecord>,
    authors: HashMap<AuthorId, AuthorRecord>,
    categories: Vec<CategoryRecord>,
    favorites: Vec<FavoriteRecord>,
    wishes: Vec<WishRecord>,
}

/// Fixture-backed store. Records are pushed in by tests; reads take a
/// shared lock so the store can sit behind an `Arc` like the real adapter.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<State>,
    timezone: Tz,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_timezone(Tz::UTC)
    }

    /// The timezone used to interpret `OnDate` windows, matching the
    /// engine's configured one.
    pub fn with_timezone(timezone: Tz) -> Self {
        Self {
            state: RwLock::new(State::default()),
            timezone,
        }
    }

    pub fn push_topic(&self, topic: TopicRecord) {
        rw_write(&self.state, "push_topic")
            .topics
            .insert(topic.id, topic);
    }

    pub fn push_entry(&self, entry: EntryRecord) {
        rw_write(&self.state, "push_entry")
            .entries
            .push(entry);
    }

    pub fn push_author(&self, author: AuthorRecord) {
        rw_write(&self.state, "push_author")
            .authors
            .insert(author.id, author);
    }

    pub fn push_category(&self, category: CategoryRecord) {
        rw_write(&self.state, "push_category")
            .categories
            .push(category);
    }

    pub fn push_favorite(&self, favorite: FavoriteRecord) {
        rw_write(&self.state, "push_favorite")
            .favorites
            .push(favorite);
    }

    pub fn push_wish(&self, wish: WishRecord) {
        rw_write(&self.state, "push_wish")
            .wishes
            .push(wish);
    }

    fn in_window(&self, at: OffsetDateTime, window: Option<EntryWindow>) -> bool {
        match window {
            None => true,
            Some(EntryWindow::Since(start)) => at >= start,
            Some(EntryWindow::OnDate { year, month, day }) => {
                civil_date(at, self.timezone) == Some((year, month, day))
            }
        }
    }
}

fn in_category(topic: &TopicRecord, scope: &CategoryScope) -> bool {
    match scope {
        CategoryScope::Any => true,
        CategoryScope::Uncategorized => topic.category_ids.is_empty(),
        CategoryScope::In(ids) => topic.category_ids.iter().any(|id| ids.contains(id)),
        CategoryScope::InOrUncategorized(ids) => {
            topic.category_ids.is_empty() || topic.category_ids.iter().any(|id| ids.contains(id))
        }
        CategoryScope::Only(id) => topic.category_ids.contains(id),
    }
}

fn novice_allows(scope: NoviceScope, is_novice: bool) -> bool {
    match scope {
        NoviceScope::Exclude => !is_novice,
        NoviceScope::Only => is_novice,
        NoviceScope::Any => true,
    }
}

/// The candidate a topic query reduces each topic to before ordering.
struct TopicHit {
    title: String,
    slug: String,
    created_at: OffsetDateTime,
    count: i64,
    latest: OffsetDateTime,
}

#[async_trait]
impl ReadStore for MemoryStore {
    async fn topics_matching(&self, query: &TopicQuery) -> Result<Vec<Row>, StoreError> {
        let state = rw_read(&self.state, "topics_matching");

        let mut hits: Vec<TopicHit> = Vec::new();
        for topic in state.topics.values() {
            if topic.is_censored || topic.is_banned {
                continue;
            }
            if !in_category(topic, &query.categories) {
                continue;
            }
            if let Some(needle) = &query.title_contains {
                if !topic
                    .title
                    .to_lowercase()
                    .contains(&needle.to_lowercase())
                {
                    continue;
                }
            }
            if let Some(from) = query.created_from {
                if topic.created_at < from {
                    continue;
                }
            }
            if let Some(to) = query.created_to {
                if topic.created_at > to {
                    continue;
                }
            }

            // An entry qualifies when it is published, its author passes the
            // novice rule and is not excluded, and it falls in the window.
            let qualifying: Vec<&EntryRecord> = state
                .entries
                .iter()
                .filter(|e| {
                    e.topic_id == topic.id
                        && !e.is_draft
                        && !query.exclude_authors.contains(&e.author_id)
                        && state
                            .authors
                            .get(&e.author_id)
                            .is_some_and(|a| a.is_active && novice_allows(query.novices, a.is_novice))
                        && self.in_window(e.created_at, query.window)
                })
                .collect();

            if let Some(username) = &query.author_username {
                let by_author = qualifying.iter().any(|e| {
                    state
                        .authors
                        .get(&e.author_id)
                        .is_some_and(|a| a.username.eq_ignore_ascii_case(username))
                });
                if !by_author {
                    continue;
                }
            }
            if let Some(author_id) = query.favorited_by {
                let favorited = qualifying.iter().any(|e| {
                    state
                        .favorites
                        .iter()
                        .any(|f| f.entry_id == e.id && f.author_id == author_id)
                });
                if !favorited {
                    continue;
                }
            }
            if let Some(threshold) = query.min_entry_vote_rate {
                if !qualifying.iter().any(|e| e.vote_rate >= threshold) {
                    continue;
                }
            }

            let (count, latest) = match &query.wished {
                // Wished topics need no qualifying entry; the count and
                // recency come from the wishes themselves.
                Some(scope) => {
                    let wishes: Vec<&WishRecord> = state
                        .wishes
                        .iter()
                        .filter(|w| {
                            w.topic_id == topic.id
                                && match scope {
                                    WishScope::Anyone { exclude_authors } => {
                                        !exclude_authors.contains(&w.author_id)
                                    }
                                    WishScope::By(author) => w.author_id == *author,
                                }
                        })
                        .collect();
                    if wishes.is_empty() {
                        continue;
                    }
                    let latest = wishes.iter().map(|w| w.created_at).max().unwrap_or(topic.created_at);
                    (wishes.len() as i64, latest)
                }
                None => {
                    if qualifying.is_empty() {
                        continue;
                    }
                    let latest = qualifying
                        .iter()
                        .map(|e| e.created_at)
                        .max()
                        .unwrap_or(topic.created_at);
                    (qualifying.len() as i64, latest)
                }
            };

            hits.push(TopicHit {
                title: topic.title.clone(),
                slug: topic.slug.clone(),
                created_at: topic.created_at,
                count,
                latest,
            });
        }

        match query.order {
            TopicOrder::LatestEntry => hits.sort_by(|a, b| b.latest.cmp(&a.latest)),
            TopicOrder::WindowCount => hits.sort_by(|a, b| b.count.cmp(&a.count)),
            TopicOrder::WindowCountThenLatest | TopicOrder::WishCountThenRecent => {
                hits.sort_by(|a, b| b.count.cmp(&a.count).then(b.latest.cmp(&a.latest)));
            }
            TopicOrder::Title => hits.sort_by(|a, b| a.title.cmp(&b.title)),
            TopicOrder::CreatedAt => hits.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            TopicOrder::CountThenCreatedAt => {
                hits.sort_by(|a, b| b.count.cmp(&a.count).then(b.created_at.cmp(&a.created_at)));
            }
        }
        if let Some(limit) = query.limit {
            hits.truncate(limit);
        }

        Ok(hits
            .into_iter()
            .map(|h| Row::topic(h.title, h.slug, h.count))
            .collect())
    }

    async fn entries_matching(&self, query: &EntryQuery) -> Result<Vec<Row>, StoreError> {
        let state = rw_read(&self.state, "entries_matching");

        // (entry, ordering instant) pairs; the instant is the favorite time
        // when the query keys off favorites, the entry time otherwise.
        let mut hits: Vec<(&EntryRecord, OffsetDateTime)> = Vec::new();
        for entry in &state.entries {
            let topic_visible = state
                .topics
                .get(&entry.topic_id)
                .is_some_and(|t| !t.is_censored && !t.is_banned);
            if !topic_visible {
                continue;
            }

            match query.include_drafts_of {
                Some(owner) => {
                    if !entry.is_draft || entry.author_id != owner {
                        continue;
                    }
                }
                None => {
                    if entry.is_draft {
                        continue;
                    }
                    let author_ok = state
                        .authors
                        .get(&entry.author_id)
                        .is_some_and(|a| a.is_active && !a.is_novice);
                    if !author_ok {
                        continue;
                    }
                }
            }
            if let Some(authors) = &query.authored_by {
                if !authors.contains(&entry.author_id) {
                    continue;
                }
            }

            let at = match &query.favorited_by {
                Some(authors) => {
                    let latest_favorite = state
                        .favorites
                        .iter()
                        .filter(|f| f.entry_id == entry.id && authors.contains(&f.author_id))
                        .map(|f| f.created_at)
                        .max();
                    match latest_favorite {
                        Some(at) => at,
                        None => continue,
                    }
                }
                None => entry.created_at,
            };
            if !self.in_window(at, query.window) {
                continue;
            }
            hits.push((entry, at));
        }

        match query.order {
            EntryOrder::CreatedAtDesc | EntryOrder::FavoritedAtDesc => {
                hits.sort_by(|a, b| b.1.cmp(&a.1));
            }
            EntryOrder::VoteRateDesc => {
                hits.sort_by(|a, b| b.0.vote_rate.total_cmp(&a.0.vote_rate));
            }
        }
        if let Some(limit) = query.limit {
            hits.truncate(limit);
        }

        let rows = hits
            .into_iter()
            .map(|(entry, _)| {
                let topic_title = state
                    .topics
                    .get(&entry.topic_id)
                    .map(|t| t.title.clone())
                    .unwrap_or_default();
                let title = match query.title {
                    EntryTitle::Plain => topic_title,
                    EntryTitle::WithAuthor => {
                        let username = state
                            .authors
                            .get(&entry.author_id)
                            .map(|a| a.username.as_str())
                            .unwrap_or("?");
                        format!("{topic_title} (@{username})")
                    }
                    EntryTitle::WithEntryId => format!("{topic_title} (#{})", entry.id),
                };
                Row::entry(title, entry.id)
            })
            .collect();
        Ok(rows)
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<CategoryRecord>, StoreError> {
        let state = rw_read(&self.state, "category_by_slug");
        Ok(state.categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn author_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AuthorRecord>, StoreError> {
        let state = rw_read(&self.state, "author_by_username");
        Ok(state
            .authors
            .values()
            .find(|a| a.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn count_entries_since(&self, at: OffsetDateTime) -> Result<u64, StoreError> {
        let state = rw_read(&self.state, "count_entries_since");
        let count = state
            .entries
            .iter()
            .filter(|e| {
                !e.is_draft
                    && e.created_at >= at
                    && state
                        .authors
                        .get(&e.author_id)
                        .is_some_and(|a| a.is_active && !a.is_novice)
                    && state
                        .topics
                        .get(&e.topic_id)
                        .is_some_and(|t| !t.is_censored && !t.is_banned)
            })
            .count();
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn author(id: AuthorId, username: &str, is_novice: bool) -> AuthorRecord {
        AuthorRecord {
            id,
            username: username.to_owned(),
            slug: username.to_owned(),
            is_novice,
            is_active: true,
        }
    }

    fn topic(id: i64, title: &str, categories: Vec<i64>) -> TopicRecord {
        TopicRecord {
            id,
            title: title.to_owned(),
            slug: title.replace(' ', "-"),
            created_at: datetime!(2024-01-01 0:00 UTC),
            is_censored: false,
            is_banned: false,
            category_ids: categories,
        }
    }

    fn entry(id: i64, topic_id: i64, author_id: AuthorId, at: OffsetDateTime) -> EntryRecord {
        EntryRecord {
            id,
            topic_id,
            author_id,
            created_at: at,
            vote_rate: 0.0,
            is_draft: false,
        }
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.push_author(author(1, "ferris", false));
        store.push_author(author(2, "corro", false));
        store.push_author(author(3, "newbie", true));
        store.push_topic(topic(10, "ownership", vec![100]));
        store.push_topic(topic(11, "borrowing", vec![]));
        store.push_entry(entry(1000, 10, 1, datetime!(2024-06-15 08:00 UTC)));
        store.push_entry(entry(1001, 10, 2, datetime!(2024-06-15 09:00 UTC)));
        store.push_entry(entry(1002, 11, 3, datetime!(2024-06-15 09:30 UTC)));
        store
    }

    #[tokio::test]
    async fn topics_require_a_qualifying_entry() {
        let store = seeded();
        let query = TopicQuery {
            window: Some(EntryWindow::Since(datetime!(2024-06-15 00:00 UTC))),
            ..TopicQuery::default()
        };
        let rows = store.topics_matching(&query).await.expect("query runs");
        // "borrowing" only has a novice entry, which the base filter drops.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "ownership");
        assert_eq!(rows[0].count, Some(2));
    }

    #[tokio::test]
    async fn blocked_author_entries_never_qualify() {
        let store = seeded();
        let query = TopicQuery {
            window: Some(EntryWindow::Since(datetime!(2024-06-15 00:00 UTC))),
            exclude_authors: vec![1, 2],
            ..TopicQuery::default()
        };
        let rows = store.topics_matching(&query).await.expect("query runs");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn novice_scope_inverts_the_rule() {
        let store = seeded();
        let query = TopicQuery {
            window: Some(EntryWindow::Since(datetime!(2024-06-15 00:00 UTC))),
            novices: NoviceScope::Only,
            ..TopicQuery::default()
        };
        let rows = store.topics_matching(&query).await.expect("query runs");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "borrowing");
    }

    #[tokio::test]
    async fn on_date_window_matches_the_civil_day() {
        let store = seeded();
        store.push_entry(entry(1003, 11, 1, datetime!(2024-06-14 23:59 UTC)));
        let query = TopicQuery {
            window: Some(EntryWindow::OnDate {
                year: 2024,
                month: 6,
                day: 14,
            }),
            ..TopicQuery::default()
        };
        let rows = store.topics_matching(&query).await.expect("query runs");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "borrowing");
    }

    #[tokio::test]
    async fn entry_titles_follow_the_requested_format() {
        let store = seeded();
        let query = EntryQuery {
            authored_by: Some(vec![1]),
            title: EntryTitle::WithAuthor,
            ..EntryQuery::default()
        };
        let rows = store.entries_matching(&query).await.expect("query runs");
        assert_eq!(rows[0].title, "ownership (@ferris)");
        assert_eq!(rows[0].slug, "1000");

        let query = EntryQuery {
            authored_by: Some(vec![1]),
            title: EntryTitle::WithEntryId,
            ..EntryQuery::default()
        };
        let rows = store.entries_matching(&query).await.expect("query runs");
        assert_eq!(rows[0].title, "ownership (#1000)");
    }

    #[tokio::test]
    async fn favorites_key_off_the_favorite_time() {
        let store = seeded();
        store.push_favorite(FavoriteRecord {
            author_id: 2,
            entry_id: 1000,
            created_at: datetime!(2024-06-15 12:00 UTC),
        });
        let query = EntryQuery {
            window: Some(EntryWindow::Since(datetime!(2024-06-15 10:00 UTC))),
            favorited_by: Some(vec![2]),
            order: EntryOrder::FavoritedAtDesc,
            ..EntryQuery::default()
        };
        let rows = store.entries_matching(&query).await.expect("query runs");
        // The entry itself predates the window; the favorite does not.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "1000");
    }

    #[tokio::test]
    async fn wish_scopes_count_wishes_not_entries() {
        let store = seeded();
        store.push_topic(topic(12, "lifetimes", vec![]));
        store.push_wish(WishRecord {
            topic_id: 12,
            author_id: 1,
            created_at: datetime!(2024-06-15 11:00 UTC),
        });
        store.push_wish(WishRecord {
            topic_id: 12,
            author_id: 2,
            created_at: datetime!(2024-06-15 11:30 UTC),
        });
        let query = TopicQuery {
            wished: Some(WishScope::Anyone {
                exclude_authors: vec![],
            }),
            novices: NoviceScope::Any,
            order: TopicOrder::WishCountThenRecent,
            ..TopicQuery::default()
        };
        let rows = store.topics_matching(&query).await.expect("query runs");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "lifetimes");
        assert_eq!(rows[0].count, Some(2));

        let query = TopicQuery {
            wished: Some(WishScope::By(99)),
            novices: NoviceScope::Any,
            ..TopicQuery::default()
        };
        let rows = store.topics_matching(&query).await.expect("query runs");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn drafts_list_only_the_owner() {
        let store = seeded();
        store.push_entry(EntryRecord {
            id: 1004,
            topic_id: 10,
            author_id: 1,
            created_at: datetime!(2024-06-15 10:00 UTC),
            vote_rate: 0.0,
            is_draft: true,
        });
        let query = EntryQuery {
            include_drafts_of: Some(1),
            ..EntryQuery::default()
        };
        let rows = store.entries_matching(&query).await.expect("query runs");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "1004");

        let query = EntryQuery {
            include_drafts_of: Some(2),
            ..EntryQuery::default()
        };
        assert!(store.entries_matching(&query).await.expect("query runs").is_empty());
    }

    #[tokio::test]
    async fn count_entries_since_skips_drafts_and_novices() {
        let store = seeded();
        assert_eq!(
            store
                .count_entries_since(datetime!(2024-06-15 00:00 UTC))
                .await
                .expect("count runs"),
            2
        );
        assert_eq!(
            store
                .count_entries_since(datetime!(2024-06-15 08:30 UTC))
                .await
                .expect("count runs"),
            1
        );
    }
}
