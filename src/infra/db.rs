//! Postgres-backed [`ReadStore`].
//!
//! Expected schema: `topics (id, title, slug, created_at, is_censored,
//! is_banned)`, `topic_categories (topic_id, category_id)`, `entries (id,
//! topic_id, author_id, created_at, vote_rate, is_draft)`, `authors (id,
//! username, slug, is_novice, is_active)`, `categories (id, name, slug,
//! weight, is_pseudo)`, `favorites (author_id, entry_id, created_at)` and
//! `wishes (topic_id, author_id, created_at)`. All instants are
//! `timestamptz`; civil-day comparisons convert through the engine's
//! configured timezone.

use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::application::repos::{
    CategoryScope, EntryOrder, EntryQuery, EntryTitle, EntryWindow, NoviceScope, ReadStore,
    StoreError, TopicOrder, TopicQuery, WishScope,
};
use crate::domain::entities::{AuthorRecord, CategoryRecord};
use crate::domain::rows::Row;

#[derive(Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
    timezone: Tz,
}

#[derive(sqlx::FromRow)]
struct TopicRowDb {
    title: String,
    slug: String,
    count: i64,
}

#[derive(sqlx::FromRow)]
struct EntryRowDb {
    title: String,
    entry_id: i64,
}

#[derive(sqlx::FromRow)]
struct CategoryRowDb {
    id: i64,
    name: String,
    slug: String,
    weight: i32,
    is_pseudo: bool,
}

#[derive(sqlx::FromRow)]
struct AuthorRowDb {
    id: i64,
    username: String,
    slug: String,
    is_novice: bool,
    is_active: bool,
}

impl PostgresStore {
    pub fn new(pool: PgPool, timezone: Tz) -> Self {
        Self {
            pool: Arc::new(pool),
            timezone,
        }
    }

    pub async fn connect(url: &str, max_connections: u32, timezone: Tz) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool, timezone))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Push the window predicate for the given timestamp column.
    fn apply_window(&self, qb: &mut QueryBuilder<'_, Postgres>, column: &str, window: EntryWindow) {
        match window {
            EntryWindow::Since(start) => {
                qb.push(format!(" AND {column} >= "));
                qb.push_bind(start);
            }
            EntryWindow::OnDate { year, month, day } => {
                qb.push(" AND timezone(");
                qb.push_bind(self.timezone.name().to_owned());
                qb.push(format!(", {column})::date = make_date("));
                qb.push_bind(year);
                qb.push(", ");
                qb.push_bind(i32::from(month));
                qb.push(", ");
                qb.push_bind(i32::from(day));
                qb.push(")");
            }
        }
    }

    fn apply_category_scope(qb: &mut QueryBuilder<'_, Postgres>, scope: &CategoryScope) {
        const NONE: &str =
            " NOT EXISTS (SELECT 1 FROM topic_categories tc WHERE tc.topic_id = t.id)";
        match scope {
            CategoryScope::Any => {}
            CategoryScope::Uncategorized => {
                qb.push(" AND");
                qb.push(NONE);
            }
            CategoryScope::In(ids) => {
                qb.push(
                    " AND EXISTS (SELECT 1 FROM topic_categories tc \
                     WHERE tc.topic_id = t.id AND tc.category_id = ANY(",
                );
                qb.push_bind(ids.clone());
                qb.push("))");
            }
            CategoryScope::InOrUncategorized(ids) => {
                qb.push(" AND (");
                qb.push(NONE);
                qb.push(
                    " OR EXISTS (SELECT 1 FROM topic_categories tc \
                     WHERE tc.topic_id = t.id AND tc.category_id = ANY(",
                );
                qb.push_bind(ids.clone());
                qb.push(")))");
            }
            CategoryScope::Only(id) => {
                qb.push(
                    " AND EXISTS (SELECT 1 FROM topic_categories tc \
                     WHERE tc.topic_id = t.id AND tc.category_id = ",
                );
                qb.push_bind(*id);
                qb.push(")");
            }
        }
    }

    /// Push the qualifying-entry predicate for the given entry/author
    /// aliases: published, active author, the query's novice rule, no
    /// excluded author, inside the window. Applied to the main join and to
    /// every EXISTS probe so both agree on what counts as an entry.
    fn push_qualifying_entry(
        &self,
        qb: &mut QueryBuilder<'static, Postgres>,
        entry: &str,
        author: &str,
        query: &TopicQuery,
    ) {
        qb.push(format!(
            " AND {entry}.is_draft = FALSE AND {author}.is_active = TRUE"
        ));
        match query.novices {
            NoviceScope::Exclude => {
                qb.push(format!(" AND {author}.is_novice = FALSE"));
            }
            NoviceScope::Only => {
                qb.push(format!(" AND {author}.is_novice = TRUE"));
            }
            NoviceScope::Any => {}
        }
        if !query.exclude_authors.is_empty() {
            qb.push(format!(" AND NOT ({entry}.author_id = ANY("));
            qb.push_bind(query.exclude_authors.clone());
            qb.push("))");
        }
        if let Some(window) = query.window {
            self.apply_window(qb, &format!("{entry}.created_at"), window);
        }
    }

    fn topics_query(&self, query: &TopicQuery) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(
            "SELECT t.title, t.slug, COUNT(*) AS count, MAX(e.created_at) AS latest \
             FROM topics t \
             JOIN entries e ON e.topic_id = t.id \
             JOIN authors a ON a.id = e.author_id \
             WHERE t.is_censored = FALSE AND t.is_banned = FALSE",
        );
        self.push_qualifying_entry(&mut qb, "e", "a", query);
        Self::apply_category_scope(&mut qb, &query.categories);
        if let Some(needle) = &query.title_contains {
            qb.push(" AND t.title ILIKE ");
            qb.push_bind(format!("%{needle}%"));
        }
        if let Some(from) = query.created_from {
            qb.push(" AND t.created_at >= ");
            qb.push_bind(from);
        }
        if let Some(to) = query.created_to {
            qb.push(" AND t.created_at <= ");
            qb.push_bind(to);
        }
        if let Some(username) = &query.author_username {
            qb.push(
                " AND EXISTS (SELECT 1 FROM entries e2 JOIN authors a2 ON a2.id = e2.author_id \
                 WHERE e2.topic_id = t.id AND lower(a2.username) = lower(",
            );
            qb.push_bind(username.clone());
            qb.push(")");
            self.push_qualifying_entry(&mut qb, "e2", "a2", query);
            qb.push(")");
        }
        if let Some(author_id) = query.favorited_by {
            qb.push(
                " AND EXISTS (SELECT 1 FROM favorites f \
                 JOIN entries e3 ON e3.id = f.entry_id \
                 JOIN authors a3 ON a3.id = e3.author_id \
                 WHERE e3.topic_id = t.id AND f.author_id = ",
            );
            qb.push_bind(author_id);
            self.push_qualifying_entry(&mut qb, "e3", "a3", query);
            qb.push(")");
        }
        if let Some(threshold) = query.min_entry_vote_rate {
            qb.push(
                " AND EXISTS (SELECT 1 FROM entries e4 JOIN authors a4 ON a4.id = e4.author_id \
                 WHERE e4.topic_id = t.id AND e4.vote_rate >= ",
            );
            qb.push_bind(threshold);
            self.push_qualifying_entry(&mut qb, "e4", "a4", query);
            qb.push(")");
        }

        qb.push(" GROUP BY t.id, t.title, t.slug, t.created_at");
        qb.push(match query.order {
            TopicOrder::LatestEntry => " ORDER BY latest DESC",
            TopicOrder::WindowCount => " ORDER BY count DESC",
            TopicOrder::WindowCountThenLatest | TopicOrder::WishCountThenRecent => {
                " ORDER BY count DESC, latest DESC"
            }
            TopicOrder::Title => " ORDER BY t.title ASC",
            TopicOrder::CreatedAt => " ORDER BY t.created_at DESC",
            TopicOrder::CountThenCreatedAt => " ORDER BY count DESC, t.created_at DESC",
        });
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(limit as i64);
        }
        qb
    }

    async fn wished_topics(&self, query: &TopicQuery, scope: &WishScope) -> Result<Vec<Row>, StoreError> {
        let mut qb = QueryBuilder::new(
            "SELECT t.title, t.slug, COUNT(*) AS count, MAX(w.created_at) AS latest \
             FROM topics t JOIN wishes w ON w.topic_id = t.id \
             WHERE t.is_censored = FALSE AND t.is_banned = FALSE",
        );
        match scope {
            WishScope::Anyone { exclude_authors } => {
                if !exclude_authors.is_empty() {
                    qb.push(" AND NOT (w.author_id = ANY(");
                    qb.push_bind(exclude_authors.clone());
                    qb.push("))");
                }
            }
            WishScope::By(author) => {
                qb.push(" AND w.author_id = ");
                qb.push_bind(*author);
            }
        }
        qb.push(" GROUP BY t.id, t.title, t.slug ORDER BY count DESC, latest DESC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(limit as i64);
        }

        let rows = qb
            .build_query_as::<TopicRowDb>()
            .fetch_all(self.pool())
            .await
            .map_err(StoreError::from_persistence)?;
        Ok(rows
            .into_iter()
            .map(|r| Row::topic(r.title, r.slug, r.count))
            .collect())
    }
}

#[async_trait]
impl ReadStore for PostgresStore {
    async fn topics_matching(&self, query: &TopicQuery) -> Result<Vec<Row>, StoreError> {
        if let Some(scope) = &query.wished {
            return self.wished_topics(query, scope).await;
        }

        let mut qb = self.topics_query(query);
        let rows = qb
            .build_query_as::<TopicRowDb>()
            .fetch_all(self.pool())
            .await
            .map_err(StoreError::from_persistence)?;
        Ok(rows
            .into_iter()
            .map(|r| Row::topic(r.title, r.slug, r.count))
            .collect())
    }

    async fn entries_matching(&self, query: &EntryQuery) -> Result<Vec<Row>, StoreError> {
        let title_expr = match query.title {
            EntryTitle::Plain => "t.title",
            EntryTitle::WithAuthor => "t.title || ' (@' || a.username || ')'",
            EntryTitle::WithEntryId => "t.title || ' (#' || e.id::text || ')'",
        };
        let mut qb = QueryBuilder::new(format!("SELECT {title_expr} AS title, e.id AS entry_id"));
        let favorites = query.favorited_by.as_ref();
        if favorites.is_some() {
            qb.push(", MAX(f.created_at) AS fav_at");
        }
        qb.push(
            " FROM entries e \
             JOIN topics t ON t.id = e.topic_id \
             JOIN authors a ON a.id = e.author_id",
        );
        if let Some(authors) = favorites {
            qb.push(" JOIN favorites f ON f.entry_id = e.id AND f.author_id = ANY(");
            qb.push_bind(authors.clone());
            qb.push(")");
        }
        qb.push(" WHERE t.is_censored = FALSE AND t.is_banned = FALSE");

        match query.include_drafts_of {
            Some(owner) => {
                qb.push(" AND e.is_draft = TRUE AND e.author_id = ");
                qb.push_bind(owner);
            }
            None => {
                qb.push(" AND e.is_draft = FALSE AND a.is_active = TRUE AND a.is_novice = FALSE");
            }
        }
        if let Some(authors) = &query.authored_by {
            qb.push(" AND e.author_id = ANY(");
            qb.push_bind(authors.clone());
            qb.push(")");
        }
        if let Some(window) = query.window {
            // Favorite-driven listings window on the favorite instant.
            let column = if favorites.is_some() {
                "f.created_at"
            } else {
                "e.created_at"
            };
            self.apply_window(&mut qb, column, window);
        }
        if favorites.is_some() {
            qb.push(" GROUP BY e.id, t.title, a.username");
        }
        qb.push(match query.order {
            EntryOrder::CreatedAtDesc => " ORDER BY e.created_at DESC",
            EntryOrder::VoteRateDesc => " ORDER BY e.vote_rate DESC",
            EntryOrder::FavoritedAtDesc => " ORDER BY fav_at DESC",
        });
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(limit as i64);
        }

        let rows = qb
            .build_query_as::<EntryRowDb>()
            .fetch_all(self.pool())
            .await
            .map_err(StoreError::from_persistence)?;
        Ok(rows
            .into_iter()
            .map(|r| Row::entry(r.title, r.entry_id))
            .collect())
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<CategoryRecord>, StoreError> {
        let row = sqlx::query_as::<_, CategoryRowDb>(
            "SELECT id, name, slug, weight, is_pseudo FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(StoreError::from_persistence)?;
        Ok(row.map(|r| CategoryRecord {
            id: r.id,
            name: r.name,
            slug: r.slug,
            weight: r.weight,
            is_pseudo: r.is_pseudo,
        }))
    }

    async fn author_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AuthorRecord>, StoreError> {
        let row = sqlx::query_as::<_, AuthorRowDb>(
            "SELECT id, username, slug, is_novice, is_active \
             FROM authors WHERE lower(username) = lower($1)",
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await
        .map_err(StoreError::from_persistence)?;
        Ok(row.map(|r| AuthorRecord {
            id: r.id,
            username: r.username,
            slug: r.slug,
            is_novice: r.is_novice,
            is_active: r.is_active,
        }))
    }

    async fn count_entries_since(&self, at: OffsetDateTime) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM entries e \
             JOIN topics t ON t.id = e.topic_id \
             JOIN authors a ON a.id = e.author_id \
             WHERE e.is_draft = FALSE AND a.is_active = TRUE AND a.is_novice = FALSE \
               AND t.is_censored = FALSE AND t.is_banned = FALSE \
               AND e.created_at >= $1",
        )
        .bind(at)
        .fetch_one(self.pool())
        .await
        .map_err(StoreError::from_persistence)?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // connect_lazy never touches the network, so the SQL shape can be
    // checked without a database.
    fn store() -> PostgresStore {
        let pool = PgPool::connect_lazy("postgres://localhost/unused").expect("lazy pool");
        PostgresStore::new(pool, Tz::UTC)
    }

    #[tokio::test]
    async fn search_probes_require_qualifying_entries() {
        let store = store();
        let query = TopicQuery {
            author_username: Some("ferris".to_owned()),
            favorited_by: Some(7),
            min_entry_vote_rate: Some(489.0),
            ..TopicQuery::default()
        };
        let mut qb = store.topics_query(&query);
        let sql = qb.sql();

        // The author-nick, favorites and vote-rate probes all apply the
        // same published/active/novice predicate as the main join.
        for author_alias in ["a", "a2", "a3", "a4"] {
            assert!(
                sql.contains(&format!("{author_alias}.is_active = TRUE")),
                "missing is_active for {author_alias}: {sql}"
            );
            assert!(
                sql.contains(&format!("{author_alias}.is_novice = FALSE")),
                "missing novice rule for {author_alias}: {sql}"
            );
        }
        for entry_alias in ["e", "e2", "e3", "e4"] {
            assert!(
                sql.contains(&format!("{entry_alias}.is_draft = FALSE")),
                "missing draft rule for {entry_alias}: {sql}"
            );
        }
    }

    #[tokio::test]
    async fn novice_scope_flows_into_the_probes() {
        let store = store();
        let query = TopicQuery {
            novices: NoviceScope::Any,
            author_username: Some("newbie".to_owned()),
            ..TopicQuery::default()
        };
        let mut qb = store.topics_query(&query);
        let sql = qb.sql();
        assert!(!sql.contains("is_novice"), "novice-neutral query: {sql}");
        assert!(sql.contains("a2.is_active = TRUE"));
    }
}
