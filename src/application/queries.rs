//! Per-slug query construction.
//!
//! One constructor per virtual list, each producing a declarative
//! [`TopicQuery`] or [`EntryQuery`] for the storage adapters. The base
//! filter (published entries, non-novice authors, non-censored topics) is
//! part of the adapter contract; constructors only express what deviates
//! from it.

use time::OffsetDateTime;

use crate::application::repos::{
    CategoryScope, EntryOrder, EntryQuery, EntryTitle, EntryWindow, NoviceScope, TopicOrder,
    TopicQuery, WishScope,
};
use crate::application::registry::VirtualList;
use crate::application::search::{SearchKeys, SearchOrdering};
use crate::config::EngineConfig;
use crate::domain::viewer::{AuthorId, CategoryId, Viewer};
use crate::infra::clock::{civil_date, window_start};

/// What the engine hands to a storage adapter for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    Topics(TopicQuery),
    Entries(EntryQuery),
}

/// Validated request state the constructors read.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    pub viewer: &'a Viewer,
    pub year: Option<i32>,
    pub tab: Option<&'a str>,
    pub search: &'a SearchKeys,
    pub now: OffsetDateTime,
    pub config: &'a EngineConfig,
}

impl QueryContext<'_> {
    fn daily_window(&self) -> EntryWindow {
        EntryWindow::Since(window_start(self.now, self.config.daily_window_hours))
    }
}

/// Build the plan for a virtual list. `user-stats` is resolved by the
/// engine (it needs an author lookup first) and never reaches this
/// function.
pub fn plan_for(list: VirtualList, ctx: &QueryContext<'_>) -> QueryPlan {
    match list {
        VirtualList::Today => QueryPlan::Topics(today(ctx)),
        VirtualList::Agenda => QueryPlan::Topics(agenda(ctx)),
        VirtualList::Uncategorized => QueryPlan::Topics(uncategorized(ctx)),
        VirtualList::OnThisDay => QueryPlan::Topics(on_this_day(ctx)),
        VirtualList::Novices => QueryPlan::Topics(novices(ctx)),
        VirtualList::Wishlist => QueryPlan::Topics(wishlist(ctx)),
        VirtualList::Search => QueryPlan::Topics(advanced_search(ctx)),
        VirtualList::Debe => QueryPlan::Entries(debe(ctx)),
        VirtualList::Drafts => QueryPlan::Entries(drafts(ctx)),
        VirtualList::Follow => QueryPlan::Entries(follow(ctx)),
        VirtualList::UserStats => QueryPlan::Entries(user_stats_unresolved()),
    }
}

/// Topics with fresh activity inside the viewer's followed categories.
fn today(ctx: &QueryContext<'_>) -> TopicQuery {
    let followed = ctx.viewer.followed_categories.clone();
    let categories = if ctx.viewer.allow_uncategorized {
        CategoryScope::InOrUncategorized(followed)
    } else {
        CategoryScope::In(followed)
    };
    TopicQuery {
        window: Some(ctx.daily_window()),
        categories,
        exclude_authors: ctx.viewer.blocked.clone(),
        order: TopicOrder::LatestEntry,
        ..TopicQuery::default()
    }
}

/// Site-wide view of the rolling window, busiest topics first.
fn agenda(ctx: &QueryContext<'_>) -> TopicQuery {
    TopicQuery {
        window: Some(ctx.daily_window()),
        order: TopicOrder::WindowCountThenLatest,
        ..TopicQuery::default()
    }
}

/// Like today, but only topics with no category, and viewer-neutral: no
/// follow filter and no block filter. The slug caches in the global
/// namespace, so nothing viewer-specific may reach the query.
fn uncategorized(ctx: &QueryContext<'_>) -> TopicQuery {
    TopicQuery {
        window: Some(ctx.daily_window()),
        categories: CategoryScope::Uncategorized,
        order: TopicOrder::LatestEntry,
        ..TopicQuery::default()
    }
}

/// Topics whose entries on today's month/day of the requested year.
/// The civil month/day come from the configured timezone.
fn on_this_day(ctx: &QueryContext<'_>) -> TopicQuery {
    let (_, month, day) =
        civil_date(ctx.now, ctx.config.timezone).unwrap_or((0, 1, 1));
    // Year is validated by the resolver before planning.
    let year = ctx.year.or(ctx.config.default_year()).unwrap_or(0);
    TopicQuery {
        window: Some(EntryWindow::OnDate { year, month, day }),
        order: TopicOrder::WindowCount,
        ..TopicQuery::default()
    }
}

/// The novice list inverts the base filter's novice rule.
fn novices(ctx: &QueryContext<'_>) -> TopicQuery {
    TopicQuery {
        window: Some(ctx.daily_window()),
        novices: NoviceScope::Only,
        order: TopicOrder::LatestEntry,
        ..TopicQuery::default()
    }
}

/// Wishlist tabs: everyone's wishes minus blocked wishers, or only the
/// viewer's own.
fn wishlist(ctx: &QueryContext<'_>) -> TopicQuery {
    let wished = match ctx.tab {
        Some("owned") => WishScope::By(ctx.viewer.id.unwrap_or_default()),
        _ => WishScope::Anyone {
            exclude_authors: ctx.viewer.blocked.clone(),
        },
    };
    TopicQuery {
        wished: Some(wished),
        novices: NoviceScope::Any,
        order: TopicOrder::WishCountThenRecent,
        ..TopicQuery::default()
    }
}

/// Advanced search over whole topics (no rolling window). A seed keyword
/// substitutes when the caller gave nothing to search by.
fn advanced_search(ctx: &QueryContext<'_>) -> TopicQuery {
    let search = ctx.search;
    let keywords = if search.has_primary_constraint() {
        search.keywords.clone()
    } else {
        Some(ctx.config.seed_keywords.clone())
    };
    let favorited_by = (search.is_in_favorites && ctx.viewer.is_authenticated())
        .then(|| ctx.viewer.id)
        .flatten();
    let order = match search.ordering {
        SearchOrdering::Alpha => TopicOrder::Title,
        SearchOrdering::Newer => TopicOrder::CreatedAt,
        SearchOrdering::Popular => TopicOrder::CountThenCreatedAt,
    };
    TopicQuery {
        title_contains: keywords,
        author_username: search.author_nick.clone(),
        favorited_by,
        min_entry_vote_rate: search
            .is_nice_ones
            .then_some(ctx.config.nice_vote_threshold),
        created_from: search.created_from(),
        created_to: search.created_to(),
        order,
        limit: Some(ctx.config.topics_per_page as usize),
        ..TopicQuery::default()
    }
}

/// Yesterday's most voted entries. "Yesterday" is the civil date of
/// now-minus-window in the configured timezone.
fn debe(ctx: &QueryContext<'_>) -> EntryQuery {
    let threshold = window_start(ctx.now, ctx.config.daily_window_hours);
    let (year, month, day) =
        civil_date(threshold, ctx.config.timezone).unwrap_or((0, 1, 1));
    let limit = ctx
        .config
        .debe_limit
        .min(ctx.config.topics_per_page as usize);
    EntryQuery {
        window: Some(EntryWindow::OnDate { year, month, day }),
        order: EntryOrder::VoteRateDesc,
        title: EntryTitle::Plain,
        limit: Some(limit),
        ..EntryQuery::default()
    }
}

/// The viewer's own drafts, newest first.
fn drafts(ctx: &QueryContext<'_>) -> EntryQuery {
    EntryQuery {
        include_drafts_of: ctx.viewer.id,
        order: EntryOrder::CreatedAtDesc,
        title: EntryTitle::Plain,
        ..EntryQuery::default()
    }
}

/// The follow tabs: fresh entries written by, or favorited by, the people
/// the viewer follows.
fn follow(ctx: &QueryContext<'_>) -> EntryQuery {
    let following = ctx.viewer.following.clone();
    match ctx.tab {
        Some("favorites") => EntryQuery {
            window: Some(ctx.daily_window()),
            favorited_by: Some(following),
            order: EntryOrder::FavoritedAtDesc,
            title: EntryTitle::WithEntryId,
            ..EntryQuery::default()
        },
        _ => EntryQuery {
            window: Some(ctx.daily_window()),
            authored_by: Some(following),
            order: EntryOrder::CreatedAtDesc,
            title: EntryTitle::WithAuthor,
            ..EntryQuery::default()
        },
    }
}

/// Placeholder: the engine swaps in the resolved author id before running.
fn user_stats_unresolved() -> EntryQuery {
    user_stats(&[])
}

/// Published entries of a single author, newest first.
pub fn user_stats(author_ids: &[AuthorId]) -> EntryQuery {
    EntryQuery {
        authored_by: Some(author_ids.to_vec()),
        order: EntryOrder::CreatedAtDesc,
        title: EntryTitle::Plain,
        ..EntryQuery::default()
    }
}

/// Database-backed category: fresh activity within one category.
pub fn generic_category(category_id: CategoryId, ctx: &QueryContext<'_>) -> TopicQuery {
    TopicQuery {
        window: Some(ctx.daily_window()),
        categories: CategoryScope::Only(category_id),
        order: TopicOrder::LatestEntry,
        ..TopicQuery::default()
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn context<'a>(
        viewer: &'a Viewer,
        search: &'a SearchKeys,
        config: &'a EngineConfig,
    ) -> QueryContext<'a> {
        QueryContext {
            viewer,
            year: None,
            tab: None,
            search,
            now: datetime!(2024-06-15 10:00 UTC),
            config,
        }
    }

    #[test]
    fn today_scopes_to_followed_categories_and_blocked_set() {
        let viewer = Viewer {
            id: Some(1),
            followed_categories: vec![10, 11],
            allow_uncategorized: true,
            blocked: vec![66],
            ..Viewer::default()
        };
        let search = SearchKeys::default();
        let config = EngineConfig::default();
        let query = match plan_for(VirtualList::Today, &context(&viewer, &search, &config)) {
            QueryPlan::Topics(q) => q,
            QueryPlan::Entries(_) => panic!("today lists topics"),
        };

        assert_eq!(
            query.categories,
            CategoryScope::InOrUncategorized(vec![10, 11])
        );
        assert_eq!(query.exclude_authors, vec![66]);
        assert_eq!(
            query.window,
            Some(EntryWindow::Since(datetime!(2024-06-14 10:00 UTC)))
        );
        assert_eq!(query.order, TopicOrder::LatestEntry);
    }

    #[test]
    fn debe_targets_the_previous_civil_day() {
        let viewer = Viewer::anonymous();
        let search = SearchKeys::default();
        let config = EngineConfig::default();
        let query = match plan_for(VirtualList::Debe, &context(&viewer, &search, &config)) {
            QueryPlan::Entries(q) => q,
            QueryPlan::Topics(_) => panic!("debe lists entries"),
        };

        assert_eq!(
            query.window,
            Some(EntryWindow::OnDate {
                year: 2024,
                month: 6,
                day: 14
            })
        );
        assert_eq!(query.order, EntryOrder::VoteRateDesc);
        assert_eq!(query.limit, Some(50));
    }

    #[test]
    fn uncategorized_carries_nothing_viewer_specific() {
        let viewer = Viewer {
            id: Some(1),
            followed_categories: vec![10],
            blocked: vec![66],
            ..Viewer::default()
        };
        let search = SearchKeys::default();
        let config = EngineConfig::default();
        let query = match plan_for(VirtualList::Uncategorized, &context(&viewer, &search, &config))
        {
            QueryPlan::Topics(q) => q,
            QueryPlan::Entries(_) => panic!("uncategorized lists topics"),
        };
        assert_eq!(query.categories, CategoryScope::Uncategorized);
        assert!(query.exclude_authors.is_empty());
    }

    #[test]
    fn novices_invert_the_novice_rule() {
        let viewer = Viewer::authenticated(1);
        let search = SearchKeys::default();
        let config = EngineConfig::default();
        let query = match plan_for(VirtualList::Novices, &context(&viewer, &search, &config)) {
            QueryPlan::Topics(q) => q,
            QueryPlan::Entries(_) => panic!("novices lists topics"),
        };
        assert_eq!(query.novices, NoviceScope::Only);
    }

    #[test]
    fn follow_tab_switches_shape() {
        let viewer = Viewer {
            id: Some(1),
            following: vec![5, 6],
            ..Viewer::default()
        };
        let search = SearchKeys::default();
        let config = EngineConfig::default();
        let mut ctx = context(&viewer, &search, &config);

        ctx.tab = Some("entries");
        let entries = match plan_for(VirtualList::Follow, &ctx) {
            QueryPlan::Entries(q) => q,
            QueryPlan::Topics(_) => panic!("follow lists entries"),
        };
        assert_eq!(entries.authored_by, Some(vec![5, 6]));
        assert_eq!(entries.title, EntryTitle::WithAuthor);

        ctx.tab = Some("favorites");
        let favorites = match plan_for(VirtualList::Follow, &ctx) {
            QueryPlan::Entries(q) => q,
            QueryPlan::Topics(_) => panic!("follow lists entries"),
        };
        assert_eq!(favorites.favorited_by, Some(vec![5, 6]));
        assert_eq!(favorites.order, EntryOrder::FavoritedAtDesc);
        assert_eq!(favorites.title, EntryTitle::WithEntryId);
    }

    #[test]
    fn empty_search_gets_the_seed_keyword() {
        let viewer = Viewer::anonymous();
        let search = SearchKeys::default();
        let config = EngineConfig::default();
        let query = match plan_for(VirtualList::Search, &context(&viewer, &search, &config)) {
            QueryPlan::Topics(q) => q,
            QueryPlan::Entries(_) => panic!("search lists topics"),
        };
        assert_eq!(query.title_contains.as_deref(), Some("common sense"));
        assert_eq!(query.order, TopicOrder::CreatedAt);
        assert_eq!(query.limit, Some(50));
    }

    #[test]
    fn nice_search_uses_the_configured_threshold() {
        let viewer = Viewer::authenticated(1);
        let search = SearchKeys::from_query("keywords=rust&is_nice_ones=true&ordering=popular");
        let config = EngineConfig::default();
        let query = match plan_for(VirtualList::Search, &context(&viewer, &search, &config)) {
            QueryPlan::Topics(q) => q,
            QueryPlan::Entries(_) => panic!("search lists topics"),
        };
        assert_eq!(query.min_entry_vote_rate, Some(489.0));
        assert_eq!(query.order, TopicOrder::CountThenCreatedAt);
    }

    #[test]
    fn wishlist_owned_tab_scopes_to_the_viewer() {
        let viewer = Viewer {
            id: Some(7),
            blocked: vec![2],
            ..Viewer::default()
        };
        let search = SearchKeys::default();
        let config = EngineConfig::default();
        let mut ctx = context(&viewer, &search, &config);

        let all = match plan_for(VirtualList::Wishlist, &ctx) {
            QueryPlan::Topics(q) => q,
            QueryPlan::Entries(_) => panic!("wishlist lists topics"),
        };
        assert_eq!(
            all.wished,
            Some(WishScope::Anyone {
                exclude_authors: vec![2]
            })
        );

        ctx.tab = Some("owned");
        let owned = match plan_for(VirtualList::Wishlist, &ctx) {
            QueryPlan::Topics(q) => q,
            QueryPlan::Entries(_) => panic!("wishlist lists topics"),
        };
        assert_eq!(owned.wished, Some(WishScope::By(7)));
    }
}
