//! The topic list engine: resolve, authorize, cache, query, frame.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use metrics::counter;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::application::frame::{LeftFrame, TabView, TabsView, parameters_for, parameters_for_generic};
use crate::application::pagination::paginate;
use crate::application::queries::{self, QueryContext, QueryPlan};
use crate::application::registry::{SlugRegistry, SlugSpec, VirtualList};
use crate::application::repos::ReadStore;
use crate::application::search::SearchKeys;
use crate::cache::{CachedRows, TopicListCache, keys, policy};
use crate::config::EngineConfig;
use crate::domain::error::EngineError;
use crate::domain::rows::{Row, RowKind};
use crate::domain::viewer::Viewer;
use crate::infra::clock::{Clock, civil_date};

/// One left-frame request. `page` outside the valid range is coerced, a
/// missing `tab` falls back to the slug's default, and `refresh` forces a
/// cache bypass plus rewrite.
#[derive(Debug, Clone, Copy)]
pub struct FrameRequest<'a> {
    pub viewer: &'a Viewer,
    pub slug: &'a str,
    pub page: i64,
    pub year: Option<i32>,
    pub tab: Option<&'a str>,
    /// Raw query string carrying the advanced-search keys.
    pub search_query: Option<&'a str>,
    pub refresh: bool,
}

impl<'a> FrameRequest<'a> {
    pub fn new(viewer: &'a Viewer, slug: &'a str) -> Self {
        Self {
            viewer,
            slug,
            page: 1,
            year: None,
            tab: None,
            search_query: None,
            refresh: false,
        }
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = page;
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn tab(mut self, tab: &'a str) -> Self {
        self.tab = Some(tab);
        self
    }

    pub fn search_query(mut self, query: &'a str) -> Self {
        self.search_query = Some(query);
        self
    }

    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }
}

/// Request-scoped synchronous pipeline over injected collaborators.
/// Holds no background state; concurrent invocations only share the cache,
/// where the policy is read-through last-writer-wins.
pub struct Engine {
    registry: SlugRegistry,
    clock: Arc<dyn Clock>,
    storage: Arc<dyn ReadStore>,
    cache: Arc<dyn TopicListCache>,
    config: EngineConfig,
}

/// Everything needed to address one cache slot and frame one response,
/// after slug resolution and input validation.
struct ResolvedRequest {
    slug: String,
    safename: Option<String>,
    row_kind: RowKind,
    user_exclusive: bool,
    cache_eligible: bool,
    day_bound: bool,
    year: Option<i32>,
    year_range: Option<Vec<i32>>,
    tab: Option<String>,
    tabs: Option<TabsView>,
    search: SearchKeys,
    search_hash: Option<u64>,
    parameters: String,
    list: Option<VirtualList>,
    generic_category_id: Option<i64>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        storage: Arc<dyn ReadStore>,
        cache: Arc<dyn TopicListCache>,
    ) -> Self {
        Self {
            registry: SlugRegistry::from_config(&config),
            clock,
            storage,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &SlugRegistry {
        &self.registry
    }

    /// Build the left frame for one request.
    ///
    /// When the engine picks an `on-this-day` year itself, the frame's
    /// `year` field carries the pick; hosts persist it to the viewer's
    /// session (`Viewer::session_year`) to keep it stable across
    /// paginations.
    pub async fn build_left_frame(
        &self,
        request: FrameRequest<'_>,
    ) -> Result<LeftFrame, EngineError> {
        let resolved = self.resolve(&request).await?;
        let now = self.clock.now();

        let key = keys::frame_key(
            resolved.user_exclusive,
            request.viewer,
            &resolved.slug,
            resolved.year,
            resolved.tab.as_deref(),
            resolved.search_hash,
        );
        let cacheable = resolved.cache_eligible && !self.config.disable_cache;

        if cacheable && request.refresh {
            self.cache_delete(&key).await;
        }

        let mut refresh_count = 0u64;
        let mut rows: Option<Vec<Row>> = None;

        if cacheable && !request.refresh {
            if let Some(snapshot) = self.cache_get(&key).await {
                if policy::is_fresh(resolved.day_bound, snapshot.set_at, now, self.config.timezone)
                {
                    if resolved.list == Some(VirtualList::Today) {
                        refresh_count =
                            self.storage.count_entries_since(snapshot.set_at).await?;
                    }
                    debug!(slug = %resolved.slug, cache = "hit", "left frame rows");
                    rows = Some(snapshot.rows);
                }
            }
        }

        let rows = match rows {
            Some(rows) => rows,
            None => {
                let rows = self.run(&resolved, request.viewer, now).await?;
                if cacheable {
                    let snapshot = CachedRows {
                        rows: rows.clone(),
                        set_at: now,
                    };
                    let ttl = policy::ttl_for(&resolved.slug, &self.config);
                    self.cache_set(&key, snapshot, ttl).await;
                }
                debug!(slug = %resolved.slug, cache = "miss", rows = rows.len(), "left frame rows");
                rows
            }
        };

        let per_page = self.page_size(request.viewer);
        let page = paginate(rows, per_page, request.page);

        Ok(LeftFrame {
            slug: resolved.slug,
            safename: resolved.safename,
            slug_identifier: resolved.row_kind.slug_identifier(),
            year: resolved.year,
            year_range: resolved.year_range,
            tabs: resolved.tabs,
            parameters: resolved.parameters,
            refresh_count,
            page,
        })
    }

    /// Drop the cache slot a request would read. A no-op for uncached
    /// slugs; cache backend failures are swallowed.
    pub async fn invalidate(&self, request: FrameRequest<'_>) -> Result<(), EngineError> {
        let resolved = self.resolve(&request).await?;
        if !resolved.cache_eligible || self.config.disable_cache {
            return Ok(());
        }
        let key = keys::frame_key(
            resolved.user_exclusive,
            request.viewer,
            &resolved.slug,
            resolved.year,
            resolved.tab.as_deref(),
            resolved.search_hash,
        );
        self.cache_delete(&key).await;
        Ok(())
    }

    async fn resolve(&self, request: &FrameRequest<'_>) -> Result<ResolvedRequest, EngineError> {
        let slug = request.slug.trim();
        if slug.is_empty() {
            return Err(EngineError::invalid_argument("slug is required"));
        }

        let search = request
            .search_query
            .map(SearchKeys::from_query)
            .unwrap_or_default();

        if let Some(spec) = self.registry.resolve(slug) {
            if spec.login_required && !request.viewer.is_authenticated() {
                return Err(EngineError::permission_denied(slug));
            }
            return Ok(self.resolve_virtual(spec, request, search));
        }

        let category = self
            .storage
            .category_by_slug(slug)
            .await?
            .ok_or_else(|| EngineError::not_found(slug))?;

        Ok(ResolvedRequest {
            slug: slug.to_owned(),
            safename: Some(category.name),
            row_kind: RowKind::Topic,
            user_exclusive: false,
            cache_eligible: !self.config.uncached_slugs.contains(slug),
            day_bound: false,
            year: None,
            year_range: None,
            tab: None,
            tabs: None,
            search,
            search_hash: None,
            parameters: parameters_for_generic(),
            list: None,
            generic_category_id: Some(category.id),
        })
    }

    fn resolve_virtual(
        &self,
        spec: &SlugSpec,
        request: &FrameRequest<'_>,
        search: SearchKeys,
    ) -> ResolvedRequest {
        let tab = spec
            .tabs
            .as_ref()
            .map(|tabs| tabs.resolve(request.tab).to_owned());
        let tabs = spec.tabs.as_ref().zip(tab.as_ref()).map(|(set, current)| TabsView {
            current: current.clone(),
            available: set
                .available
                .iter()
                .map(|t| TabView {
                    name: t.name.clone(),
                    safename: t.safename.clone(),
                })
                .collect(),
        });

        let (year, year_range) = if spec.list == VirtualList::OnThisDay {
            (
                Some(self.select_year(request.year, request.viewer)),
                Some(self.config.year_range.clone()),
            )
        } else {
            (None, None)
        };

        let search_hash = (spec.list == VirtualList::Search || spec.list == VirtualList::UserStats)
            .then(|| {
                let pairs = search.fingerprint_pairs();
                keys::search_fingerprint(pairs.iter().map(|(k, v)| (*k, v.as_str())))
            });

        let parameters = parameters_for(&spec.slug, tab.as_deref(), year);

        ResolvedRequest {
            slug: spec.slug.clone(),
            safename: Some(spec.safename.clone()),
            row_kind: spec.row_kind,
            user_exclusive: spec.user_exclusive,
            cache_eligible: spec.cache_eligible,
            day_bound: spec.day_bound,
            year,
            year_range,
            tab,
            tabs,
            search,
            search_hash,
            parameters,
            list: Some(spec.list),
            generic_category_id: None,
        }
    }

    /// Year validation for `on-this-day`: out-of-range requests coerce to
    /// the default; absent requests reuse the session's pick or draw a new
    /// one, stable within the viewer's civil day.
    fn select_year(&self, requested: Option<i32>, viewer: &Viewer) -> i32 {
        let range = &self.config.year_range;
        let default = self.config.default_year().unwrap_or(0);
        match requested {
            Some(year) if range.contains(&year) => year,
            Some(_) => default,
            None => match viewer.session_year.filter(|y| range.contains(y)) {
                Some(year) => year,
                // Hand-built configs may bypass load()'s validation and
                // carry an empty range; fall back to the default year.
                None if range.is_empty() => default,
                None => {
                    let mut hasher = DefaultHasher::new();
                    viewer.id.hash(&mut hasher);
                    civil_date(self.clock.now(), self.config.timezone).hash(&mut hasher);
                    let index = (hasher.finish() % range.len() as u64) as usize;
                    range[index]
                }
            },
        }
    }

    async fn run(
        &self,
        resolved: &ResolvedRequest,
        viewer: &Viewer,
        now: OffsetDateTime,
    ) -> Result<Vec<Row>, EngineError> {
        let ctx = QueryContext {
            viewer,
            year: resolved.year,
            tab: resolved.tab.as_deref(),
            search: &resolved.search,
            now,
            config: &self.config,
        };

        let plan = match (resolved.list, resolved.generic_category_id) {
            (Some(VirtualList::UserStats), _) => {
                let nick = resolved
                    .search
                    .author_nick
                    .as_deref()
                    .ok_or_else(|| EngineError::not_found(&resolved.slug))?;
                let author = self
                    .storage
                    .author_by_username(nick)
                    .await?
                    .ok_or_else(|| EngineError::not_found(&resolved.slug))?;
                QueryPlan::Entries(queries::user_stats(&[author.id]))
            }
            (Some(list), _) => queries::plan_for(list, &ctx),
            (None, Some(category_id)) => {
                QueryPlan::Topics(queries::generic_category(category_id, &ctx))
            }
            (None, None) => {
                return Err(EngineError::invalid_argument(
                    "request resolved to neither a virtual list nor a category",
                ));
            }
        };

        let rows = match plan {
            QueryPlan::Topics(query) => self.storage.topics_matching(&query).await?,
            QueryPlan::Entries(query) => self.storage.entries_matching(&query).await?,
        };
        Ok(rows)
    }

    fn page_size(&self, viewer: &Viewer) -> usize {
        if viewer.is_authenticated() {
            viewer
                .topics_per_page
                .unwrap_or(self.config.topics_per_page) as usize
        } else {
            self.config.topics_per_page as usize
        }
    }

    // Cache backend failures never surface: log, count, degrade to a miss.

    async fn cache_get(&self, key: &str) -> Option<CachedRows> {
        match self.cache.get(key).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                counter!("leftframe_cache_errors_total").increment(1);
                warn!(%key, %error, "cache get failed; treating as miss");
                None
            }
        }
    }

    async fn cache_set(&self, key: &str, snapshot: CachedRows, ttl: time::Duration) {
        if let Err(error) = self.cache.set(key, snapshot, ttl).await {
            counter!("leftframe_cache_errors_total").increment(1);
            warn!(%key, %error, "cache set failed; skipping store");
        }
    }

    async fn cache_delete(&self, key: &str) {
        if let Err(error) = self.cache.delete(key).await {
            counter!("leftframe_cache_errors_total").increment(1);
            warn!(%key, %error, "cache delete failed");
        }
    }
}
