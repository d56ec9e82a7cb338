//! Configuration layer: typed engine settings with layered precedence
//! (defaults → file → environment).

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_TOPICS_PER_PAGE: u32 = 50;
const DEFAULT_CACHE_TTL_SECS: u64 = 90;
const DEFAULT_TODAY_TTL_SECS: u64 = 300;
const DEFAULT_DAILY_TTL_SECS: u64 = 86_400;
const DEFAULT_WINDOW_HOURS: i64 = 24;
const DEFAULT_NICE_VOTE_THRESHOLD: f64 = 489.0;
const DEFAULT_DEBE_LIMIT: usize = 50;
const DEFAULT_SEED_KEYWORDS: &str = "common sense";
const ENV_PREFIX: &str = "LEFTFRAME";

/// A named tab with its human label.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TabDef {
    pub name: String,
    pub safename: String,
}

/// Tab set declaration for a tabbed slug.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TabsConfig {
    pub tabs: Vec<TabDef>,
    pub default: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration could not be loaded: {0}")]
    Load(#[from] config::ConfigError),
    #[error("configuration invalid: {0}")]
    Invalid(String),
}

/// Engine settings. All fields have defaults matching the production
/// dictionary; any of them may be overridden from a TOML file or from
/// `LEFTFRAME_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Page size for guests and viewers without a preference.
    pub topics_per_page: u32,
    /// Years selectable for `on-this-day`, descending; the first element is
    /// the default when a requested year is absent or out of range.
    pub year_range: Vec<i32>,
    /// Slugs rejected for anonymous viewers.
    pub login_required_slugs: BTreeSet<String>,
    /// Slugs whose cache slots are partitioned by viewer id.
    pub user_exclusive_slugs: BTreeSet<String>,
    /// Tab declarations for tabbed slugs.
    pub tabbed_slugs: BTreeMap<String, TabsConfig>,
    /// Slugs that bypass the cache entirely.
    pub uncached_slugs: BTreeSet<String>,
    /// Kill switch for the whole cache layer.
    pub disable_cache: bool,
    pub cache_default_ttl_seconds: u64,
    /// Per-slug TTL overrides in seconds.
    pub cache_slug_ttl_overrides: BTreeMap<String, u64>,
    /// Rolling window for "qualifying" entries.
    pub daily_window_hours: i64,
    /// Minimum vote rate for an entry to make its topic "nice".
    pub nice_vote_threshold: f64,
    /// Timezone used for civil-day boundaries (debe and on-this-day
    /// freshness). Day boundaries are computed in this zone, not the
    /// server's.
    pub timezone: Tz,
    /// How many entries `debe` considers before page truncation.
    pub debe_limit: usize,
    /// Seed keyword substituted when an advanced search carries no
    /// keyword, author or favorites constraint.
    pub seed_keywords: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let daily = [
            ("debe".to_owned(), DEFAULT_DAILY_TTL_SECS),
            ("on-this-day".to_owned(), DEFAULT_DAILY_TTL_SECS),
            ("today".to_owned(), DEFAULT_TODAY_TTL_SECS),
        ];
        Self {
            topics_per_page: DEFAULT_TOPICS_PER_PAGE,
            year_range: vec![2022, 2021, 2020],
            login_required_slugs: ["today", "drafts", "follow", "novices", "wishlist"]
                .map(str::to_owned)
                .into(),
            user_exclusive_slugs: ["today", "drafts", "follow"].map(str::to_owned).into(),
            tabbed_slugs: BTreeMap::from([
                (
                    "follow".to_owned(),
                    TabsConfig {
                        tabs: vec![
                            tab("entries", "latest entries"),
                            tab("favorites", "latest favorites"),
                        ],
                        default: "entries".to_owned(),
                    },
                ),
                (
                    "wishlist".to_owned(),
                    TabsConfig {
                        tabs: vec![tab("all", "all wishes"), tab("owned", "my wishes")],
                        default: "all".to_owned(),
                    },
                ),
            ]),
            uncached_slugs: ["drafts", "wishlist", "search", "user-stats"]
                .map(str::to_owned)
                .into(),
            disable_cache: false,
            cache_default_ttl_seconds: DEFAULT_CACHE_TTL_SECS,
            cache_slug_ttl_overrides: BTreeMap::from(daily),
            daily_window_hours: DEFAULT_WINDOW_HOURS,
            nice_vote_threshold: DEFAULT_NICE_VOTE_THRESHOLD,
            timezone: Tz::UTC,
            debe_limit: DEFAULT_DEBE_LIMIT,
            seed_keywords: DEFAULT_SEED_KEYWORDS.to_owned(),
        }
    }
}

fn tab(name: &str, safename: &str) -> TabDef {
    TabDef {
        name: name.to_owned(),
        safename: safename.to_owned(),
    }
}

impl EngineConfig {
    /// Load settings from an optional TOML file, then apply `LEFTFRAME_*`
    /// environment overrides on top of the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let raw = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let mut settings: EngineConfig = raw.try_deserialize()?;
        settings.normalize()?;
        Ok(settings)
    }

    /// The default year for `on-this-day` (first of the descending range).
    pub fn default_year(&self) -> Option<i32> {
        self.year_range.first().copied()
    }

    fn normalize(&mut self) -> Result<(), ConfigError> {
        if self.topics_per_page == 0 {
            return Err(ConfigError::Invalid(
                "topics_per_page must be at least 1".to_owned(),
            ));
        }
        if self.year_range.is_empty() {
            return Err(ConfigError::Invalid(
                "year_range must contain at least one year".to_owned(),
            ));
        }
        // The first element is the contractual default; keep the range
        // descending regardless of the file's ordering.
        self.year_range.sort_unstable_by(|a, b| b.cmp(a));
        self.year_range.dedup();
        if self.daily_window_hours <= 0 {
            return Err(ConfigError::Invalid(
                "daily_window_hours must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}
