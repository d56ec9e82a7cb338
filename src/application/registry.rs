//! The slug registry: explicit polymorphism over category slugs.
//!
//! Every reserved (virtual) slug gets one [`SlugSpec`] describing its
//! capabilities: display name, authorization and cache flags, row kind and
//! tab set. Database-backed category slugs are not listed here; the engine
//! falls back to the generic handler for them.

use std::collections::BTreeMap;

use crate::config::{EngineConfig, TabDef};
use crate::domain::rows::RowKind;

/// The virtual list algorithms the query layer implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualList {
    Today,
    Agenda,
    Uncategorized,
    OnThisDay,
    Drafts,
    Novices,
    Follow,
    Debe,
    Wishlist,
    Search,
    UserStats,
}

#[derive(Debug, Clone)]
pub struct TabSet {
    pub available: Vec<TabDef>,
    pub default: String,
}

impl TabSet {
    /// Coerce a requested tab into the declared set.
    pub fn resolve<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(tab) if self.available.iter().any(|t| t.name == tab) => tab,
            _ => &self.default,
        }
    }
}

/// Capability record for one reserved slug.
#[derive(Debug, Clone)]
pub struct SlugSpec {
    pub slug: String,
    pub safename: String,
    pub description: String,
    pub list: VirtualList,
    pub row_kind: RowKind,
    pub login_required: bool,
    pub user_exclusive: bool,
    pub cache_eligible: bool,
    /// Snapshot is only valid within the civil day it was taken.
    pub day_bound: bool,
    pub tabs: Option<TabSet>,
}

/// Registry of reserved slugs, built once per engine from configuration.
#[derive(Debug, Clone)]
pub struct SlugRegistry {
    specs: BTreeMap<String, SlugSpec>,
}

// slug, safename, description, algorithm, row kind, day-bound
const BASE_TABLE: &[(&str, &str, &str, VirtualList, RowKind, bool)] = &[
    (
        "today",
        "today",
        "the latest entries",
        VirtualList::Today,
        RowKind::Topic,
        false,
    ),
    (
        "agenda",
        "agenda",
        "what's happening",
        VirtualList::Agenda,
        RowKind::Topic,
        false,
    ),
    (
        "uncategorized",
        "uncategorized",
        "topics without a channel",
        VirtualList::Uncategorized,
        RowKind::Topic,
        false,
    ),
    (
        "on-this-day",
        "on this day",
        "what was said in past years",
        VirtualList::OnThisDay,
        RowKind::Topic,
        true,
    ),
    (
        "drafts",
        "drafts",
        "entries set aside",
        VirtualList::Drafts,
        RowKind::EntryEdit,
        false,
    ),
    (
        "novices",
        "novices",
        "entries from novices",
        VirtualList::Novices,
        RowKind::Topic,
        false,
    ),
    (
        "follow",
        "following",
        "what the people I follow wrote",
        VirtualList::Follow,
        RowKind::Entry,
        false,
    ),
    (
        "debe",
        "yesterday's best",
        "most voted entries of yesterday",
        VirtualList::Debe,
        RowKind::Entry,
        true,
    ),
    (
        "wishlist",
        "wishlist",
        "topics waiting for an entry",
        VirtualList::Wishlist,
        RowKind::Topic,
        false,
    ),
    (
        "search",
        "search results",
        "advanced search",
        VirtualList::Search,
        RowKind::Topic,
        false,
    ),
    (
        "user-stats",
        "user stats",
        "entries of a single author",
        VirtualList::UserStats,
        RowKind::Entry,
        false,
    ),
];

impl SlugRegistry {
    pub fn from_config(config: &EngineConfig) -> Self {
        let specs = BASE_TABLE
            .iter()
            .map(|&(slug, safename, description, list, row_kind, day_bound)| {
                let tabs = config.tabbed_slugs.get(slug).map(|t| TabSet {
                    available: t.tabs.clone(),
                    default: t.default.clone(),
                });
                let spec = SlugSpec {
                    slug: slug.to_owned(),
                    safename: safename.to_owned(),
                    description: description.to_owned(),
                    list,
                    row_kind,
                    login_required: config.login_required_slugs.contains(slug),
                    user_exclusive: config.user_exclusive_slugs.contains(slug),
                    cache_eligible: !config.uncached_slugs.contains(slug),
                    day_bound,
                    tabs,
                };
                (slug.to_owned(), spec)
            })
            .collect();
        Self { specs }
    }

    pub fn resolve(&self, slug: &str) -> Option<&SlugSpec> {
        self.specs.get(slug)
    }

    pub fn reserved_slugs(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SlugRegistry {
        SlugRegistry::from_config(&EngineConfig::default())
    }

    #[test]
    fn reserves_the_whole_slug_set() {
        let registry = registry();
        for slug in [
            "today",
            "agenda",
            "uncategorized",
            "on-this-day",
            "drafts",
            "novices",
            "follow",
            "debe",
            "wishlist",
            "search",
            "user-stats",
        ] {
            assert!(registry.resolve(slug).is_some(), "missing {slug}");
        }
        assert!(registry.resolve("linux").is_none());
    }

    #[test]
    fn today_is_login_required_and_user_exclusive() {
        let registry = registry();
        let today = registry.resolve("today").expect("today registered");
        assert!(today.login_required);
        assert!(today.user_exclusive);
        assert!(today.cache_eligible);
        assert!(!today.day_bound);
    }

    #[test]
    fn debe_is_public_day_bound_and_entry_shaped() {
        let registry = registry();
        let debe = registry.resolve("debe").expect("debe registered");
        assert!(!debe.login_required);
        assert!(!debe.user_exclusive);
        assert!(debe.day_bound);
        assert_eq!(debe.row_kind, RowKind::Entry);
    }

    #[test]
    fn drafts_bypass_the_cache_and_link_to_the_editor() {
        let registry = registry();
        let drafts = registry.resolve("drafts").expect("drafts registered");
        assert!(!drafts.cache_eligible);
        assert_eq!(drafts.row_kind, RowKind::EntryEdit);
    }

    #[test]
    fn tab_coercion_falls_back_to_the_default() {
        let registry = registry();
        let follow = registry.resolve("follow").expect("follow registered");
        let tabs = follow.tabs.as_ref().expect("follow is tabbed");
        assert_eq!(tabs.resolve(Some("favorites")), "favorites");
        assert_eq!(tabs.resolve(Some("bogus")), "entries");
        assert_eq!(tabs.resolve(None), "entries");
    }
}
