//! Left-frame assembly: the serialized output of one engine request.

use serde::Serialize;

use crate::application::pagination::PageView;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabView {
    pub name: String,
    pub safename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabsView {
    pub current: String,
    pub available: Vec<TabView>,
}

/// The frame handed to the presentation layer. Field names are
/// contractual; optional fields are omitted (not null) when serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeftFrame {
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safename: Option<String>,
    pub slug_identifier: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_range: Option<Vec<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tabs: Option<TabsView>,
    /// Slug-specific query-string hint the presentation layer echoes back
    /// on row links (e.g. `?a=today`).
    pub parameters: String,
    /// Number of publishable entries newer than the cached snapshot;
    /// non-zero only for `today` on a cache hit.
    pub refresh_count: u64,
    pub page: PageView,
}

/// The per-slug (and per-tab) link parameter table.
pub fn parameters_for(slug: &str, tab: Option<&str>, year: Option<i32>) -> String {
    match (slug, tab) {
        ("today", _) | ("uncategorized", _) => "?a=today".to_owned(),
        ("agenda", _) => "?a=popular".to_owned(),
        ("novices", _) => "?a=novices".to_owned(),
        ("on-this-day", _) => match year {
            Some(year) => format!("?a=history&year={year}"),
            None => "?a=history".to_owned(),
        },
        ("follow", Some("entries")) => "?a=recent".to_owned(),
        _ => String::new(),
    }
}

/// Generic database categories share the `today` parameter.
pub fn parameters_for_generic() -> String {
    "?a=today".to_owned()
}
