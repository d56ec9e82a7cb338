//! The two uniform row shapes the query layer emits.

use serde::{Deserialize, Serialize};

/// A single left-frame row. Topic rows carry an in-window entry count;
/// entry rows carry an entry id in `slug` and no count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub title: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

impl Row {
    pub fn topic(title: impl Into<String>, slug: impl Into<String>, count: i64) -> Self {
        Self {
            title: title.into(),
            slug: slug.into(),
            count: Some(count),
        }
    }

    pub fn entry(title: impl Into<String>, entry_id: i64) -> Self {
        Self {
            title: title.into(),
            slug: entry_id.to_string(),
            count: None,
        }
    }
}

/// What a row's `slug` field points at; drives the URL prefix the
/// presentation layer uses to build links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// Rows link to `/topic/{slug}`.
    Topic,
    /// Rows link to `/entry/{id}`.
    Entry,
    /// Rows link to `/entry/update/{id}` (the viewer's own drafts).
    EntryEdit,
}

impl RowKind {
    pub fn slug_identifier(self) -> &'static str {
        match self {
            RowKind::Topic => "/topic/",
            RowKind::Entry => "/entry/",
            RowKind::EntryEdit => "/entry/update/",
        }
    }
}
