//! The viewer interface: everything the engine consumes about the caller.

pub type AuthorId = i64;
pub type CategoryId = i64;

/// Request-scoped snapshot of the caller. Anonymous viewers have no id.
///
/// `session_year` is the viewer-local sticky choice for `on-this-day`: when
/// the engine picks a year because none was requested, the frame's `year`
/// field carries the choice and the host is expected to write it back to the
/// session so the pick stays stable across paginations.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub id: Option<AuthorId>,
    /// Per-viewer page size preference; guests fall back to the configured
    /// default.
    pub topics_per_page: Option<u32>,
    /// Categories the viewer follows; scopes the `today` list.
    pub followed_categories: Vec<CategoryId>,
    /// Whether `today` should also include topics with no category.
    pub allow_uncategorized: bool,
    /// Authors the viewer follows; scopes the `follow` lists.
    pub following: Vec<AuthorId>,
    /// Authors the viewer has blocked; their entries never qualify.
    pub blocked: Vec<AuthorId>,
    pub session_year: Option<i32>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(id: AuthorId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }
}
