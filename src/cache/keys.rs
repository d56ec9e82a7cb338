//! Cache key construction.
//!
//! A frame's cache identity joins: the namespace (`global`, or
//! `pri_uid_{viewer_id}` for user-exclusive slugs), the slug, and optional
//! year, tab and search-fingerprint suffixes.

use std::fmt::Write as _;
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::domain::viewer::Viewer;

/// Build the cache key for one frame request.
///
/// User-exclusive slugs must never share a slot across viewers, so the
/// namespace carries the viewer id. Anonymous viewers never reach
/// user-exclusive slugs (the authorization gate rejects them first), but a
/// missing id still degrades to the global namespace rather than panicking.
pub fn frame_key(
    user_exclusive: bool,
    viewer: &Viewer,
    slug: &str,
    year: Option<i32>,
    tab: Option<&str>,
    search_hash: Option<u64>,
) -> String {
    let mut key = match (user_exclusive, viewer.id) {
        (true, Some(id)) => format!("pri_uid_{id}_{slug}"),
        _ => format!("global_{slug}"),
    };
    if let Some(year) = year {
        let _ = write!(key, "_{year}");
    }
    if let Some(tab) = tab {
        let _ = write!(key, "_{tab}");
    }
    if let Some(hash) = search_hash {
        let _ = write!(key, "_{hash:016x}");
    }
    key
}

/// Stable fingerprint over an ordered sequence of whitelisted search
/// key/value pairs.
pub fn search_fingerprint<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> u64 {
    let mut hasher = DefaultHasher::new();
    for (name, value) in pairs {
        name.hash(&mut hasher);
        value.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_key_shape() {
        let viewer = Viewer::anonymous();
        assert_eq!(
            frame_key(false, &viewer, "debe", None, None, None),
            "global_debe"
        );
    }

    #[test]
    fn user_exclusive_keys_are_partitioned_by_viewer() {
        let u1 = Viewer::authenticated(1);
        let u2 = Viewer::authenticated(2);
        let k1 = frame_key(true, &u1, "today", None, None, None);
        let k2 = frame_key(true, &u2, "today", None, None, None);
        assert_eq!(k1, "pri_uid_1_today");
        assert_eq!(k2, "pri_uid_2_today");
        assert_ne!(k1, k2);
    }

    #[test]
    fn year_and_tab_suffixes() {
        let viewer = Viewer::anonymous();
        assert_eq!(
            frame_key(false, &viewer, "on-this-day", Some(2021), None, None),
            "global_on-this-day_2021"
        );
        let owner = Viewer::authenticated(9);
        assert_eq!(
            frame_key(true, &owner, "follow", None, Some("favorites"), None),
            "pri_uid_9_follow_favorites"
        );
    }

    #[test]
    fn search_fingerprint_is_stable_and_value_sensitive() {
        let a = search_fingerprint([("keywords", "rust"), ("ordering", "newer")]);
        let b = search_fingerprint([("keywords", "rust"), ("ordering", "newer")]);
        let c = search_fingerprint([("keywords", "rust"), ("ordering", "alpha")]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
