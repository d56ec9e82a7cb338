//! Per-slug TTL and freshness rules.

use chrono_tz::Tz;
use time::{Duration, OffsetDateTime};

use crate::config::EngineConfig;
use crate::infra::clock::civil_date;

/// TTL for a slug's cache entries: the per-slug override when present,
/// the default otherwise.
pub fn ttl_for(slug: &str, config: &EngineConfig) -> Duration {
    let seconds = config
        .cache_slug_ttl_overrides
        .get(slug)
        .copied()
        .unwrap_or(config.cache_default_ttl_seconds);
    Duration::seconds(seconds as i64)
}

/// Whether a cached snapshot is still usable.
///
/// Day-bound slugs (debe, on-this-day) are identical for a whole civil day
/// and carry a 24h TTL, but must be recomputed as soon as the day rolls
/// over; their snapshot is fresh only while `set_at` and `now` share a
/// civil date in the configured timezone. Everything else relies on the
/// store's TTL alone.
pub fn is_fresh(day_bound: bool, set_at: OffsetDateTime, now: OffsetDateTime, tz: Tz) -> bool {
    if !day_bound {
        return true;
    }
    match (civil_date(set_at, tz), civil_date(now, tz)) {
        (Some(stored), Some(current)) => stored == current,
        _ => false,
    }
}
