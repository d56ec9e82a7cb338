//! Advanced-search key parsing.
//!
//! Only a whitelisted set of keys is forwarded from the request's query
//! string; everything else is dropped. Values that fail to parse are
//! ignored rather than raised, matching the engine's coerce-don't-error
//! policy for user input.

use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};
use url::form_urlencoded;

/// Keys forwarded to the search builder, in fingerprint order.
pub const WHITELISTED_KEYS: &[&str] = &[
    "keywords",
    "author_nick",
    "is_in_favorites",
    "is_nice_ones",
    "from_date",
    "to_date",
    "ordering",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchOrdering {
    Alpha,
    #[default]
    Newer,
    Popular,
}

impl SearchOrdering {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("alpha") => Self::Alpha,
            Some("popular") => Self::Popular,
            _ => Self::Newer,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Newer => "newer",
            Self::Popular => "popular",
        }
    }
}

/// Parsed, validated advanced-search parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchKeys {
    pub keywords: Option<String>,
    pub author_nick: Option<String>,
    pub is_in_favorites: bool,
    pub is_nice_ones: bool,
    pub from_date: Option<Date>,
    pub to_date: Option<Date>,
    pub ordering: SearchOrdering,
}

impl SearchKeys {
    /// Parse from a raw query string (`keywords=rust&ordering=alpha`).
    pub fn from_query(query: &str) -> Self {
        let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Build from already-split key/value pairs; non-whitelisted keys are
    /// discarded.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut keys = Self::default();
        let mut ordering_raw: Option<String> = None;
        for (name, value) in pairs {
            match name {
                "keywords" => keys.keywords = non_empty(value),
                "author_nick" => keys.author_nick = non_empty(value),
                "is_in_favorites" => keys.is_in_favorites = value == "true",
                "is_nice_ones" => keys.is_nice_ones = value == "true",
                "from_date" => keys.from_date = parse_date(value),
                "to_date" => keys.to_date = parse_date(value),
                "ordering" => ordering_raw = Some(value.to_owned()),
                _ => {}
            }
        }
        keys.ordering = SearchOrdering::parse(ordering_raw.as_deref());
        keys
    }

    /// Whether the search carries any of the constraints that make a seed
    /// keyword unnecessary.
    pub fn has_primary_constraint(&self) -> bool {
        self.keywords.is_some() || self.author_nick.is_some() || self.is_in_favorites
    }

    /// Topic creation lower bound. The stored bound is pushed back a day so
    /// a `from_date` equal to the topic's creation date matches inclusively.
    pub fn created_from(&self) -> Option<OffsetDateTime> {
        self.from_date
            .map(|d| d.midnight().assume_utc() - Duration::days(1))
    }

    /// Topic creation upper bound (end of the given civil day).
    pub fn created_to(&self) -> Option<OffsetDateTime> {
        self.to_date
            .map(|d| d.midnight().assume_utc() + Duration::days(1))
    }

    /// Canonical whitelisted values for the cache-key fingerprint.
    pub fn fingerprint_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("keywords", self.keywords.clone().unwrap_or_default()),
            ("author_nick", self.author_nick.clone().unwrap_or_default()),
            ("is_in_favorites", self.is_in_favorites.to_string()),
            ("is_nice_ones", self.is_nice_ones.to_string()),
            ("from_date", date_repr(self.from_date)),
            ("to_date", date_repr(self.to_date)),
            ("ordering", self.ordering.as_str().to_owned()),
        ]
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn parse_date(value: &str) -> Option<Date> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(value.trim(), &format).ok()
}

fn date_repr(date: Option<Date>) -> String {
    date.map(|d| d.to_string()).unwrap_or_default()
}
