//! Number-based pagination over materialized row streams.
//!
//! Page numbers are always coerced into range: zero, negative or
//! overflowing requests land on the first or last page, never an error.

use serde::Serialize;

use crate::domain::rows::Row;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginatorView {
    pub num_pages: usize,
    pub page_range: Vec<usize>,
}

/// One serialized page, field names contractual with the presentation
/// layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageView {
    pub object_list: Vec<Row>,
    pub number: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub has_other_pages: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page_number: Option<usize>,
    pub paginator: PaginatorView,
}

/// Slice `rows` into the requested page of `per_page` items.
pub fn paginate(rows: Vec<Row>, per_page: usize, requested: i64) -> PageView {
    let per_page = per_page.max(1);
    let num_pages = rows.len().div_ceil(per_page).max(1);
    let number = coerce(requested, num_pages);

    let start = (number - 1) * per_page;
    let object_list: Vec<Row> = rows
        .into_iter()
        .skip(start)
        .take(per_page)
        .collect();

    let has_next = number < num_pages;
    let has_previous = number > 1;
    PageView {
        object_list,
        number,
        has_next,
        has_previous,
        has_other_pages: has_next || has_previous,
        next_page_number: has_next.then_some(number + 1),
        previous_page_number: has_previous.then_some(number - 1),
        paginator: PaginatorView {
            num_pages,
            page_range: (1..=num_pages).collect(),
        },
    }
}

fn coerce(requested: i64, num_pages: usize) -> usize {
    if requested < 1 {
        1
    } else {
        (requested as usize).min(num_pages)
    }
}
