//! Page-number pagination over a filtered query.
//!
//! [`Pagination`] is the raw `LIMIT`/`OFFSET` pair a query renders.
//! [`Paginator`] sits on top of it: it counts the filtered rows once and
//! works out page boundaries from the count.
//!
//! ```rust
//! use sift_query::Pagination;
//!
//! let pagination = Pagination::new().skip(40).take(20);
//! assert_eq!(pagination.to_sql(), "LIMIT 20 OFFSET 40");
//!
//! // page 3 of 20
//! assert_eq!(Pagination::page(3, 20), pagination);
//! ```
//!
//! Pages are 1-based. Asking for a page outside `1..=num_pages` is an error;
//! the paginator never clamps silently.

use serde::Serialize;
use std::fmt::Write;

use crate::error::{QueryError, QueryResult};
use crate::traits::FilterQuery;

/// Raw `LIMIT`/`OFFSET` settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    /// Number of records to skip.
    pub skip: Option<u64>,
    /// Maximum number of records to take.
    pub take: Option<u64>,
}

impl Pagination {
    /// Create a new pagination with no limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of records to skip.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Set the maximum number of records to take.
    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    /// The slice for a 1-based page.
    pub fn page(page: u64, page_size: u64) -> Self {
        Self {
            skip: Some(page.saturating_sub(1) * page_size),
            take: Some(page_size),
        }
    }

    /// Check if no limit or offset is set.
    pub fn is_empty(&self) -> bool {
        self.skip.is_none() && self.take.is_none()
    }

    /// Generate the `LIMIT`/`OFFSET` clause.
    pub fn to_sql(&self) -> String {
        let mut sql = String::with_capacity(48);
        self.write_sql(&mut sql);
        sql
    }

    /// Write the `LIMIT`/`OFFSET` clause to a buffer.
    pub fn write_sql(&self, buffer: &mut String) {
        if let Some(take) = self.take {
            let _ = write!(buffer, "LIMIT {}", take);
        }
        if let Some(skip) = self.skip {
            if self.take.is_some() {
                buffer.push(' ');
            }
            let _ = write!(buffer, "OFFSET {}", skip);
        }
    }
}

/// Serializable page summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// Total rows matching the query.
    pub count: u64,
    /// Rows per page. Equals `count` when the query is not paged.
    pub page_size: u64,
    /// Current page, starting at 1.
    pub page: u64,
    /// Total number of pages, at least 1.
    pub num_pages: u64,
    /// Whether a following page exists.
    pub has_next_page: bool,
    /// Whether a preceding page exists.
    pub has_prev_page: bool,
}

/// One page of a filtered query.
#[derive(Debug, Clone)]
pub struct Paginator<Q> {
    query: Q,
    page: u64,
    page_size: Option<u64>,
    count: u64,
    num_pages: u64,
}

impl<Q: FilterQuery> Paginator<Q> {
    /// Count `query` and position on `page`.
    ///
    /// `page_size = None` puts every row on a single page.
    pub fn new(query: Q, page: u64, page_size: Option<u64>) -> QueryResult<Self> {
        if page_size == Some(0) {
            return Err(QueryError::invalid_page_size(0));
        }
        let count = query.count()?;
        tracing::debug!(count, page, ?page_size, "counted rows for pagination");
        Self::with_count(query, page, page_size, count)
    }

    fn with_count(query: Q, page: u64, page_size: Option<u64>, count: u64) -> QueryResult<Self> {
        let num_pages = match page_size {
            Some(size) => count.div_ceil(size).max(1),
            None => 1,
        };
        if page == 0 || page > num_pages {
            return Err(QueryError::page_out_of_range(page, num_pages));
        }
        Ok(Self {
            query,
            page,
            page_size,
            count,
            num_pages,
        })
    }

    /// Total rows matching the query.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Current page.
    pub fn page(&self) -> u64 {
        self.page
    }

    /// Rows per page, if paged.
    pub fn page_size(&self) -> Option<u64> {
        self.page_size
    }

    /// Total number of pages.
    pub fn num_pages(&self) -> u64 {
        self.num_pages
    }

    /// The unsliced query.
    pub fn query(&self) -> &Q {
        &self.query
    }

    /// Whether a following page exists.
    pub fn has_next_page(&self) -> bool {
        self.page < self.num_pages
    }

    /// Whether a preceding page exists.
    pub fn has_previous_page(&self) -> bool {
        self.page > 1
    }

    /// The following page. Reuses the count.
    pub fn next_page(&self) -> QueryResult<Self> {
        Self::with_count(self.query.clone(), self.page + 1, self.page_size, self.count)
    }

    /// The preceding page. Reuses the count.
    pub fn previous_page(&self) -> QueryResult<Self> {
        Self::with_count(
            self.query.clone(),
            self.page.saturating_sub(1),
            self.page_size,
            self.count,
        )
    }

    /// The slice of this page.
    pub fn pagination(&self) -> Pagination {
        match self.page_size {
            Some(size) => Pagination::page(self.page, size),
            None => Pagination::new(),
        }
    }

    /// The query limited to this page.
    pub fn sliced_query(&self) -> Q {
        let slice = self.pagination();
        let mut query = self.query.clone();
        if let Some(take) = slice.take {
            query = query.limit(take);
        }
        if let Some(skip) = slice.skip {
            query = query.offset(skip);
        }
        query
    }

    /// Fetch the rows of this page.
    pub fn get_objects(&self) -> QueryResult<Vec<Q::Row>> {
        self.sliced_query().all()
    }

    /// Summary of this page.
    pub fn info(&self) -> PageInfo {
        PageInfo {
            count: self.count,
            page_size: self.page_size.unwrap_or(self.count),
            page: self.page,
            num_pages: self.num_pages,
            has_next_page: self.has_next_page(),
            has_prev_page: self.has_previous_page(),
        }
    }

    /// Summary of this page as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.info()).unwrap_or_default()
    }
}
