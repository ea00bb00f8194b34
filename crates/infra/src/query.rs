//! Query parameters shared by the stores.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use carebill_billing::InvoiceStatus;
use carebill_core::{ClientId, SenderId};

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of rows to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    /// A single page of up to `limit` rows.
    pub fn first(limit: u32) -> Self {
        Self::new(Some(limit), None)
    }

    pub(crate) fn window<T: Clone>(&self, rows: &[T]) -> Vec<T> {
        rows.iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

/// Filter criteria for invoice listing; all fields are optional and combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFilter {
    pub client_id: Option<ClientId>,
    pub sender_id: Option<SenderId>,
    pub status: Option<InvoiceStatus>,
    /// Issue date on or after.
    pub start_date: Option<NaiveDate>,
    /// Issue date on or before.
    pub end_date: Option<NaiveDate>,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of rows matching the filter (across all pages).
    pub total: u64,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        (self.pagination.offset as u64 + self.items.len() as u64) < self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn caps_page_size() {
        assert_eq!(Pagination::new(Some(5000), None).limit, 1000);
        assert_eq!(Pagination::new(None, Some(3)), Pagination { limit: 50, offset: 3 });
    }

    #[test]
    fn windows_rows() {
        let rows: Vec<u32> = (0..10).collect();
        assert_eq!(Pagination::new(Some(3), Some(8)).window(&rows), vec![8, 9]);
    }

    #[test]
    fn reports_more_pages() {
        let page = Page {
            items: vec![1, 2],
            total: 5,
            pagination: Pagination::new(Some(2), Some(0)),
        };
        assert!(page.has_more());
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        #[test]
        fn pages_cover_all_rows_exactly_once(
            len in 0usize..300,
            limit in 1u32..80,
        ) {
            let rows: Vec<usize> = (0..len).collect();
            let mut seen = Vec::new();
            let mut offset = 0u32;
            loop {
                let pagination = Pagination::new(Some(limit), Some(offset));
                let page = Page {
                    items: pagination.window(&rows),
                    total: len as u64,
                    pagination,
                };
                prop_assert!(page.items.len() <= limit as usize);
                seen.extend(page.items.iter().copied());
                if !page.has_more() {
                    break;
                }
                offset += limit;
            }
            prop_assert_eq!(seen, rows);
        }
    }
}
