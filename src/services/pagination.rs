//! Page math and the paged response envelope.
//!
//! The envelope is the unit stored in the response cache: it is built after
//! assembly and visibility filtering, never from raw rows.

use serde::Serialize;

/// 1-indexed page request. Bounds are validated at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    /// Index range of this page within `total_rows` ordered rows.
    /// Empty once the offset runs past the end.
    pub fn window(&self, total_rows: usize) -> std::ops::Range<usize> {
        let offset = usize::try_from(self.offset()).unwrap_or(0);
        let limit = usize::try_from(self.limit()).unwrap_or(0);
        if offset >= total_rows {
            return total_rows..total_rows;
        }
        offset..(offset + limit).min(total_rows)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pager {
    pub page: i64,
    pub page_size: i64,
    pub total_rows: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageEnvelope<T> {
    pub list: Vec<T>,
    pub pager: Pager,
}

impl<T> PageEnvelope<T> {
    pub fn build(items: Vec<T>, page: PageRequest, total_rows: i64) -> Self {
        Self {
            list: items,
            pager: Pager {
                page: page.page,
                page_size: page.page_size,
                total_rows,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_follows_page_number() {
        for page in 1..=10 {
            for page_size in [1, 7, 20, 50] {
                let request = PageRequest::new(page, page_size);
                assert_eq!(request.offset(), (page - 1) * page_size);
                assert_eq!(request.limit(), page_size);
            }
        }
    }

    #[test]
    fn window_length_is_bounded_by_remaining_rows() {
        let total = 45;
        for page in 1..=5 {
            let request = PageRequest::new(page, 20);
            let window = request.window(total);
            let offset = ((page - 1) * 20) as usize;
            let expected = if offset < total {
                20.min(total - offset)
            } else {
                0
            };
            assert_eq!(window.len(), expected, "page {}", page);
        }
    }

    #[test]
    fn envelope_serializes_list_and_pager() {
        let envelope = PageEnvelope::build(vec![1, 2, 3], PageRequest::new(2, 3), 9);
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "list": [1, 2, 3],
                "pager": { "page": 2, "page_size": 3, "total_rows": 9 }
            })
        );
    }
}
