pub mod protected;
pub mod public;

use serde::Deserialize;

/// Common `?page=&limit=` query parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Returns `(limit, offset)` with limit clamped to 1..=100.
    pub fn window(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(20).clamp(1, 100);
        let page = self.page.unwrap_or(1).max(1);
        (limit, (page - 1) * limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_window_clamps() {
        let (limit, offset) = Pagination {
            page: Some(3),
            limit: Some(500),
        }
        .window();
        assert_eq!(limit, 100);
        assert_eq!(offset, 200);

        let (limit, offset) = Pagination {
            page: None,
            limit: None,
        }
        .window();
        assert_eq!(limit, 20);
        assert_eq!(offset, 0);
    }
}
