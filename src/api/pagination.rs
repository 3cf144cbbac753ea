//! Pagination parameters for list endpoints

use serde::Deserialize;

/// Offset/limit pagination query parameters
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationParams {
    /// Maximum rows any list endpoint will return in one page
    pub const MAX_LIMIT: i64 = 500;

    /// Returns the clamped limit (default 100)
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, Self::MAX_LIMIT)
    }

    /// Returns the offset (never negative)
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let p = PaginationParams::default();
        assert_eq!(p.limit(), 100);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let p = PaginationParams {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(p.limit(), PaginationParams::MAX_LIMIT);
        assert_eq!(p.offset(), 0);

        let p = PaginationParams {
            limit: Some(0),
            offset: Some(40),
        };
        assert_eq!(p.limit(), 1);
        assert_eq!(p.offset(), 40);
    }
}
