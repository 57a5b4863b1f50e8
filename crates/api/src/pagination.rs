//! Limit/offset pagination for list endpoints

use revu_common::config::PaginationConfig;
use serde::Deserialize;

/// Query parameters shared by all list endpoints
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl PageQuery {
    /// Resolve against configured defaults, clamping `limit` to the maximum
    pub fn resolve(&self, config: &PaginationConfig) -> (u64, u64) {
        let limit = self
            .limit
            .unwrap_or(config.default_limit)
            .clamp(1, config.max_limit);
        let offset = self.offset.unwrap_or(0);
        (limit, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PaginationConfig {
        PaginationConfig::default()
    }

    #[test]
    fn test_defaults() {
        let (limit, offset) = PageQuery::default().resolve(&config());
        assert_eq!(limit, 10);
        assert_eq!(offset, 0);
    }

    #[test]
    fn test_limit_clamped_to_max() {
        let query = PageQuery {
            limit: Some(10_000),
            offset: Some(20),
        };
        let (limit, offset) = query.resolve(&config());
        assert_eq!(limit, 100);
        assert_eq!(offset, 20);
    }

    #[test]
    fn test_zero_limit_raised_to_one() {
        let query = PageQuery {
            limit: Some(0),
            offset: None,
        };
        let (limit, _) = query.resolve(&config());
        assert_eq!(limit, 1);
    }
}
