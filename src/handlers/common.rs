use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

const MAX_PER_PAGE: u64 = 100;
/// Keeps the SQL offset well inside `i64`
const MAX_PAGE: u64 = 1_000_000;

/// Pagination parameters for list operations
#[derive(Debug, Clone, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationParams {
    /// Page and page size clamped to sane bounds
    pub fn normalized(&self) -> (u64, u64) {
        (
            self.page.clamp(1, MAX_PAGE),
            self.per_page.clamp(1, MAX_PER_PAGE),
        )
    }
}

pub fn total_pages(total: u64, per_page: u64) -> u64 {
    if per_page == 0 {
        0
    } else {
        total.div_ceil(per_page)
    }
}

/// Builds the list envelope from a page of items and the overall count
pub fn paginated<T>(
    items: Vec<T>,
    total: u64,
    page: u64,
    per_page: u64,
) -> crate::PaginatedResponse<T> {
    crate::PaginatedResponse {
        items,
        total,
        page,
        limit: per_page,
        total_pages: total_pages(total, per_page),
    }
}

/// Parses an optional enum-valued query parameter
pub fn parse_optional<T>(raw: Option<&str>, field: &str) -> Result<Option<T>, ServiceError>
where
    T: std::str::FromStr,
{
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ServiceError::InvalidInput(format!("invalid {}: {}", field, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::OrderStatus;

    #[test]
    fn pagination_is_clamped() {
        let params = PaginationParams {
            page: 0,
            per_page: 5000,
        };
        assert_eq!(params.normalized(), (1, MAX_PER_PAGE));
        let far = PaginationParams {
            page: u64::MAX,
            per_page: 20,
        };
        assert_eq!(far.normalized(), (MAX_PAGE, 20));
        assert_eq!(total_pages(41, 20), 3);
        assert_eq!(total_pages(0, 20), 0);
    }

    #[test]
    fn optional_enum_parsing() {
        assert_eq!(
            parse_optional::<OrderStatus>(Some("shipped"), "status").unwrap(),
            Some(OrderStatus::Shipped)
        );
        assert_eq!(parse_optional::<OrderStatus>(Some(" "), "status").unwrap(), None);
        assert!(parse_optional::<OrderStatus>(Some("lost"), "status").is_err());
    }
}
