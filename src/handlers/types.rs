//! # Common API Types
//!
//! Shared response wrapper for list endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::repositories::Pagination;

/// Page of results from a limit/offset list endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    /// Items for the current page
    pub data: Vec<T>,
    /// Limit that was applied after clamping
    pub limit: u64,
    /// Rows skipped
    pub offset: u64,
    /// Offset of the next page; null when this page was not full
    pub next_offset: Option<u64>,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: Pagination) -> Self {
        let limit = page.limit();
        let offset = page.offset();
        let next_offset = (data.len() as u64 == limit).then(|| offset + limit);
        Self {
            data,
            limit,
            offset,
            next_offset,
        }
    }
}
