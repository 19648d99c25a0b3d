//! Cross-entity building blocks: soft-delete tag and pagination

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a stored status string does not match any known variant
#[derive(Debug, Clone, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Soft-delete tag carried by every deletable entity
///
/// Deleted records stay in storage for referential history; list queries
/// hide them unless the caller explicitly asks for deleted rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordState {
    #[default]
    Active,
    Deleted,
}

db_enum!(RecordState, "record_state" {
    Active => "active",
    Deleted => "deleted",
});

impl RecordState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Default page size for list endpoints
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Upper bound for page size
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pagination query parameters (1-based page)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Page number clamped to >= 1
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size clamped to 1..=MAX_PAGE_SIZE
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }
}

/// 分页响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    /// 数据列表
    pub data: Vec<T>,
    /// 总记录数
    pub total: u64,
    /// 当前页码
    pub page: u32,
    /// 每页数量
    pub limit: u32,
    /// 总页数
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: u64, query: &PageQuery) -> Self {
        let limit = query.limit();
        let total_pages = total.div_ceil(u64::from(limit)) as u32;
        Self {
            data,
            total,
            page: query.page(),
            limit,
            total_pages,
        }
    }

    /// Paginate an already filtered, ordered collection
    pub fn from_vec(all: Vec<T>, query: &PageQuery) -> Self {
        let total = all.len() as u64;
        let data = all
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .collect();
        Self::new(data, total, query)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResponse<U> {
        PaginatedResponse {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}
