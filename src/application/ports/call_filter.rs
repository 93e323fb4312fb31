use serde::Serialize;

use crate::domain::Call;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct CallFilter {
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    pub query: Option<String>,
}

impl CallFilter {
    pub fn new(page: Option<u32>, page_size: Option<u32>, query: Option<String>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
            query: query
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty()),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl Default for CallFilter {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CallPage {
    pub items: Vec<Call>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}
