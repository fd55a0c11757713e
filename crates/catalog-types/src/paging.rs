//! Page windows for document listing and search.

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Default number of hits per page
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: u32 = 50;

/// A 1-based page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    /// Build a validated page (`page >= 1`, `1 <= size <= 50`).
    pub fn new(page: u32, size: u32) -> Result<Self, TypesError> {
        let page = Self { page, size };
        page.validate()?;
        Ok(page)
    }

    pub fn validate(&self) -> Result<(), TypesError> {
        if self.page == 0 {
            return Err(TypesError::InvalidInput("page must be >= 1".to_string()));
        }
        if self.size == 0 || self.size > MAX_PAGE_SIZE {
            return Err(TypesError::InvalidInput(format!(
                "size must be 1-{}, got {}",
                MAX_PAGE_SIZE, self.size
            )));
        }
        Ok(())
    }

    /// Number of hits to skip.
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.size as u64
    }
}
