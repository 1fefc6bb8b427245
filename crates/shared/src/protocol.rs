use serde::{Deserialize, Serialize};

use crate::domain::PageSize;

/// Body of `GET /{Controller}` and `GET /{Controller}/search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_count: u64,
}

impl<T> PageEnvelope<T> {
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            total_pages: 0,
            total_count: 0,
        }
    }
}

/// Query string of a browse request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: u32,
    pub page_size: PageSize,
    pub ascending: bool,
    pub sort_field: String,
}

/// Query string of a search request. Search carries no sort parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub keyword: String,
    pub page: u32,
    pub page_size: PageSize,
}
