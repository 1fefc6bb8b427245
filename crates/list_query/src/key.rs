use std::fmt;

use shared::{
    domain::{PageSize, Resource},
    protocol::{ListParams, SearchParams},
};

use crate::query::QueryState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    Browse,
    Search,
}

impl FetchMode {
    pub fn for_keyword(debounced_keyword: &str) -> Self {
        if debounced_keyword.trim().is_empty() {
            FetchMode::Browse
        } else {
            FetchMode::Search
        }
    }
}

/// Identity of one fetchable page.
///
/// Browse keys carry the sort and no keyword. Search keys carry the keyword
/// and no sort: the search endpoint takes no sort parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub resource: Resource,
    pub mode: FetchMode,
    pub keyword: Option<String>,
    pub page: u32,
    pub page_size: PageSize,
    pub sort_field: Option<String>,
    pub ascending: Option<bool>,
}

impl FetchKey {
    pub fn derive(resource: Resource, state: &QueryState, debounced_keyword: &str) -> Self {
        match FetchMode::for_keyword(debounced_keyword) {
            FetchMode::Search => Self {
                resource,
                mode: FetchMode::Search,
                keyword: Some(debounced_keyword.to_string()),
                page: state.page(),
                page_size: state.page_size(),
                sort_field: None,
                ascending: None,
            },
            FetchMode::Browse => Self {
                resource,
                mode: FetchMode::Browse,
                keyword: None,
                page: state.page(),
                page_size: state.page_size(),
                sort_field: Some(state.sort_field().to_string()),
                ascending: Some(state.ascending()),
            },
        }
    }

    /// Same mode and filters, different page.
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    pub(crate) fn request(&self) -> FetchRequest {
        match self.mode {
            FetchMode::Search => FetchRequest::Search(SearchParams {
                keyword: self.keyword.clone().unwrap_or_default(),
                page: self.page,
                page_size: self.page_size,
            }),
            FetchMode::Browse => FetchRequest::List(ListParams {
                page: self.page,
                page_size: self.page_size,
                ascending: self.ascending.unwrap_or(true),
                sort_field: self.sort_field.clone().unwrap_or_default(),
            }),
        }
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            FetchMode::Search => write!(
                f,
                "{}/search?keyword={:?}&page={}&pageSize={}",
                self.resource,
                self.keyword.as_deref().unwrap_or_default(),
                self.page,
                self.page_size
            ),
            FetchMode::Browse => write!(
                f,
                "{}?page={}&pageSize={}&sortField={}&ascending={}",
                self.resource,
                self.page,
                self.page_size,
                self.sort_field.as_deref().unwrap_or_default(),
                self.ascending.unwrap_or(true)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FetchRequest {
    List(ListParams),
    Search(SearchParams),
}

/// Selects a family of cache entries for invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePrefix {
    pub resource: Resource,
    pub mode: Option<FetchMode>,
}

impl CachePrefix {
    pub fn resource(resource: Resource) -> Self {
        Self {
            resource,
            mode: None,
        }
    }

    pub fn mode(resource: Resource, mode: FetchMode) -> Self {
        Self {
            resource,
            mode: Some(mode),
        }
    }

    pub fn matches(&self, key: &FetchKey) -> bool {
        key.resource == self.resource && self.mode.map_or(true, |mode| mode == key.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_keyword_browses() {
        assert_eq!(FetchMode::for_keyword(""), FetchMode::Browse);
        assert_eq!(FetchMode::for_keyword("   "), FetchMode::Browse);
        assert_eq!(FetchMode::for_keyword(" algo "), FetchMode::Search);
    }

    #[test]
    fn search_keys_drop_sort_and_browse_keys_drop_keyword() {
        let state = QueryState::new("name", PageSize::Ten);

        let browse = FetchKey::derive(Resource::Course, &state, "  ");
        assert_eq!(browse.mode, FetchMode::Browse);
        assert_eq!(browse.keyword, None);
        assert_eq!(browse.sort_field.as_deref(), Some("name"));
        assert_eq!(browse.ascending, Some(true));

        let search = FetchKey::derive(Resource::Course, &state, "algo");
        assert_eq!(search.mode, FetchMode::Search);
        assert_eq!(search.keyword.as_deref(), Some("algo"));
        assert_eq!(search.sort_field, None);
        assert_eq!(search.ascending, None);
        assert_ne!(browse, search);
    }

    #[test]
    fn prefix_matches_resource_and_optional_mode() {
        let state = QueryState::new("name", PageSize::Ten);
        let browse = FetchKey::derive(Resource::Lesson, &state, "");
        let search = FetchKey::derive(Resource::Lesson, &state, "intro");

        assert!(CachePrefix::resource(Resource::Lesson).matches(&browse));
        assert!(CachePrefix::resource(Resource::Lesson).matches(&search));
        assert!(!CachePrefix::resource(Resource::Course).matches(&browse));
        assert!(!CachePrefix::mode(Resource::Lesson, FetchMode::Search).matches(&browse));
    }

    #[test]
    fn search_request_omits_sort() {
        let state = QueryState::new("name", PageSize::Twenty);
        let key = FetchKey::derive(Resource::Problem, &state, "graph");
        assert_eq!(
            key.with_page(3).request(),
            FetchRequest::Search(SearchParams {
                keyword: "graph".into(),
                page: 3,
                page_size: PageSize::Twenty,
            })
        );
    }
}
