use shared::domain::PageSize;

/// Pagination, sort and search input of one list view.
///
/// Every filter change (sort field, direction, page size, keyword) sends the
/// view back to page 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    page: u32,
    page_size: PageSize,
    sort_field: String,
    ascending: bool,
    keyword: String,
}

impl Default for QueryState {
    fn default() -> Self {
        Self::new(String::new(), PageSize::default())
    }
}

impl QueryState {
    pub fn new(sort_field: impl Into<String>, page_size: PageSize) -> Self {
        Self {
            page: 1,
            page_size,
            sort_field: sort_field.into(),
            ascending: true,
            keyword: String::new(),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn sort_field(&self) -> &str {
        &self.sort_field
    }

    pub fn ascending(&self) -> bool {
        self.ascending
    }

    /// Raw keyword as typed, before debouncing.
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Same field flips direction, a new field starts ascending.
    pub fn set_sort(&mut self, field: &str) {
        if self.sort_field == field {
            self.ascending = !self.ascending;
        } else {
            self.sort_field = field.to_string();
            self.ascending = true;
        }
        self.page = 1;
    }

    pub fn set_page_size(&mut self, size: PageSize) -> bool {
        if self.page_size == size {
            return false;
        }
        self.page_size = size;
        self.page = 1;
        true
    }

    pub fn set_keyword(&mut self, text: &str) -> bool {
        if self.keyword == text {
            return false;
        }
        self.keyword = text.to_string();
        self.page = 1;
        true
    }

    /// Moves to `page` if it lies within `1..=total_pages`.
    pub fn try_set_page(&mut self, page: u32, total_pages: u32) -> bool {
        if page < 1 || page > total_pages {
            return false;
        }
        self.page = page;
        true
    }

    pub(crate) fn reset_page(&mut self) {
        self.page = 1;
    }
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;
