//! Client-side filter, sort and pagination over small cached listings.

use serde::Serialize;

pub trait Searchable {
    /// Text matched by the search box.
    fn search_text(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub direction: SortDirection,
    pub page: usize,
    pub page_size: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            search: None,
            direction: SortDirection::Ascending,
            page: 1,
            page_size: 10,
        }
    }
}

impl ListQuery {
    /// Filter by case-insensitive substring, sort by `key`, then cut out
    /// the requested page.
    pub fn apply<T, K, F>(&self, items: &[T], key: F) -> Page<T>
    where
        T: Searchable + Clone,
        K: Ord,
        F: Fn(&T) -> K,
    {
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
            .map(str::to_lowercase);

        let mut matching: Vec<T> = items
            .iter()
            .filter(|item| match &needle {
                Some(needle) => item.search_text().to_lowercase().contains(needle),
                None => true,
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ordering = key(a).cmp(&key(b));
            match self.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });

        paginate(matching, self.page, self.page_size)
    }
}

/// Out-of-range pages clamp to the nearest valid one; an empty list still
/// has one (empty) page.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);

    let items = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Page {
        items,
        page,
        page_size,
        total_items,
        total_pages,
    }
}
