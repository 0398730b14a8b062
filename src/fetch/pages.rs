//! Infinite page feed with a page/selection cursor.
//!
//! Pages are appended by `load_more`; the feed stops asking once a page comes
//! back shorter than the page size. The cursor moves across loaded pages only.

use std::future::Future;

use tracing::{debug, warn};

use super::FetchFailure;
use crate::config::PagingConfig;

/// Outcome of a `load_more` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page with this many items was appended
    Loaded(usize),
    /// The last page was already reached; nothing was fetched
    Exhausted,
    /// The fetch failed; the error is kept on the feed
    Failed,
}

/// Pages fetched so far plus a cursor over them
#[derive(Debug)]
pub struct PageFeed<T> {
    pages: Vec<Vec<T>>,
    page_size: usize,
    has_more: bool,
    error: Option<FetchFailure>,
    /// Current page (0-indexed)
    page: usize,
    /// Currently selected index within the current page
    selected: usize,
}

impl<T> Default for PageFeed<T> {
    fn default() -> Self {
        Self::with_config(&PagingConfig::default())
    }
}

impl<T> PageFeed<T> {
    /// Create an empty feed expecting pages of `page_size` items
    pub fn new(page_size: usize) -> Self {
        Self {
            pages: Vec::new(),
            page_size: page_size.max(1),
            has_more: true,
            error: None,
            page: 0,
            selected: 0,
        }
    }

    pub fn with_config(paging: &PagingConfig) -> Self {
        Self::new(paging.page_size)
    }

    /// Fetch the next page.
    ///
    /// `fetch` receives the 0-indexed page number to load.
    pub async fn load_more<F, Fut>(&mut self, fetch: F) -> LoadOutcome
    where
        F: FnOnce(usize) -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<T>>>,
    {
        if !self.has_more {
            return LoadOutcome::Exhausted;
        }

        let index = self.pages.len();
        match fetch(index).await {
            Ok(items) => {
                let count = items.len();
                self.has_more = count >= self.page_size;
                self.error = None;
                if count > 0 {
                    self.pages.push(items);
                }
                debug!(page = index, count, has_more = self.has_more, "page loaded");
                LoadOutcome::Loaded(count)
            }
            Err(err) => {
                let failure = FetchFailure::from(err);
                warn!(page = index, error = %failure, "page fetch failed");
                self.error = Some(failure);
                LoadOutcome::Failed
            }
        }
    }

    /// Drop all pages and start over
    pub fn reset(&mut self) {
        self.pages.clear();
        self.has_more = true;
        self.error = None;
        self.page = 0;
        self.selected = 0;
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn error(&self) -> Option<&FetchFailure> {
        self.error.as_ref()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Get the total number of loaded items
    pub fn len(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// All loaded items in order
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.pages.iter().flatten()
    }

    /// Number of loaded pages (at least 1 for display)
    pub fn total_pages(&self) -> usize {
        self.pages.len().max(1)
    }

    /// Get the current page number (1-indexed for display)
    pub fn current_page(&self) -> usize {
        self.page + 1
    }

    /// Get the items on the current page
    pub fn current_page_items(&self) -> &[T] {
        self.pages.get(self.page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Get the currently selected item
    pub fn selected_item(&self) -> Option<&T> {
        self.current_page_items().get(self.selected)
    }

    /// Get the global index of the selected item
    pub fn selected_index(&self) -> usize {
        self.pages[..self.page.min(self.pages.len())]
            .iter()
            .map(Vec::len)
            .sum::<usize>()
            + self.selected
    }

    /// Move selection to the next item, wrapping to the first loaded page
    pub fn select_next(&mut self) {
        let page_items = self.current_page_items().len();
        if page_items == 0 {
            return;
        }

        if self.selected + 1 < page_items {
            self.selected += 1;
        } else if self.page + 1 < self.pages.len() {
            self.page += 1;
            self.selected = 0;
        } else {
            self.page = 0;
            self.selected = 0;
        }
    }

    /// Move selection to the previous item, wrapping to the last loaded page
    pub fn select_prev(&mut self) {
        if self.pages.is_empty() {
            return;
        }

        if self.selected > 0 {
            self.selected -= 1;
        } else {
            self.page = if self.page > 0 {
                self.page - 1
            } else {
                self.pages.len() - 1
            };
            self.selected = self.current_page_items().len().saturating_sub(1);
        }
    }

    /// Move to the next loaded page
    pub fn next_page(&mut self) {
        if self.page + 1 < self.pages.len() {
            self.page += 1;
            self.selected = 0;
        }
    }

    /// Move to the previous page
    pub fn prev_page(&mut self) {
        if self.page > 0 {
            self.page -= 1;
            self.selected = 0;
        }
    }
}
