//! Presentational state for the browser views
//!
//! DOM-free state the app glue drives: list pagination, location
//! selection, and the user-facing feedback line for assignment actions.
//! Rendering and timers stay in the platform layer.

use crate::api::PageInfo;
use crate::assignments::AssignError;

/// How long the search box waits for typing to settle before querying.
pub const SEARCH_DEBOUNCE_MS: i32 = 400;

/// First page of the character list.
pub const FIRST_PAGE: u32 = 1;

/// Search and pagination state for the character list view.
#[derive(Debug, Clone, Default)]
pub struct CharactersListModel {
    pub search: String,
    page: u32,
    total_pages: u32,
    has_next: bool,
    has_prev: bool,
}

impl CharactersListModel {
    pub fn new() -> Self {
        Self {
            page: FIRST_PAGE,
            ..Self::default()
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn has_prev(&self) -> bool {
        self.has_prev
    }

    /// The name filter to query with; empty search means no filter.
    pub fn name_filter(&self) -> Option<&str> {
        let trimmed = self.search.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// A new search term always restarts from the first page.
    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
        self.page = FIRST_PAGE;
    }

    /// Fold a fetched page's info into the pagination state.
    pub fn apply_page_info(&mut self, info: &PageInfo) {
        self.total_pages = info.pages;
        self.has_next = info.has_next();
        self.has_prev = info.has_prev();
    }

    /// Returns true when the page actually changed.
    pub fn go_to_next_page(&mut self) -> bool {
        if self.has_next {
            self.page += 1;
            true
        } else {
            false
        }
    }

    /// Returns true when the page actually changed.
    pub fn go_to_previous_page(&mut self) -> bool {
        if self.has_prev && self.page > FIRST_PAGE {
            self.page -= 1;
            true
        } else {
            false
        }
    }
}

/// Selected-location tracking for the by-location view.
///
/// The selection clears when no locations remain and snaps to the first
/// available location when the current one disappears (after an unassign
/// or a move that emptied it).
#[derive(Debug, Clone, Default)]
pub struct LocationBrowserModel {
    selected: Option<String>,
}

impl LocationBrowserModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn select(&mut self, location: impl Into<String>) {
        self.selected = Some(location.into());
    }

    /// Reconcile the selection against the current (sorted) location names.
    pub fn sync<'a>(&mut self, available: impl Iterator<Item = &'a str>) {
        let mut first = None;
        let mut current_exists = false;
        for name in available {
            if first.is_none() {
                first = Some(name);
            }
            if Some(name) == self.selected.as_deref() {
                current_exists = true;
            }
        }
        if !current_exists {
            self.selected = first.map(str::to_string);
        }
    }
}

/// Feedback line for the assignment panel.
pub mod feedback {
    use super::AssignError;

    pub fn assigned(location: &str) -> String {
        format!("Assigned to {location}.")
    }

    pub fn created(location: &str) -> String {
        format!("Location {location} created.")
    }

    pub fn unassigned() -> String {
        "Character released from its location.".to_string()
    }

    pub fn no_location_selected() -> String {
        "Pick an available location first.".to_string()
    }

    pub fn rejected(error: &AssignError) -> String {
        error.to_string()
    }
}
