//! Ordinal quick-pick over the first few entries.

use serde::Serialize;

use crate::entry::{paths_equal, Entry};

/// Default number of entries offered.
pub const DEFAULT_LIMIT: usize = 9;

/// One row of the quick-pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickItem {
    /// 1-based position, usable as a selector.
    pub ordinal: usize,
    pub title: String,
    pub path: String,
    pub active: bool,
}

/// The offered rows plus the row to preselect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuickPick {
    pub items: Vec<PickItem>,
    pub selected: usize,
}

impl QuickPick {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Currently selected row.
    pub fn current(&self) -> Option<&PickItem> {
        self.items.get(self.selected)
    }

    /// Move the selection to the next row, wrapping.
    pub fn advance(&mut self) {
        self.selected = advance(self.selected, self.items.len());
    }
}

/// Build the quick-pick for `entries`, preselecting `active` when offered.
pub fn quick_pick(entries: &[Entry], active: Option<&str>, limit: usize) -> QuickPick {
    let items: Vec<PickItem> = entries
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, entry)| PickItem {
            ordinal: i + 1,
            title: entry.title().to_string(),
            path: entry.path().to_string(),
            active: active.is_some_and(|a| paths_equal(a, entry.path())),
        })
        .collect();
    let selected = items.iter().position(|item| item.active).unwrap_or(0);
    QuickPick { items, selected }
}

/// Next index after `index` in a list of `len`, wrapping to 0.
pub fn advance(index: usize, len: usize) -> usize {
    if len == 0 || index + 1 >= len {
        0
    } else {
        index + 1
    }
}
