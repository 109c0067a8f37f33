//! Sort engine for listing entries.
//!
//! The sortable fields form a closed enum rather than a generic dotted-path
//! lookup: the nested raw values (`size.raw`, `modified.raw`) compare
//! numerically, the text fields compare case-insensitively, and fully
//! numeric text still compares as numbers so `9` sorts before `10`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::Entry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Name,
    Modified,
    Size,
    Type,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Compares two text values the way the listing UI expects: numerically when
/// both parse as finite numbers, otherwise case-insensitively with the raw
/// bytes as a deterministic tiebreak.
fn text_cmp(a: &str, b: &str) -> Ordering {
    if let (Ok(na), Ok(nb)) = (a.parse::<f64>(), b.parse::<f64>()) {
        if na.is_finite() && nb.is_finite() {
            return na.partial_cmp(&nb).unwrap_or(Ordering::Equal);
        }
    }

    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn entry_cmp(a: &Entry, b: &Entry, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => text_cmp(&a.name, &b.name),
        SortKey::Modified => a.modified.raw.cmp(&b.modified.raw),
        SortKey::Size => a.size.raw.cmp(&b.size.raw),
        SortKey::Type => text_cmp(a.kind.as_str(), b.kind.as_str()),
    }
}

/// Stably reorders `entries` in place by `key` in the given direction.
pub fn sort_entries(entries: &mut [Entry], key: SortKey, order: SortOrder) {
    entries.sort_by(|a, b| {
        let ordering = entry_cmp(a, b, key);
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}
