//! Per-request directory listing model and pipeline stages.
//!
//! A [`Listing`] is built fresh for every directory request by
//! [`collect::collect`], mutated in place by the dot-file processor
//! ([`dotfile::apply`]) and the sort engine ([`sort::sort_entries`]), then
//! handed to the renderer and dropped. Nothing in here outlives a request.

pub mod collect;
pub mod dotfile;
pub mod sort;

use serde::Serialize;

/// Media classification of an entry, derived from its extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    pub fn is_media(self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Video)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Other => "other",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct EntrySize {
    pub raw: u64,
    pub readable: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct EntryModified {
    /// Unix seconds, rounded from the filesystem mtime.
    pub raw: i64,
    /// The two configured date renderings of the offset-adjusted mtime.
    pub formatted: [String; 2],
}

/// One file or directory in a listing.
#[derive(Clone, Debug, Serialize)]
pub struct Entry {
    pub media: bool,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub hidden: bool,
    /// Request-relative path, always with forward slashes.
    pub relative: String,
    pub name: String,
    /// Lowercased extension; `None` for directories.
    pub extension: Option<String>,
    pub size: EntrySize,
    pub modified: EntryModified,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Contents {
    pub files: Vec<Entry>,
    pub directories: Vec<Entry>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TotalStats {
    /// Sum of `size.raw` over files; directories contribute nothing.
    pub size: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct NewestStats {
    /// Largest `modified.raw` among files, or 0 when there are none.
    pub file: i64,
    /// Largest `modified.raw` among directories, or 0 when there are none.
    pub directory: i64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ListingStats {
    pub total: TotalStats,
    pub newest: NewestStats,
}

/// Collected, classified contents of one directory plus aggregates.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Listing {
    pub contents: Contents,
    pub stats: ListingStats,
}

impl Listing {
    /// Finds a file entry by exact name.
    pub fn file_position(&self, name: &str) -> Option<usize> {
        self.contents.files.iter().position(|f| f.name == name)
    }
}
