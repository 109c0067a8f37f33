//! Directory scanning and collection.
//!
//! Builds the [`Listing`] for one directory request: scan, stat, filter,
//! classify, and aggregate. Stats for the individual entries run as one
//! concurrent batch per request; a single failing entry is logged and
//! skipped rather than failing the whole collection.

use std::path::{Path, PathBuf};

use regex::Regex;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::format::{format_date, offset_timestamp, readable_size};
use crate::paths::join_relative;

use super::{Contents, Entry, EntryModified, EntrySize, Listing, ListingStats, MediaKind};

/// Reserved per-directory control file. The only name beginning with a dot
/// that survives the scan, so it can be discovered, processed, and then
/// hidden by the visibility pass.
pub const DOT_FILE: &str = ".vitrine";

/// A directory as the request handler sees it: the canonical filesystem
/// location and the request-relative path used for links.
#[derive(Clone, Debug)]
pub struct PathInfo {
    pub real: PathBuf,
    pub relative: String,
}

#[derive(Clone, Debug)]
pub struct ScanEntry {
    pub name: String,
    /// Lowercased text after the final dot (the whole name when undotted).
    pub extension: String,
}

fn scan_extension(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_lowercase()
}

fn is_reserved_name(name: &str) -> bool {
    (name.starts_with('.') || name.starts_with('$') || name.contains('#')) && name != DOT_FILE
}

/// Lists a directory, dropping reserved names and optionally anything whose
/// extension is not in `include`.
pub async fn scan(path: &Path, include: Option<&[&str]>) -> std::io::Result<Vec<ScanEntry>> {
    let mut reader = tokio::fs::read_dir(path).await?;
    let mut entries = Vec::new();

    while let Some(dir_entry) = reader.next_entry().await? {
        let name = dir_entry.file_name().to_string_lossy().into_owned();

        if is_reserved_name(&name) {
            continue;
        }

        let extension = scan_extension(&name);

        if let Some(include) = include {
            if !include.iter().any(|ext| *ext == extension) {
                continue;
            }
        }

        entries.push(ScanEntry { name, extension });
    }

    Ok(entries)
}

struct StatEntry {
    name: String,
    extension: String,
    directory: bool,
    size: u64,
    modified: i64,
}

fn filter_regex(pattern: &str, sensitive: bool) -> Option<Regex> {
    let source = if sensitive {
        pattern.to_string()
    } else {
        format!("(?i){pattern}")
    };

    match Regex::new(&source) {
        Ok(regex) => Some(regex),
        Err(error) => {
            tracing::warn!(pattern, %error, "invalid filter pattern, skipping");
            None
        }
    }
}

fn apply_filters(files: Vec<StatEntry>, config: &Config) -> Vec<StatEntry> {
    let file_regex = config
        .filter
        .file
        .as_deref()
        .and_then(|p| filter_regex(p, config.filter.sensitive));
    let directory_regex = config
        .filter
        .directory
        .as_deref()
        .and_then(|p| filter_regex(p, config.filter.sensitive));

    files
        .into_iter()
        .filter(|entry| {
            if !entry.directory && config.is_excluded_extension(&entry.extension) {
                return false;
            }

            if entry.directory {
                if let Some(regex) = &directory_regex {
                    return regex.is_match(&entry.name);
                }
            } else if let Some(regex) = &file_regex {
                return regex.is_match(&entry.name);
            }

            true
        })
        .collect()
}

/// Collects the listing for one directory.
///
/// `timezone_offset_seconds` is the client's offset, applied to each mtime
/// before date formatting. The returned entry order equals the directory
/// read order; sorting is a separate, later stage.
pub async fn collect(
    path: &PathInfo,
    config: &Config,
    timezone_offset_seconds: i64,
) -> std::io::Result<Listing> {
    let scanned = scan(&path.real, None).await?;

    // Stat every entry concurrently, then restore the scan order.
    let mut stats = JoinSet::new();

    for (index, entry) in scanned.into_iter().enumerate() {
        let target = path.real.join(&entry.name);
        stats.spawn(async move { (index, entry, tokio::fs::metadata(&target).await) });
    }

    let mut slots: Vec<Option<StatEntry>> = (0..stats.len()).map(|_| None).collect();

    while let Some(joined) = stats.join_next().await {
        let Ok((index, entry, result)) = joined else {
            continue;
        };

        match result {
            Ok(metadata) => {
                let directory = !metadata.is_file();
                let modified_ms = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_millis())
                    .unwrap_or(0);

                slots[index] = Some(StatEntry {
                    name: entry.name,
                    extension: entry.extension,
                    directory,
                    size: if directory { 0 } else { metadata.len() },
                    modified: ((modified_ms as f64) / 1000.0).round() as i64,
                });
            }
            Err(error) => {
                tracing::warn!(name = %entry.name, %error, "stat failed, skipping entry");
            }
        }
    }

    let mut entries: Vec<StatEntry> = slots.into_iter().flatten().collect();

    if config.filter.is_configured() || config.exclude.is_some() {
        entries = apply_filters(entries, config);
    }

    let date_formats = config.format.date_formats();
    let mut listing = Listing {
        contents: Contents::default(),
        stats: ListingStats::default(),
    };

    for entry in entries {
        let kind = if config.media.image.contains(&entry.extension) {
            MediaKind::Image
        } else if config.media.video.contains(&entry.extension) {
            MediaKind::Video
        } else {
            MediaKind::Other
        };

        let newest = if entry.directory {
            &mut listing.stats.newest.directory
        } else {
            &mut listing.stats.newest.file
        };
        if entry.modified > *newest {
            *newest = entry.modified;
        }

        listing.stats.total.size += entry.size;

        let adjusted = offset_timestamp(timezone_offset_seconds, entry.modified);
        let formatted = [
            format_date(&date_formats[0], adjusted),
            format_date(&date_formats[1], adjusted),
        ];

        let built = Entry {
            media: kind.is_media(),
            kind,
            hidden: false,
            relative: join_relative(&path.relative, &entry.name),
            name: entry.name,
            extension: (!entry.directory).then_some(entry.extension),
            size: EntrySize {
                raw: entry.size,
                readable: readable_size(&config.format.sizes, entry.size),
            },
            modified: EntryModified {
                raw: entry.modified,
                formatted,
            },
        };

        if entry.directory {
            listing.contents.directories.push(built);
        } else {
            listing.contents.files.push(built);
        }
    }

    Ok(listing)
}
