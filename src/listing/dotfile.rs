//! The `.vitrine` per-directory control document.
//!
//! A directory may carry a JSON dot-file that hides entries (exact names or
//! `*`-wildcards), hides whole extensions, and overrides the page's
//! HTML-head metadata. The document is read fresh on every request and a
//! parse failure drops the whole document, never the request.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::paths::wildcard_expression;

use super::Listing;

/// One HTML-head directive: arbitrary attribute/value pairs, where the
/// `content` key is the directive's payload and everything else identifies
/// the slot it occupies (`name="viewport"`, `charset="utf-8"`, ...).
pub type MetadataItem = BTreeMap<String, Value>;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DotFile {
    /// Exact names or `*`-wildcards; directories match with a trailing `/`.
    pub ignore: Vec<String>,
    /// Extensions whose files are hidden.
    pub exclude: Vec<String>,
    pub metadata: Vec<MetadataItem>,
    #[serde(rename = "metadataBehavior")]
    pub metadata_behavior: Option<String>,
}

impl DotFile {
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

fn truthy_content(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Merges two metadata sets, the second winning.
///
/// Items are flattened into a `property -> value -> content` map, so after
/// the merge there is exactly one item per `(property, value)` pair. A
/// falsy or absent `content` clears that pair's content without removing
/// the pair itself.
pub fn merge_metadata(existing: &[MetadataItem], incoming: &[MetadataItem]) -> Vec<MetadataItem> {
    let mut merged: BTreeMap<String, BTreeMap<String, Option<String>>> = BTreeMap::new();

    for item in existing.iter().chain(incoming.iter()) {
        let content = truthy_content(item.get("content"));

        for (property, value) in item {
            if property == "content" {
                continue;
            }

            merged
                .entry(property.clone())
                .or_default()
                .insert(value_text(value), content.clone());
        }
    }

    merged
        .into_iter()
        .flat_map(|(property, values)| {
            values.into_iter().map(move |(value, content)| {
                let mut item = MetadataItem::new();
                item.insert(property.clone(), Value::String(value));
                if let Some(content) = content {
                    item.insert("content".to_string(), Value::String(content));
                }
                item
            })
        })
        .collect()
}

fn hide_ignored(listing: &mut Listing, patterns: &[String]) {
    // Keys are file names and directory names with a trailing slash, each
    // mapped back to (is_directory, index) so entries can be flagged.
    let mut keys: Vec<(String, bool, usize)> = Vec::new();

    for (index, file) in listing.contents.files.iter().enumerate() {
        keys.push((file.name.clone(), false, index));
    }
    for (index, dir) in listing.contents.directories.iter().enumerate() {
        keys.push((format!("{}/", dir.name), true, index));
    }

    let mut hide = |directory: bool, index: usize| {
        let entry = if directory {
            &mut listing.contents.directories[index]
        } else {
            &mut listing.contents.files[index]
        };
        entry.hidden = true;
    };

    for pattern in patterns {
        if pattern.is_empty() {
            continue;
        }

        if let Some((_, directory, index)) = keys.iter().find(|(key, _, _)| key == pattern) {
            hide(*directory, *index);
        } else if pattern.contains('*') {
            let Ok(regex) = wildcard_expression(pattern) else {
                continue;
            };

            for (key, directory, index) in &keys {
                if regex.is_match(key) {
                    hide(*directory, *index);
                }
            }
        }
    }
}

fn hide_excluded(listing: &mut Listing, extensions: &[String]) {
    let lowered: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();

    for file in &mut listing.contents.files {
        if let Some(extension) = &file.extension {
            if lowered.iter().any(|e| e == extension) {
                file.hidden = true;
            }
        }
    }
}

/// Applies a parsed dot-file to a listing.
///
/// Entry `hidden` flags are set in place; the metadata set is treated as an
/// immutable value and the (possibly replaced) set is returned.
pub fn apply(doc: &DotFile, listing: &mut Listing, metadata: &[MetadataItem]) -> Vec<MetadataItem> {
    if !doc.ignore.is_empty() {
        hide_ignored(listing, &doc.ignore);
    }

    if !doc.exclude.is_empty() {
        hide_excluded(listing, &doc.exclude);
    }

    if doc.metadata.is_empty() {
        return metadata.to_vec();
    }

    let behavior = doc
        .metadata_behavior
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_else(|| "overwrite".to_string());

    match behavior.as_str() {
        "overwrite" => merge_metadata(metadata, &doc.metadata),
        "replace" => doc.metadata.clone(),
        other => {
            tracing::debug!(behavior = other, "invalid metadataBehavior, ignoring metadata");
            metadata.to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{Contents, Entry, EntryModified, EntrySize, ListingStats, MediaKind};

    fn entry(name: &str, extension: Option<&str>) -> Entry {
        Entry {
            media: false,
            kind: MediaKind::Other,
            hidden: false,
            relative: format!("/{name}"),
            name: name.to_string(),
            extension: extension.map(str::to_string),
            size: EntrySize {
                raw: 0,
                readable: String::new(),
            },
            modified: EntryModified {
                raw: 0,
                formatted: [String::new(), String::new()],
            },
        }
    }

    fn listing() -> Listing {
        Listing {
            contents: Contents {
                files: vec![
                    entry("a.tmp", Some("tmp")),
                    entry("b.tmp", Some("tmp")),
                    entry("keep.txt", Some("txt")),
                    entry("build", Some("build")),
                ],
                directories: vec![entry("build", None), entry("sub", None)],
            },
            stats: ListingStats::default(),
        }
    }

    fn item(pairs: &[(&str, &str)]) -> MetadataItem {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn wildcard_hides_matching_files_only() {
        let mut listing = listing();
        let doc = DotFile {
            ignore: vec!["*.tmp".to_string()],
            ..Default::default()
        };
        apply(&doc, &mut listing, &[]);

        let hidden: Vec<bool> = listing.contents.files.iter().map(|f| f.hidden).collect();
        assert_eq!(hidden, vec![true, true, false, false]);
        assert!(listing.contents.directories.iter().all(|d| !d.hidden));
    }

    #[test]
    fn trailing_slash_targets_the_directory() {
        let mut listing = listing();
        let doc = DotFile {
            ignore: vec!["build/".to_string()],
            ..Default::default()
        };
        apply(&doc, &mut listing, &[]);

        // The file named "build" stays, the directory goes.
        assert!(!listing.contents.files.iter().any(|f| f.name == "build" && f.hidden));
        let build_dir = listing
            .contents
            .directories
            .iter()
            .find(|d| d.name == "build")
            .unwrap();
        assert!(build_dir.hidden);
    }

    #[test]
    fn bare_name_targets_the_file() {
        let mut listing = listing();
        let doc = DotFile {
            ignore: vec!["build".to_string()],
            ..Default::default()
        };
        apply(&doc, &mut listing, &[]);

        let build_file = listing
            .contents
            .files
            .iter()
            .find(|f| f.name == "build")
            .unwrap();
        assert!(build_file.hidden);
        assert!(listing.contents.directories.iter().all(|d| !d.hidden));
    }

    #[test]
    fn empty_patterns_are_skipped() {
        let mut listing = listing();
        let doc = DotFile {
            ignore: vec![String::new(), "keep.txt".to_string()],
            ..Default::default()
        };
        apply(&doc, &mut listing, &[]);

        assert!(listing.contents.files.iter().any(|f| f.name == "keep.txt" && f.hidden));
    }

    #[test]
    fn exclude_hides_by_extension_case_folded() {
        let mut listing = listing();
        let doc = DotFile {
            exclude: vec!["TMP".to_string()],
            ..Default::default()
        };
        apply(&doc, &mut listing, &[]);

        assert!(listing.contents.files[0].hidden);
        assert!(listing.contents.files[1].hidden);
        assert!(!listing.contents.files[2].hidden);
    }

    #[test]
    fn metadata_overwrite_deduplicates() {
        let existing = vec![item(&[("name", "viewport"), ("content", "A")])];
        let incoming = vec![item(&[("name", "viewport"), ("content", "B")])];

        let merged = merge_metadata(&existing, &incoming);

        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].get("name"),
            Some(&Value::String("viewport".to_string()))
        );
        assert_eq!(
            merged[0].get("content"),
            Some(&Value::String("B".to_string()))
        );
    }

    #[test]
    fn metadata_distinct_values_both_survive() {
        let existing = vec![item(&[("property", "og:type"), ("content", "website")])];
        let incoming = vec![item(&[("property", "og:title"), ("content", "Files")])];

        let merged = merge_metadata(&existing, &incoming);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn falsy_content_clears_the_slot() {
        let existing = vec![item(&[("name", "robots"), ("content", "noindex")])];
        let mut incoming_item = MetadataItem::new();
        incoming_item.insert("name".to_string(), Value::String("robots".to_string()));
        incoming_item.insert("content".to_string(), Value::Bool(false));

        let merged = merge_metadata(&existing, &[incoming_item]);

        assert_eq!(merged.len(), 1);
        assert!(!merged[0].contains_key("content"));
    }

    #[test]
    fn replace_behavior_swaps_wholesale() {
        let mut listing = listing();
        let doc = DotFile {
            metadata: vec![item(&[("name", "description"), ("content", "local")])],
            metadata_behavior: Some("replace".to_string()),
            ..Default::default()
        };

        let merged = apply(
            &doc,
            &mut listing,
            &[item(&[("name", "viewport"), ("content", "server")])],
        );

        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].get("name"),
            Some(&Value::String("description".to_string()))
        );
    }

    #[test]
    fn invalid_behavior_keeps_existing_metadata() {
        let mut listing = listing();
        let doc = DotFile {
            metadata: vec![item(&[("name", "description"), ("content", "local")])],
            metadata_behavior: Some("append".to_string()),
            ..Default::default()
        };

        let existing = vec![item(&[("name", "viewport"), ("content", "server")])];
        let merged = apply(&doc, &mut listing, &existing);

        assert_eq!(merged, existing);
    }

    #[test]
    fn malformed_document_fails_to_parse() {
        assert!(DotFile::parse("{not json").is_err());
        assert!(DotFile::parse("{\"ignore\": [null]}").is_err());
        assert!(DotFile::parse("{\"ignore\": [\"a\"], \"exclude\": []}").is_ok());
    }
}
