//! Theme pool discovery.
//!
//! Runs once during startup, before the listener opens. Top-level `*.css`
//! files and one-level theme directories containing stylesheets each
//! contribute a pool entry keyed by the lowercased file stem and valued by
//! the URL it is served under.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{Config, ThemesConfig};
use crate::listing::collect::scan;
use crate::prefs::ThemeSettings;

/// URL prefix the theme stylesheets are mounted on.
pub const THEMES_ROUTE: &str = "/themes";

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    }
}

/// Scans `location` for stylesheets. Returns `None` when the directory is
/// unreadable or contributes nothing, which disables theming.
pub async fn load_theme_pool(location: &Path) -> Option<BTreeMap<String, String>> {
    let mut pool = BTreeMap::new();

    let entries = match scan(location, None).await {
        Ok(entries) => entries,
        Err(error) => {
            tracing::error!(path = %location.display(), %error, "loading themes failed");
            return None;
        }
    };

    for entry in entries {
        let full = location.join(&entry.name);
        let Ok(metadata) = tokio::fs::symlink_metadata(&full).await else {
            continue;
        };

        if metadata.is_file() && entry.extension == "css" {
            pool.insert(
                strip_extension(&entry.name).to_lowercase(),
                format!("{THEMES_ROUTE}/{}", entry.name),
            );
        } else if metadata.is_dir() {
            // A theme directory: every stylesheet inside joins the pool.
            let Ok(children) = scan(&full, Some(&["css"])).await else {
                continue;
            };

            for child in children {
                pool.insert(
                    strip_extension(&child.name).to_lowercase(),
                    format!("{THEMES_ROUTE}/{}/{}", entry.name, child.name),
                );
            }
        }
    }

    if pool.is_empty() {
        None
    } else {
        Some(pool)
    }
}

/// Resolves the configured theme directory into the template's theme
/// settings. The configured default is honored only when the pool actually
/// contains it.
pub async fn resolve_themes(config: &Config) -> Option<ThemeSettings> {
    let themes: &ThemesConfig = config.style.themes.as_ref()?;
    let pool = load_theme_pool(&themes.path).await?;

    let set = themes
        .default
        .as_deref()
        .map(str::to_lowercase)
        .filter(|name| pool.contains_key(name));

    tracing::debug!(count = pool.len(), "loaded theme pool");

    Some(ThemeSettings {
        path: format!("{THEMES_ROUTE}/"),
        pool,
        set,
    })
}
