//! Client preferences and the per-request page configuration.
//!
//! The server builds one [`PageConfig`] template at startup. Each request
//! reads the preference cookie (absent or malformed means "no preferences"),
//! overlays the few whitelisted fields onto a copy of the template, and
//! stamps in the request-computed values. The client can never introduce a
//! key the template does not carry, and wrong-shaped values are skipped
//! rather than rejected: preferences only affect presentation.

use std::collections::BTreeMap;

use axum::http::{header, HeaderMap};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::listing::sort::{SortKey, SortOrder};

/// Name of the preference cookie.
pub const COOKIE_NAME: &str = "vitrine";

// ---------------------------------------------------------------------------
// Cookie payload
// ---------------------------------------------------------------------------

/// The browser-owned preference document. Every field is optional and every
/// leaf is validated at use, so a cookie written by an older or newer UI
/// build degrades to defaults instead of erroring.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ClientPrefs {
    pub sort: Option<SortPref>,
    pub style: Option<StylePref>,
    pub readme: Option<ReadmePref>,
    /// Minutes, as produced by `Date.getTimezoneOffset()`.
    #[serde(rename = "timezoneOffset")]
    pub timezone_offset: Option<Value>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SortPref {
    pub row: Option<Value>,
    pub ascending: Option<Value>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct StylePref {
    pub compact: Option<Value>,
    /// A theme name, or `false` to reset to the default.
    pub theme: Option<Value>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ReadmePref {
    pub toggled: Option<Value>,
}

impl ClientPrefs {
    /// Reads the preference cookie from the request headers. Anything that
    /// fails to parse is treated as an empty preference set.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        for header_value in headers.get_all(header::COOKIE) {
            let Ok(cookies) = header_value.to_str() else {
                continue;
            };

            for pair in cookies.split(';') {
                let Some((name, value)) = pair.trim().split_once('=') else {
                    continue;
                };

                if name != COOKIE_NAME {
                    continue;
                }

                let decoded = percent_decode_str(value).decode_utf8_lossy();
                return serde_json::from_str(&decoded).unwrap_or_default();
            }
        }

        Self::default()
    }

    /// The client timezone offset in seconds, defaulting to zero.
    pub fn timezone_offset_seconds(&self) -> i64 {
        self.timezone_offset
            .as_ref()
            .and_then(Value::as_f64)
            .map(|minutes| (minutes * 60.0) as i64)
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Page configuration
// ---------------------------------------------------------------------------

/// The configuration handed to the template and mirrored to the browser
/// scripts as JSON. Shaped exactly like the server template; see
/// [`PageConfig::resolve`] for the whitelist of client-controlled fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    /// Whether this response crossed the virtualized-rendering threshold.
    pub performance: bool,
    pub format: FormatSettings,
    pub preview: PreviewSettings,
    pub sorting: SortingSettings,
    pub gallery: GallerySettings,
    pub extensions: ExtensionSettings,
    pub icon: IconSettings,
    pub style: StyleSettings,
    pub readme: ReadmeSettings,
    /// Server-computed UTC timestamp, fresh per request.
    pub timestamp: i64,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatSettings {
    pub sizes: Vec<String>,
    pub date: [String; 2],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSettings {
    pub enabled: bool,
    pub hover_delay: u64,
    pub cursor_indicator: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortingSettings {
    pub enabled: bool,
    pub types: u8,
    pub sort_by: SortKey,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GallerySettings {
    pub enabled: bool,
    pub reverse_options: bool,
    pub scroll_interval: u64,
    pub list_alignment: u8,
    pub fit_content: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSettings {
    pub image: Vec<String>,
    pub video: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IconSettings {
    pub path: Option<String>,
    pub mime: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSettings {
    pub themes: Option<ThemeSettings>,
    pub compact: bool,
}

/// Theme pool discovered at startup; `None` at the `StyleSettings` level
/// means theming is disabled entirely.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSettings {
    /// URL prefix the stylesheets are served under.
    pub path: String,
    /// Theme name -> stylesheet URL.
    pub pool: BTreeMap<String, String>,
    /// Currently selected theme, if any.
    pub set: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadmeSettings {
    pub toggled: bool,
}

impl PageConfig {
    /// Builds the server-side template from the frozen configuration plus
    /// the startup-discovered theme pool and favicon.
    pub fn template(config: &Config, themes: Option<ThemeSettings>, icon: IconSettings) -> Self {
        Self {
            performance: false,
            format: FormatSettings {
                sizes: config.format.sizes.clone(),
                date: config.format.date_formats(),
            },
            preview: PreviewSettings {
                enabled: config.preview.enabled,
                hover_delay: config.preview.hover_delay,
                cursor_indicator: config.preview.cursor_indicator,
            },
            sorting: SortingSettings {
                enabled: config.sorting.enabled,
                types: config.sorting.types,
                sort_by: config.sorting.sort_by,
                order: config.sorting.order,
            },
            gallery: GallerySettings {
                enabled: config.gallery.enabled,
                reverse_options: config.gallery.reverse_options,
                scroll_interval: config.gallery.scroll_interval,
                list_alignment: config.gallery.list_alignment,
                fit_content: config.gallery.fit_content,
            },
            extensions: ExtensionSettings {
                image: config.media.image.clone(),
                video: config.media.video.clone(),
            },
            icon,
            style: StyleSettings {
                themes,
                compact: config.style.compact,
            },
            readme: ReadmeSettings {
                toggled: config.readme.toggled,
            },
            timestamp: 0,
            debug: config.debug,
        }
    }

    /// Overlays client preferences onto a copy of the template.
    ///
    /// Only the whitelisted fields move across, and only when the value has
    /// the right shape; everything else stays at the server default.
    pub fn resolve(&self, client: &ClientPrefs) -> PageConfig {
        let mut resolved = self.clone();

        if let Some(style) = &client.style {
            if let Some(compact) = style.compact.as_ref().and_then(Value::as_bool) {
                resolved.style.compact = compact;
            }

            if let Some(themes) = resolved.style.themes.as_mut() {
                if let Some(theme) = &style.theme {
                    themes.set = theme
                        .as_str()
                        .filter(|name| !name.is_empty())
                        .map(str::to_string);
                }
            }
        }

        if let Some(sort) = &client.sort {
            if let Some(row) = sort.row.as_ref().and_then(Value::as_i64) {
                let key = match row {
                    0 => Some(SortKey::Name),
                    1 => Some(SortKey::Modified),
                    2 => Some(SortKey::Size),
                    3 => Some(SortKey::Type),
                    _ => None,
                };

                if let Some(key) = key {
                    resolved.sorting.sort_by = key;
                    resolved.sorting.enabled = true;
                }
            }

            if let Some(ascending) = sort.ascending.as_ref().and_then(Value::as_i64) {
                if ascending == 0 || ascending == 1 {
                    resolved.sorting.order = if ascending == 1 {
                        SortOrder::Asc
                    } else {
                        SortOrder::Desc
                    };
                    resolved.sorting.enabled = true;
                }
            }
        }

        if let Some(readme) = &client.readme {
            if let Some(toggled) = readme.toggled.as_ref().and_then(Value::as_bool) {
                resolved.readme.toggled = toggled;
            }
        }

        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn template() -> PageConfig {
        let mut pool = BTreeMap::new();
        pool.insert("dark".to_string(), "/themes/dark.css".to_string());

        PageConfig::template(
            &Config::default(),
            Some(ThemeSettings {
                path: "/themes/".to_string(),
                pool,
                set: None,
            }),
            IconSettings {
                path: None,
                mime: "image/png".to_string(),
            },
        )
    }

    fn cookie_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{COOKIE_NAME}={value}")).unwrap(),
        );
        headers
    }

    fn prefs(json: &str) -> ClientPrefs {
        ClientPrefs::from_headers(&cookie_headers(json))
    }

    #[test]
    fn missing_cookie_is_empty() {
        let prefs = ClientPrefs::from_headers(&HeaderMap::new());
        assert!(prefs.sort.is_none());
        assert_eq!(prefs.timezone_offset_seconds(), 0);
    }

    #[test]
    fn malformed_cookie_is_empty() {
        let prefs = prefs("{broken json!");
        assert!(prefs.sort.is_none() && prefs.style.is_none());
    }

    #[test]
    fn url_encoded_cookie_parses() {
        let prefs = prefs("%7B%22timezoneOffset%22%3A-120%7D");
        assert_eq!(prefs.timezone_offset_seconds(), -7200);
    }

    #[test]
    fn sort_row_maps_by_position_and_enables() {
        let resolved = template().resolve(&prefs(r#"{"sort":{"row":2}}"#));
        assert_eq!(resolved.sorting.sort_by, SortKey::Size);
        assert!(resolved.sorting.enabled);

        let resolved = template().resolve(&prefs(r#"{"sort":{"row":3,"ascending":0}}"#));
        assert_eq!(resolved.sorting.sort_by, SortKey::Type);
        assert_eq!(resolved.sorting.order, SortOrder::Desc);
    }

    #[test]
    fn out_of_range_row_is_ignored() {
        let resolved = template().resolve(&prefs(r#"{"sort":{"row":7}}"#));
        assert_eq!(resolved.sorting.sort_by, SortKey::Name);
        assert!(!resolved.sorting.enabled);
    }

    #[test]
    fn ascending_alone_enables_sorting() {
        let resolved = template().resolve(&prefs(r#"{"sort":{"ascending":1}}"#));
        assert_eq!(resolved.sorting.order, SortOrder::Asc);
        assert!(resolved.sorting.enabled);
    }

    #[test]
    fn compact_requires_a_boolean() {
        let resolved = template().resolve(&prefs(r#"{"style":{"compact":true}}"#));
        assert!(resolved.style.compact);

        let resolved = template().resolve(&prefs(r#"{"style":{"compact":"yes"}}"#));
        assert!(!resolved.style.compact);
    }

    #[test]
    fn theme_name_is_applied_and_falsy_resets() {
        let resolved = template().resolve(&prefs(r#"{"style":{"theme":"dark"}}"#));
        assert_eq!(
            resolved.style.themes.unwrap().set,
            Some("dark".to_string())
        );

        let resolved = template().resolve(&prefs(r#"{"style":{"theme":false}}"#));
        assert_eq!(resolved.style.themes.unwrap().set, None);
    }

    #[test]
    fn theme_ignored_when_server_has_no_pool() {
        let base = PageConfig::template(
            &Config::default(),
            None,
            IconSettings {
                path: None,
                mime: "image/png".to_string(),
            },
        );

        let resolved = base.resolve(&prefs(r#"{"style":{"theme":"dark"}}"#));
        assert!(resolved.style.themes.is_none());
    }

    #[test]
    fn readme_toggle_passes_through() {
        let resolved = template().resolve(&prefs(r#"{"readme":{"toggled":false}}"#));
        assert!(!resolved.readme.toggled);
    }

    #[test]
    fn unknown_keys_cannot_reach_the_config() {
        let resolved = template().resolve(&prefs(r#"{"foo":"bar","style":{"foo":1}}"#));
        let json = serde_json::to_string(&resolved).unwrap();
        assert!(!json.contains("foo"));
        assert!(!json.contains("bar"));
    }

    #[test]
    fn template_reflects_server_defaults() {
        let page = template();
        assert!(!page.performance);
        assert!(page.gallery.enabled);
        assert_eq!(page.format.date[0], "d/m/y H:i");
        assert!(!page.sorting.enabled);
    }
}
