//! Startup-only server configuration.
//!
//! Loaded once from a TOML file (plus CLI overrides), validated, enriched
//! with the discovered theme pool and favicon, and then frozen behind an
//! `Arc` for the lifetime of the process. Nothing on the request path ever
//! writes to it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::listing::dotfile::MetadataItem;
use crate::listing::sort::{SortKey, SortOrder};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Root directory does not exist: {0}")]
    RootMissing(PathBuf),
    #[error("Root path is not a directory: {0}")]
    RootNotDirectory(PathBuf),
    #[error("Compiled asset directory does not exist: {0}")]
    AssetsMissing(PathBuf),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    /// Basic-auth user map; absent means the server is open.
    pub auth: Option<AuthConfig>,
    pub format: FormatConfig,
    pub sorting: SortingConfig,
    pub gallery: GalleryConfig,
    pub preview: PreviewConfig,
    pub readme: ReadmeConfig,
    pub media: MediaConfig,
    pub style: StyleConfig,
    /// Custom favicon; falls back to whatever the asset bundle ships.
    pub icon: Option<IconConfig>,
    pub filter: FilterConfig,
    /// File-count threshold that flips the client into virtualized
    /// rendering. 0 disables performance mode entirely.
    pub performance: u32,
    /// Extensions excluded from listings and from direct file serving.
    pub exclude: Option<Vec<String>>,
    /// Extra HTML-head directives, merged with per-directory dot-files.
    pub metadata: Vec<MetadataItem>,
    /// Compiled front-end assets, served under `/assets/`.
    pub assets: Option<PathBuf>,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: None,
            format: FormatConfig::default(),
            sorting: SortingConfig::default(),
            gallery: GalleryConfig::default(),
            preview: PreviewConfig::default(),
            readme: ReadmeConfig::default(),
            media: MediaConfig::default(),
            style: StyleConfig::default(),
            icon: None,
            filter: FilterConfig::default(),
            performance: 100,
            exclude: None,
            metadata: Vec::new(),
            assets: None,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
    pub root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind: "0.0.0.0".to_string(),
            root: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// username -> password.
    pub users: BTreeMap<String, String>,
    /// Wildcard route patterns to gate; absent gates every route.
    pub restrict: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Unit labels by binary-prefix tier.
    pub sizes: Vec<String>,
    /// One or two PHP-`date()` format strings; a single entry is used twice.
    pub date: Vec<String>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            sizes: [" B", " KiB", " MiB", " GiB", " TiB"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            date: vec!["d/m/y H:i".to_string(), "d/m/y".to_string()],
        }
    }
}

impl FormatConfig {
    /// The two date format strings, padding with the first when only one is
    /// configured.
    pub fn date_formats(&self) -> [String; 2] {
        let first = self
            .date
            .first()
            .cloned()
            .unwrap_or_else(|| "d/m/y H:i".to_string());
        let second = self.date.get(1).cloned().unwrap_or_else(|| first.clone());
        [first, second]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SortingConfig {
    pub enabled: bool,
    /// 0 sorts both lists, 1 files only, 2 directories only.
    pub types: u8,
    pub sort_by: SortKey,
    pub order: SortOrder,
}

impl Default for SortingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            types: 0,
            sort_by: SortKey::Name,
            order: SortOrder::Asc,
        }
    }
}

impl SortingConfig {
    pub fn applies_to_files(&self) -> bool {
        self.types == 0 || self.types == 1
    }

    pub fn applies_to_directories(&self) -> bool {
        self.types == 0 || self.types == 2
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub enabled: bool,
    pub reverse_options: bool,
    pub scroll_interval: u64,
    pub list_alignment: u8,
    pub fit_content: bool,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reverse_options: false,
            scroll_interval: 50,
            list_alignment: 0,
            fit_content: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub enabled: bool,
    pub hover_delay: u64,
    pub cursor_indicator: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hover_delay: 75,
            cursor_indicator: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReadmeConfig {
    pub enabled: bool,
    /// Hide the README.md row from the listing once rendered.
    pub hidden: bool,
    /// Whether the rendered README starts expanded.
    pub toggled: bool,
}

impl Default for ReadmeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hidden: false,
            toggled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub image: Vec<String>,
    pub video: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            image: ["jpg", "jpeg", "png", "gif", "ico", "svg", "bmp", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            video: ["webm", "mp4", "ogv", "ogg", "mov"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub compact: bool,
    pub themes: Option<ThemesConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThemesConfig {
    /// Directory scanned for stylesheets at startup.
    pub path: PathBuf,
    /// Default theme name; honored only when present in the pool.
    pub default: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IconConfig {
    pub file: PathBuf,
    /// Explicit MIME type; guessed from the file name when absent.
    pub mime: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Basename regex a file must match to be listed.
    pub file: Option<String>,
    /// Basename regex a directory must match to be listed.
    pub directory: Option<String>,
    /// Match case-sensitively instead of the default insensitive match.
    pub sensitive: bool,
}

impl FilterConfig {
    pub fn is_configured(&self) -> bool {
        self.file.is_some() || self.directory.is_some()
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Whether `extension` (already lowercased) is excluded from listings
    /// and from direct serving.
    pub fn is_excluded_extension(&self, extension: &str) -> bool {
        self.exclude
            .as_deref()
            .is_some_and(|list| list.iter().any(|e| e.eq_ignore_ascii_case(extension)))
    }
}
