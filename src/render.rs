//! Server-rendered views.
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! The listing page carries the hooks the browser bundle binds to (sortable
//! column spans, `preview` anchors, the embedded page-config JSON); the
//! error views stay deliberately bare so nothing internal leaks.

use axum::http::StatusCode;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use pulldown_cmark::{html as md_html, Parser};

use crate::listing::dotfile::MetadataItem;
use crate::listing::{Contents, Entry};
use crate::paths::trim_trailing;
use crate::prefs::PageConfig;

/// Characters percent-encoded inside generated hrefs. Path separators stay
/// literal so nested entries keep their structure.
const HREF_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'#')
    .add(b'%')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^');

pub fn encode_href(path: &str) -> String {
    utf8_percent_encode(path, HREF_ENCODE).to_string()
}

/// Converts markdown text (a README) to HTML.
pub fn markdown_to_html(text: &str) -> String {
    let parser = Parser::new(text);
    let mut out = String::with_capacity(text.len() * 3 / 2);
    md_html::push_html(&mut out, parser);
    out
}

/// A rendered README block and whether it starts expanded.
#[derive(Debug, Clone)]
pub struct ReadmeBlock {
    pub html: String,
    pub open: bool,
}

#[derive(Debug, Clone)]
pub struct PageStats {
    pub total_size: String,
    pub newest_file: i64,
    pub newest_directory: i64,
}

/// Everything the listing view needs; assembled by the request handler.
pub struct RenderContext<'a> {
    pub config: &'a PageConfig,
    pub contents: &'a Contents,
    /// Tidied request path, e.g. `/sub/dir`.
    pub display_path: String,
    pub parent: String,
    pub metadata: &'a [MetadataItem],
    pub readme: Option<ReadmeBlock>,
    pub stats: PageStats,
    pub file_count: usize,
    pub directory_count: usize,
    /// Handler wall time in seconds, microsecond precision.
    pub rendered: String,
    pub has_assets: bool,
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Head directives have arbitrary attribute names, so the tags are built by
/// hand with escaping rather than through the macro.
fn metadata_tags(items: &[MetadataItem]) -> Markup {
    let mut built = String::new();

    for item in items {
        built.push_str("<meta");
        for (attribute, value) in item {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            built.push(' ');
            built.push_str(&escape_html(attribute));
            built.push_str("=\"");
            built.push_str(&escape_html(&text));
            built.push('"');
        }
        built.push_str(">\n");
    }

    PreEscaped(built)
}

/// Breadcrumb: one anchor per path segment, starting at the root.
pub fn clickable_path(path: &str) -> Markup {
    let trimmed = trim_trailing(path.trim_start_matches('/'), '/');
    let parts: Vec<&str> = trimmed.split('/').filter(|p| !p.is_empty()).collect();

    html! {
        a href="/" { "/" }
        @for (index, part) in parts.iter().enumerate() {
            @let target = format!("/{}", parts[..=index].join("/"));
            a href=(encode_href(&target)) {
                @if index > 0 { "/" }
                (part)
            }
        }
    }
}

fn sortable_header(label: &str, column: u8) -> Markup {
    html! {
        th {
            span sortable data-column=(column) { (label) }
        }
    }
}

fn directory_row(entry: &Entry) -> Markup {
    let href = format!("{}/", encode_href(&entry.relative));

    html! {
        tr.directory hidden[entry.hidden] {
            td data-raw=(entry.name) {
                a href=(href) { (entry.name) "/" }
            }
            td data-raw=(entry.modified.raw) {
                span title=(entry.modified.formatted[1]) { (entry.modified.formatted[0]) }
            }
            td { "-" }
            td { "directory" }
        }
    }
}

fn file_row(entry: &Entry) -> Markup {
    let href = encode_href(&entry.relative);

    html! {
        tr.file hidden[entry.hidden] {
            td data-raw=(entry.name) {
                @if entry.media {
                    a.preview href=(href) { (entry.name) }
                } @else {
                    a href=(href) { (entry.name) }
                }
            }
            td data-raw=(entry.modified.raw) {
                span title=(entry.modified.formatted[1]) { (entry.modified.formatted[0]) }
            }
            td data-raw=(entry.size.raw) { (entry.size.readable) }
            td { (entry.kind.as_str()) }
        }
    }
}

/// JSON-encodes the page config for the browser bundle, made safe for
/// inline script embedding.
fn config_script(config: &PageConfig) -> Markup {
    let json = serde_json::to_string(config)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/");

    PreEscaped(format!("window.vitrine = {{ config: {json} }};"))
}

/// The directory listing page.
pub fn index_page(ctx: &RenderContext) -> Markup {
    let title = format!("Index of {}", ctx.display_path);
    let theme_href = ctx
        .config
        .style
        .themes
        .as_ref()
        .and_then(|t| t.set.as_ref().and_then(|name| t.pool.get(name)));

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                (metadata_tags(ctx.metadata))
                title { (title) }
                @if let Some(path) = &ctx.config.icon.path {
                    link rel="shortcut icon" href=(path) type=(ctx.config.icon.mime);
                }
                @if ctx.has_assets {
                    link rel="stylesheet" href="/assets/main.css";
                }
                @if let Some(href) = theme_href {
                    link rel="stylesheet" href=(href);
                }
                script { (config_script(ctx.config)) }
            }
            body is-loading class=[ctx.config.style.compact.then_some("compact")] {
                div.topBar {
                    div.path { "Index of " (clickable_path(&ctx.display_path)) }
                    div.extend { "+" }
                }
                @if let Some(readme) = &ctx.readme {
                    details.readmeContainer open[readme.open] {
                        summary { "README.md" }
                        article { (PreEscaped(readme.html.clone())) }
                    }
                }
                div.filterContainer {
                    input type="text" placeholder="Filter .." autocomplete="off";
                }
                div.tableContainer {
                    table {
                        thead {
                            tr {
                                (sortable_header("Name", 0))
                                (sortable_header("Modified", 1))
                                (sortable_header("Size", 2))
                                (sortable_header("Type", 3))
                            }
                        }
                        tbody {
                            @if ctx.display_path != "/" {
                                tr.parent {
                                    td { a href=(encode_href(&ctx.parent)) { ".." } }
                                    td { "-" }
                                    td { "-" }
                                    td { "-" }
                                }
                            }
                            @for entry in &ctx.contents.directories {
                                (directory_row(entry))
                            }
                            @for entry in &ctx.contents.files {
                                (file_row(entry))
                            }
                        }
                    }
                }
                div.bottomBar {
                    span.directories { (ctx.directory_count) " directories" }
                    span.files { (ctx.file_count) " files" }
                    span.size { (ctx.stats.total_size) }
                    span.rendered data-newest-file=(ctx.stats.newest_file)
                        data-newest-directory=(ctx.stats.newest_directory) {
                        "rendered in " (ctx.rendered) "s"
                    }
                }
                @if ctx.has_assets {
                    script src="/assets/main.js" defer {}
                }
            }
        }
    }
}

/// Error views: a status line and nothing else worth scraping.
pub fn error_page(status: StatusCode, code: Option<&str>) -> Markup {
    let heading = match status {
        StatusCode::NOT_FOUND => "404 — not found",
        StatusCode::BAD_REQUEST => "400 — bad request",
        _ => "error",
    };

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { (heading) }
            }
            body.error {
                main {
                    h1 { (heading) }
                    @if let Some(code) = code {
                        p.code { (code) }
                    }
                    p { a href="/" { "Back to the index" } }
                }
            }
        }
    }
}
