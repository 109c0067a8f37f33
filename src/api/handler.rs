//! The browse handler: one catch-all route that resolves a request path to
//! a directory render, a file stream, or an error view.
//!
//! Flow per request: decode -> realpath -> stat -> containment check ->
//! (directory: collect, dot-file, README, sort, resolve config, render) |
//! (file: exclusion check, stream) | (neither: reject). Every failure not
//! recovered locally funnels through [`PageError`], which keeps response
//! bodies generic while the details go to the log.

use std::path::Path;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{Html, IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use tokio_stream::StreamExt;
use tokio_util::io::ReaderStream;

use crate::api::error::PageError;
use crate::api::AppState;
use crate::format::readable_size;
use crate::listing::collect::{collect, PathInfo, DOT_FILE};
use crate::listing::dotfile::{self, DotFile};
use crate::listing::sort::sort_entries;
use crate::paths::{is_above_path, parent_path, tidy_request_path, to_forward_slashes, trim_trailing};
use crate::prefs::ClientPrefs;
use crate::render::{self, PageStats, ReadmeBlock, RenderContext};

const README_FILE: &str = "README.md";

/// Catch-all entry point.
pub async fn browse(State(state): State<AppState>, req: Request) -> Response {
    let started = Instant::now();

    // Only a GET surface exists; anything else gets the plain 404 view.
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return PageError::NotFound.into_response();
    }

    let raw_path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let relative = percent_decode_str(&raw_path)
        .decode_utf8_lossy()
        .into_owned();

    let result = handle(
        &state,
        &relative,
        &raw_path,
        query.as_deref(),
        req.headers(),
        started,
    )
    .await;

    match result {
        Ok(response) => response,
        Err(error) => {
            match &error {
                PageError::NotFound => {
                    tracing::warn!(path = %relative, "request path not found")
                }
                // Containment failures were already logged at error level.
                PageError::Denied => {}
                PageError::BadRequest(code) => {
                    tracing::error!(path = %relative, ?code, "request failed")
                }
            }
            error.into_response()
        }
    }
}

async fn handle(
    state: &AppState,
    relative: &str,
    raw_path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    started: Instant,
) -> Result<Response, PageError> {
    let joined = state.root.join(relative.trim_start_matches('/'));
    let requested = tokio::fs::canonicalize(&joined).await?;
    let metadata = tokio::fs::metadata(&requested).await?;

    let root_text = to_forward_slashes(&state.root.to_string_lossy());
    let root_text = trim_trailing(&root_text, '/');
    let requested_text = to_forward_slashes(&requested.to_string_lossy());

    if !is_above_path(root_text, &requested_text) {
        tracing::error!(path = %relative, "request resolved outside the served root");
        return Err(PageError::Denied);
    }

    if metadata.is_dir() {
        render_directory(state, &requested, relative, raw_path, query, headers, started).await
    } else if metadata.is_file() {
        serve_file(state, &requested, relative).await
    } else {
        Err(PageError::BadRequest(None))
    }
}

fn redirect_with_slash(raw_path: &str, query: Option<&str>) -> Result<Response, PageError> {
    let location = match query {
        Some(query) => format!("{raw_path}/?{query}"),
        None => format!("{raw_path}/"),
    };

    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(header::LOCATION, location)
        .body(Body::empty())
        .map_err(|_| PageError::BadRequest(None))
}

async fn render_directory(
    state: &AppState,
    requested: &Path,
    relative: &str,
    raw_path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    started: Instant,
) -> Result<Response, PageError> {
    // Directories live at trailing-slash URLs; anything else redirects
    // before any collection work happens.
    if !raw_path.ends_with('/') {
        return redirect_with_slash(raw_path, query);
    }

    if state.config.debug {
        tracing::debug!(path = %relative, "navigating");
    }

    let prefs = ClientPrefs::from_headers(headers);
    let mut page = state.template.resolve(&prefs);
    page.timestamp = chrono::Utc::now().timestamp();

    let info = PathInfo {
        real: requested.to_path_buf(),
        relative: relative.to_string(),
    };
    let mut listing = collect(&info, &state.config, prefs.timezone_offset_seconds()).await?;

    page.performance = state.config.performance > 0
        && listing.contents.files.len() >= state.config.performance as usize;

    let mut readme = None;
    if state.config.readme.enabled {
        if let Some(position) = listing.file_position(README_FILE) {
            let text = tokio::fs::read_to_string(requested.join(README_FILE)).await?;
            readme = Some(ReadmeBlock {
                html: render::markdown_to_html(&text),
                open: page.readme.toggled,
            });

            if state.config.readme.hidden {
                listing.contents.files[position].hidden = true;
            }
        }
    }

    let mut metadata_set = state.config.metadata.clone();
    if let Some(position) = listing.file_position(DOT_FILE) {
        match tokio::fs::read_to_string(requested.join(DOT_FILE)).await {
            Ok(content) => match DotFile::parse(&content) {
                Ok(doc) => {
                    metadata_set = dotfile::apply(&doc, &mut listing, &metadata_set);
                }
                Err(error) => {
                    tracing::debug!(path = %relative, %error, "ignoring unparsable dot-file");
                }
            },
            Err(error) => {
                tracing::debug!(path = %relative, %error, "ignoring unreadable dot-file");
            }
        }

        // The control file never shows up in the rendered listing.
        listing.contents.files[position].hidden = true;
    }

    if page.sorting.enabled {
        let key = page.sorting.sort_by;
        let order = page.sorting.order;

        if matches!(page.sorting.types, 0 | 1) {
            sort_entries(&mut listing.contents.files, key, order);
        }
        if matches!(page.sorting.types, 0 | 2) {
            sort_entries(&mut listing.contents.directories, key, order);
        }
    }

    let display_path = tidy_request_path(relative);
    let parent = parent_path(&display_path);

    let context = RenderContext {
        config: &page,
        contents: &listing.contents,
        display_path,
        parent,
        metadata: &metadata_set,
        readme,
        stats: PageStats {
            total_size: readable_size(&state.config.format.sizes, listing.stats.total.size),
            newest_file: listing.stats.newest.file,
            newest_directory: listing.stats.newest.directory,
        },
        file_count: listing.contents.files.len(),
        directory_count: listing.contents.directories.len(),
        rendered: format!("{:.6}", started.elapsed().as_secs_f64()),
        has_assets: state.config.assets.is_some(),
    };

    Ok(Html(render::index_page(&context).into_string()).into_response())
}

fn serve_extension(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.rsplit('.').next().unwrap_or(&name).to_lowercase()
}

async fn serve_file(
    state: &AppState,
    requested: &Path,
    relative: &str,
) -> Result<Response, PageError> {
    if state.config.is_excluded_extension(&serve_extension(requested)) {
        // Excluded extensions present as missing; the file is never opened.
        return Err(PageError::NotFound);
    }

    if state.config.debug {
        tracing::debug!(path = %relative, "serving");
    }

    let metadata = tokio::fs::metadata(requested).await?;
    let file = tokio::fs::File::open(requested).await?;

    let mime = mime_guess::from_path(requested)
        .first_or_octet_stream()
        .to_string();
    let file_name = requested
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let safe_name = file_name.replace('"', "'");

    // Mid-flight errors terminate the body; hyper resets the connection and
    // the cause lands in the log rather than a half-written page.
    let log_path = requested.to_path_buf();
    let stream = ReaderStream::new(file).map(move |chunk| {
        if let Err(error) = &chunk {
            tracing::error!(path = %log_path.display(), %error, "streaming failed mid-flight");
        }
        chunk
    });

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime),
            (header::CONTENT_LENGTH, metadata.len().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{safe_name}\""),
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_extension_lowercases() {
        assert_eq!(serve_extension(Path::new("/x/Tool.EXE")), "exe");
        assert_eq!(serve_extension(Path::new("/x/archive.tar.gz")), "gz");
        assert_eq!(serve_extension(Path::new("/x/Makefile")), "makefile");
    }

    #[test]
    fn redirect_keeps_the_query_string() {
        let response = redirect_with_slash("/sub", Some("a=1")).unwrap();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/sub/?a=1"
        );

        let response = redirect_with_slash("/sub", None).unwrap();
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/sub/");
    }
}
