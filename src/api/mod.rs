//! HTTP surface: shared state and router assembly.

pub mod error;
pub mod handler;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

use crate::auth;
use crate::config::Config;
use crate::prefs::PageConfig;
use crate::themes::THEMES_ROUTE;

/// A custom favicon resolved at startup.
#[derive(Clone, Debug)]
pub struct IconFile {
    /// Route it is served on, e.g. `/favicon.png`.
    pub uri: String,
    pub file: PathBuf,
    pub mime: String,
}

/// Shared application state. Everything in here is immutable once the
/// listener opens; requests only read.
#[derive(Clone)]
pub struct AppState {
    /// Canonicalized served root.
    pub root: PathBuf,
    pub config: Arc<Config>,
    /// The page-config template client preferences overlay onto.
    pub template: Arc<PageConfig>,
    pub icon: Option<IconFile>,
}

impl AppState {
    pub fn new(root: PathBuf, config: Config, template: PageConfig, icon: Option<IconFile>) -> Self {
        Self {
            root,
            config: Arc::new(config),
            template: Arc::new(template),
            icon,
        }
    }
}

/// Builds the router: static mounts, the favicon route, and the browse
/// catch-all, wrapped in auth, compression, and request tracing.
pub fn router(state: AppState) -> Router {
    let mut router = Router::new();

    if let Some(themes) = &state.config.style.themes {
        router = router.nest_service(THEMES_ROUTE, ServeDir::new(&themes.path));
    }

    if let Some(assets) = &state.config.assets {
        router = router.nest_service("/assets", ServeDir::new(assets));
    }

    if let Some(icon) = &state.icon {
        let icon_file = icon.clone();
        router = router.route(
            &icon.uri,
            get(move || {
                let icon = icon_file.clone();
                async move {
                    match tokio::fs::read(&icon.file).await {
                        Ok(bytes) => {
                            ([(header::CONTENT_TYPE, icon.mime.clone())], bytes).into_response()
                        }
                        Err(error) => {
                            tracing::error!(path = %icon.file.display(), %error, "favicon read failed");
                            StatusCode::INTERNAL_SERVER_ERROR.into_response()
                        }
                    }
                }
            }),
        );
    }

    router
        .fallback(handler::browse)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth::basic_auth,
                )),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::prefs::IconSettings;
    use axum::body::Body;
    use axum::http::Request;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use http_body_util::BodyExt;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state_for(dir: &TempDir, mutate: impl FnOnce(&mut Config)) -> AppState {
        let mut config = Config::default();
        config.server.root = dir.path().to_path_buf();
        mutate(&mut config);

        let root = dir.path().canonicalize().unwrap();
        let template = PageConfig::template(
            &config,
            None,
            IconSettings {
                path: None,
                mime: "image/png".to_string(),
            },
        );

        AppState::new(root, config, template, None)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn directory_without_slash_redirects() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let app = router(state_for(&dir, |_| {}));
        let response = app.oneshot(get_request("/sub")).await.unwrap();

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/sub/");
    }

    #[tokio::test]
    async fn listing_renders_entries_and_hides_the_dot_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.png"), vec![0u8; 500]).unwrap();
        fs::write(dir.path().join("b.mp4"), vec![0u8; 2048]).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(
            dir.path().join(".vitrine"),
            r#"{"ignore": ["a.png"]}"#,
        )
        .unwrap();

        let app = router(state_for(&dir, |_| {}));
        let response = app.oneshot(get_request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;

        // Hidden entries stay in the DOM; visibility is a client concern.
        assert!(body.contains("a.png"));
        assert!(body.contains("b.mp4"));
        assert!(body.contains("sub/"));
        assert!(body.contains(".vitrine"));
        assert!(body.contains("hidden"));
        assert!(body.contains("window.vitrine"));
    }

    #[tokio::test]
    async fn missing_path_renders_the_404_view() {
        let dir = TempDir::new().unwrap();

        let app = router(state_for(&dir, |_| {}));
        let response = app.oneshot(get_request("/nope.txt")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_text(response).await;
        assert!(body.contains("404"));
    }

    #[tokio::test]
    async fn traversal_is_denied_without_detail() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("inside.txt"), b"x").unwrap();

        let app = router(state_for(&dir, |_| {}));
        let response = app.oneshot(get_request("/%2e%2e/%2e%2e/etc")).await.unwrap();

        // Either the resolved path escapes (400) or does not exist (404);
        // never a successful response, never a path echo.
        assert!(matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND
        ));
        let body = body_text(response).await;
        assert!(!body.contains("etc"));
    }

    #[tokio::test]
    async fn excluded_extension_is_never_streamed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tool.exe"), b"MZ").unwrap();

        let app = router(state_for(&dir, |config| {
            config.exclude = Some(vec!["exe".to_string()]);
        }));
        let response = app.oneshot(get_request("/tool.exe")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_text(response).await;
        assert!(body.contains("404"));
        assert!(!body.contains("MZ"));
    }

    #[tokio::test]
    async fn files_stream_with_inline_disposition() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

        let app = router(state_for(&dir, |_| {}));
        let response = app.oneshot(get_request("/notes.txt")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("notes.txt"));
        assert_eq!(body_text(response).await, "hello");
    }

    #[tokio::test]
    async fn sort_cookie_reorders_the_listing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("big.bin"), vec![0u8; 4096]).unwrap();
        fs::write(dir.path().join("small.bin"), vec![0u8; 16]).unwrap();

        let app = router(state_for(&dir, |_| {}));
        let request = Request::builder()
            .uri("/")
            .header(
                header::COOKIE,
                r#"vitrine={"sort":{"row":2,"ascending":1}}"#,
            )
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        let small = body.find("small.bin").unwrap();
        let big = body.find("big.bin").unwrap();
        assert!(small < big, "ascending size sort lists the small file first");
    }

    #[tokio::test]
    async fn readme_is_converted_to_html() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "# Welcome\n\ntext").unwrap();

        let app = router(state_for(&dir, |_| {}));
        let response = app.oneshot(get_request("/")).await.unwrap();

        let body = body_text(response).await;
        assert!(body.contains("<h1>Welcome</h1>"));
    }

    #[tokio::test]
    async fn auth_gates_and_admits() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file.txt"), b"x").unwrap();

        let app = router(state_for(&dir, |config| {
            let mut users = BTreeMap::new();
            users.insert("alice".to_string(), "secret".to_string());
            config.auth = Some(AuthConfig {
                users,
                restrict: None,
            });
        }));

        let denied = app
            .clone()
            .oneshot(get_request("/file.txt"))
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
        assert!(denied.headers().contains_key(header::WWW_AUTHENTICATE));

        let credentials = STANDARD.encode("alice:secret");
        let request = Request::builder()
            .uri("/file.txt")
            .header(header::AUTHORIZATION, format!("Basic {credentials}"))
            .body(Body::empty())
            .unwrap();
        let admitted = app.oneshot(request).await.unwrap();
        assert_eq!(admitted.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn restricted_routes_leave_the_rest_open() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("private")).unwrap();
        fs::write(dir.path().join("open.txt"), b"x").unwrap();

        let app = router(state_for(&dir, |config| {
            let mut users = BTreeMap::new();
            users.insert("alice".to_string(), "secret".to_string());
            config.auth = Some(AuthConfig {
                users,
                restrict: Some(vec!["/private/*".to_string()]),
            });
        }));

        let open = app.clone().oneshot(get_request("/open.txt")).await.unwrap();
        assert_eq!(open.status(), StatusCode::OK);

        let gated = app.oneshot(get_request("/private/x")).await.unwrap();
        assert_eq!(gated.status(), StatusCode::UNAUTHORIZED);
    }
}
