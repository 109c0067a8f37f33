//! Request-level error type.
//!
//! Every failure on the browse path collapses into one of these variants and
//! renders the matching error view. Details are logged server-side only; the
//! response body never carries paths or messages, at most a short error code
//! for diagnostics.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::render;

#[derive(Debug)]
pub enum PageError {
    /// The path does not exist (or is deliberately treated as such).
    NotFound,
    /// Anything else that aborted the request; the optional code is shown
    /// on the error view for diagnostics.
    BadRequest(Option<String>),
    /// The resolved path escaped the served root. Rendered exactly like a
    /// plain bad request so the response leaks nothing about why.
    Denied,
}

impl PageError {
    pub fn status(&self) -> StatusCode {
        match self {
            PageError::NotFound => StatusCode::NOT_FOUND,
            PageError::BadRequest(_) | PageError::Denied => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<std::io::Error> for PageError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => PageError::NotFound,
            kind => PageError::BadRequest(Some(format!("{kind:?}"))),
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = match &self {
            PageError::BadRequest(code) => code.as_deref(),
            _ => None,
        };

        let body = render::error_page(status, code).into_string();
        (status, Html(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_404() {
        let error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(PageError::from(error).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn other_io_errors_map_to_400_with_code() {
        let error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let page_error = PageError::from(error);
        assert_eq!(page_error.status(), StatusCode::BAD_REQUEST);
        match page_error {
            PageError::BadRequest(Some(code)) => assert_eq!(code, "PermissionDenied"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn denied_looks_like_a_plain_bad_request() {
        let response = PageError::Denied.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
