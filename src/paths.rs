//! Path containment and small string helpers shared across the pipeline.

use regex::Regex;

/// Checks whether `candidate` sits at or below `base`.
///
/// This is a pure string check: both arguments must already be canonical
/// (symlinks resolved) and use forward slashes, and `base` must carry no
/// trailing slash. The prefix must end on a path-segment boundary, so a
/// sibling such as `/srv/files-other` does not pass for `/srv/files`.
/// Resolution is the caller's job; a `false` here means the request escaped
/// the served root and must be denied.
pub fn is_above_path(base: &str, candidate: &str) -> bool {
    candidate == base || candidate.strip_prefix(base).is_some_and(|rest| rest.starts_with('/'))
}

/// Compiles a `*`-wildcard pattern into an anchored regular expression.
///
/// Every regex metacharacter except `*` is escaped, then `*` becomes `.*`.
/// A pattern without `*` therefore matches exactly.
pub fn wildcard_expression(pattern: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(pattern).replace("\\*", ".*");
    Regex::new(&format!("^{escaped}$"))
}

/// Removes a single trailing `ch`, if present.
pub fn trim_trailing(s: &str, ch: char) -> &str {
    s.strip_suffix(ch).unwrap_or(s)
}

/// Prepends `ch` unless the string already starts with it.
pub fn add_leading(s: &str, ch: char) -> String {
    if s.starts_with(ch) {
        s.to_string()
    } else {
        format!("{ch}{s}")
    }
}

/// Normalizes backslashes to forward slashes for URL-style comparison.
pub fn to_forward_slashes(s: &str) -> String {
    s.replace('\\', "/")
}

/// Tidies a request path for display: duplicate slashes collapse and the
/// trailing slash is dropped, except for the root itself.
pub fn tidy_request_path(path: &str) -> String {
    if path == "/" {
        return path.to_string();
    }

    let mut tidied = String::with_capacity(path.len());
    let mut previous_slash = false;

    for ch in path.chars() {
        if ch == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        tidied.push(ch);
    }

    let tidied = trim_trailing(&tidied, '/');
    if tidied.is_empty() {
        "/".to_string()
    } else {
        tidied.to_string()
    }
}

/// Parent of a tidied request path, always with a leading slash.
pub fn parent_path(path: &str) -> String {
    let parent = match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    };
    add_leading(parent, '/')
}

/// Joins a URL-style relative directory path and an entry name.
pub fn join_relative(relative: &str, name: &str) -> String {
    let base = trim_trailing(relative, '/');
    format!("{}/{}", base, name)
}
