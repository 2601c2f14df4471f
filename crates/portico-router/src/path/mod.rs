/// Path utilities for request paths and route patterns
///
/// All functions are **pure**: given same input, always produce same output with no side effects.

use std::borrow::Cow;

/// Normalize a request path before matching
///
/// The only rewrite is a missing leading `/`; everything else (trailing
/// slashes, doubled slashes, case) is matched as received.
///
/// Returns `Cow::Borrowed` when the path already starts with `/`.
///
/// # Examples
///
/// ```
/// use portico_router::path::normalize_path;
/// use std::borrow::Cow;
///
/// assert!(matches!(normalize_path("/users/42"), Cow::Borrowed("/users/42")));
/// assert_eq!(normalize_path("users/42"), "/users/42");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if path.starts_with('/') {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(format!("/{}", path))
    }
}

/// Splits a route pattern into its segments
///
/// Leading and trailing slashes are trimmed first, so `/users/:id/` and
/// `users/:id` yield the same segments. The root pattern `/` yields no
/// segments.
///
/// # Examples
///
/// ```
/// use portico_router::path::pattern_segments;
///
/// let segments: Vec<&str> = pattern_segments("/users/:id/").collect();
/// assert_eq!(segments, vec!["users", ":id"]);
///
/// assert_eq!(pattern_segments("/").count(), 0);
/// ```
pub fn pattern_segments(pattern: &str) -> impl Iterator<Item = &str> {
    let trimmed = pattern.trim_matches('/');
    trimmed.split('/').filter(move |_| !trimmed.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_keeps_leading_slash() {
        assert_eq!(normalize_path("/about"), "/about");
        assert!(matches!(normalize_path("/about"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_normalize_adds_leading_slash() {
        assert_eq!(normalize_path("about"), "/about");
        assert_eq!(normalize_path("users/42"), "/users/42");
    }

    #[test]
    fn test_normalize_does_not_touch_trailing_slash() {
        assert_eq!(normalize_path("/about/"), "/about/");
    }

    #[test]
    fn test_pattern_segments_root() {
        assert_eq!(pattern_segments("/").count(), 0);
        assert_eq!(pattern_segments("").count(), 0);
        assert_eq!(pattern_segments("///").count(), 0);
    }

    #[test]
    fn test_pattern_segments_trims_both_ends() {
        let segments: Vec<&str> = pattern_segments("//user/:name/status/").collect();
        assert_eq!(segments, vec!["user", ":name", "status"]);
    }
}
