/// Pattern parsing for route segments
///
/// Pure functional parsing of URL patterns (`/users/:id`) into typed segments
/// and anchored regular expressions.

use crate::path::pattern_segments;
use crate::RouteError;

/// Represents the two kinds of route pattern segments
///
/// # Examples
///
/// ```
/// use portico_router::route::pattern::{classify_segment, PatternSegmentType};
///
/// let seg = classify_segment("users");
/// assert!(matches!(seg, PatternSegmentType::Static(_)));
///
/// let seg = classify_segment(":id");
/// assert!(matches!(seg, PatternSegmentType::Param(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegmentType<'a> {
    /// Named capture: `:name`, matches one non-empty segment
    Param(&'a str),
    /// Literal text, matched exactly
    Static(&'a str),
}

/// Classifies a segment into a pattern type (pure function)
pub fn classify_segment(segment: &str) -> PatternSegmentType<'_> {
    match segment.strip_prefix(':') {
        Some(name) => PatternSegmentType::Param(name),
        None => PatternSegmentType::Static(segment),
    }
}

/// Checks that a capture name can be used as a regex group name
fn is_valid_param_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Compiles a URL pattern into an anchored regex source
///
/// Returns the regex source and the capture names in pattern order.
///
/// # Examples
///
/// ```
/// use portico_router::route::pattern::compile_pattern;
///
/// let (source, params) = compile_pattern("/users/:id").unwrap();
/// assert_eq!(source, "^/users/(?P<id>[^/]+)$");
/// assert_eq!(params, vec!["id".to_string()]);
///
/// let (source, _) = compile_pattern("/").unwrap();
/// assert_eq!(source, "^/$");
/// ```
pub fn compile_pattern(pattern: &str) -> Result<(String, Vec<String>), RouteError> {
    let mut params: Vec<String> = Vec::new();
    let mut parts: Vec<String> = Vec::new();

    for segment in pattern_segments(pattern) {
        match classify_segment(segment) {
            PatternSegmentType::Param(name) => {
                if !is_valid_param_name(name) {
                    return Err(RouteError::InvalidParam {
                        pattern: pattern.to_string(),
                        name: name.to_string(),
                    });
                }
                if params.iter().any(|p| p == name) {
                    return Err(RouteError::DuplicateParam {
                        pattern: pattern.to_string(),
                        name: name.to_string(),
                    });
                }
                params.push(name.to_string());
                parts.push(format!("(?P<{}>[^/]+)", name));
            }
            PatternSegmentType::Static(text) => parts.push(regex::escape(text)),
        }
    }

    Ok((format!("^/{}$", parts.join("/")), params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_static() {
        assert_eq!(classify_segment("about"), PatternSegmentType::Static("about"));
    }

    #[test]
    fn test_classify_param() {
        assert_eq!(classify_segment(":id"), PatternSegmentType::Param("id"));
    }

    #[test]
    fn test_compile_escapes_literals() {
        let (source, params) = compile_pattern("/files/report.v1+final").unwrap();
        assert_eq!(source, r"^/files/report\.v1\+final$");
        assert!(params.is_empty());
    }

    #[test]
    fn test_compile_multiple_params() {
        let (source, params) = compile_pattern("/user/:user_name/status/:id").unwrap();
        assert_eq!(
            source,
            "^/user/(?P<user_name>[^/]+)/status/(?P<id>[^/]+)$"
        );
        assert_eq!(params, vec!["user_name", "id"]);
    }

    #[test]
    fn test_compile_trims_slashes() {
        let (with, _) = compile_pattern("/account/signin/").unwrap();
        let (without, _) = compile_pattern("account/signin").unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn test_compile_rejects_bad_param_name() {
        let err = compile_pattern("/users/:1st").unwrap_err();
        assert!(matches!(err, RouteError::InvalidParam { .. }));

        let err = compile_pattern("/users/:").unwrap_err();
        assert!(matches!(err, RouteError::InvalidParam { .. }));
    }

    #[test]
    fn test_compile_rejects_duplicate_param() {
        let err = compile_pattern("/a/:id/b/:id").unwrap_err();
        assert!(matches!(err, RouteError::DuplicateParam { .. }));
    }
}
