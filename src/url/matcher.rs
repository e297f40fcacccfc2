/// Checks if a domain matches a domain pattern
///
/// Two kinds of pattern are supported:
/// 1. Exact: `"example.com"` matches only `"example.com"`
/// 2. Wildcard: `"*.example.com"` matches `"example.com"` and any subdomain of it
///
/// Both sides are expected to be lowercase already.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(!matches_wildcard("example.com", "blog.example.com"));
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "myexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base
            || (candidate.len() > base.len()
                && candidate.ends_with(base)
                && candidate.as_bytes()[candidate.len() - base.len() - 1] == b'.')
    } else {
        candidate == pattern
    }
}

/// Checks whether any pattern matches any of the candidate forms
pub fn matches_any<P, C>(patterns: &[P], candidates: &[C]) -> bool
where
    P: AsRef<str>,
    C: AsRef<str>,
{
    patterns.iter().any(|pattern| {
        candidates
            .iter()
            .any(|candidate| matches_wildcard(pattern.as_ref(), candidate.as_ref()))
    })
}
