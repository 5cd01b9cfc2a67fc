// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

use crate::error::Result;

/// Join URL segments with exactly one `/` between them.
///
/// Trailing slashes of `base` and leading slashes of the last segment are
/// trimmed; middle segments are trimmed on both sides. A trailing slash on
/// the last segment is kept, which the REST routes rely on.
///
/// # Examples
/// ```
/// use dataval_dashboard::utils::url::url_join;
///
/// assert_eq!(
///     url_join("http://host/api/", &["/validator-summary/", "7/"]),
///     "http://host/api/validator-summary/7/"
/// );
/// ```
pub fn url_join(base: &str, segments: &[&str]) -> String {
    let Some((last, middle)) = segments.split_last() else {
        return base.to_string();
    };

    let mut parts = Vec::with_capacity(segments.len() + 1);
    parts.push(base.trim_end_matches('/'));
    parts.extend(middle.iter().map(|s| s.trim_matches('/')).filter(|s| !s.is_empty()));
    parts.push(last.trim_start_matches('/'));
    parts.join("/")
}

/// Parse a joined endpoint URL.
pub fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    Ok(Url::parse(&url_join(base, segments))?)
}

/// Resolve a continuation link, which may be absolute or relative to `base`.
pub fn resolve(base: &Url, href: &str) -> Result<Url> {
    Ok(base.join(href)?)
}
