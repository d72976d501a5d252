//! Share-link parsing and direct-download URL construction.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use super::error::FetchError;

/// Content host used when no override is configured.
pub const DEFAULT_DRIVE_BASE_URL: &str = "https://drive.google.com";

/// Path-segment form: `.../file/d/<id>/view`.
#[allow(clippy::expect_used)]
static PATH_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/d/([a-zA-Z0-9_-]+)").expect("path id regex is valid") // Static pattern, safe to panic
});

/// Query-parameter form: `...?id=<id>`.
#[allow(clippy::expect_used)]
static QUERY_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"id=([a-zA-Z0-9_-]+)").expect("query id regex is valid") // Static pattern, safe to panic
});

/// Confirmation token on the large-file interstitial, either as a link
/// parameter or as a hidden form field.
#[allow(clippy::expect_used)]
static CONFIRM_TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"confirm=([0-9A-Za-z_-]+)|name="confirm"\s+value="([0-9A-Za-z_-]+)""#)
        .expect("confirm token regex is valid") // Static pattern, safe to panic
});

/// Extracts the file id from a share link.
///
/// The path-segment form is tried first, then the query-parameter form.
///
/// # Errors
///
/// Returns [`FetchError::UnresolvableReference`] when neither shape matches.
///
/// # Examples
///
/// ```
/// use uploader_core::fetch::resolve_identifier;
///
/// let id = resolve_identifier("https://drive.google.com/file/d/XYZ9/view?usp=sharing").unwrap();
/// assert_eq!(id, "XYZ9");
/// ```
pub fn resolve_identifier(source_reference: &str) -> Result<String, FetchError> {
    let captured = PATH_ID_PATTERN
        .captures(source_reference)
        .or_else(|| QUERY_ID_PATTERN.captures(source_reference))
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string());

    match captured {
        Some(id) => {
            trace!(reference = source_reference, id = %id, "resolved file id");
            Ok(id)
        }
        None => Err(FetchError::unresolvable(source_reference)),
    }
}

/// Direct-download URL on the default host.
#[must_use]
pub fn direct_download_url(id: &str) -> String {
    direct_download_url_with_base(DEFAULT_DRIVE_BASE_URL, id, None)
}

/// Direct-download URL on `base`, optionally carrying a confirmation token.
///
/// `id` and `confirm` are restricted to URL-safe characters by the patterns
/// that produce them, so no escaping is applied.
#[must_use]
pub fn direct_download_url_with_base(base: &str, id: &str, confirm: Option<&str>) -> String {
    let base = base.trim_end_matches('/');
    match confirm {
        Some(token) => format!("{base}/uc?export=download&id={id}&confirm={token}"),
        None => format!("{base}/uc?export=download&id={id}"),
    }
}

/// Finds the confirmation token in an interstitial HTML page.
#[must_use]
pub fn extract_confirm_token(html: &str) -> Option<String> {
    let captures = CONFIRM_TOKEN_PATTERN.captures(html)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|token| token.as_str().to_string())
}
