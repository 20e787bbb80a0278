//! Meta-refresh redirects.
//!
//! The portal moves the browser along with `<meta http-equiv="refresh">` tags
//! instead of HTTP redirects. Their `content` looks like `0; url=/next`.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

use crate::error::ProtocolDrift;

lazy_static! {
    static ref REFRESH_CONTENT: Regex =
        Regex::new(r"(?i)^\s*([0-9]+)(?:\s*;(?:\s*url\s*=)?\s*(.+)?)?$").expect("valid regex");
    static ref META_REFRESH: Selector =
        Selector::parse("meta[http-equiv][content]").expect("valid selector");
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no meta refresh in page")]
    Missing,
    #[error("malformed meta refresh content `{0}`")]
    Malformed(String),
    #[error("meta refresh `{0}` has no target url")]
    NoTarget(String),
}

/// Returns the target URL of a meta refresh `content` attribute, unresolved.
pub fn parse_refresh_content(content: &str) -> Result<&str, RefreshError> {
    let captures = REFRESH_CONTENT
        .captures(content)
        .ok_or_else(|| RefreshError::Malformed(content.to_owned()))?;

    captures
        .get(2)
        .map(|target| target.as_str())
        .ok_or_else(|| RefreshError::NoTarget(content.to_owned()))
}

/// Finds the first meta refresh in `html` and returns its target, unresolved.
pub fn extract_refresh_target(html: &str) -> Result<String, RefreshError> {
    let document = Html::parse_document(html);
    let content = document
        .select(&META_REFRESH)
        .find(|meta| {
            meta.value()
                .attr("http-equiv")
                .map_or(false, |equiv| equiv.trim().eq_ignore_ascii_case("refresh"))
        })
        .and_then(|meta| meta.value().attr("content"))
        .ok_or(RefreshError::Missing)?;

    parse_refresh_content(content).map(str::to_owned)
}

/// Resolves a possibly relative redirect `target` against `base`.
pub fn resolve(base: &Url, target: &str) -> Result<Url, ProtocolDrift> {
    base.join(target).map_err(|source| ProtocolDrift::Unresolvable {
        target: target.to_owned(),
        base: base.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute_target() {
        assert_eq!(
            parse_refresh_content("0;url=https://example.com/x"),
            Ok("https://example.com/x")
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(parse_refresh_content("3;URL=/relative/path"), Ok("/relative/path"));
        assert_eq!(parse_refresh_content("  1 ; Url = next"), Ok("next"));
    }

    #[test]
    fn test_parse_without_url_keyword() {
        assert_eq!(parse_refresh_content("0; /bare"), Ok("/bare"));
    }

    #[test]
    fn test_parse_delay_only_has_no_target() {
        assert_eq!(
            parse_refresh_content("5"),
            Err(RefreshError::NoTarget("5".to_owned()))
        );
        assert_eq!(
            parse_refresh_content("5;"),
            Err(RefreshError::NoTarget("5;".to_owned()))
        );
    }

    #[test]
    fn test_parse_delay_must_be_ascii_digits() {
        assert_eq!(
            parse_refresh_content("٣;url=/x"),
            Err(RefreshError::Malformed("٣;url=/x".to_owned()))
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert_eq!(
            parse_refresh_content("url=/x"),
            Err(RefreshError::Malformed("url=/x".to_owned()))
        );
    }

    #[test]
    fn test_extract_from_document() {
        let html = r#"<html><head>
            <meta charset="utf-8">
            <meta http-equiv="Refresh" content="0; URL=../portal/login">
            </head><body></body></html>"#;

        assert_eq!(extract_refresh_target(html), Ok("../portal/login".to_owned()));
    }

    #[test]
    fn test_extract_missing() {
        let html = r#"<html><head><meta http-equiv="content-type" content="text/html"></head></html>"#;

        assert_eq!(extract_refresh_target(html), Err(RefreshError::Missing));
        assert_eq!(extract_refresh_target(""), Err(RefreshError::Missing));
    }

    #[test]
    fn test_resolve_relative() {
        let base: Url = "https://a.example/p/q".parse().unwrap();

        assert_eq!(resolve(&base, "../r").unwrap().as_str(), "https://a.example/r");
        assert_eq!(
            resolve(&base, "https://b.example/s").unwrap().as_str(),
            "https://b.example/s"
        );
    }

    #[test]
    fn test_resolve_invalid() {
        let base: Url = "https://a.example/p/q".parse().unwrap();

        assert!(matches!(
            resolve(&base, "http://[broken"),
            Err(ProtocolDrift::Unresolvable { .. })
        ));
    }
}
