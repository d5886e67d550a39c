use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::client::Protocol;
use crate::error::Error;

pub(crate) const DEFAULT_HOST: &str = "spreadsheets.google.com";
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Blocking client carrying the crate's user agent.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client, Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("sheetfeed-rs/{}", env!("CARGO_PKG_VERSION")))
            .unwrap_or(HeaderValue::from_static("sheetfeed-rs")),
    );

    reqwest::blocking::Client::builder()
        .default_headers(default_headers)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Transport(Box::new(e)))
}

/// `<protocol>://<host>/feeds/<segments...>`
pub(crate) fn feed_url(protocol: Protocol, host: &str, segments: &[&str]) -> String {
    let mut url = format!("{}://{}/feeds", protocol.as_str(), host.trim_end_matches('/'));
    for segment in segments {
        url.push('/');
        url.push_str(segment.trim_matches('/'));
    }
    url
}

/// Last non-empty path segment of a URL, ignoring any query string.
pub(crate) fn last_path_segment(url: &str) -> Option<&str> {
    let path = url.split('?').next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

pub(crate) fn is_atom_content_type(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("application/atom+xml")
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_url() {
        assert_eq!(
            feed_url(Protocol::Https, DEFAULT_HOST, &["cells", "abc", "od6", "private", "full"]),
            "https://spreadsheets.google.com/feeds/cells/abc/od6/private/full"
        );
        assert_eq!(
            feed_url(Protocol::Http, "127.0.0.1:8080/", &["spreadsheets", "private", "full"]),
            "http://127.0.0.1:8080/feeds/spreadsheets/private/full"
        );
    }

    #[test]
    fn test_last_path_segment() {
        assert_eq!(
            last_path_segment("https://host/feeds/spreadsheets/private/full/key123"),
            Some("key123")
        );
        assert_eq!(last_path_segment("https://host/feeds/worksheets/k/od6/"), Some("od6"));
        assert_eq!(last_path_segment("https://host/a/b?x=1"), Some("b"));
        assert_eq!(last_path_segment(""), None);
    }

    #[test]
    fn test_atom_content_type() {
        assert!(is_atom_content_type("application/atom+xml; charset=UTF-8"));
        assert!(is_atom_content_type("Application/Atom+XML"));
        assert!(!is_atom_content_type("text/html"));
        assert!(!is_atom_content_type("application/xml"));
    }
}
