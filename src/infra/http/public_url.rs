//! Absolute URL resolution for links that leave the site.

use axum::http::{HeaderMap, header::HOST};
use url::Url;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Origin to prefix absolute links with.
///
/// A configured public URL wins. Otherwise the origin is rebuilt from the
/// `Host` header and `X-Forwarded-Proto` (defaulting to `http`).
pub fn resolve_base_url(configured: Option<&Url>, headers: &HeaderMap) -> Option<Url> {
    if let Some(url) = configured {
        return Some(url.clone());
    }

    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())?;

    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| value == "http" || value == "https")
        .unwrap_or_else(|| "http".to_string());

    Url::parse(&format!("{scheme}://{host}/")).ok()
}

/// Absolute form of `path` when a public URL is configured, otherwise the path itself.
pub fn canonical_url(configured: Option<&Url>, path: &str) -> String {
    configured
        .and_then(|base| base.join(path).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn configured_url_takes_precedence() {
        let configured = Url::parse("https://blog.example/").expect("valid url");
        let resolved = resolve_base_url(Some(&configured), &headers(&[("host", "other:8000")]));
        assert_eq!(resolved, Some(configured));
    }

    #[test]
    fn host_header_defaults_to_http() {
        let resolved = resolve_base_url(None, &headers(&[("host", "localhost:8000")]));
        assert_eq!(
            resolved.map(|url| url.to_string()),
            Some("http://localhost:8000/".to_string())
        );
    }

    #[test]
    fn forwarded_proto_is_honoured() {
        let resolved = resolve_base_url(
            None,
            &headers(&[("host", "blog.example"), ("x-forwarded-proto", "HTTPS, http")]),
        );
        assert_eq!(
            resolved.map(|url| url.to_string()),
            Some("https://blog.example/".to_string())
        );
    }

    #[test]
    fn missing_host_yields_nothing() {
        assert!(resolve_base_url(None, &HeaderMap::new()).is_none());
    }

    #[test]
    fn canonical_falls_back_to_path() {
        assert_eq!(canonical_url(None, "/search/"), "/search/");
        let base = Url::parse("https://blog.example/").expect("valid url");
        assert_eq!(
            canonical_url(Some(&base), "/search/"),
            "https://blog.example/search/"
        );
    }
}
