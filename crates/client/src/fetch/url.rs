//! URL canonicalization and scope handling.

use url::Url;

/// Error type for URL handling failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL so equivalent requests share one cache identity.
///
/// Normalization steps:
/// 1. Lowercase the host
/// 2. Remove fragment (#...)
/// 3. Keep query string intact (do not reorder)
pub fn canonicalize(url: &Url) -> Url {
    let mut canonical = url.clone();
    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            // host_str came from a parsed URL, so the lowered form parses too
            let _ = canonical.set_host(Some(&lowered));
        }
    }
    canonical.set_fragment(None);
    canonical
}

/// The controlled scope: an origin plus its root path.
#[derive(Debug, Clone)]
pub struct Scope {
    root: Url,
}

impl Scope {
    /// Build a scope from an origin string such as `https://app.example`.
    pub fn new(origin: &str) -> Result<Self, UrlError> {
        let trimmed = origin.trim();
        if trimmed.is_empty() {
            return Err(UrlError::Empty);
        }

        let parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
        }

        let root = parsed.join("/").map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        Ok(Self { root: canonicalize(&root) })
    }

    /// The root document URL (`/`).
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Resolve a path or absolute URL against the scope.
    pub fn resolve(&self, input: &str) -> Result<Url, UrlError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(UrlError::Empty);
        }
        let url = self.root.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        Ok(canonicalize(&url))
    }

    /// Whether `url` has the same scheme, host and port as the scope.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.root.origin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let canonical = canonicalize(&url("https://EXAMPLE.COM/Path"));
        assert_eq!(canonical.host_str(), Some("example.com"));
        assert_eq!(canonical.path(), "/Path");
    }

    #[test]
    fn test_canonicalize_remove_fragment() {
        let canonical = canonicalize(&url("https://example.com/#section"));
        assert_eq!(canonical.fragment(), None);
        assert_eq!(canonical.as_str(), "https://example.com/");
    }

    #[test]
    fn test_canonicalize_preserve_query() {
        let canonical = canonicalize(&url("https://example.com/?b=2&a=1"));
        assert_eq!(canonical.query(), Some("b=2&a=1"));
    }

    #[test]
    fn test_scope_root() {
        let scope = Scope::new("https://app.test").unwrap();
        assert_eq!(scope.root().as_str(), "https://app.test/");
    }

    #[test]
    fn test_scope_resolve_path() {
        let scope = Scope::new("http://localhost:8080").unwrap();
        let resolved = scope.resolve("/index.css").unwrap();
        assert_eq!(resolved.as_str(), "http://localhost:8080/index.css");
    }

    #[test]
    fn test_scope_resolve_absolute() {
        let scope = Scope::new("https://app.test").unwrap();
        let resolved = scope.resolve("https://cdn.test/lib.js#x").unwrap();
        assert_eq!(resolved.as_str(), "https://cdn.test/lib.js");
    }

    #[test]
    fn test_scope_same_origin() {
        let scope = Scope::new("https://app.test").unwrap();
        assert!(scope.is_same_origin(&url("https://app.test/index.html")));
        assert!(!scope.is_same_origin(&url("http://app.test/index.html")));
        assert!(!scope.is_same_origin(&url("https://app.test:8443/")));
        assert!(!scope.is_same_origin(&url("https://cdn.test/")));
    }

    #[test]
    fn test_scope_unsupported_scheme() {
        assert!(matches!(Scope::new("file:///tmp"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_scope_empty() {
        assert!(matches!(Scope::new("   "), Err(UrlError::Empty)));
        let scope = Scope::new("https://app.test").unwrap();
        assert!(matches!(scope.resolve(""), Err(UrlError::Empty)));
    }
}
