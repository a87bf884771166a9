//! Turns an inbound request into an origin request.

use axum::http::Method;
use mirror_cache::cache_key;
use mirror_core::{Error, Result, decode_path, encode_path};
use serde::{Deserialize, Serialize};
use url::Url;

/// Characters that may never appear in a mirrored host name.
const INVALID_HOST_CHARS: &str = "`~!@#$%^&*()+={}[]|\\\"';:><?/";

/// How hosts and paths are derived from requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Take the host from the first path segment instead of the Host header.
    #[serde(default)]
    pub host_from_first_path: bool,
    /// Required host suffix, stripped before contacting the origin.
    #[serde(default)]
    pub base_domain: Option<String>,
    /// Requests whose path ends with one of these are refused.
    #[serde(default)]
    pub block_suffixes: Vec<String>,
}

/// A request rewritten towards its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub method: Method,
    pub host: String,
    /// Decoded path below the host.
    pub path: String,
    /// `https://{host}{path}`, encoded, without query.
    pub url: Url,
    /// Store key, `{host}/{path}` with the path decoded.
    pub key: String,
}

#[derive(Debug, Clone, Default)]
pub struct RequestResolver {
    config: ResolverConfig,
}

impl RequestResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Resolve a request given its method, Host header and raw
    /// (percent-encoded) path.
    ///
    /// Suffix checks, `..` rejection and the cache key all work on the
    /// decoded path; only the origin URL is re-encoded.
    pub fn resolve(&self, method: &Method, host: Option<&str>, raw_path: &str) -> Result<ResolvedRequest> {
        if method != Method::GET && method != Method::HEAD {
            return Err(Error::MethodNotAllowed(method.to_string()));
        }

        let path = decode_path(raw_path)?;

        if self
            .config
            .block_suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && path.ends_with(suffix.as_str()))
        {
            return Err(Error::Forbidden(path));
        }

        if path.is_empty() || path.ends_with('/') {
            return Err(Error::NotFound(format!("no file in path {:?}", path)));
        }

        let (host, path) = if self.config.host_from_first_path {
            let trimmed = path.strip_prefix('/').unwrap_or(&path);
            let (host, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));
            if rest.is_empty() {
                return Err(Error::NotFound(format!("no file after host in {:?}", path)));
            }
            (host.to_string(), format!("/{}", rest))
        } else {
            (host.unwrap_or_default().to_string(), path)
        };

        let host = self.origin_host(&host)?;

        if path.split('/').any(|segment| segment == "..") {
            return Err(Error::NotFound(format!("relative segment in {:?}", path)));
        }

        let url = Url::parse(&format!("https://{}{}", host, encode_path(&path)))
            .map_err(|e| Error::NotFound(format!("invalid origin url: {}", e)))?;
        let key = cache_key(&host, &path);

        Ok(ResolvedRequest {
            method: method.clone(),
            host,
            path,
            url,
            key,
        })
    }

    /// Whether requests carrying this Host header are mirrored by host name.
    /// Always false when the host comes from the path.
    pub fn is_mirrored_host(&self, host: Option<&str>) -> bool {
        if self.config.host_from_first_path {
            return false;
        }
        host.is_some_and(|host| self.origin_host(host).is_ok())
    }

    /// Lowercase and validate `host`, then strip the base domain.
    fn origin_host(&self, host: &str) -> Result<String> {
        let host = host.to_ascii_lowercase();
        if !host.contains('.') || !is_valid_domain(&host) {
            return Err(Error::NotFound(format!("invalid host {:?}", host)));
        }

        let Some(base) = self.config.base_domain.as_deref().filter(|b| !b.is_empty()) else {
            return Ok(host);
        };
        let stripped = host
            .strip_suffix(&base.to_ascii_lowercase())
            .map(|h| h.trim_end_matches('.'))
            .ok_or_else(|| Error::NotFound(format!("host {:?} outside {:?}", host, base)))?;
        if stripped.is_empty() {
            return Err(Error::NotFound(format!("no host below {:?}", base)));
        }
        Ok(stripped.to_string())
    }
}

/// Domain name syntax check (RFC 1035 / RFC 3696, leniently).
pub fn is_valid_domain(host: &str) -> bool {
    let host = host.trim();
    if host.is_empty() || host.len() > 255 {
        return false;
    }
    if host.starts_with(['-', '_', '.']) || host.ends_with(['-', '_']) {
        return false;
    }
    !host.contains(|c: char| INVALID_HOST_CHARS.contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(config: ResolverConfig) -> RequestResolver {
        RequestResolver::new(config)
    }

    fn first_path() -> RequestResolver {
        resolver(ResolverConfig {
            host_from_first_path: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_host_header_mode() {
        let resolved = resolver(ResolverConfig::default())
            .resolve(&Method::GET, Some("Example.com"), "/a/b.tar.gz")
            .expect("resolve");
        assert_eq!(resolved.host, "example.com");
        assert_eq!(resolved.path, "/a/b.tar.gz");
        assert_eq!(resolved.url.as_str(), "https://example.com/a/b.tar.gz");
        assert_eq!(resolved.key, "example.com/a/b.tar.gz");
    }

    #[test]
    fn test_host_from_first_path() {
        let resolved = first_path()
            .resolve(&Method::GET, Some("mirror.local"), "/example.com/a/b")
            .expect("resolve");
        assert_eq!(resolved.host, "example.com");
        assert_eq!(resolved.path, "/a/b");
        assert_eq!(resolved.url.as_str(), "https://example.com/a/b");
    }

    #[test]
    fn test_host_only_is_not_found() {
        let err = first_path()
            .resolve(&Method::GET, None, "/onlyhost")
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_directory_paths_are_not_found() {
        let resolver = resolver(ResolverConfig::default());
        for path in ["", "/", "/dir/"] {
            let err = resolver
                .resolve(&Method::GET, Some("example.com"), path)
                .unwrap_err();
            assert!(err.is_not_found(), "{:?}", path);
        }
    }

    #[test]
    fn test_only_get_and_head() {
        let resolver = resolver(ResolverConfig::default());
        assert!(resolver.resolve(&Method::HEAD, Some("example.com"), "/f").is_ok());
        let err = resolver
            .resolve(&Method::POST, Some("example.com"), "/f")
            .unwrap_err();
        assert!(matches!(err, Error::MethodNotAllowed(_)));
    }

    #[test]
    fn test_blocked_suffix_checked_before_host() {
        let resolver = resolver(ResolverConfig {
            block_suffixes: vec![".iso".to_string()],
            ..Default::default()
        });
        let err = resolver
            .resolve(&Method::GET, Some("not a host"), "/big.iso")
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[test]
    fn test_invalid_hosts() {
        let resolver = resolver(ResolverConfig::default());
        for host in ["localhost", "-example.com", "example.com-", ".example.com", "example.com:8080", "ex ample.com?"] {
            let err = resolver.resolve(&Method::GET, Some(host), "/f").unwrap_err();
            assert!(err.is_not_found(), "{}", host);
        }
    }

    #[test]
    fn test_base_domain_is_stripped() {
        let resolver = resolver(ResolverConfig {
            base_domain: Some("mirror.example.net".to_string()),
            ..Default::default()
        });

        let resolved = resolver
            .resolve(&Method::GET, Some("github.com.mirror.example.net"), "/x/y")
            .expect("resolve");
        assert_eq!(resolved.host, "github.com");
        assert_eq!(resolved.key, "github.com/x/y");

        let err = resolver
            .resolve(&Method::GET, Some("github.com"), "/x/y")
            .unwrap_err();
        assert!(err.is_not_found());

        let err = resolver
            .resolve(&Method::GET, Some("mirror.example.net"), "/x/y")
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_parent_segments_rejected() {
        let err = first_path()
            .resolve(&Method::GET, None, "/example.com/../etc/passwd")
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_encoded_paths_are_decoded() {
        let resolved = resolver(ResolverConfig::default())
            .resolve(&Method::GET, Some("example.com"), "/pool/a%20b.txt")
            .expect("resolve");
        assert_eq!(resolved.path, "/pool/a b.txt");
        assert_eq!(resolved.key, "example.com/pool/a b.txt");
        assert_eq!(resolved.url.as_str(), "https://example.com/pool/a%20b.txt");
    }

    #[test]
    fn test_encoded_parent_segments_rejected() {
        let resolver = resolver(ResolverConfig::default());
        for path in ["/a/%2e%2e/etc/x", "/a/%2E%2E/etc/x", "/a/.%2e/x"] {
            let err = resolver
                .resolve(&Method::GET, Some("example.com"), path)
                .unwrap_err();
            assert!(err.is_not_found(), "{}", path);
        }
    }

    #[test]
    fn test_invalid_utf8_path_is_not_found() {
        let err = resolver(ResolverConfig::default())
            .resolve(&Method::GET, Some("example.com"), "/file%ff")
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_encoded_blocked_suffix() {
        let resolver = resolver(ResolverConfig {
            block_suffixes: vec![".iso".to_string()],
            ..Default::default()
        });
        let err = resolver
            .resolve(&Method::GET, Some("example.com"), "/disk%2Eiso")
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[test]
    fn test_is_mirrored_host() {
        let by_header = resolver(ResolverConfig::default());
        assert!(by_header.is_mirrored_host(Some("gitlab.com")));
        assert!(!by_header.is_mirrored_host(Some("localhost:8080")));
        assert!(!by_header.is_mirrored_host(Some("127.0.0.1:8080")));
        assert!(!by_header.is_mirrored_host(None));
        assert!(!first_path().is_mirrored_host(Some("gitlab.com")));
    }

    #[test]
    fn test_is_valid_domain() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("a-b.example.co.uk"));
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("_example.com"));
        assert!(!is_valid_domain(&"a".repeat(256)));
    }
}
