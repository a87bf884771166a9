//! Cache key derivation.

/// Join a resolved host and path into a store key.
///
/// Empty segments are dropped, so the key never starts with a slash and never
/// contains `//`.
pub fn cache_key(host: &str, path: &str) -> String {
    let mut key = String::with_capacity(host.len() + path.len() + 1);
    key.push_str(host.trim_matches('/'));
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(segment);
    }
    key
}
