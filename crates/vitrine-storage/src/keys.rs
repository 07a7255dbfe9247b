//! Storage key canonicalization.
//!
//! A canonical key is bucket-relative and free of scheme, host, query and leading
//! slashes. Normalization is applied until it reaches a fixed point, which makes it
//! idempotent even for pathological inputs such as URLs nested in URL paths.

use percent_encoding::percent_decode_str;
use url::Url;

/// True for `http://` and `https://` URLs, case-insensitively.
pub fn is_absolute_url(value: &str) -> bool {
    let bytes = value.trim_start().as_bytes();
    has_prefix_ignore_case(bytes, b"http://") || has_prefix_ignore_case(bytes, b"https://")
}

/// Upgrade `http://` URLs to `https://`; anything else passes through.
pub fn ensure_https(value: &str) -> String {
    if has_prefix_ignore_case(value.as_bytes(), b"http://") {
        // The prefix is ASCII, so byte 7 is a char boundary.
        format!("https://{}", &value[7..])
    } else {
        value.to_string()
    }
}

fn has_prefix_ignore_case(bytes: &[u8], prefix: &[u8]) -> bool {
    bytes.len() >= prefix.len() && bytes[..prefix.len()].eq_ignore_ascii_case(prefix)
}

#[derive(Debug, Clone, Default)]
pub struct KeyNormalizer {
    bucket: Option<String>,
}

impl KeyNormalizer {
    pub fn new(bucket: Option<String>) -> Self {
        let bucket = bucket
            .map(|b| b.trim().trim_matches('/').to_string())
            .filter(|b| !b.is_empty());
        Self { bucket }
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// Canonicalize a bare key, a full URL, or a `bucket/key` reference.
    ///
    /// Returns `None` when nothing is left after stripping.
    pub fn normalize(&self, raw: Option<&str>) -> Option<String> {
        let mut current = raw?.trim().to_string();
        loop {
            let next = self.step(&current);
            if next == current {
                break;
            }
            current = next;
        }
        if current.is_empty() {
            None
        } else {
            Some(current)
        }
    }

    /// One reduction: URL to path, then leading slashes, then the bucket segment.
    /// Every step either shortens the input or returns it unchanged.
    fn step(&self, value: &str) -> String {
        if is_absolute_url(value) {
            return url_path(value);
        }

        let trimmed = value.trim().trim_start_matches('/');
        if trimmed.len() != value.len() {
            return trimmed.to_string();
        }

        if let Some(bucket) = &self.bucket {
            if let Some(rest) = trimmed.strip_prefix(bucket.as_str()) {
                if rest.is_empty() || rest.starts_with('/') {
                    return rest.to_string();
                }
            }
        }

        trimmed.to_string()
    }
}

/// Decoded path component of an absolute URL.
fn url_path(value: &str) -> String {
    match Url::parse(value.trim()) {
        Ok(url) => percent_decode_str(url.path())
            .decode_utf8_lossy()
            .into_owned(),
        Err(_) => {
            // Unparseable host: cut the scheme and authority by hand.
            let without_scheme = value
                .trim()
                .split_once("://")
                .map(|(_, rest)| rest)
                .unwrap_or("");
            let path = without_scheme
                .find('/')
                .map(|idx| &without_scheme[idx..])
                .unwrap_or("");
            let path = path.split(['?', '#']).next().unwrap_or("");
            percent_decode_str(path).decode_utf8_lossy().into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> KeyNormalizer {
        KeyNormalizer::new(Some("wardrobe".to_string()))
    }

    #[test]
    fn test_bare_key_unchanged() {
        assert_eq!(
            normalizer().normalize(Some("catalog/x.png")).as_deref(),
            Some("catalog/x.png")
        );
    }

    #[test]
    fn test_full_url_keeps_only_path() {
        assert_eq!(
            normalizer()
                .normalize(Some("https://cdn.example/usergen/a%20b.png?v=3#frag"))
                .as_deref(),
            Some("usergen/a b.png")
        );
    }

    #[test]
    fn test_bucket_prefix_is_stripped() {
        let n = normalizer();
        assert_eq!(
            n.normalize(Some("wardrobe/catalog/x.png")).as_deref(),
            Some("catalog/x.png")
        );
        assert_eq!(
            n.normalize(Some("https://acct.r2.cloudflarestorage.com/wardrobe/catalog/x.png"))
                .as_deref(),
            Some("catalog/x.png")
        );
        // A segment that merely starts with the bucket name is kept.
        assert_eq!(
            n.normalize(Some("wardrobe-old/x.png")).as_deref(),
            Some("wardrobe-old/x.png")
        );
    }

    #[test]
    fn test_leading_slashes_stripped() {
        assert_eq!(
            normalizer().normalize(Some("///generated/1.png")).as_deref(),
            Some("generated/1.png")
        );
    }

    #[test]
    fn test_empty_results_are_none() {
        let n = normalizer();
        assert_eq!(n.normalize(None), None);
        assert_eq!(n.normalize(Some("")), None);
        assert_eq!(n.normalize(Some("///")), None);
        assert_eq!(n.normalize(Some("https://cdn.example/")), None);
        assert_eq!(n.normalize(Some("/wardrobe/")), None);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let n = normalizer();
        let inputs = [
            "catalog/x.png",
            "/catalog/x.png",
            "//wardrobe/catalog/x.png",
            "https://cdn.example/catalog/x.png?sig=1",
            "HTTP://cdn.example/wardrobe/wardrobe/x.png",
            "https://cdn.example/https://other.example/y.png",
            "https://cdn.example/a%2520b.png",
            "wardrobe",
            "  spaced/key.png ",
        ];
        for input in inputs {
            let once = n.normalize(Some(input));
            let twice = n.normalize(once.as_deref());
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_no_bucket_configured() {
        let n = KeyNormalizer::new(None);
        assert_eq!(
            n.normalize(Some("wardrobe/catalog/x.png")).as_deref(),
            Some("wardrobe/catalog/x.png")
        );
    }

    #[test]
    fn test_ensure_https() {
        assert_eq!(ensure_https("http://a/b"), "https://a/b");
        assert_eq!(ensure_https("HTTP://a/b"), "https://a/b");
        assert_eq!(ensure_https("https://a/b"), "https://a/b");
        assert_eq!(ensure_https("catalog/x.png"), "catalog/x.png");
    }

    #[test]
    fn test_is_absolute_url() {
        assert!(is_absolute_url("https://a"));
        assert!(is_absolute_url("Http://a"));
        assert!(!is_absolute_url("catalog/http://"));
        assert!(!is_absolute_url("ftp://a"));
        assert!(!is_absolute_url("http:"));
    }

    #[test]
    fn test_multibyte_host_is_still_a_url() {
        assert!(is_absolute_url("http://ü.example/catalog/x.png"));
        assert!(is_absolute_url("https://ü.example/catalog/x.png"));
        assert_eq!(
            normalizer()
                .normalize(Some("http://ü.example/catalog/x.png"))
                .as_deref(),
            Some("catalog/x.png")
        );
        assert_eq!(
            normalizer().normalize(Some("https://é/wardrobe/ü.png")).as_deref(),
            Some("ü.png")
        );
        assert_eq!(ensure_https("http://ü.example/x"), "https://ü.example/x");
        assert_eq!(ensure_https("ü"), "ü");
    }
}
