//! # Target Classification
//!
//! Deterministic classification of a target string, URL host extraction,
//! and file-name sanitisation.
//!
//! Rules, applied in order:
//! 1. starts with `http://` or `https://` => `url`
//! 2. dotted-quad of 1-3 ASCII digits per octet => `ip`
//! 3. anything else => `domain`
//!
//! IPv6 literals fall through to `domain`. This is the documented
//! behaviour and is kept as-is; see DESIGN.md.

use crate::TargetType;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static DOTTED_QUAD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[0-9]{1,3}(\.[0-9]{1,3}){3}$").ok());

/// Classify a target value.
#[must_use]
pub fn classify(value: &str) -> TargetType {
    if is_url(value) {
        TargetType::Url
    } else if is_dotted_quad(value) {
        TargetType::Ip
    } else {
        TargetType::Domain
    }
}

/// `^https?://`
fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Four dot-separated groups of 1-3 ASCII digits.
///
/// Octet values are not range-checked: `999.1.1.1` is still an `ip`.
fn is_dotted_quad(value: &str) -> bool {
    DOTTED_QUAD.as_ref().is_some_and(|re| re.is_match(value))
}

/// Extract the hostname component of a URL.
///
/// Returns `None` when the value does not parse or has no host.
/// Bracketed IPv6 hosts are returned without brackets.
#[must_use]
pub fn extract_hostname(value: &str) -> Option<String> {
    let parsed = Url::parse(value).ok()?;
    let host = parsed.host_str()?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Make a target safe for use in a file name.
///
/// Every character other than a word character, `.` or `-` becomes `_`.
#[must_use]
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_known_examples() {
        assert_eq!(classify("http://example.com"), TargetType::Url);
        assert_eq!(classify("https://example.com/path?q=1"), TargetType::Url);
        assert_eq!(classify("192.168.1.1"), TargetType::Ip);
        assert_eq!(classify("example.com"), TargetType::Domain);
    }

    #[test]
    fn classify_edge_cases() {
        // Not range checked
        assert_eq!(classify("999.999.999.999"), TargetType::Ip);
        // Too many / too few octets
        assert_eq!(classify("1.2.3.4.5"), TargetType::Domain);
        assert_eq!(classify("1.2.3"), TargetType::Domain);
        assert_eq!(classify("1.2.3."), TargetType::Domain);
        assert_eq!(classify("1234.1.1.1"), TargetType::Domain);
        // Whole-value match on ASCII digits only
        assert_eq!(classify("1.2.3.4\n"), TargetType::Domain);
        assert_eq!(classify(" 1.2.3.4"), TargetType::Domain);
        assert_eq!(classify("\u{0661}.2.3.4"), TargetType::Domain);
        // Scheme is case sensitive, like the pattern
        assert_eq!(classify("HTTP://example.com"), TargetType::Domain);
        assert_eq!(classify("ftp://example.com"), TargetType::Domain);
    }

    #[test]
    fn ipv6_is_classified_as_domain() {
        assert_eq!(classify("2001:db8::1"), TargetType::Domain);
        assert_eq!(classify("::1"), TargetType::Domain);
    }

    #[test]
    fn hostname_extraction() {
        assert_eq!(
            extract_hostname("https://Sub.Example.com:8443/login").as_deref(),
            Some("sub.example.com")
        );
        assert_eq!(
            extract_hostname("http://[2001:db8::1]:80/").as_deref(),
            Some("2001:db8::1")
        );
        assert_eq!(extract_hostname("http://"), None);
        assert_eq!(extract_hostname("not a url"), None);
    }

    #[test]
    fn sanitize_replaces_non_word_characters() {
        assert_eq!(sanitize("example.com"), "example.com");
        assert_eq!(
            sanitize("https://example.com/a?b=c"),
            "https___example.com_a_b_c"
        );
        assert_eq!(sanitize("2001:db8::1"), "2001_db8__1");
    }
}
