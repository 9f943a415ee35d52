//! Domain canonicalization used to key `DomainProfile` lookups.

use url::Url;

/// Extracts the canonical domain key for a URL: lowercased host with a
/// single leading `www.` stripped. Subdomains other than `www` are kept
/// distinct (`shop.example.com` and `example.com` are different keys).
pub fn extract_domain(url: &str) -> crate::error::Result<String> {
    let parsed = Url::parse(url)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| crate::error::FetchError::BadRequest(format!("url has no host: {url}")))?;
    Ok(canonicalize_host(host))
}

fn canonicalize_host(host: &str) -> String {
    let lower = host.to_ascii_lowercase();
    lower.strip_prefix("www.").unwrap_or(&lower).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain_basic() {
        assert_eq!(extract_domain("https://example.com/a/b").unwrap(), "example.com");
    }

    #[test]
    fn test_extract_domain_strips_www() {
        assert_eq!(
            extract_domain("https://www.example.com/page").unwrap(),
            "example.com"
        );
    }

    #[test]
    fn test_extract_domain_lowercases() {
        assert_eq!(extract_domain("https://EXAMPLE.COM").unwrap(), "example.com");
    }

    #[test]
    fn test_extract_domain_keeps_other_subdomains() {
        assert_eq!(
            extract_domain("https://shop.example.com").unwrap(),
            "shop.example.com"
        );
        assert_ne!(
            extract_domain("https://shop.example.com").unwrap(),
            extract_domain("https://example.com").unwrap()
        );
    }

    #[test]
    fn test_extract_domain_keeps_port_out_of_key() {
        assert_eq!(extract_domain("https://example.com:8443/x").unwrap(), "example.com");
    }

    #[test]
    fn test_extract_domain_rejects_malformed_url() {
        assert!(extract_domain("not a url").is_err());
    }

    #[test]
    fn test_extract_domain_www_only_host_is_empty_after_strip() {
        // a literal "www." or "www" host is pathological but should not panic
        assert_eq!(canonicalize_host("www"), "www");
    }
}
