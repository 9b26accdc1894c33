use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use product_harvester::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if `candidate` belongs to the same site as `root`
///
/// Hosts are compared case-insensitively with any leading `www.` ignored, and
/// ports must match so that local test servers on different ports stay apart.
pub fn is_same_site(root: &Url, candidate: &Url) -> bool {
    let (Some(root_host), Some(candidate_host)) = (extract_domain(root), extract_domain(candidate))
    else {
        return false;
    };

    strip_www(&root_host) == strip_www(&candidate_host)
        && root.port_or_known_default() == candidate.port_or_known_default()
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_extract_subdomain() {
        let url = url("https://blog.example.com/post");
        assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = url("https://example.com:8080/");
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_mixed_case() {
        let url = url("https://Example.COM/");
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_same_site_ignores_www() {
        assert!(is_same_site(
            &url("https://www.shop.com/"),
            &url("https://shop.com/p/1")
        ));
        assert!(!is_same_site(
            &url("https://shop.com/"),
            &url("http://SHOP.com/x")
        ));
    }

    #[test]
    fn test_same_site_rejects_other_hosts_and_ports() {
        assert!(!is_same_site(
            &url("https://shop.com/"),
            &url("https://blog.shop.com/")
        ));
        assert!(!is_same_site(
            &url("http://127.0.0.1:4000/"),
            &url("http://127.0.0.1:4001/")
        ));
        assert!(is_same_site(
            &url("http://127.0.0.1:4000/"),
            &url("http://127.0.0.1:4000/catalog")
        ));
    }
}
