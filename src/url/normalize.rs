use crate::UrlError;
use url::Url;

/// Query parameters that only track where a visitor came from
///
/// Any `utm_*` parameter is dropped as well.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "msclkid",
    "mc_cid",
    "mc_eid",
    "srsltid",
    "_pos",
    "_sid",
    "_ss",
    "ref",
    "source",
];

/// Normalizes a URL so that two links to the same shop page compare equal
///
/// The host is lowercased, dot segments, empty segments and a trailing slash
/// are removed from the path (the root keeps its `/`), the fragment is
/// dropped, tracking parameters are removed and the rest are sorted by key.
/// Scheme, port and path case are kept because the result is fetched as-is.
///
/// # Examples
///
/// ```
/// use product_harvester::url::normalize_url;
///
/// let url = normalize_url("https://Shop.Example.com/shoes/?utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://shop.example.com/shoes");
/// ```
pub fn normalize_url(raw: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(UrlError::InvalidScheme(format!(
                "only http and https are harvested, got {}",
                other
            )))
        }
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_string();
    if host.chars().any(|c| c.is_ascii_uppercase()) {
        url.set_host(Some(&host.to_ascii_lowercase()))
            .map_err(|e| UrlError::Malformed(format!("cannot lowercase host {}: {}", host, e)))?;
    }

    let path = clean_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    if url.query().is_some() {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.sort();

        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Resolves `.`/`..`, collapses repeated slashes and drops a trailing slash
fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
