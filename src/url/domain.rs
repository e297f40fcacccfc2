use std::net::IpAddr;
use url::Url;

/// Second-level labels under which registrations happen one level deeper
const TWO_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "com.au", "net.au", "org.au", "co.nz", "co.jp",
    "com.br", "co.in", "co.za",
];

/// Extracts the domain (lowercase host) from a URL
///
/// The port is not part of the domain: every port on a host shares the same
/// rate limit and robots policy.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_harvest::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM:8443/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the registrable apex of a host
///
/// Uses the last two labels, or three when the host sits under a known
/// two-label public suffix such as `co.uk`. IP addresses are their own apex.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::apex_domain;
///
/// assert_eq!(apex_domain("news.example.com"), "example.com");
/// assert_eq!(apex_domain("www.bbc.co.uk"), "bbc.co.uk");
/// assert_eq!(apex_domain("127.0.0.1"), "127.0.0.1");
/// ```
pub fn apex_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();

    if host.parse::<IpAddr>().is_ok() {
        return host;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host;
    }

    let last_two = labels[labels.len() - 2..].join(".");
    let keep = if TWO_LABEL_SUFFIXES.contains(&last_two.as_str()) {
        3
    } else {
        2
    };

    labels[labels.len().saturating_sub(keep)..].join(".")
}
