//! Sort-friendly URI Reordering Transform.
//!
//! SURT rewrites a URI so that lexical ordering groups related resources together: the host
//! name is reversed and comma-separated, the scheme is dropped and everything is lowercased.
//! `http://www.Example.com/a?b=1&a=2` becomes `com,example)/a?a=2&b=1`.
use url::Url;

lazy_static! {
    /// Leading `www.`, `www1.` and so on, which are dropped from host names.
    static ref WWW_PREFIX: regex::Regex = regex::Regex::new(r"^www\d*\.").unwrap();
}

/// Canonicalize a URI into its SURT form.
///
/// Input that cannot be parsed as a hierarchical URI is only lowercased.
pub fn canonicalize(uri: &str) -> String {
    let uri = uri.trim();
    let url = match Url::parse(uri) {
        Ok(url) if !url.cannot_be_a_base() => url,
        _ => return uri.to_lowercase(),
    };
    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_lowercase(),
        _ => return uri.to_lowercase(),
    };

    let host = host.trim_end_matches('.');
    let host = WWW_PREFIX.replace(host, "");
    let mut out = if host.parse::<std::net::IpAddr>().is_ok() || host.starts_with('[') {
        host.into_owned()
    } else {
        host.rsplit('.').collect::<Vec<_>>().join(",")
    };

    if let Some(port) = url.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push(')');
    out.push_str(&url.path().to_lowercase());

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        let mut params: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
        params.sort_unstable();
        out.push('?');
        out.push_str(&params.join("&").to_lowercase());
    }
    out
}
