//! Registrable domain extraction from endpoint addresses.
//!
//! Endpoint addresses are conventionally `"<node-identity>-<url>"`. The
//! extracted domain groups endpoints run by the same provider so that
//! multi-endpoint selection can spread requests across providers.

use std::net::IpAddr;
use url::Url;

/// Two-label public suffixes under which registrations take a third label.
const MULTI_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "me.uk", "com.au", "net.au", "org.au", "co.nz",
    "co.jp", "ne.jp", "co.kr", "co.in", "co.za", "com.br", "com.cn", "com.mx", "com.sg",
    "com.tr", "com.hk",
];

/// Suffixes of private networks; hosts under them are returned whole.
const INTERNAL_SUFFIXES: &[&str] = &[".local", ".internal", ".corp", ".home", ".lan"];

/// Extracts the registrable domain (eTLD+1) of the URL embedded in `addr`.
///
/// Resolution order:
///
/// 1. `addr` parsed as a URL
/// 2. the substring starting at the first `http`
/// 3. any `-`, `_` or space separated part containing a dot, as `https://<part>`
///
/// IP addresses, `localhost` and private or single-label hosts are returned
/// as-is. Returns `None` when no host can be found.
#[must_use]
pub fn extract_tld(addr: &str) -> Option<String> {
    if let Some(domain) = domain_of(addr) {
        return Some(domain);
    }

    if let Some(idx) = addr.find("http") {
        if let Some(domain) = domain_of(&addr[idx..]) {
            return Some(domain);
        }
    }

    addr.split(['-', '_', ' '])
        .filter(|part| part.contains('.') && !part.starts_with("http"))
        .find_map(|part| domain_of(&format!("https://{part}")))
}

fn domain_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;
    if host.is_empty() {
        return None;
    }
    Some(registrable_domain(host))
}

fn registrable_domain(host: &str) -> String {
    let host = host.trim_start_matches('[').trim_end_matches(']').trim_end_matches('.');
    let host = host.to_ascii_lowercase();

    if host.parse::<IpAddr>().is_ok() || is_localhost(&host) || is_internal(&host) {
        return host;
    }

    let labels: Vec<&str> = host.split('.').collect();
    let len = labels.len();

    if len >= 3 {
        let suffix = labels[len - 2..].join(".");
        if MULTI_LABEL_SUFFIXES.contains(&suffix.as_str()) {
            return labels[len - 3..].join(".");
        }
    }

    labels[len - 2..].join(".")
}

fn is_localhost(host: &str) -> bool {
    host == "localhost" || host.starts_with("localhost.")
}

fn is_internal(host: &str) -> bool {
    !host.contains('.') || INTERNAL_SUFFIXES.iter().any(|suffix| host.ends_with(suffix))
}
