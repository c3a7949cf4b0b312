/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use chrono::{DateTime, Utc};
use http::HeaderMap;
use http::header::SET_COOKIE;

use hx_types::net::Host;

mod parse;
mod psl;

pub use psl::{NoPublicSuffix, PublicSuffix};

use parse::parse_set_cookie;

/// One stored cookie, RFC 6265 storage model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub persistent: bool,
    pub host_only: bool,
    pub secure_only: bool,
    pub http_only: bool,
}

impl Cookie {
    fn same_identity(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    fn expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires, Some(at) if at <= now)
    }
}

/// The request host must equal the cookie domain, or be a subdomain of it.
/// IP addresses never domain-match.
fn domain_matches(host: &str, domain: &str, host_is_ip: bool) -> bool {
    if host == domain {
        return true;
    }
    if host_is_ip {
        return false;
    }
    host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

/// RFC 6265 section 5.1.4.
fn default_path(request_path: &str) -> String {
    if !request_path.starts_with('/') {
        return "/".to_string();
    }
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(p) => request_path[..p].to_string(),
    }
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    if request_path.starts_with(cookie_path) {
        return cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/');
    }
    false
}

/// An in-memory cookie store with value semantics.
///
/// No two cookies share `(domain, path, name)`. Expired cookies are pruned
/// lazily whenever the jar is read for a request.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        CookieJar::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    pub fn get(&self, domain: &str, path: &str, name: &str) -> Option<&Cookie> {
        self.cookies
            .iter()
            .find(|c| c.domain == domain && c.path == path && c.name == name)
    }

    /// Insert or replace on `(domain, path, name)`. A replaced cookie keeps
    /// its original creation time.
    pub fn insert(&mut self, mut cookie: Cookie) {
        if let Some(p) = self.cookies.iter().position(|c| c.same_identity(&cookie)) {
            cookie.created = self.cookies[p].created;
            self.cookies[p] = cookie;
        } else {
            self.cookies.push(cookie);
        }
    }

    /// Ingest every `Set-Cookie` header of a response, per RFC 6265
    /// section 5.3.
    pub fn update_from_response(
        &mut self,
        host: &Host,
        request_path: &str,
        headers: &HeaderMap,
        psl: &dyn PublicSuffix,
        now: DateTime<Utc>,
    ) {
        let request_host = host.to_string();
        let host_is_ip = host.is_ip();
        for value in headers.get_all(SET_COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            let Some(set) = parse_set_cookie(value, now) else {
                continue;
            };

            let (domain, host_only) = match set.domain {
                Some(domain) => {
                    // never scope a cookie to a public suffix, unless the
                    // host IS that suffix (then fall back to host-only)
                    if psl.is_public_suffix(&domain) {
                        if request_host != domain {
                            continue;
                        }
                        (request_host.clone(), true)
                    } else if domain_matches(&request_host, &domain, host_is_ip) {
                        (domain, false)
                    } else {
                        continue;
                    }
                }
                None => (request_host.clone(), true),
            };

            let path = set
                .path
                .unwrap_or_else(|| default_path(request_path));

            self.insert(Cookie {
                name: set.name,
                value: set.value,
                domain,
                path,
                persistent: set.expires.is_some(),
                expires: set.expires,
                created: now,
                last_access: now,
                host_only,
                secure_only: set.secure,
                http_only: set.http_only,
            });
        }
    }

    /// The `Cookie` header for a request to `host`/`path`, or None when no
    /// stored cookie matches. Matching cookies are ordered by path length
    /// descending, then creation time ascending. Expired cookies are removed
    /// and the `last_access` of every sent cookie is updated.
    pub fn cookie_header_value(
        &mut self,
        host: &Host,
        path: &str,
        secure: bool,
        now: DateTime<Utc>,
    ) -> Option<String> {
        self.cookies.retain(|c| !c.expired(now));

        let request_host = host.to_string();
        let host_is_ip = host.is_ip();

        let mut picked: Vec<&mut Cookie> = self
            .cookies
            .iter_mut()
            .filter(|c| {
                let domain_ok = if c.host_only {
                    request_host == c.domain
                } else {
                    domain_matches(&request_host, &c.domain, host_is_ip)
                };
                domain_ok && path_matches(path, &c.path) && (secure || !c.secure_only)
            })
            .collect();
        if picked.is_empty() {
            return None;
        }

        picked.sort_by(|a, b| {
            b.path
                .len()
                .cmp(&a.path.len())
                .then(a.created.cmp(&b.created))
        });

        let mut header = String::new();
        for cookie in picked {
            cookie.last_access = now;
            if !header.is_empty() {
                header.push_str("; ");
            }
            header.push_str(&cookie.name);
            header.push('=');
            header.push_str(&cookie.value);
        }
        Some(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use http::HeaderValue;

    fn jar_with(headers: &[&str], host: &str, path: &str, now: DateTime<Utc>) -> CookieJar {
        let mut map = HeaderMap::new();
        for h in headers {
            map.append(SET_COOKIE, HeaderValue::from_str(h).unwrap());
        }
        let mut jar = CookieJar::new();
        jar.update_from_response(
            &Host::Domain(host.to_string()),
            path,
            &map,
            &NoPublicSuffix,
            now,
        );
        jar
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn host_only_cookie_not_sent_to_subdomain() {
        let now = t0();
        let mut jar = jar_with(&["sid=1"], "example.com", "/", now);

        let host = Host::Domain("www.example.com".to_string());
        assert!(jar.cookie_header_value(&host, "/", false, now).is_none());

        let host = Host::Domain("example.com".to_string());
        assert_eq!(
            jar.cookie_header_value(&host, "/", false, now).as_deref(),
            Some("sid=1")
        );
    }

    #[test]
    fn domain_cookie_sent_to_subdomain() {
        let now = t0();
        let mut jar = jar_with(&["sid=1; Domain=example.com"], "example.com", "/", now);

        let host = Host::Domain("www.example.com".to_string());
        assert_eq!(
            jar.cookie_header_value(&host, "/", false, now).as_deref(),
            Some("sid=1")
        );
        let host = Host::Domain("notexample.com".to_string());
        assert!(jar.cookie_header_value(&host, "/", false, now).is_none());
    }

    #[test]
    fn public_suffix_domain_rejected() {
        let now = t0();
        let mut map = HeaderMap::new();
        map.append(SET_COOKIE, HeaderValue::from_static("evil=1; Domain=com"));
        let mut jar = CookieJar::new();
        let psl = |d: &str| d == "com";
        jar.update_from_response(
            &Host::Domain("example.com".to_string()),
            "/",
            &map,
            &psl,
            now,
        );
        assert!(jar.is_empty());
    }

    #[test]
    fn foreign_domain_rejected() {
        let now = t0();
        let jar = jar_with(&["a=1; Domain=other.org"], "example.com", "/", now);
        assert!(jar.is_empty());
    }

    #[test]
    fn replace_keeps_creation_time() {
        let now = t0();
        let later = now + TimeDelta::seconds(60);
        let mut jar = jar_with(&["sid=1"], "example.com", "/", now);
        let mut map = HeaderMap::new();
        map.append(SET_COOKIE, HeaderValue::from_static("sid=2"));
        jar.update_from_response(
            &Host::Domain("example.com".to_string()),
            "/",
            &map,
            &NoPublicSuffix,
            later,
        );

        assert_eq!(jar.len(), 1);
        let c = jar.get("example.com", "/", "sid").unwrap();
        assert_eq!(c.value, "2");
        assert_eq!(c.created, now);
        assert_eq!(c.last_access, later);
    }

    #[test]
    fn expired_pruned_at_read_time() {
        let now = t0();
        let mut jar = jar_with(&["gone=1; Max-Age=10"], "example.com", "/", now);
        assert_eq!(jar.len(), 1);

        let host = Host::Domain("example.com".to_string());
        let later = now + TimeDelta::seconds(11);
        assert!(jar.cookie_header_value(&host, "/", false, later).is_none());
        assert!(jar.is_empty());
    }

    #[test]
    fn secure_cookie_needs_secure_request() {
        let now = t0();
        let mut jar = jar_with(&["s=1; Secure"], "example.com", "/", now);
        let host = Host::Domain("example.com".to_string());
        assert!(jar.cookie_header_value(&host, "/", false, now).is_none());
        assert_eq!(
            jar.cookie_header_value(&host, "/", true, now).as_deref(),
            Some("s=1")
        );
    }

    #[test]
    fn path_filter_and_order() {
        let now = t0();
        let mut jar = jar_with(
            &["outer=1; Path=/", "inner=2; Path=/deep", "other=3; Path=/elsewhere"],
            "example.com",
            "/",
            now,
        );
        let host = Host::Domain("example.com".to_string());
        // longest path first
        assert_eq!(
            jar.cookie_header_value(&host, "/deep/page", false, now)
                .as_deref(),
            Some("inner=2; outer=1")
        );
        assert_eq!(
            jar.cookie_header_value(&host, "/", false, now).as_deref(),
            Some("outer=1")
        );
    }

    #[test]
    fn default_path_from_request() {
        assert_eq!(default_path("/a/b/c"), "/a/b");
        assert_eq!(default_path("/a"), "/");
        assert_eq!(default_path("/"), "/");
        assert_eq!(default_path(""), "/");
    }

    #[test]
    fn path_matching_rules() {
        assert!(path_matches("/a/b", "/a"));
        assert!(path_matches("/a/b", "/a/"));
        assert!(path_matches("/a", "/a"));
        assert!(!path_matches("/ab", "/a"));
        assert!(!path_matches("/", "/a"));
    }

    #[test]
    fn ip_host_never_domain_matches() {
        assert!(!domain_matches("10.0.0.1", "0.0.1", true));
        assert!(domain_matches("10.0.0.1", "10.0.0.1", true));
    }
}
