/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

use anyhow::anyhow;

/// The host part of an authority, either an IP address or a registered domain.
///
/// Domains are stored lowercased so that equality and hashing match the
/// case-insensitive comparison rules of DNS names.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Host {
    Ip(IpAddr),
    Domain(String),
}

impl Host {
    pub fn is_empty(&self) -> bool {
        match self {
            Host::Ip(ip) => ip.is_unspecified(),
            Host::Domain(domain) => domain.is_empty(),
        }
    }

    pub fn is_ip(&self) -> bool {
        matches!(self, Host::Ip(_))
    }

    /// The host formatted for use inside an authority component.
    ///
    /// IPv6 addresses are enclosed in square brackets.
    pub fn authority_str(&self) -> String {
        match self {
            Host::Ip(IpAddr::V6(ip6)) => format!("[{ip6}]"),
            Host::Ip(IpAddr::V4(ip4)) => ip4.to_string(),
            Host::Domain(domain) => domain.to_string(),
        }
    }

    fn from_maybe_mapped_ip6(ip6: Ipv6Addr) -> Self {
        if let Some(ip4) = ip6.to_ipv4_mapped() {
            Host::Ip(IpAddr::V4(ip4))
        } else {
            Host::Ip(IpAddr::V6(ip6))
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Ip(ip) => write!(f, "{ip}"),
            Host::Domain(domain) => write!(f, "{domain}"),
        }
    }
}

impl From<url::Host> for Host {
    fn from(v: url::Host) -> Self {
        match v {
            url::Host::Ipv4(ip4) => Host::Ip(IpAddr::V4(ip4)),
            url::Host::Ipv6(ip6) => Host::from_maybe_mapped_ip6(ip6),
            url::Host::Domain(domain) => Host::Domain(domain.to_lowercase()),
        }
    }
}

impl FromStr for Host {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(anyhow!("empty host string"));
        }
        if s.as_bytes()[0] == b'[' {
            let pos_last = s.len() - 1;
            if s.as_bytes()[pos_last] == b']' {
                if let Ok(ip6) = Ipv6Addr::from_str(&s[1..pos_last]) {
                    return Ok(Host::from_maybe_mapped_ip6(ip6));
                }
            }
            return Err(anyhow!("invalid ipv6 address in squared brackets"));
        }
        if let Ok(ip) = IpAddr::from_str(s) {
            return match ip {
                IpAddr::V4(_) => Ok(Host::Ip(ip)),
                IpAddr::V6(ip6) => Ok(Host::from_maybe_mapped_ip6(ip6)),
            };
        }
        Ok(Host::Domain(s.to_lowercase()))
    }
}
