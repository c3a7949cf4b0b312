/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

use super::Host;

/// A (host, port) pair identifying a peer to connect to.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct UpstreamAddr {
    host: Host,
    port: u16,
}

impl UpstreamAddr {
    pub fn new(host: Host, port: u16) -> Self {
        UpstreamAddr { host, port }
    }

    #[inline]
    pub fn host(&self) -> &Host {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host_str(&self) -> String {
        self.host.to_string()
    }
}

impl fmt::Display for UpstreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host.authority_str(), self.port)
    }
}

impl FromStr for UpstreamAddr {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(p) = memchr::memrchr(b':', s.as_bytes()) {
            // a colon may also appear inside a bare ipv6 address
            if s.as_bytes()[0] != b'[' && memchr::memchr(b':', &s.as_bytes()[..p]).is_some() {
                let host = Host::from_str(s)?;
                return Err(anyhow!("no port found for host {host}"));
            }
            let host = Host::from_str(&s[..p])?;
            let port = u16::from_str(&s[p + 1..]).map_err(|e| anyhow!("invalid port: {e}"))?;
            Ok(UpstreamAddr { host, port })
        } else {
            Err(anyhow!("no port found in upstream addr string"))
        }
    }
}
