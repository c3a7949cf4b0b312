/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::str::FromStr;

use anyhow::anyhow;
use base64::prelude::*;

/// A Basic credential as defined in RFC 7617.
///
/// The base64 form is computed once at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBasicAuth {
    username: String,
    password: String,
    encoded_value: String,
}

impl HttpBasicAuth {
    pub fn new(username: &str, password: &str) -> Self {
        let mut buf = Vec::with_capacity(username.len() + 1 + password.len());
        buf.extend_from_slice(username.as_bytes());
        buf.push(b':');
        buf.extend_from_slice(password.as_bytes());

        let encoded_value = BASE64_STANDARD.encode(buf);

        HttpBasicAuth {
            username: username.to_string(),
            password: password.to_string(),
            encoded_value,
        }
    }

    #[inline]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[inline]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[inline]
    pub fn encoded_value(&self) -> &str {
        &self.encoded_value
    }
}

impl FromStr for HttpBasicAuth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded_value = s.trim();

        let decoded = BASE64_STANDARD
            .decode(encoded_value)
            .map_err(|e| anyhow!("invalid base64 encoding: {e}"))?;
        let value =
            std::str::from_utf8(&decoded).map_err(|e| anyhow!("invalid utf-8 encoding: {e}"))?;

        match memchr::memchr(b':', value.as_bytes()) {
            Some(i) => Ok(HttpBasicAuth {
                username: value[0..i].to_string(),
                password: value[i + 1..].to_string(),
                encoded_value: encoded_value.to_string(),
            }),
            None => Err(anyhow!("no delimiter found in credential")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode() {
        let auth = HttpBasicAuth::new("Aladdin", "open sesame");
        assert_eq!(auth.encoded_value(), "QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn round_trip() {
        let auth = HttpBasicAuth::from_str("QWxhZGRpbjpvcGVuIHNlc2FtZQ==").unwrap();
        assert_eq!(auth.username(), "Aladdin");
        assert_eq!(auth.password(), "open sesame");
    }
}
