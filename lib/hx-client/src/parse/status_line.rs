/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use atoi::FromRadix10;
use http::Version;

use super::LineParseError;

pub struct StatusLine<'a> {
    pub version: Version,
    pub code: u16,
    pub reason: &'a str,
}

impl<'a> StatusLine<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<StatusLine<'a>, LineParseError> {
        const MINIMAL_LENGTH: usize = 13; // HTTP/1.x XYZ\n

        if buf.len() < MINIMAL_LENGTH {
            return Err(LineParseError::NotLongEnough);
        }

        let Some(p) = memchr::memchr(b' ', buf) else {
            return Err(LineParseError::NoDelimiterFound(' '));
        };
        let version = match &buf[0..p] {
            b"HTTP/1.0" => Version::HTTP_10,
            b"HTTP/1.1" => Version::HTTP_11,
            _ => return Err(LineParseError::InvalidVersion),
        };

        let left = &buf[p + 1..];
        let (code, len) = u16::from_radix_10(left);
        if len != 3 || code < 100 {
            return Err(LineParseError::InvalidStatusCode);
        }

        let reason = if left.len() > len {
            std::str::from_utf8(&left[len..])?.trim()
        } else {
            ""
        };

        Ok(StatusLine {
            version,
            code,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal() {
        let s = StatusLine::parse(b"HTTP/1.1 200 OK\r\n").unwrap();
        assert_eq!(s.version, Version::HTTP_11);
        assert_eq!(s.code, 200);
        assert_eq!(s.reason, "OK");
    }

    #[test]
    fn no_reason() {
        let s = StatusLine::parse(b"HTTP/1.0 204 \r\n").unwrap();
        assert_eq!(s.version, Version::HTTP_10);
        assert_eq!(s.code, 204);
        assert_eq!(s.reason, "");
    }

    #[test]
    fn multi_word_reason() {
        let s = StatusLine::parse(b"HTTP/1.1 301 Moved Permanently\r\n").unwrap();
        assert_eq!(s.code, 301);
        assert_eq!(s.reason, "Moved Permanently");
    }

    #[test]
    fn reject_h2() {
        assert!(StatusLine::parse(b"HTTP/2.0 200 OK\r\n").is_err());
    }

    #[test]
    fn reject_short_code() {
        assert!(StatusLine::parse(b"HTTP/1.1 20 OKOK\r\n").is_err());
    }
}
