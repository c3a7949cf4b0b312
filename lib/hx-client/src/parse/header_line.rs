/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use super::LineParseError;

pub struct HeaderLine<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

impl<'a> HeaderLine<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<HeaderLine<'a>, LineParseError> {
        let line = std::str::from_utf8(buf)?;
        let Some(p) = memchr::memchr(b':', line.as_bytes()) else {
            return Err(LineParseError::NoDelimiterFound(':'));
        };

        let name = line[0..p].trim();
        if name.is_empty() || !name.is_ascii() {
            return Err(LineParseError::InvalidHeaderName);
        }
        let value = line[p + 1..].trim();

        Ok(HeaderLine { name, value })
    }

    /// An obs-fold continuation starts with SP or HTAB and extends the
    /// previous header's value.
    pub fn is_continuation(buf: &[u8]) -> bool {
        matches!(buf.first(), Some(b' ') | Some(b'\t'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal() {
        let h = HeaderLine::parse(b"Content-Type: text/plain\r\n").unwrap();
        assert_eq!(h.name, "Content-Type");
        assert_eq!(h.value, "text/plain");
    }

    #[test]
    fn empty_value() {
        let h = HeaderLine::parse(b"X-Empty:\r\n").unwrap();
        assert_eq!(h.name, "X-Empty");
        assert_eq!(h.value, "");
    }

    #[test]
    fn no_delimiter() {
        assert!(HeaderLine::parse(b"not-a-header\r\n").is_err());
    }

    #[test]
    fn continuation() {
        assert!(HeaderLine::is_continuation(b" folded\r\n"));
        assert!(HeaderLine::is_continuation(b"\tfolded\r\n"));
        assert!(!HeaderLine::is_continuation(b"Name: value\r\n"));
    }
}
