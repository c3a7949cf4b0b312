/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use atoi::FromRadix16;

use super::LineParseError;

/// A chunk-size line as received. Chunk extensions are accepted and ignored.
pub struct ChunkSizeLine {
    pub chunk_size: u64,
}

impl ChunkSizeLine {
    pub fn parse(buf: &[u8]) -> Result<ChunkSizeLine, LineParseError> {
        let (chunk_size, offset) = u64::from_radix_16(buf);
        if offset == 0 {
            return Err(LineParseError::InvalidChunkSize);
        }

        if buf.len() == offset {
            return Err(LineParseError::NotLongEnough);
        }

        match buf[offset] {
            b'\r' | b'\n' | b';' => Ok(ChunkSizeLine { chunk_size }),
            _ => Err(LineParseError::InvalidChunkSize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple() {
        let chunk = ChunkSizeLine::parse(b"1\r\n").unwrap();
        assert_eq!(chunk.chunk_size, 1);

        let chunk = ChunkSizeLine::parse(b"1F\r\n").unwrap();
        assert_eq!(chunk.chunk_size, 0x1f);
    }

    #[test]
    fn with_extension() {
        let chunk = ChunkSizeLine::parse(b"a; name=value\r\n").unwrap();
        assert_eq!(chunk.chunk_size, 10);
    }

    #[test]
    fn invalid() {
        assert!(ChunkSizeLine::parse(b"\r\n").is_err());
        assert!(ChunkSizeLine::parse(b"zz\r\n").is_err());
    }
}
