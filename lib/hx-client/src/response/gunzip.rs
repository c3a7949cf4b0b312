/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::io::Write;

use bytes::Bytes;
use flate2::write::GzDecoder;

use crate::error::HttpClientError;

/// Incremental gzip inflater fed from body chunks as they arrive.
///
/// Header, trailer and checksum handling are left to the decoder; any
/// malformed input surfaces as `InvalidCompression`.
pub(crate) struct GzipInflater {
    decoder: GzDecoder<Vec<u8>>,
}

impl GzipInflater {
    pub(crate) fn new() -> Self {
        GzipInflater {
            decoder: GzDecoder::new(Vec::new()),
        }
    }

    /// Push compressed bytes in, take whatever inflated output is ready.
    pub(crate) fn feed(&mut self, data: &[u8]) -> Result<Bytes, HttpClientError> {
        self.decoder
            .write_all(data)
            .map_err(|e| HttpClientError::InvalidCompression(e.to_string()))?;
        Ok(self.take_output())
    }

    /// The compressed stream ended; flush and verify the gzip trailer.
    pub(crate) fn finish(&mut self) -> Result<Bytes, HttpClientError> {
        self.decoder
            .try_finish()
            .map_err(|e| HttpClientError::InvalidCompression(e.to_string()))?;
        Ok(self.take_output())
    }

    fn take_output(&mut self) -> Bytes {
        Bytes::from(std::mem::take(self.decoder.get_mut()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn inflate_in_pieces() {
        let compressed = gzip(b"hello gzip world");
        let mut inflater = GzipInflater::new();

        let mut out = Vec::new();
        for piece in compressed.chunks(3) {
            out.extend_from_slice(&inflater.feed(piece).unwrap());
        }
        out.extend_from_slice(&inflater.finish().unwrap());
        assert_eq!(out, b"hello gzip world");
    }

    #[test]
    fn truncated_stream_fails() {
        let compressed = gzip(b"hello gzip world");
        let mut inflater = GzipInflater::new();
        inflater.feed(&compressed[..compressed.len() - 4]).unwrap();
        assert!(matches!(
            inflater.finish(),
            Err(HttpClientError::InvalidCompression(_))
        ));
    }

    #[test]
    fn garbage_fails() {
        let mut inflater = GzipInflater::new();
        let r = inflater
            .feed(b"this is definitely not gzip data at all")
            .and_then(|_| inflater.finish());
        assert!(matches!(r, Err(HttpClientError::InvalidCompression(_))));
    }
}
