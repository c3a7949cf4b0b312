/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

mod chunk_size_line;
mod header_line;
mod status_line;

pub use chunk_size_line::ChunkSizeLine;
pub use header_line::HeaderLine;
pub use status_line::StatusLine;

use std::str::Utf8Error;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LineParseError {
    #[error("not long enough")]
    NotLongEnough,
    #[error("no delimiter {0:?} found")]
    NoDelimiterFound(char),
    #[error("invalid http version")]
    InvalidVersion,
    #[error("invalid status code")]
    InvalidStatusCode,
    #[error("invalid chunk size")]
    InvalidChunkSize,
    #[error("invalid header name")]
    InvalidHeaderName,
    #[error("invalid header value")]
    InvalidHeaderValue,
    #[error("invalid utf-8 encoding: {0}")]
    InvalidUtf8Encoding(#[from] Utf8Error),
}
