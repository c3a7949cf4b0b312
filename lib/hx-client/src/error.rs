/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::io;

use http::{HeaderMap, StatusCode};
use thiserror::Error;

use crate::cookie::CookieJar;
use crate::parse::LineParseError;

/// Context handed to the caller when a status check rejects a response.
#[derive(Debug)]
pub struct StatusErrorDetail {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub cookie_jar: CookieJar,
}

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// DNS lookup, TCP connect or TLS handshake failure, or a pooled
    /// connection that died before any response byte arrived.
    #[error("connection failed: {0}")]
    ConnectionFailure(io::Error),
    #[error("connection manager is closed")]
    ManagerClosed,
    #[error("retry budget for pooled connections exhausted")]
    TooManyRetries,
    #[error("invalid status line: {0}")]
    InvalidStatusLine(LineParseError),
    #[error("invalid header line: {0}")]
    InvalidHeaderLine(LineParseError),
    #[error("response header block larger than {0} bytes")]
    OverlongHeaders(usize),
    #[error("connection closed inside the response header block")]
    IncompleteHeaders,
    #[error("response body too short: expected {expected}, received {received}")]
    ResponseBodyTooShort { expected: u64, received: u64 },
    #[error("invalid chunk header: {0}")]
    InvalidChunkHeader(LineParseError),
    #[error("invalid compressed body: {0}")]
    InvalidCompression(String),
    #[error("request deadline exceeded")]
    ResponseTimeout,
    #[error("response status {} rejected by status check", .0.status)]
    StatusCodeError(Box<StatusErrorDetail>),
    #[error("too many redirects")]
    TooManyRedirects,
    #[error("proxy connect to {addr} failed with status {status}")]
    ProxyConnectFailed { addr: String, status: u16 },
    #[error("io failed: {0:?}")]
    Io(#[from] io::Error),
}

impl HttpClientError {
    pub(crate) fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        HttpClientError::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// True for transport failures that may be a stale pooled connection:
    /// the peer vanished before producing a single response byte.
    pub(crate) fn is_stale_connection(&self) -> bool {
        matches!(
            self,
            HttpClientError::ConnectionFailure(_) | HttpClientError::Io(_)
        )
    }
}
