/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::str::FromStr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::header::{CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Version};
use log::debug;

use crate::cookie::CookieJar;
use crate::deadline::Deadline;
use crate::error::HttpClientError;
use crate::parse::{HeaderLine, LineParseError, StatusLine};
use crate::pool::{ConnectionManager, PooledConn};
use crate::stream::{BufferedStream, StreamReadError};

mod body;
mod gunzip;

pub(crate) use body::{BodyFramer, BodyFraming};
use gunzip::GzipInflater;

/// The decoded status line and header block of a response.
pub(crate) struct ResponseHead {
    pub(crate) version: Version,
    pub(crate) status: StatusCode,
    pub(crate) reason: String,
    pub(crate) headers: HeaderMap,
    pub(crate) keep_alive: bool,
    pub(crate) framing: BodyFraming,
}

fn invalid_header(e: LineParseError) -> HttpClientError {
    HttpClientError::InvalidHeaderLine(e)
}

/// Read and decode a response head off the connection.
///
/// A transport failure before the first response byte is reported as
/// `ConnectionFailure` so the driver can treat the connection as stale;
/// later failures are protocol errors.
pub(crate) async fn read_response_head(
    stream: &mut BufferedStream,
    method: &Method,
    max_header_size: usize,
) -> Result<ResponseHead, HttpClientError> {
    let status_line = stream.read_line(max_header_size).await.map_err(|e| match e {
        StreamReadError::Closed { read: 0 } => HttpClientError::ConnectionFailure(
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before any response byte",
            ),
        ),
        StreamReadError::Closed { .. } => HttpClientError::IncompleteHeaders,
        StreamReadError::LimitExceeded => HttpClientError::OverlongHeaders(max_header_size),
        StreamReadError::Io(e) => HttpClientError::ConnectionFailure(e),
    })?;
    let mut header_size = status_line.len();

    let status = StatusLine::parse(&status_line).map_err(HttpClientError::InvalidStatusLine)?;

    // collect raw header lines first so obs-fold continuations can be
    // joined before header names are validated
    let mut raw_headers: Vec<(String, String)> = Vec::with_capacity(16);
    loop {
        if header_size >= max_header_size {
            return Err(HttpClientError::OverlongHeaders(max_header_size));
        }
        let line = stream
            .read_line(max_header_size - header_size)
            .await
            .map_err(|e| match e {
                StreamReadError::Closed { .. } => HttpClientError::IncompleteHeaders,
                StreamReadError::LimitExceeded => HttpClientError::OverlongHeaders(max_header_size),
                StreamReadError::Io(e) => HttpClientError::Io(e),
            })?;
        header_size += line.len();

        if line.as_ref() == b"\r\n" || line.as_ref() == b"\n" {
            break;
        }

        if HeaderLine::is_continuation(&line) {
            let folded = std::str::from_utf8(&line)
                .map_err(|e| invalid_header(LineParseError::InvalidUtf8Encoding(e)))?
                .trim();
            match raw_headers.last_mut() {
                Some((_name, value)) => {
                    if !folded.is_empty() {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(folded);
                    }
                }
                None => return Err(invalid_header(LineParseError::InvalidHeaderName)),
            }
            continue;
        }

        let header = HeaderLine::parse(&line).map_err(invalid_header)?;
        raw_headers.push((header.name.to_string(), header.value.to_string()));
    }

    build_head(status, raw_headers, method)
}

fn build_head(
    status: StatusLine<'_>,
    raw_headers: Vec<(String, String)>,
    method: &Method,
) -> Result<ResponseHead, HttpClientError> {
    let version = status.version;
    let code =
        StatusCode::from_u16(status.code).map_err(|_| {
            HttpClientError::InvalidStatusLine(LineParseError::InvalidStatusCode)
        })?;
    let reason = status.reason.to_string();

    let mut headers = HeaderMap::with_capacity(raw_headers.len());
    let mut keep_alive = version >= Version::HTTP_11;
    let mut chunked = false;
    let mut content_length: Option<u64> = None;

    for (name, value) in raw_headers {
        let header_name = HeaderName::from_str(&name)
            .map_err(|_| invalid_header(LineParseError::InvalidHeaderName))?;
        let header_value = HeaderValue::from_str(&value)
            .map_err(|_| invalid_header(LineParseError::InvalidHeaderValue))?;

        if header_name == CONNECTION {
            for token in value.split(',') {
                if token.trim().eq_ignore_ascii_case("close") {
                    keep_alive = false;
                }
            }
        } else if header_name == TRANSFER_ENCODING {
            let v = value.to_lowercase();
            if v.ends_with("chunked") {
                chunked = true;
            } else if v.contains("chunked") {
                // chunked must be the final transfer coding
                return Err(invalid_header(LineParseError::InvalidHeaderValue));
            }
        } else if header_name == CONTENT_LENGTH && !chunked {
            let parsed = u64::from_str(value.trim())
                .map_err(|_| invalid_header(LineParseError::InvalidHeaderValue))?;
            if matches!(content_length, Some(prev) if prev != parsed) {
                return Err(invalid_header(LineParseError::InvalidHeaderValue));
            }
            content_length = Some(parsed);
        }

        headers.append(header_name, header_value);
    }

    let expect_no_body = code.as_u16() < 200
        || code == StatusCode::NO_CONTENT
        || code == StatusCode::NOT_MODIFIED
        || method == Method::HEAD;

    let framing = if expect_no_body {
        BodyFraming::None
    } else if chunked {
        BodyFraming::Chunked
    } else if let Some(len) = content_length {
        BodyFraming::ContentLength(len)
    } else {
        // delimited by connection close
        keep_alive = false;
        BodyFraming::UntilEof
    };

    Ok(ResponseHead {
        version,
        status: code,
        reason,
        headers,
        keep_alive,
        framing,
    })
}

/// A decoded response owning the connection it arrived on.
///
/// The body is a lazy single-pass stream of chunks. Reading it to its clean
/// end hands the connection back to the pool when the framing and the peer
/// allow reuse; dropping the response early closes the connection instead.
pub struct HttpResponse {
    status: StatusCode,
    version: Version,
    reason: String,
    headers: HeaderMap,
    pub cookie_jar: CookieJar,
    body: ResponseBodyState,
}

pub(crate) struct ResponseBodyState {
    pub(crate) framer: BodyFramer,
    pub(crate) gunzip: Option<GzipInflater>,
    pub(crate) conn: Option<PooledConn>,
    pub(crate) manager: Arc<ConnectionManager>,
    pub(crate) deadline: Deadline,
    pub(crate) keep_alive: bool,
}

impl HttpResponse {
    pub(crate) fn new(
        head: ResponseHead,
        cookie_jar: CookieJar,
        conn: PooledConn,
        manager: Arc<ConnectionManager>,
        deadline: Deadline,
        gunzip: bool,
    ) -> Self {
        let framer = BodyFramer::new(head.framing, manager.config().body_line_max_len);
        HttpResponse {
            status: head.status,
            version: head.version,
            reason: head.reason,
            headers: head.headers,
            cookie_jar,
            body: ResponseBodyState {
                framer,
                gunzip: gunzip.then(GzipInflater::new),
                conn: Some(conn),
                manager,
                deadline,
                keep_alive: head.keep_alive,
            },
        }
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The next piece of the body. Empty bytes mean the body is complete;
    /// at that point the connection has been returned to the pool or
    /// closed.
    pub async fn read_chunk(&mut self) -> Result<Bytes, HttpClientError> {
        loop {
            let Some(conn) = self.body.conn.as_mut() else {
                return Ok(Bytes::new());
            };
            let raw = match self
                .body
                .deadline
                .run(self.body.framer.next_chunk(&mut conn.stream))
                .await
            {
                Ok(raw) => raw,
                Err(e) => {
                    self.abort();
                    return Err(e);
                }
            };

            match &mut self.body.gunzip {
                None => {
                    if raw.is_empty() {
                        self.finish();
                    }
                    return Ok(raw);
                }
                Some(inflater) => {
                    if raw.is_empty() {
                        let tail = match inflater.finish() {
                            Ok(tail) => tail,
                            Err(e) => {
                                self.abort();
                                return Err(e);
                            }
                        };
                        self.finish();
                        return Ok(tail);
                    }
                    match inflater.feed(&raw) {
                        // the inflater may need more input before it can
                        // produce anything
                        Ok(out) if out.is_empty() => continue,
                        Ok(out) => return Ok(out),
                        Err(e) => {
                            self.abort();
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Read the whole remaining body into memory.
    pub async fn read_body_to_end(&mut self) -> Result<Bytes, HttpClientError> {
        let mut out = BytesMut::new();
        loop {
            let chunk = self.read_chunk().await?;
            if chunk.is_empty() {
                return Ok(out.freeze());
            }
            out.extend_from_slice(&chunk);
        }
    }

    /// Consume and discard the rest of the body, enabling connection reuse.
    pub async fn drain_body(&mut self) -> Result<(), HttpClientError> {
        loop {
            if self.read_chunk().await?.is_empty() {
                return Ok(());
            }
        }
    }

    /// Body reached its clean end: pool the connection if everything allows
    /// it.
    fn finish(&mut self) {
        if let Some(conn) = self.body.conn.take() {
            let reusable = self.body.keep_alive
                && self.body.framer.framing_allows_reuse()
                && self.body.framer.finished();
            self.body.manager.release(conn, reusable);
        }
    }

    /// Body failed: the connection state is unknown, close it.
    fn abort(&mut self) {
        if let Some(conn) = self.body.conn.take() {
            debug!("dropping connection to {} after body failure", conn.key);
            self.body.manager.release(conn, false);
        }
    }
}

impl Drop for HttpResponse {
    fn drop(&mut self) {
        // a response dropped before its body was drained must not leak a
        // connection with unread data back into the pool
        if let Some(conn) = self.body.conn.take() {
            self.body.manager.release(conn, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn stream_with(input: &[u8]) -> BufferedStream {
        let (a, mut b) = tokio::io::duplex(64 * 1024);
        b.write_all(input).await.unwrap();
        drop(b);
        BufferedStream::new(Box::new(a))
    }

    #[tokio::test]
    async fn simple_head() {
        let mut stream = stream_with(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 4\r\n\r\nbody",
        )
        .await;
        let head = read_response_head(&mut stream, &Method::GET, 4096)
            .await
            .unwrap();
        assert_eq!(head.status, StatusCode::OK);
        assert_eq!(head.version, Version::HTTP_11);
        assert_eq!(head.reason, "OK");
        assert!(head.keep_alive);
        assert_eq!(head.framing, BodyFraming::ContentLength(4));

        // residual bytes stay buffered for the body
        let rest = stream.next_chunk(usize::MAX).await.unwrap();
        assert_eq!(rest.as_ref(), b"body");
    }

    #[tokio::test]
    async fn head_parse_from_chunked_stream() {
        // the header block arriving in arbitrary stream fragments
        let parts = vec![
            std::io::Result::Ok(Bytes::from_static(b"HTTP/1.1 200 ")),
            Ok(Bytes::from_static(b"OK\r\nContent-")),
            Ok(Bytes::from_static(b"Length: 4\r\n\r\nbody")),
        ];
        let reader = tokio_util::io::StreamReader::new(tokio_stream::iter(parts));
        let io = tokio::io::join(reader, tokio::io::sink());
        let mut stream = BufferedStream::new(Box::new(io));

        let head = read_response_head(&mut stream, &Method::GET, 4096)
            .await
            .unwrap();
        assert_eq!(head.status, StatusCode::OK);
        assert_eq!(head.framing, BodyFraming::ContentLength(4));
        let rest = stream.next_chunk(usize::MAX).await.unwrap();
        assert_eq!(rest.as_ref(), b"body");
    }

    #[tokio::test]
    async fn connection_close_and_eof_framing() {
        let mut stream =
            stream_with(b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n").await;
        let head = read_response_head(&mut stream, &Method::GET, 4096)
            .await
            .unwrap();
        assert!(!head.keep_alive);
        assert_eq!(head.framing, BodyFraming::UntilEof);
    }

    #[tokio::test]
    async fn http10_not_reusable() {
        let mut stream =
            stream_with(b"HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\n").await;
        let head = read_response_head(&mut stream, &Method::GET, 4096)
            .await
            .unwrap();
        assert!(!head.keep_alive);
        assert_eq!(head.framing, BodyFraming::None);
    }

    #[tokio::test]
    async fn chunked_wins_over_content_length() {
        let mut stream = stream_with(
            b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\nTransfer-Encoding: chunked\r\n\r\n",
        )
        .await;
        let head = read_response_head(&mut stream, &Method::GET, 4096)
            .await
            .unwrap();
        assert_eq!(head.framing, BodyFraming::Chunked);
    }

    #[tokio::test]
    async fn head_response_has_no_body() {
        let mut stream =
            stream_with(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n").await;
        let head = read_response_head(&mut stream, &Method::HEAD, 4096)
            .await
            .unwrap();
        assert_eq!(head.framing, BodyFraming::None);
        assert!(head.keep_alive);
    }

    #[tokio::test]
    async fn obs_fold_joined() {
        let mut stream = stream_with(
            b"HTTP/1.1 200 OK\r\nX-Long: first\r\n  second\r\nContent-Length: 0\r\n\r\n",
        )
        .await;
        let head = read_response_head(&mut stream, &Method::GET, 4096)
            .await
            .unwrap();
        assert_eq!(
            head.headers.get("x-long").unwrap().to_str().unwrap(),
            "first second"
        );
    }

    #[tokio::test]
    async fn eof_before_any_byte_is_connection_failure() {
        let (a, b) = tokio::io::duplex(16);
        drop(b);
        let mut stream = BufferedStream::new(Box::new(a));
        assert!(matches!(
            read_response_head(&mut stream, &Method::GET, 4096).await,
            Err(HttpClientError::ConnectionFailure(_))
        ));
    }

    #[tokio::test]
    async fn eof_inside_headers_is_incomplete() {
        let mut stream = stream_with(b"HTTP/1.1 200 OK\r\nContent-").await;
        assert!(matches!(
            read_response_head(&mut stream, &Method::GET, 4096).await,
            Err(HttpClientError::IncompleteHeaders)
        ));
    }

    #[tokio::test]
    async fn overlong_headers_rejected() {
        let mut big = Vec::from(&b"HTTP/1.1 200 OK\r\n"[..]);
        for i in 0..100 {
            big.extend_from_slice(format!("X-Header-{i}: {}\r\n", "v".repeat(100)).as_bytes());
        }
        big.extend_from_slice(b"\r\n");
        let mut stream = stream_with(&big).await;
        assert!(matches!(
            read_response_head(&mut stream, &Method::GET, 1024).await,
            Err(HttpClientError::OverlongHeaders(1024))
        ));
    }

    #[tokio::test]
    async fn garbage_status_line() {
        let mut stream = stream_with(b"SMTP ready to go here\r\n\r\n").await;
        assert!(matches!(
            read_response_head(&mut stream, &Method::GET, 4096).await,
            Err(HttpClientError::InvalidStatusLine(_))
        ));
    }

    #[tokio::test]
    async fn conflicting_content_lengths() {
        let mut stream = stream_with(
            b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\nContent-Length: 5\r\n\r\n",
        )
        .await;
        assert!(matches!(
            read_response_head(&mut stream, &Method::GET, 4096).await,
            Err(HttpClientError::InvalidHeaderLine(_))
        ));
    }
}
