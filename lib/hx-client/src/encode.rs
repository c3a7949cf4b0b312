/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::io::Write;

use http::header::{ACCEPT_ENCODING, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use http::{HeaderMap, Method};
use tokio::io::AsyncReadExt;

use crate::error::HttpClientError;
use crate::request::{HttpRequest, RequestBody};
use crate::stream::BufferedStream;

const BODY_COPY_BUF_SIZE: usize = 8 * 1024;

/// Serialize the request line and header block.
///
/// `headers` are the effective headers for this attempt (request headers
/// plus whatever the driver merged in). The encoder owns the `Host`,
/// body-framing and `Accept-Encoding` lines; caller-supplied values for the
/// first two are ignored, a caller-supplied `Accept-Encoding` wins and an
/// empty one suppresses the header.
pub(crate) fn build_request_head(req: &HttpRequest, headers: &HeaderMap) -> Vec<u8> {
    let mut buf = Vec::<u8>::with_capacity(1024);

    buf.extend_from_slice(req.method.as_str().as_bytes());
    buf.push(b' ');
    write_request_target(&mut buf, req);
    buf.extend_from_slice(b" HTTP/1.1\r\n");

    if !headers.contains_key(HOST) {
        let _ = write!(buf, "Host: {}\r\n", req.host_header_value());
    }

    match req.body.known_len() {
        Some(len) => {
            let skip = len == 0 && (req.method == Method::GET || req.method == Method::HEAD);
            if !skip {
                let _ = write!(buf, "Content-Length: {len}\r\n");
            }
        }
        None => buf.extend_from_slice(b"Transfer-Encoding: chunked\r\n"),
    }

    let mut has_accept_encoding = false;
    for (name, value) in headers.iter() {
        if name == CONTENT_LENGTH || name == TRANSFER_ENCODING {
            continue;
        }
        if name == ACCEPT_ENCODING {
            has_accept_encoding = true;
            if value.is_empty() {
                continue;
            }
        }
        buf.extend_from_slice(name.as_str().as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    if !has_accept_encoding {
        buf.extend_from_slice(b"Accept-Encoding: gzip\r\n");
    }

    buf.extend_from_slice(b"\r\n");
    buf
}

/// Absolute form for plaintext requests through a proxy, origin form
/// otherwise.
fn write_request_target(buf: &mut Vec<u8>, req: &HttpRequest) {
    if req.proxy().is_some() && !req.is_secure() {
        buf.extend_from_slice(b"http://");
        buf.extend_from_slice(req.host_header_value().as_bytes());
    }
    if !req.path().starts_with('/') {
        buf.push(b'/');
    }
    buf.extend_from_slice(req.path().as_bytes());
    if !req.query().is_empty() {
        buf.push(b'?');
        buf.extend_from_slice(req.query().as_bytes());
    }
}

/// Put one request on the wire: head, then the body under its framing.
///
/// Replayable bodies are left intact so the driver can retry the request on
/// a fresh connection; streaming bodies are consumed.
pub(crate) async fn send_request(
    stream: &mut BufferedStream,
    req: &mut HttpRequest,
    headers: &HeaderMap,
) -> Result<(), HttpClientError> {
    // materialize a deferred payload first so that a retry can replay it
    if let RequestBody::Builder { .. } = req.body {
        if let RequestBody::Builder { len, build } = std::mem::take(&mut req.body) {
            let mut payload = Vec::with_capacity(len as usize);
            build(&mut payload);
            req.body = RequestBody::Bytes(payload.into());
        }
    }

    let head = build_request_head(req, headers);
    stream.write_all(&head).await?;

    match &mut req.body {
        RequestBody::Empty | RequestBody::Builder { .. } => {}
        RequestBody::Bytes(payload) => {
            let payload = payload.clone();
            stream.write_all(&payload).await?;
        }
        RequestBody::Stream { len, reader } => {
            let total = *len;
            let mut sent = 0u64;
            let mut buf = vec![0u8; BODY_COPY_BUF_SIZE];
            while sent < total {
                let want = buf.len().min((total - sent) as usize);
                let nr = reader.read(&mut buf[..want]).await?;
                if nr == 0 {
                    return Err(HttpClientError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "request body stream ended before its declared length",
                    )));
                }
                stream.write_all(&buf[..nr]).await?;
                sent += nr as u64;
            }
        }
        RequestBody::Chunked { reader } => {
            let mut buf = vec![0u8; BODY_COPY_BUF_SIZE];
            let mut chunk_head = Vec::<u8>::with_capacity(16);
            loop {
                let nr = reader.read(&mut buf).await?;
                if nr == 0 {
                    stream.write_all(b"0\r\n\r\n").await?;
                    break;
                }
                chunk_head.clear();
                let _ = write!(chunk_head, "{nr:x}\r\n");
                stream.write_all(&chunk_head).await?;
                stream.write_all(&buf[..nr]).await?;
                stream.write_all(b"\r\n").await?;
            }
        }
    }

    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hx_types::net::Host;
    use tokio::io::AsyncReadExt;

    fn head_str(req: &HttpRequest) -> String {
        String::from_utf8(build_request_head(req, &req.headers)).unwrap()
    }

    #[test]
    fn origin_form_get() {
        let req = HttpRequest::parse_url("http://example.com/a/b?x=1").unwrap();
        let head = head_str(&req);
        assert!(head.starts_with("GET /a/b?x=1 HTTP/1.1\r\n"));
        assert!(head.contains("Host: example.com\r\n"));
        assert!(head.contains("Accept-Encoding: gzip\r\n"));
        // GET with empty body carries no framing header
        assert!(!head.contains("Content-Length"));
        assert!(!head.contains("Transfer-Encoding"));
        assert!(head.ends_with("\r\n\r\n"));
    }

    #[test]
    fn absolute_form_through_plain_proxy() {
        let mut req = HttpRequest::parse_url("http://example.com:8080/a?x=1").unwrap();
        req.set_proxy(Host::Domain("proxy.local".to_string()), 3128);
        let head = head_str(&req);
        assert!(head.starts_with("GET http://example.com:8080/a?x=1 HTTP/1.1\r\n"));
    }

    #[test]
    fn https_through_proxy_stays_origin_form() {
        let mut req = HttpRequest::parse_url("https://example.com/a").unwrap();
        req.set_proxy(Host::Domain("proxy.local".to_string()), 3128);
        assert!(head_str(&req).starts_with("GET /a HTTP/1.1\r\n"));
    }

    #[test]
    fn post_carries_content_length() {
        let mut req = HttpRequest::parse_url("http://example.com/").unwrap();
        req.method = Method::POST;
        req.set_body_bytes(Bytes::from_static(b"hello"));
        assert!(head_str(&req).contains("Content-Length: 5\r\n"));

        // a zero length body on POST is still framed
        req.body = RequestBody::Empty;
        assert!(head_str(&req).contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn chunked_body_announced() {
        let mut req = HttpRequest::parse_url("http://example.com/").unwrap();
        req.method = Method::POST;
        req.body = RequestBody::Chunked {
            reader: Box::new(tokio::io::empty()),
        };
        assert!(head_str(&req).contains("Transfer-Encoding: chunked\r\n"));
    }

    #[test]
    fn caller_host_header_wins() {
        let mut req = HttpRequest::parse_url("http://example.com/").unwrap();
        req.set_header("host", "override.example").unwrap();
        let head = head_str(&req);
        assert!(head.contains("host: override.example\r\n"));
        assert!(!head.contains("Host: example.com\r\n"));
    }

    #[test]
    fn empty_accept_encoding_suppresses_header() {
        let mut req = HttpRequest::parse_url("http://example.com/").unwrap();
        req.set_header("accept-encoding", "").unwrap();
        let head = head_str(&req);
        assert!(!head.to_lowercase().contains("accept-encoding"));

        req.set_header("accept-encoding", "br").unwrap();
        let head = head_str(&req);
        assert!(head.contains("accept-encoding: br\r\n"));
        assert!(!head.contains("Accept-Encoding: gzip\r\n"));
    }

    async fn wire_bytes_for(mut req: HttpRequest) -> Vec<u8> {
        let (a, mut b) = tokio::io::duplex(64 * 1024);
        let mut stream = BufferedStream::new(Box::new(a));
        let headers = req.headers.clone();
        send_request(&mut stream, &mut req, &headers).await.unwrap();
        drop(stream);
        let mut out = Vec::new();
        b.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn chunked_body_on_the_wire() {
        let mut req = HttpRequest::parse_url("http://example.com/up").unwrap();
        req.method = Method::PUT;
        req.body = RequestBody::Chunked {
            reader: Box::new(std::io::Cursor::new(b"abcdef".to_vec())),
        };

        let wire = wire_bytes_for(req).await;
        let text = String::from_utf8(wire).unwrap();
        let body = text.splitn(2, "\r\n\r\n").nth(1).unwrap();
        assert_eq!(body, "6\r\nabcdef\r\n0\r\n\r\n");
    }

    #[tokio::test]
    async fn builder_body_materialized_once() {
        let mut req = HttpRequest::parse_url("http://example.com/up").unwrap();
        req.method = Method::POST;
        req.body = RequestBody::Builder {
            len: 3,
            build: Box::new(|buf| buf.extend_from_slice(b"xyz")),
        };

        let wire = wire_bytes_for(req).await;
        let text = String::from_utf8(wire).unwrap();
        assert!(text.contains("Content-Length: 3\r\n"));
        assert!(text.ends_with("\r\n\r\nxyz"));
    }
}
