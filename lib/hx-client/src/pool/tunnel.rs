/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::io::{self, Write};

use hx_types::auth::HttpBasicAuth;
use hx_types::net::UpstreamAddr;

use crate::error::HttpClientError;
use crate::parse::StatusLine;
use crate::stream::{BufferedStream, StreamReadError};

fn connect_error(msg: String) -> HttpClientError {
    HttpClientError::ConnectionFailure(io::Error::new(io::ErrorKind::InvalidData, msg))
}

/// Open a tunnel through an HTTP proxy with a CONNECT request, leaving the
/// stream ready for the TLS handshake to the real peer.
pub(crate) async fn establish(
    stream: &mut BufferedStream,
    target: &UpstreamAddr,
    auth: Option<&HttpBasicAuth>,
    max_header_size: usize,
) -> Result<(), HttpClientError> {
    let mut head = Vec::<u8>::with_capacity(128);
    let _ = write!(head, "CONNECT {target} HTTP/1.1\r\n");
    let _ = write!(head, "Host: {target}\r\n");
    if let Some(auth) = auth {
        let _ = write!(head, "Proxy-Authorization: Basic {}\r\n", auth.encoded_value());
    }
    head.extend_from_slice(b"\r\n");

    stream
        .write_all_flush(&head)
        .await
        .map_err(HttpClientError::ConnectionFailure)?;

    let mut head_size = 0usize;
    let line = read_proxy_line(stream, max_header_size).await?;
    head_size += line.len();
    let status = StatusLine::parse(&line)
        .map_err(|e| connect_error(format!("invalid proxy response status line: {e}")))?;
    if !(200..300).contains(&status.code) {
        return Err(HttpClientError::ProxyConnectFailed {
            addr: target.to_string(),
            status: status.code,
        });
    }

    // discard the response headers up to the blank line
    loop {
        let line = read_proxy_line(stream, max_header_size - head_size).await?;
        head_size += line.len();
        if line.as_ref() == b"\r\n" || line.as_ref() == b"\n" {
            return Ok(());
        }
    }
}

async fn read_proxy_line(
    stream: &mut BufferedStream,
    max_len: usize,
) -> Result<bytes::Bytes, HttpClientError> {
    stream.read_line(max_len).await.map_err(|e| match e {
        StreamReadError::Closed { .. } => {
            connect_error("proxy closed the connection mid-response".to_string())
        }
        StreamReadError::LimitExceeded => {
            connect_error("proxy response headers too large".to_string())
        }
        StreamReadError::Io(e) => HttpClientError::ConnectionFailure(e),
    })
}
