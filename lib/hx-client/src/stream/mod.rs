/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

mod tcp;
pub use tcp::TcpConnectFactory;

#[cfg(feature = "rustls")]
mod rustls;
#[cfg(feature = "rustls")]
pub use self::rustls::RustlsConnectFactory;

mod factory;
pub use factory::{ConnectFactory, TlsConnectFactory};

/// Any duplex byte stream usable as the transport under a request:
/// a TCP socket, a TLS session, or an in-test fake.
pub trait ClientStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ClientStream for T {}

pub type BoxClientStream = Box<dyn ClientStream>;

const DEFAULT_READ_BUF_SIZE: usize = 8 * 1024;

/// Failure modes of the bounded read helpers, mapped by the caller into the
/// protocol error that fits its context.
#[derive(Debug)]
pub enum StreamReadError {
    /// Clean EOF before the requested data was complete; `read` bytes of it
    /// had already arrived.
    Closed { read: usize },
    /// The line did not terminate within the caller's limit.
    LimitExceeded,
    Io(io::Error),
}

impl From<io::Error> for StreamReadError {
    fn from(e: io::Error) -> Self {
        StreamReadError::Io(e)
    }
}

/// A duplex stream with a read-ahead buffer.
///
/// Reads beyond a caller-requested boundary land in the buffer and are
/// served back before the socket is touched again, so header parsing can
/// take lines without over-consuming the body.
pub struct BufferedStream {
    inner: BoxClientStream,
    rbuf: BytesMut,
    read_size: usize,
    eof: bool,
}

impl BufferedStream {
    pub fn new(inner: BoxClientStream) -> Self {
        Self::with_read_size(inner, DEFAULT_READ_BUF_SIZE)
    }

    pub fn with_read_size(inner: BoxClientStream, read_size: usize) -> Self {
        BufferedStream {
            inner,
            rbuf: BytesMut::with_capacity(read_size),
            read_size,
            eof: false,
        }
    }

    /// Pull more bytes from the socket into the read-ahead buffer.
    /// Returns the number of bytes added, 0 on EOF.
    async fn fill(&mut self) -> io::Result<usize> {
        if self.eof {
            return Ok(0);
        }
        self.rbuf.reserve(self.read_size);
        let nr = self.inner.read_buf(&mut self.rbuf).await?;
        if nr == 0 {
            self.eof = true;
        }
        Ok(nr)
    }

    /// The next available bytes: the read-ahead buffer if non-empty,
    /// otherwise one socket read. Empty bytes signal clean EOF and all
    /// subsequent reads stay empty without touching the socket.
    pub async fn next_chunk(&mut self, max_len: usize) -> io::Result<Bytes> {
        if self.rbuf.is_empty() {
            self.fill().await?;
        }
        let take = self.rbuf.len().min(max_len);
        Ok(self.rbuf.split_to(take).freeze())
    }

    /// Read one line terminated by `\n`, returned with its terminator.
    pub async fn read_line(&mut self, max_len: usize) -> Result<Bytes, StreamReadError> {
        let mut scanned = 0usize;
        loop {
            if let Some(p) = memchr::memchr(b'\n', &self.rbuf[scanned..]) {
                let line_len = scanned + p + 1;
                if line_len > max_len {
                    return Err(StreamReadError::LimitExceeded);
                }
                return Ok(self.rbuf.split_to(line_len).freeze());
            }
            scanned = self.rbuf.len();
            if scanned >= max_len {
                return Err(StreamReadError::LimitExceeded);
            }
            if self.fill().await? == 0 {
                return Err(StreamReadError::Closed { read: scanned });
            }
        }
    }

    /// Read exactly `n` bytes.
    pub async fn read_exact_len(&mut self, n: usize) -> Result<Bytes, StreamReadError> {
        while self.rbuf.len() < n {
            if self.fill().await? == 0 {
                return Err(StreamReadError::Closed {
                    read: self.rbuf.len(),
                });
            }
        }
        Ok(self.rbuf.split_to(n).freeze())
    }

    pub async fn write_all_flush(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data).await?;
        self.inner.flush().await
    }

    pub async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data).await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }

    /// Unwrap the transport, discarding the read-ahead buffer. Used to
    /// hand a tunneled stream to the TLS layer, which speaks next.
    pub fn into_inner(self) -> BoxClientStream {
        self.inner
    }
}
