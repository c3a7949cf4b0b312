/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::fmt;

use bytes::Bytes;
use tokio::io::AsyncRead;

pub type BoxBodyReader = Box<dyn AsyncRead + Send + Unpin>;

/// The outgoing body of a request. Consumed at most once.
#[derive(Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Eager bytes of known length.
    Bytes(Bytes),
    /// Deferred production of a payload whose length is declared up front.
    Builder {
        len: u64,
        build: Box<dyn FnOnce(&mut Vec<u8>) + Send>,
    },
    /// A byte stream of known length, framed by `Content-Length`.
    Stream { len: u64, reader: BoxBodyReader },
    /// A byte stream of unknown length, framed by chunked transfer coding.
    Chunked { reader: BoxBodyReader },
}

impl RequestBody {
    /// The length to announce in `Content-Length`, None for chunked bodies.
    pub fn known_len(&self) -> Option<u64> {
        match self {
            RequestBody::Empty => Some(0),
            RequestBody::Bytes(b) => Some(b.len() as u64),
            RequestBody::Builder { len, .. } => Some(*len),
            RequestBody::Stream { len, .. } => Some(*len),
            RequestBody::Chunked { .. } => None,
        }
    }

    /// Whether this body can be written a second time after a failed send.
    pub fn is_replayable(&self) -> bool {
        matches!(self, RequestBody::Empty | RequestBody::Bytes(_))
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            RequestBody::Builder { len, .. } => write!(f, "Builder({len} bytes)"),
            RequestBody::Stream { len, .. } => write!(f, "Stream({len} bytes)"),
            RequestBody::Chunked { .. } => f.write_str("Chunked"),
        }
    }
}
