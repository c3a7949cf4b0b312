/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::io;

use bytes::Bytes;

use crate::error::HttpClientError;
use crate::parse::{ChunkSizeLine, LineParseError};
use crate::stream::{BufferedStream, StreamReadError};

const DATA_READ_CAP: usize = 64 * 1024;

/// How the end of the response body is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// The response has no body at all (HEAD, 1xx, 204, 304).
    None,
    ContentLength(u64),
    Chunked,
    /// Everything until the peer closes; forbids connection reuse.
    UntilEof,
}

enum FramerState {
    Data { remaining: u64 },
    ChunkSize,
    ChunkData { remaining: u64 },
    ChunkDataEnd,
    Trailers,
    UntilEof,
    Done,
}

/// Pulls raw body bytes off a connection under one of the three framings,
/// never consuming past the body's end.
pub(crate) struct BodyFramer {
    framing: BodyFraming,
    state: FramerState,
    line_max: usize,
    expected: u64,
    received: u64,
}

fn early_eof(what: &str) -> HttpClientError {
    HttpClientError::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("connection closed while reading {what}"),
    ))
}

impl BodyFramer {
    pub(crate) fn new(framing: BodyFraming, line_max: usize) -> Self {
        let state = match framing {
            BodyFraming::None => FramerState::Done,
            BodyFraming::ContentLength(0) => FramerState::Done,
            BodyFraming::ContentLength(n) => FramerState::Data { remaining: n },
            BodyFraming::Chunked => FramerState::ChunkSize,
            BodyFraming::UntilEof => FramerState::UntilEof,
        };
        let expected = match framing {
            BodyFraming::ContentLength(n) => n,
            _ => 0,
        };
        BodyFramer {
            framing,
            state,
            line_max,
            expected,
            received: 0,
        }
    }

    pub(crate) fn finished(&self) -> bool {
        matches!(self.state, FramerState::Done)
    }

    /// Whether this framing leaves the connection in a reusable state once
    /// drained.
    pub(crate) fn framing_allows_reuse(&self) -> bool {
        !matches!(self.framing, BodyFraming::UntilEof)
    }

    /// The next piece of body data; empty bytes signal the end of the body.
    pub(crate) async fn next_chunk(
        &mut self,
        stream: &mut BufferedStream,
    ) -> Result<Bytes, HttpClientError> {
        loop {
            match &mut self.state {
                FramerState::Done => return Ok(Bytes::new()),
                FramerState::Data { remaining } => {
                    let cap = (*remaining).min(DATA_READ_CAP as u64) as usize;
                    let data = stream.next_chunk(cap).await?;
                    if data.is_empty() {
                        return Err(HttpClientError::ResponseBodyTooShort {
                            expected: self.expected,
                            received: self.received,
                        });
                    }
                    *remaining -= data.len() as u64;
                    self.received += data.len() as u64;
                    if *remaining == 0 {
                        self.state = FramerState::Done;
                    }
                    return Ok(data);
                }
                FramerState::ChunkSize => {
                    let line = self.read_chunk_line(stream).await?;
                    let chunk = ChunkSizeLine::parse(&line)
                        .map_err(HttpClientError::InvalidChunkHeader)?;
                    if chunk.chunk_size == 0 {
                        self.state = FramerState::Trailers;
                    } else {
                        self.state = FramerState::ChunkData {
                            remaining: chunk.chunk_size,
                        };
                    }
                }
                FramerState::ChunkData { remaining } => {
                    let cap = (*remaining).min(DATA_READ_CAP as u64) as usize;
                    let data = stream.next_chunk(cap).await?;
                    if data.is_empty() {
                        return Err(early_eof("chunk data"));
                    }
                    *remaining -= data.len() as u64;
                    self.received += data.len() as u64;
                    if *remaining == 0 {
                        self.state = FramerState::ChunkDataEnd;
                    }
                    return Ok(data);
                }
                FramerState::ChunkDataEnd => {
                    let end = stream.read_exact_len(2).await.map_err(|e| match e {
                        StreamReadError::Closed { .. } => early_eof("chunk data ending"),
                        StreamReadError::LimitExceeded => {
                            HttpClientError::InvalidChunkHeader(LineParseError::InvalidChunkSize)
                        }
                        StreamReadError::Io(e) => HttpClientError::Io(e),
                    })?;
                    if end.as_ref() != b"\r\n" {
                        return Err(HttpClientError::InvalidChunkHeader(
                            LineParseError::InvalidChunkSize,
                        ));
                    }
                    self.state = FramerState::ChunkSize;
                }
                FramerState::Trailers => {
                    let line = self.read_chunk_line(stream).await?;
                    if line.as_ref() == b"\r\n" || line.as_ref() == b"\n" {
                        self.state = FramerState::Done;
                    }
                    // trailer header lines are consumed and dropped
                }
                FramerState::UntilEof => {
                    let data = stream.next_chunk(DATA_READ_CAP).await?;
                    if data.is_empty() {
                        self.state = FramerState::Done;
                    }
                    self.received += data.len() as u64;
                    return Ok(data);
                }
            }
        }
    }

    async fn read_chunk_line(
        &mut self,
        stream: &mut BufferedStream,
    ) -> Result<Bytes, HttpClientError> {
        stream.read_line(self.line_max).await.map_err(|e| match e {
            StreamReadError::Closed { .. } => early_eof("chunk header"),
            StreamReadError::LimitExceeded => {
                HttpClientError::InvalidChunkHeader(LineParseError::InvalidChunkSize)
            }
            StreamReadError::Io(e) => HttpClientError::Io(e),
        })
    }
}
