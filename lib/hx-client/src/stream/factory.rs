/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;

use hx_types::net::{Host, UpstreamAddr};

use super::BoxClientStream;

/// Opens the raw transport to a peer.
///
/// `resolved` short-circuits name resolution when the caller already knows
/// the peer address.
#[async_trait]
pub trait ConnectFactory: Send + Sync {
    async fn connect(
        &self,
        peer: &UpstreamAddr,
        resolved: Option<SocketAddr>,
    ) -> io::Result<BoxClientStream>;
}

/// Upgrades an established transport to TLS.
///
/// Implementations verify the peer certificate against `server_name` unless
/// explicitly configured otherwise.
#[async_trait]
pub trait TlsConnectFactory: Send + Sync {
    async fn handshake(
        &self,
        stream: BoxClientStream,
        server_name: &Host,
    ) -> io::Result<BoxClientStream>;
}
