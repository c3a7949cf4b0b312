/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::io;
use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use tokio::net::{TcpSocket, TcpStream, lookup_host};

use hx_types::net::{Host, UpstreamAddr};

use super::{BoxClientStream, ConnectFactory};

/// The default raw transport: resolve, connect, disable Nagle.
#[derive(Default)]
pub struct TcpConnectFactory {
    bind: Option<IpAddr>,
}

impl TcpConnectFactory {
    pub fn new(bind: Option<IpAddr>) -> Self {
        TcpConnectFactory { bind }
    }

    async fn resolve(&self, peer: &UpstreamAddr) -> io::Result<SocketAddr> {
        match peer.host() {
            Host::Ip(ip) => Ok(SocketAddr::new(*ip, peer.port())),
            Host::Domain(domain) => {
                let mut addrs = lookup_host((domain.as_str(), peer.port())).await?;
                addrs.next().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("no address resolved for {domain}"),
                    )
                })
            }
        }
    }

    async fn connect_addr(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let stream = match self.bind {
            Some(ip) => {
                let socket = if addr.is_ipv4() {
                    TcpSocket::new_v4()?
                } else {
                    TcpSocket::new_v6()?
                };
                socket.bind(SocketAddr::new(ip, 0))?;
                socket.connect(addr).await?
            }
            None => TcpStream::connect(addr).await?,
        };
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[async_trait]
impl ConnectFactory for TcpConnectFactory {
    async fn connect(
        &self,
        peer: &UpstreamAddr,
        resolved: Option<SocketAddr>,
    ) -> io::Result<BoxClientStream> {
        let addr = match resolved {
            Some(addr) => addr,
            None => self.resolve(peer).await?,
        };
        let stream = self.connect_addr(addr).await?;
        Ok(Box::new(stream))
    }
}
