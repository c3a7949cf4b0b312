/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::ServerName;
use tokio_rustls::TlsConnector;

use hx_types::net::Host;

use super::{BoxClientStream, TlsConnectFactory};

/// The provided TLS transport, backed by rustls with the webpki root set.
/// Certificate verification is always on.
pub struct RustlsConnectFactory {
    connector: TlsConnector,
}

impl Default for RustlsConnectFactory {
    fn default() -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        RustlsConnectFactory::new(Arc::new(config))
    }
}

impl RustlsConnectFactory {
    pub fn new(config: Arc<ClientConfig>) -> Self {
        RustlsConnectFactory {
            connector: TlsConnector::from(config),
        }
    }
}

#[async_trait]
impl TlsConnectFactory for RustlsConnectFactory {
    async fn handshake(
        &self,
        stream: BoxClientStream,
        server_name: &Host,
    ) -> io::Result<BoxClientStream> {
        let name = match server_name {
            Host::Ip(ip) => ServerName::IpAddress((*ip).into()),
            Host::Domain(domain) => ServerName::try_from(domain.clone())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?,
        };
        let tls_stream = self.connector.connect(name, stream).await?;
        Ok(Box::new(tls_stream))
    }
}
