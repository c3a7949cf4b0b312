/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use log::debug;
use tokio::time::Instant;

use hx_types::net::{Host, UpstreamAddr};

use crate::cookie::{NoPublicSuffix, PublicSuffix};
use crate::error::HttpClientError;
use crate::request::HttpRequest;
use crate::stream::{BufferedStream, ConnectFactory, TcpConnectFactory, TlsConnectFactory};

mod tunnel;

/// Identifies one pool bucket: connections in a bucket are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub proxy: Option<UpstreamAddr>,
    pub host: Host,
    pub port: u16,
    pub secure: bool,
}

impl PoolKey {
    pub fn for_request(req: &HttpRequest) -> Self {
        PoolKey {
            proxy: req.proxy().cloned(),
            host: req.host().clone(),
            port: req.port(),
            secure: req.is_secure(),
        }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.secure { "https" } else { "http" };
        match &self.proxy {
            Some(proxy) => write!(
                f,
                "{scheme}://{}:{} via {proxy}",
                self.host.authority_str(),
                self.port
            ),
            None => write!(f, "{scheme}://{}:{}", self.host.authority_str(), self.port),
        }
    }
}

struct IdleConn {
    stream: BufferedStream,
    created_at: Instant,
    idle_since: Instant,
}

/// A checked-out connection. Dropping it closes the socket; handing it back
/// through [`ConnectionManager::release`] may pool it instead.
pub struct PooledConn {
    pub(crate) stream: BufferedStream,
    pub(crate) key: PoolKey,
    pub(crate) created_at: Instant,
    /// Taken from the idle pool rather than freshly dialed; such a
    /// connection may be half-open and its first use gets one retry.
    pub(crate) from_pool: bool,
}

impl PooledConn {
    /// Time since the underlying socket was opened.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

pub struct ManagerConfig {
    pub pool: hx_types::net::ConnectionPoolConfig,
    pub connect_timeout: Duration,
    /// Default deadline for requests that do not set their own.
    pub response_timeout: Option<Duration>,
    pub max_header_size: usize,
    pub body_line_max_len: usize,
    pub tcp_connect: Arc<dyn ConnectFactory>,
    pub tls_connect: Option<Arc<dyn TlsConnectFactory>>,
    pub public_suffix: Arc<dyn PublicSuffix>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        #[cfg(feature = "rustls")]
        let tls_connect: Option<Arc<dyn TlsConnectFactory>> =
            Some(Arc::new(crate::stream::RustlsConnectFactory::default()));
        #[cfg(not(feature = "rustls"))]
        let tls_connect: Option<Arc<dyn TlsConnectFactory>> = None;

        ManagerConfig {
            pool: hx_types::net::ConnectionPoolConfig::default(),
            connect_timeout: Duration::from_secs(30),
            response_timeout: Some(Duration::from_secs(30)),
            max_header_size: 32 * 1024,
            body_line_max_len: 2048,
            tcp_connect: Arc::new(TcpConnectFactory::default()),
            tls_connect,
            public_suffix: Arc::new(NoPublicSuffix),
        }
    }
}

#[derive(Default)]
struct PoolState {
    idle: HashMap<PoolKey, VecDeque<IdleConn>>,
    idle_total: usize,
    closed: bool,
}

impl PoolState {
    /// Pop the freshest usable idle connection, dropping expired ones found
    /// on the way. Returns the expired connections for closing outside the
    /// lock.
    fn checkout(
        &mut self,
        key: &PoolKey,
        idle_timeout: Duration,
    ) -> (Option<IdleConn>, Vec<IdleConn>) {
        let mut expired = Vec::new();
        let mut picked = None;
        let mut now_empty = false;
        if let Some(list) = self.idle.get_mut(key) {
            if let Some(conn) = list.pop_front() {
                if conn.idle_since.elapsed() <= idle_timeout {
                    picked = Some(conn);
                } else {
                    // the list is freshest first: if the freshest expired,
                    // everything behind it expired too
                    expired.push(conn);
                    expired.extend(list.drain(..));
                }
            }
            now_empty = list.is_empty();
        }
        self.idle_total -= picked.is_some() as usize + expired.len();
        if now_empty {
            self.idle.remove(key);
        }
        (picked, expired)
    }
}

/// The idle-connection pool shared by concurrent requests.
///
/// The pool map sits behind one short-held mutex; dialing, TLS handshakes
/// and socket teardown all happen outside it.
pub struct ConnectionManager {
    config: ManagerConfig,
    state: Mutex<PoolState>,
}

impl ConnectionManager {
    /// Create a manager and arm its idle reaper. Must be called within a
    /// tokio runtime.
    pub fn new(config: ManagerConfig) -> Arc<Self> {
        let interval = config.pool.check_interval();
        let manager = Arc::new(ConnectionManager {
            config,
            state: Mutex::new(PoolState::default()),
        });
        spawn_reaper(Arc::downgrade(&manager), interval);
        manager
    }

    #[inline]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// A live connection for the request's destination: the freshest idle
    /// one when available, a newly dialed one otherwise.
    pub async fn acquire(&self, req: &HttpRequest) -> Result<PooledConn, HttpClientError> {
        let key = PoolKey::for_request(req);

        let (picked, expired) = {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return Err(HttpClientError::ManagerClosed);
            }
            state.checkout(&key, self.config.pool.idle_timeout())
        };
        drop(expired);

        if let Some(idle) = picked {
            debug!("reusing idle connection to {key}");
            return Ok(PooledConn {
                stream: idle.stream,
                key,
                created_at: idle.created_at,
                from_pool: true,
            });
        }

        debug!("dialing new connection to {key}");
        let stream = match tokio::time::timeout(self.config.connect_timeout, self.dial(req)).await
        {
            Ok(r) => r?,
            Err(_) => {
                return Err(HttpClientError::ConnectionFailure(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connect timed out",
                )));
            }
        };
        Ok(PooledConn {
            stream,
            key,
            created_at: Instant::now(),
            from_pool: false,
        })
    }

    async fn dial(&self, req: &HttpRequest) -> Result<BufferedStream, HttpClientError> {
        let upstream = req.upstream();
        match req.proxy() {
            Some(proxy) => {
                let raw = self
                    .config
                    .tcp_connect
                    .connect(proxy, None)
                    .await
                    .map_err(HttpClientError::ConnectionFailure)?;
                let mut stream = BufferedStream::new(raw);
                if req.is_secure() {
                    tunnel::establish(
                        &mut stream,
                        &upstream,
                        req.proxy_auth(),
                        self.config.max_header_size,
                    )
                    .await?;
                    let tls = self.tls_handshake(stream.into_inner(), req.host()).await?;
                    Ok(BufferedStream::new(tls))
                } else {
                    // plaintext through a proxy: requests use absolute form,
                    // no tunnel needed
                    Ok(stream)
                }
            }
            None => {
                let raw = self
                    .config
                    .tcp_connect
                    .connect(&upstream, req.resolved_addr)
                    .await
                    .map_err(HttpClientError::ConnectionFailure)?;
                if req.is_secure() {
                    let tls = self.tls_handshake(raw, req.host()).await?;
                    Ok(BufferedStream::new(tls))
                } else {
                    Ok(BufferedStream::new(raw))
                }
            }
        }
    }

    async fn tls_handshake(
        &self,
        raw: crate::stream::BoxClientStream,
        host: &Host,
    ) -> Result<crate::stream::BoxClientStream, HttpClientError> {
        let Some(tls) = &self.config.tls_connect else {
            return Err(HttpClientError::ConnectionFailure(io::Error::new(
                io::ErrorKind::Unsupported,
                "no TLS connect factory configured",
            )));
        };
        tls.handshake(raw, host)
            .await
            .map_err(HttpClientError::ConnectionFailure)
    }

    /// Hand a connection back. Reusable connections go to the front of their
    /// bucket; everything else is closed. Inserting into a full bucket
    /// closes the oldest idle connection of that bucket.
    ///
    /// `release` consumes the connection, so a connection can be released at
    /// most once.
    pub fn release(&self, conn: PooledConn, reusable: bool) {
        if !reusable {
            debug!("closing connection to {}", conn.key);
            return;
        }

        let max_per_host = self.config.pool.max_idle_per_host();
        let mut evicted: Option<IdleConn> = None;
        let mut rejected: Option<PooledConn> = None;
        {
            let mut guard = self.state.lock().unwrap();
            let state = &mut *guard;
            if state.closed
                || max_per_host == 0
                || state.idle_total >= self.config.pool.max_idle_total()
            {
                rejected = Some(conn);
            } else {
                let list = state.idle.entry(conn.key.clone()).or_default();
                if list.len() >= max_per_host {
                    evicted = list.pop_back();
                }
                list.push_front(IdleConn {
                    stream: conn.stream,
                    created_at: conn.created_at,
                    idle_since: Instant::now(),
                });
                if evicted.is_none() {
                    state.idle_total += 1;
                }
            }
        }
        drop(evicted);
        drop(rejected);
    }

    /// Close every idle connection and refuse all further acquisitions.
    pub fn close(&self) {
        let drained = {
            let mut state = self.state.lock().unwrap();
            state.closed = true;
            state.idle_total = 0;
            std::mem::take(&mut state.idle)
        };
        drop(drained);
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Total idle connections currently pooled.
    pub fn idle_connections(&self) -> usize {
        self.state.lock().unwrap().idle_total
    }

    /// Idle connections pooled for one destination.
    pub fn idle_connections_to(&self, key: &PoolKey) -> usize {
        self.state
            .lock()
            .unwrap()
            .idle
            .get(key)
            .map(|l| l.len())
            .unwrap_or(0)
    }

    /// Drop idle connections past the idle timeout. Returns true when the
    /// manager is closed and the reaper should stop.
    fn reap(&self) -> bool {
        let mut expired: Vec<IdleConn> = Vec::new();
        let closed = {
            let mut guard = self.state.lock().unwrap();
            let state = &mut *guard;
            let idle_timeout = self.config.pool.idle_timeout();
            state.idle.retain(|_key, list| {
                // freshest first, so expired connections sit at the back
                loop {
                    match list.back() {
                        Some(oldest) if oldest.idle_since.elapsed() > idle_timeout => {
                            if let Some(conn) = list.pop_back() {
                                expired.push(conn);
                            }
                        }
                        _ => break,
                    }
                }
                !list.is_empty()
            });
            state.idle_total -= expired.len();
            state.closed
        };
        if !expired.is_empty() {
            debug!("reaped {} expired idle connections", expired.len());
        }
        drop(expired);
        closed
    }
}

fn spawn_reaper(manager: Weak<ConnectionManager>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(manager) = manager.upgrade() else {
                break;
            };
            if manager.reap() {
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(host: &str) -> PoolKey {
        PoolKey {
            proxy: None,
            host: Host::Domain(host.to_string()),
            port: 80,
            secure: false,
        }
    }

    fn test_conn(key: &PoolKey) -> PooledConn {
        let (a, _b) = tokio::io::duplex(16);
        PooledConn {
            stream: BufferedStream::new(Box::new(a)),
            key: key.clone(),
            created_at: Instant::now(),
            from_pool: false,
        }
    }

    fn test_manager(mut f: impl FnMut(&mut ManagerConfig)) -> Arc<ConnectionManager> {
        let mut config = ManagerConfig::default();
        f(&mut config);
        ConnectionManager::new(config)
    }

    #[tokio::test]
    async fn global_limit_bounds_the_pool() {
        let manager = test_manager(|c| c.pool.set_max_idle_total(2));
        for i in 0..3 {
            let key = test_key(&format!("host{i}.example"));
            manager.release(test_conn(&key), true);
        }
        assert_eq!(manager.idle_connections(), 2);
    }

    #[tokio::test]
    async fn per_host_insert_evicts_oldest() {
        let manager = test_manager(|c| c.pool.set_max_idle_per_host(2));
        let key = test_key("a.example");
        for _ in 0..3 {
            manager.release(test_conn(&key), true);
        }
        assert_eq!(manager.idle_connections_to(&key), 2);
        assert_eq!(manager.idle_connections(), 2);
    }

    #[tokio::test]
    async fn non_reusable_release_closes() {
        let manager = test_manager(|_| {});
        let key = test_key("a.example");
        manager.release(test_conn(&key), false);
        assert_eq!(manager.idle_connections(), 0);
    }

    #[tokio::test]
    async fn close_drops_idle_and_blocks_release() {
        let manager = test_manager(|_| {});
        let key = test_key("a.example");
        manager.release(test_conn(&key), true);
        assert_eq!(manager.idle_connections(), 1);

        manager.close();
        assert!(manager.is_closed());
        assert_eq!(manager.idle_connections(), 0);

        // a release racing with close must not resurrect the pool
        manager.release(test_conn(&key), true);
        assert_eq!(manager.idle_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn checkout_skips_expired_connections() {
        let manager = test_manager(|c| c.pool.set_idle_timeout(Duration::from_secs(5)));
        let key = test_key("a.example");
        manager.release(test_conn(&key), true);

        tokio::time::sleep(Duration::from_secs(6)).await;

        let mut guard = manager.state.lock().unwrap();
        let (picked, expired) = guard.checkout(&key, manager.config.pool.idle_timeout());
        assert!(picked.is_none());
        assert_eq!(expired.len(), 1);
        assert_eq!(guard.idle_total, 0);
    }
}
