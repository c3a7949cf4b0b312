/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::time::Duration;

/// Retention limits for idle connections kept by a connection manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionPoolConfig {
    check_interval: Duration,
    idle_timeout: Duration,
    max_idle_per_host: usize,
    max_idle_total: usize,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        ConnectionPoolConfig::new(10, 512)
    }
}

impl ConnectionPoolConfig {
    pub fn new(max_idle_per_host: usize, max_idle_total: usize) -> Self {
        ConnectionPoolConfig {
            check_interval: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(90),
            max_idle_per_host,
            max_idle_total,
        }
    }

    #[inline]
    pub fn set_check_interval(&mut self, interval: Duration) {
        self.check_interval = interval;
    }

    /// The reaper wakes at most this often, clamped to the idle timeout.
    #[inline]
    pub fn check_interval(&self) -> Duration {
        self.check_interval.min(self.idle_timeout)
    }

    #[inline]
    pub fn set_idle_timeout(&mut self, timeout: Duration) {
        self.idle_timeout = timeout;
    }

    #[inline]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    #[inline]
    pub fn set_max_idle_per_host(&mut self, count: usize) {
        self.max_idle_per_host = count;
    }

    #[inline]
    pub fn max_idle_per_host(&self) -> usize {
        self.max_idle_per_host
    }

    #[inline]
    pub fn set_max_idle_total(&mut self, count: usize) {
        self.max_idle_total = count;
    }

    #[inline]
    pub fn max_idle_total(&self) -> usize {
        self.max_idle_total
    }
}
