/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::HttpClientError;

/// How long a whole request may take, from connection acquisition through
/// the last body read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestTimeout {
    /// Use the manager's default response timeout.
    #[default]
    Inherit,
    Explicit(Duration),
    Unlimited,
}

impl RequestTimeout {
    pub(crate) fn resolve(self, manager_default: Option<Duration>) -> Option<Duration> {
        match self {
            RequestTimeout::Inherit => manager_default,
            RequestTimeout::Explicit(d) => Some(d),
            RequestTimeout::Unlimited => None,
        }
    }
}

/// A single deadline shared by every blocking step of one request.
///
/// Each step runs under the time remaining; once the deadline passes, the
/// next step fails `ResponseTimeout` immediately.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub(crate) fn start(timeout: RequestTimeout, manager_default: Option<Duration>) -> Self {
        let at = timeout.resolve(manager_default).map(|d| Instant::now() + d);
        Deadline { at }
    }

    pub(crate) fn unlimited() -> Self {
        Deadline { at: None }
    }

    pub(crate) async fn run<T, F>(&self, fut: F) -> Result<T, HttpClientError>
    where
        F: Future<Output = Result<T, HttpClientError>>,
    {
        match self.at {
            None => fut.await,
            Some(at) => tokio::time::timeout_at(at, fut)
                .await
                .map_err(|_| HttpClientError::ResponseTimeout)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn budget_spans_operations() {
        let deadline = Deadline::start(
            RequestTimeout::Explicit(Duration::from_millis(200)),
            None,
        );

        // first operation fits in the budget
        deadline
            .run(async {
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok::<_, HttpClientError>(())
            })
            .await
            .unwrap();

        // the second one overruns what is left
        let r = deadline
            .run(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, HttpClientError>(())
            })
            .await;
        assert!(matches!(r, Err(HttpClientError::ResponseTimeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn inherit_uses_manager_default() {
        let t = RequestTimeout::Inherit;
        assert_eq!(
            t.resolve(Some(Duration::from_secs(5))),
            Some(Duration::from_secs(5))
        );
        assert_eq!(RequestTimeout::Unlimited.resolve(Some(Duration::from_secs(5))), None);
    }
}
