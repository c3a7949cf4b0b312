/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use http::header::{CONTENT_TYPE, COOKIE, LOCATION};
use http::{HeaderMap, HeaderValue, Method, StatusCode, Version};
use log::debug;

use crate::cookie::CookieJar;
use crate::deadline::Deadline;
use crate::encode;
use crate::error::HttpClientError;
use crate::pool::{ConnectionManager, PooledConn};
use crate::request::{HttpRequest, RequestBody};
use crate::response::{read_response_head, HttpResponse, ResponseHead};

/// Drive one request to a final response, following redirects and applying
/// the cookie jar along the way.
///
/// The returned response owns its connection; consuming the body to its end
/// hands the connection back to the manager's pool.
pub async fn send_request(
    mut req: HttpRequest,
    manager: &Arc<ConnectionManager>,
) -> Result<HttpResponse, HttpClientError> {
    let deadline = Deadline::start(req.timeout, manager.config().response_timeout);
    let mut jar = req.cookie_jar.take();
    let mut redirects_left = req.redirect_limit;
    let psl = manager.config().public_suffix.clone();

    loop {
        let mut headers = req.headers.clone();
        if let Some(jar) = jar.as_mut() {
            let now = Utc::now();
            if let Some(cookies) =
                jar.cookie_header_value(req.host(), req.path(), req.is_secure(), now)
            {
                if let Ok(value) = HeaderValue::from_str(&cookies) {
                    headers.insert(COOKIE, value);
                }
            }
        }

        let (conn, head) = send_with_retry(&mut req, manager, &headers, deadline).await?;

        if let Some(jar) = jar.as_mut() {
            jar.update_from_response(
                req.host(),
                req.path(),
                &head.headers,
                psl.as_ref(),
                Utc::now(),
            );
        }

        if let Some(check) = req.check_status.clone() {
            let empty_jar = CookieJar::new();
            let jar_ref = jar.as_ref().unwrap_or(&empty_jar);
            if let Some(err) = check(head.status, &head.headers, jar_ref) {
                // the caller gets the error, never a dangling connection
                drop(conn);
                return Err(err);
            }
        }

        if let Some(location) = redirect_location(&head) {
            if redirects_left > 0 {
                let status = head.status;
                debug!("following {} redirect to {location}", status.as_u16());

                // drain so the connection can go back to the pool before
                // the next hop possibly checks it out again
                let mut drained =
                    HttpResponse::new(head, CookieJar::new(), conn, manager.clone(), deadline, false);
                drained.drain_body().await?;
                drop(drained);

                let old_host = req.host().clone();
                req.set_uri_relative(&location)?;
                convert_redirect_method(&mut req, status);
                redirects_left -= 1;
                if *req.host() != old_host {
                    req.resolved_addr = None;
                }
                continue;
            }
            if req.redirect_limit > 0 {
                drop(conn);
                return Err(HttpClientError::TooManyRedirects);
            }
            // redirects disabled by the caller: the 3xx is the answer
        }

        let gunzip = req.needs_gunzip(&head.headers);
        return Ok(HttpResponse::new(
            head,
            jar.unwrap_or_default(),
            conn,
            manager.clone(),
            deadline,
            gunzip,
        ));
    }
}

/// Acquire, send and read the response head, retrying exactly once on a
/// fresh connection when a pooled connection turns out to be half-open.
async fn send_with_retry(
    req: &mut HttpRequest,
    manager: &Arc<ConnectionManager>,
    headers: &HeaderMap,
    deadline: Deadline,
) -> Result<(PooledConn, ResponseHead), HttpClientError> {
    let mut retried = false;
    loop {
        let mut conn = deadline.run(manager.acquire(req)).await?;
        let from_pool = conn.from_pool;

        match deadline
            .run(encode::send_request(&mut conn.stream, req, headers))
            .await
        {
            Ok(()) => {}
            Err(e) if from_pool && !retried && e.is_stale_connection() && req.body.is_replayable() => {
                debug!("pooled connection to {} failed at send, retrying fresh", conn.key);
                retried = true;
                continue;
            }
            // nothing of the response was seen, so this is a transport
            // failure, not a protocol one
            Err(HttpClientError::Io(e)) => return Err(HttpClientError::ConnectionFailure(e)),
            Err(e) => return Err(e),
        }

        match deadline
            .run(read_response_head(
                &mut conn.stream,
                &req.method,
                manager.config().max_header_size,
            ))
            .await
        {
            Ok(head) => return Ok((conn, head)),
            // only a failure before the first response byte marks the
            // connection as stale; later bytes mean the server was alive
            Err(HttpClientError::ConnectionFailure(e))
                if from_pool && !retried && req.body.is_replayable() =>
            {
                debug!(
                    "pooled connection to {} closed before response ({e}), retrying fresh",
                    conn.key
                );
                retried = true;
                continue;
            }
            Err(e) => return Err(e),
        }
    }
}

/// RFC 7231: 301/302/303 downgrade non-GET/HEAD methods to GET and drop the
/// body; 307/308 preserve the method.
fn convert_redirect_method(req: &mut HttpRequest, status: StatusCode) {
    match status.as_u16() {
        301 | 302 | 303 => {
            if req.method != Method::GET && req.method != Method::HEAD {
                req.method = Method::GET;
                req.body = RequestBody::Empty;
                req.headers.remove(CONTENT_TYPE);
            }
        }
        _ => {}
    }
}

fn redirect_location(head: &ResponseHead) -> Option<String> {
    if !matches!(head.status.as_u16(), 301 | 302 | 303 | 307 | 308) {
        return None;
    }
    head.headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// A response with its whole body already read into memory and its
/// connection already returned to the pool.
#[derive(Debug)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub version: Version,
    pub reason: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub cookie_jar: CookieJar,
}

/// Run a request and pre-read the body into memory.
pub async fn fetch(
    req: HttpRequest,
    manager: &Arc<ConnectionManager>,
) -> Result<FetchedResponse, HttpClientError> {
    let mut rsp = send_request(req, manager).await?;
    let body = rsp.read_body_to_end().await?;
    Ok(FetchedResponse {
        status: rsp.status(),
        version: rsp.version(),
        reason: rsp.reason().to_string(),
        headers: rsp.headers().clone(),
        body,
        cookie_jar: std::mem::take(&mut rsp.cookie_jar),
    })
}

/// Run a request and hand the streaming response to `consumer`; whatever is
/// left of the body when the consumer returns is shut down with the
/// response.
pub async fn with_response<T, F, Fut>(
    req: HttpRequest,
    manager: &Arc<ConnectionManager>,
    consumer: F,
) -> Result<T, HttpClientError>
where
    F: FnOnce(HttpResponse) -> Fut,
    Fut: Future<Output = Result<T, HttpClientError>>,
{
    let rsp = send_request(req, manager).await?;
    consumer(rsp).await
}
