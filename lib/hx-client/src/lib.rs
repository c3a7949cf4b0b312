/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

//! A low-level HTTP/1.1 client engine.
//!
//! This crate is plumbing for higher-level HTTP libraries: request
//! construction and wire encoding, a pooled connection manager, response
//! decoding with chunked and gzip handling, RFC 6265 cookies and redirect
//! resolution. It deliberately has no ergonomic request API.
//!
//! ```rust,no_run
//! use hx_client::{fetch, ConnectionManager, HttpRequest, ManagerConfig};
//!
//! # async fn example() -> Result<(), hx_client::HttpClientError> {
//! let manager = ConnectionManager::new(ManagerConfig::default());
//! let req = HttpRequest::parse_url("http://example.com/")?;
//! let rsp = fetch(req, &manager).await?;
//! assert_eq!(rsp.status.as_u16(), 200);
//! # Ok(())
//! # }
//! ```

mod deadline;
mod driver;
mod encode;
mod error;
mod parse;

pub mod cookie;
pub mod pool;
pub mod request;
pub mod response;
pub mod stream;

pub use deadline::RequestTimeout;
pub use driver::{fetch, send_request, with_response, FetchedResponse};
pub use error::{HttpClientError, StatusErrorDetail};
pub use parse::LineParseError;

pub use cookie::{Cookie, CookieJar, NoPublicSuffix, PublicSuffix};
pub use pool::{ConnectionManager, ManagerConfig, PoolKey};
pub use request::{HttpRequest, RequestBody};
pub use response::HttpResponse;
