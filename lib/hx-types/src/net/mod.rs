/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

mod host;
mod pool;
mod upstream;

pub use host::Host;
pub use pool::ConnectionPoolConfig;
pub use upstream::UpstreamAddr;
