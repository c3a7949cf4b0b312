/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

mod basic;

pub use basic::HttpBasicAuth;
