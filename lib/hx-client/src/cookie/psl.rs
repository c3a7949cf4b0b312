/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 the hx authors.
 */

/// Answers "may a cookie be scoped to this domain?" for the jar.
///
/// A public suffix (`com`, `co.uk`, ...) is a domain under which
/// registrations happen; domain cookies must never be set on one. The data
/// source is external; any closure over a suffix list satisfies this trait.
pub trait PublicSuffix: Send + Sync {
    fn is_public_suffix(&self, domain: &str) -> bool;
}

impl<F> PublicSuffix for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_public_suffix(&self, domain: &str) -> bool {
        self(domain)
    }
}

/// Treats no domain as a public suffix. The permissive default for callers
/// that do not carry a suffix list.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPublicSuffix;

impl PublicSuffix for NoPublicSuffix {
    fn is_public_suffix(&self, _domain: &str) -> bool {
        false
    }
}
