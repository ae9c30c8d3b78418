//! Built-in conformance suites
//!
//! Stateful suites provision through the run-wide resource set so later
//! suites (the stateless ones in particular) can reuse what they created.
//! Storage provisions through the suite's own set and is swept when the
//! suite closes.

pub mod compute;
pub mod identity;
pub mod network;
pub mod platform;
pub mod stateless;
pub mod storage;

use crate::error::Result;
use crate::manager::TestManager;
use crate::provider::ResourceKind;
use crate::suite::{need, Suite};

/// Every built-in suite in run order
pub static SUITES: &[Suite] = &[
    identity::SUITE,
    network::SUITE,
    compute::SUITE,
    storage::SUITE,
    platform::SUITE,
    stateless::NETWORK,
    stateless::COMPUTE,
    stateless::STORAGE,
];

/// Skip the test when `kind` is unsupported, whether the provider says so
/// up front or refused an earlier create
pub(crate) fn require_support(m: &TestManager, kind: ResourceKind) -> Result<()> {
    match m.unavailable(kind) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Unwrap a helper's resource. When it came back empty because one of
/// `kinds` turned out to be unavailable, the test is skipped, not failed.
pub(crate) fn need_resource<T>(
    m: &TestManager,
    value: Option<T>,
    kinds: &[ResourceKind],
    what: &str,
) -> Result<T> {
    if value.is_none() {
        for &kind in kinds {
            require_support(m, kind)?;
        }
    }
    need(value, what)
}
