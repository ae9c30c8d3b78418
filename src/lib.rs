//! dasein-tests library
//!
//! Test-resource lifecycle management for Dasein Cloud conformance suites:
//! label registries, get-or-provision per resource kind, stateless
//! discovery, dependency-ordered teardown, include/exclude filtering and a
//! statically registered suite runner.

pub mod config;
pub mod context;
pub mod error;
pub mod exit_codes;
pub mod finder;
pub mod labels;
pub mod manager;
pub mod naming;
pub mod provider;
pub mod providers;
pub mod provisioner;
pub mod registry;
pub mod resources;
pub mod skip;
pub mod suite;
pub mod suites;
pub mod teardown;
pub mod utils;
pub mod wait;

// Re-export commonly used types
pub use config::Config;
pub use context::TestContext;
pub use error::{DaseinError, Result};
pub use manager::TestManager;
pub use provider::{CloudProvider, ProviderFactory, ResourceKind};
pub use suite::{RunReport, SuiteRunner};
