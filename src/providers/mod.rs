//! Provider implementations bundled with the harness
//!
//! Real cloud bindings are supplied by whoever embeds the harness through
//! [`crate::provider::ProviderFactory`]. Only the simulated cloud ships here.

pub mod memory;

pub use memory::{InMemoryFactory, InMemoryProvider};

use crate::error::{ConfigError, Result};
use crate::provider::ProviderFactory;
use std::sync::Arc;

/// Factory for a built-in provider name
pub fn builtin_factory(name: &str) -> Result<Arc<dyn ProviderFactory>> {
    match name.to_lowercase().as_str() {
        memory::PROVIDER_NAME => Ok(Arc::new(InMemoryFactory::new(Arc::new(
            InMemoryProvider::new(),
        )))),
        other => Err(ConfigError::InvalidProvider(other.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DaseinError;

    #[test]
    fn test_builtin_factory() {
        assert!(builtin_factory("memory").is_ok());
        assert!(builtin_factory("Memory").is_ok());
        assert!(matches!(
            builtin_factory("azure"),
            Err(DaseinError::Config(ConfigError::InvalidProvider(_)))
        ));
    }
}
