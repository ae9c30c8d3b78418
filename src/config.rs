use crate::error::{ConfigError, Result as DaseinResult};
use crate::naming::DEFAULT_NAME_PREFIX;
use crate::provider::{ProviderContext, ResourceKind};
use crate::providers::memory;
use crate::skip::SkipFilter;
use crate::utils::ensure_dir;
use crate::wait::{WaitBudgets, WaitConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Local config file name, looked up in the working directory
pub const LOCAL_CONFIG: &str = ".dasein-tests.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub naming: NamingConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider implementation to load (e.g. "memory")
    pub name: String,
    pub cloud: String,
    pub account: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub api_shared_key: Option<String>,
    pub api_secret_key: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.to_context().fmt(f)
    }
}

/// Comma-separated `suite` / `suite.test` lists, case-insensitive
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub inclusions: Option<String>,
    pub exclusions: Option<String>,
}

/// All values in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub poll_interval_secs: u64,
    pub default_secs: u64,
    pub vm_secs: u64,
    pub image_secs: u64,
    pub snapshot_secs: u64,
    pub volume_secs: u64,
    pub database_secs: u64,
    /// How long teardown waits for a deleted VM or database to go away
    pub settle_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Leading characters of every generated resource name
    pub prefix: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: memory::PROVIDER_NAME.to_string(),
            cloud: "simulated".to_string(),
            account: None,
            region: None,
            endpoint: None,
            api_shared_key: None,
            api_secret_key: None,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 15,
            default_secs: 5 * 60,
            vm_secs: 20 * 60,
            image_secs: 20 * 60,
            snapshot_secs: 20 * 60,
            volume_secs: 10 * 60,
            database_secs: 20 * 60,
            settle_secs: 5 * 60,
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_NAME_PREFIX.to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn to_context(&self) -> ProviderContext {
        ProviderContext {
            provider_name: self.name.clone(),
            cloud_name: self.cloud.clone(),
            account: self.account.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            api_shared_key: self.api_shared_key.clone(),
            api_secret_key: self.api_secret_key.clone(),
        }
    }
}

impl TimeoutConfig {
    pub fn budgets(&self) -> WaitBudgets {
        let secs = Duration::from_secs;
        WaitBudgets::uniform(secs(self.poll_interval_secs), secs(self.default_secs))
            .with_budget(ResourceKind::VirtualMachine, secs(self.vm_secs))
            .with_budget(ResourceKind::MachineImage, secs(self.image_secs))
            .with_budget(ResourceKind::Snapshot, secs(self.snapshot_secs))
            .with_budget(ResourceKind::Volume, secs(self.volume_secs))
            .with_budget(ResourceKind::Database, secs(self.database_secs))
    }

    pub fn settle(&self) -> WaitConfig {
        WaitConfig::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.settle_secs),
        )
    }

    fn named(&self) -> [(&'static str, u64); 7] {
        [
            ("timeouts.default_secs", self.default_secs),
            ("timeouts.vm_secs", self.vm_secs),
            ("timeouts.image_secs", self.image_secs),
            ("timeouts.snapshot_secs", self.snapshot_secs),
            ("timeouts.volume_secs", self.volume_secs),
            ("timeouts.database_secs", self.database_secs),
            ("timeouts.settle_secs", self.settle_secs),
        ]
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            // Try .dasein-tests.toml in current dir, then ~/.config/dasein-tests/config.toml
            let local = PathBuf::from(LOCAL_CONFIG);
            if local.exists() {
                local
            } else {
                dirs::config_dir()
                    .map(|d| d.join("dasein-tests").join("config.toml"))
                    .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG))
            }
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
            let config: Config = toml::from_str(&content).with_context(|| {
                let mut err = format!("Failed to parse config: {}", config_path.display());
                err.push_str("\n  Common issues:");
                err.push_str("\n    - Invalid TOML syntax");
                err.push_str("\n    - Timeouts given as strings instead of seconds");
                err.push_str("\n  Tip: Run 'dasein-tests init' to create a new config file");
                err
            })?;
            Ok(config)
        } else {
            // Use defaults but warn if user explicitly provided a path
            if path.is_some() {
                eprintln!("WARNING: Config file not found: {}", config_path.display());
                eprintln!(
                    "   Using default configuration. Run 'dasein-tests init' to create a config file."
                );
            }
            Ok(Config::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Apply `DSN_*` overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply `DSN_*` overrides from any key/value source; unknown keys are ignored
    pub fn apply_overrides<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value = value.into();
            match key.as_ref() {
                "DSN_PROVIDER" => self.provider.name = value,
                "DSN_CLOUD" => self.provider.cloud = value,
                "DSN_ACCOUNT" => self.provider.account = Some(value),
                "DSN_REGION" => self.provider.region = Some(value),
                "DSN_ENDPOINT" => self.provider.endpoint = Some(value),
                "DSN_API_SHARED" => self.provider.api_shared_key = Some(value),
                "DSN_API_SECRET" => self.provider.api_secret_key = Some(value),
                "DSN_INCLUSIONS" => self.filters.inclusions = Some(value),
                "DSN_EXCLUSIONS" => self.filters.exclusions = Some(value),
                _ => {}
            }
        }
    }

    pub fn validate(&self) -> DaseinResult<()> {
        if self.provider.name.trim().is_empty() {
            return Err(ConfigError::MissingField("provider.name".to_string()).into());
        }
        if self.timeouts.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeouts.poll_interval_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        for (field, secs) in self.timeouts.named() {
            if secs <= self.timeouts.poll_interval_secs {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!(
                        "{}s must be longer than the {}s poll interval",
                        secs, self.timeouts.poll_interval_secs
                    ),
                }
                .into());
            }
        }
        if self.naming.prefix.is_empty() {
            return Err(ConfigError::MissingField("naming.prefix".to_string()).into());
        }
        Ok(())
    }

    pub fn skip_filter(&self) -> SkipFilter {
        SkipFilter::from_lists(
            self.filters.inclusions.as_deref(),
            self.filters.exclusions.as_deref(),
        )
    }
}

pub fn init_config(output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    let config = Config::default();
    config.save(output)?;
    println!("Created config file: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.provider.name, "memory");
        assert_eq!(config.timeouts.vm_secs, 1200);
        assert_eq!(config.naming.prefix, "dsn");
        assert!(config.validate().is_ok());
        assert!(config.skip_filter().is_unrestricted());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let mut config = Config::default();
        config.filters.inclusions = Some("StatelessVlan".to_string());
        assert!(config.save(&config_path).is_ok());
        assert!(config_path.exists());

        let loaded = Config::load(Some(&config_path)).unwrap();
        assert_eq!(loaded.timeouts.poll_interval_secs, config.timeouts.poll_interval_secs);
        assert_eq!(loaded.filters.inclusions.as_deref(), Some("StatelessVlan"));
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        std::fs::write(&config_path, "[provider]\nregion = \"eu-west-1\"\n").unwrap();

        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(config.provider.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.provider.name, "memory");
        assert_eq!(config.timeouts.volume_secs, 600);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let fake_path = temp_dir.path().join("nonexistent.toml");

        // Should return default config
        let config = Config::load(Some(&fake_path)).unwrap();
        assert_eq!(config.timeouts.default_secs, 300);
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "invalid toml content {").unwrap();

        let result = Config::load(Some(&config_path));
        assert!(result.is_err());
    }

    #[test]
    fn test_init_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("init_test.toml");

        assert!(init_config(&config_path).is_ok());
        assert!(config_path.exists());

        // Verify it's valid TOML
        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(config.provider.cloud, "simulated");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides([
            ("DSN_PROVIDER", "openstack"),
            ("DSN_REGION", "RegionOne"),
            ("DSN_API_SECRET", "s3cr3t"),
            ("DSN_EXCLUSIONS", "StatefulVm"),
            ("HOME", "/root"),
        ]);

        assert_eq!(config.provider.name, "openstack");
        assert_eq!(config.provider.region.as_deref(), Some("RegionOne"));
        assert_eq!(config.provider.api_secret_key.as_deref(), Some("s3cr3t"));
        assert!(!config.skip_filter().should_run("statefulvm", "launch"));
        assert!(!format!("{:?}", config.provider).contains("s3cr3t"));
    }

    #[test]
    fn test_validate_rejects_bad_timeouts() {
        let mut config = Config::default();
        config.timeouts.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timeouts.volume_secs = config.timeouts.poll_interval_secs;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("timeouts.volume_secs"));

        let mut config = Config::default();
        config.provider.name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_budgets_from_config() {
        let config = Config::default();
        let budgets = config.timeouts.budgets();
        assert_eq!(
            budgets.for_kind(ResourceKind::VirtualMachine).timeout,
            Duration::from_secs(1200)
        );
        assert_eq!(budgets.for_kind(ResourceKind::Vlan).timeout, Duration::from_secs(300));
        assert_eq!(config.timeouts.settle().timeout, Duration::from_secs(300));
    }
}
