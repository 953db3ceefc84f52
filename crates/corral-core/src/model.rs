// Core configuration model
// Typed access to the settings consumed by the membership registry

use config::{Config, ConfigError, Environment, File};

use corral_common::{DEFAULT_EVENT_QUEUE_SIZE, DEFAULT_MAX_HOST_EXPANSION};

/// Application configuration wrapper
/// Provides access to configuration values for the membership registry
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Create a new configuration from a Config instance
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Load configuration from `CORRAL.*` environment variables and an
    /// optional file (any format supported by the `config` crate)
    ///
    /// `CORRAL.MEMBERSHIP.MAX-HOST-EXPANSION=128` sets
    /// `corral.membership.max-host-expansion`.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        Self::load_with(Self::environment(), path)
    }

    fn environment() -> Environment {
        Environment::with_prefix("corral")
            .separator(".")
            .keep_prefix(true)
            .try_parsing(true)
    }

    fn load_with(environment: Environment, path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(environment);

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }

        Ok(Self::from_config(builder.build()?))
    }

    // ===================== Membership Configuration =====================

    /// Get the member change event channel capacity (default: 1024)
    pub fn membership_event_queue_size(&self) -> usize {
        self.get_usize(
            "corral.membership.event-queue-size",
            DEFAULT_EVENT_QUEUE_SIZE,
        )
    }

    /// Get the maximum number of hosts one host pattern may expand to (default: 65536)
    pub fn membership_max_host_expansion(&self) -> usize {
        self.get_usize(
            "corral.membership.max-host-expansion",
            DEFAULT_MAX_HOST_EXPANSION,
        )
    }

    fn get_usize(&self, key: &str, default: usize) -> usize {
        self.config
            .get_int(key)
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(default)
    }
}
