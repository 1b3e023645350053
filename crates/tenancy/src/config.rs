//! Tenancy configuration.
//!
//! [`TenancyConfig`] holds the process-wide settings consulted by the scope
//! API. It is installed through [`Tenancy::configure`](crate::Tenancy::configure)
//! during application setup and treated as immutable afterwards.
//!
//! # Environment Variables
//!
//! [`TenancySettings`] is the plain-data form of the configuration and can be
//! loaded from the environment:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TENANCY_REQUIRE_TENANT` | false | Fail tenant-scoped operations without a tenant (`true`, `1`, `yes`, `on`, ...) |
//! | `TENANCY_PRIMARY_KEY` | id | Primary-key field used when resolving tenants |
//!
//! A malformed value is logged and replaced by its default; the remaining
//! variables still apply.
//!
//! # Example
//!
//! ```rust
//! use helios_tenancy::{Tenancy, TenancySettings};
//!
//! let tenancy = Tenancy::new();
//!
//! // From the environment
//! tenancy.configure_from(TenancySettings::from_env());
//!
//! // Or programmatically, with a dynamic policy
//! tenancy.configure(|config| {
//!     config.primary_key = "uuid".to_string();
//!     config.require_tenant_when(|| !maintenance_window());
//! });
//! # fn maintenance_window() -> bool { false }
//! ```

use std::fmt;
use std::sync::Arc;

use clap::builder::{BoolishValueParser, TypedValueParser};
use clap::{ArgAction, CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default primary-key field name.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

const REQUIRE_TENANT_ENV: &str = "TENANCY_REQUIRE_TENANT";
const PRIMARY_KEY_ENV: &str = "TENANCY_PRIMARY_KEY";

/// Policy deciding whether operations must run with a tenant.
#[derive(Clone)]
pub enum RequireTenant {
    /// A fixed answer.
    Flag(bool),
    /// Evaluated on every check.
    Predicate(Arc<dyn Fn() -> bool + Send + Sync>),
}

impl RequireTenant {
    /// Creates a policy from a predicate.
    pub fn predicate(f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        RequireTenant::Predicate(Arc::new(f))
    }

    /// Evaluates the policy.
    ///
    /// Predicates are invoked on every call; their result is never cached.
    pub fn evaluate(&self) -> bool {
        match self {
            RequireTenant::Flag(required) => *required,
            RequireTenant::Predicate(f) => f(),
        }
    }

    /// Returns `true` if the policy is evaluated dynamically.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, RequireTenant::Predicate(_))
    }
}

impl Default for RequireTenant {
    fn default() -> Self {
        RequireTenant::Flag(false)
    }
}

impl From<bool> for RequireTenant {
    fn from(required: bool) -> Self {
        RequireTenant::Flag(required)
    }
}

impl fmt::Debug for RequireTenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequireTenant::Flag(required) => f.debug_tuple("Flag").field(required).finish(),
            RequireTenant::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Process-wide tenancy settings.
#[derive(Debug, Clone)]
pub struct TenancyConfig {
    /// Whether operations lacking a resolvable tenant should fail.
    pub require_tenant: RequireTenant,
    /// Primary-key field name used when resolving tenant identity.
    pub primary_key: String,
}

impl TenancyConfig {
    /// Sets a fixed tenant requirement.
    pub fn require_tenant(&mut self, required: bool) -> &mut Self {
        self.require_tenant = RequireTenant::Flag(required);
        self
    }

    /// Sets a tenant requirement evaluated on every check.
    pub fn require_tenant_when(
        &mut self,
        f: impl Fn() -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.require_tenant = RequireTenant::predicate(f);
        self
    }
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            require_tenant: RequireTenant::default(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
        }
    }
}

impl From<TenancySettings> for TenancyConfig {
    fn from(settings: TenancySettings) -> Self {
        Self {
            require_tenant: RequireTenant::Flag(settings.require_tenant),
            primary_key: settings.primary_key,
        }
    }
}

/// Plain-data tenancy settings, loadable from the environment or a config file.
#[derive(Debug, Clone, PartialEq, Eq, Parser, Serialize, Deserialize)]
#[command(name = "tenancy")]
#[command(about = "Tenant context settings")]
#[serde(default)]
pub struct TenancySettings {
    /// Fail tenant-scoped operations that run without a tenant.
    #[arg(
        long,
        env = REQUIRE_TENANT_ENV,
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub require_tenant: bool,

    /// Primary-key field name used when resolving tenant identity.
    #[arg(long, env = PRIMARY_KEY_ENV, default_value = DEFAULT_PRIMARY_KEY)]
    pub primary_key: String,
}

impl TenancySettings {
    /// Reads settings from environment variables, falling back to defaults.
    ///
    /// Command line arguments are ignored. A malformed variable falls back to
    /// its default without discarding the others.
    pub fn from_env() -> Self {
        match Self::try_parse_from(["tenancy"]) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(error = %err, "Malformed tenancy settings in environment, using defaults for invalid values");
                Self::from_env_lenient()
            }
        }
    }

    fn from_env_lenient() -> Self {
        let defaults = Self::default();
        let command = Self::command();

        let require_tenant = std::env::var_os(REQUIRE_TENANT_ENV)
            .and_then(|value| {
                BoolishValueParser::new()
                    .parse_ref(&command, None, &value)
                    .ok()
            })
            .unwrap_or(defaults.require_tenant);
        let primary_key = std::env::var(PRIMARY_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .unwrap_or(defaults.primary_key);

        Self {
            require_tenant,
            primary_key,
        }
    }
}

impl Default for TenancySettings {
    fn default() -> Self {
        Self {
            require_tenant: false,
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_default_config() {
        let config = TenancyConfig::default();
        assert_eq!(config.primary_key, "id");
        assert!(!config.require_tenant.evaluate());
        assert!(!config.require_tenant.is_dynamic());
    }

    #[test]
    fn test_require_tenant_flag() {
        let mut config = TenancyConfig::default();
        config.require_tenant(true);
        assert!(config.require_tenant.evaluate());
    }

    #[test]
    fn test_predicate_is_evaluated_each_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let policy = RequireTenant::predicate(move || counter.fetch_add(1, Ordering::SeqCst) % 2 == 0);

        assert!(policy.evaluate());
        assert!(!policy.evaluate());
        assert!(policy.evaluate());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(policy.is_dynamic());
    }

    #[test]
    fn test_settings_from_args() {
        let settings = TenancySettings::try_parse_from([
            "tenancy",
            "--require-tenant",
            "--primary-key",
            "uuid",
        ])
        .unwrap();
        assert!(settings.require_tenant);
        assert_eq!(settings.primary_key, "uuid");

        let config = TenancyConfig::from(settings);
        assert!(config.require_tenant.evaluate());
        assert_eq!(config.primary_key, "uuid");
    }

    #[test]
    fn test_settings_from_env() {
        // SAFETY: this is the only test in the binary that writes the
        // TENANCY_* variables. Other settings tests pass every value as an
        // argument, which takes precedence over the environment.
        unsafe {
            std::env::set_var(REQUIRE_TENANT_ENV, "1");
            std::env::set_var(PRIMARY_KEY_ENV, "uuid");
        }
        let settings = TenancySettings::from_env();
        assert!(settings.require_tenant);
        assert_eq!(settings.primary_key, "uuid");

        // A malformed flag keeps the valid primary key.
        unsafe {
            std::env::set_var(REQUIRE_TENANT_ENV, "sometimes");
            std::env::set_var(PRIMARY_KEY_ENV, "slug");
        }
        let settings = TenancySettings::from_env();
        assert!(!settings.require_tenant);
        assert_eq!(settings.primary_key, "slug");

        unsafe {
            std::env::set_var(REQUIRE_TENANT_ENV, "off");
            std::env::remove_var(PRIMARY_KEY_ENV);
        }
        assert_eq!(TenancySettings::from_env(), TenancySettings::default());

        unsafe {
            std::env::remove_var(REQUIRE_TENANT_ENV);
        }
        assert_eq!(TenancySettings::from_env(), TenancySettings::default());
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: TenancySettings =
            serde_json::from_str(r#"{ "require_tenant": true }"#).unwrap();
        assert!(settings.require_tenant);
        assert_eq!(settings.primary_key, "id");

        let empty: TenancySettings = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, TenancySettings::default());
    }

    #[test]
    fn test_debug_hides_predicate() {
        let policy = RequireTenant::predicate(|| true);
        assert_eq!(format!("{policy:?}"), "Predicate(..)");
        assert_eq!(format!("{:?}", RequireTenant::Flag(true)), "Flag(true)");
    }
}
