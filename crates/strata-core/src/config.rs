//! # Configuration
//!
//! `StrataConfig` is read from `strata.toml`. Every field has a default, so
//! an empty file (or no file) is a valid configuration.
//!
//! ```toml
//! base_uri = "http://example.org"
//! max_iterations = 10
//! tolerance = "1.0"
//! rules_file = "config/standard_rules.toml"
//!
//! [store]
//! timeout_ms = 5000
//! max_retries = 3
//! backoff_ms = 50
//!
//! [constraints]
//! functional_properties = ["http://example.org/tourism#locatedIn"]
//! ```

use crate::consistency::OntologyConstraints;
use crate::primitives::{
    DEFAULT_BASE_URI, DEFAULT_MAX_ITERATIONS, DEFAULT_STORE_BACKOFF_MS, DEFAULT_STORE_RETRIES,
    DEFAULT_STORE_TIMEOUT_MS, DEFAULT_TOLERANCE_MILLIONTHS, MAX_ITERATIONS_LIMIT,
};
use crate::rules::RuleSet;
use crate::storage::StoreSettings;
use crate::{Decimal, Iri, StrataError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Deadline and retry policy for layer store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            max_retries: DEFAULT_STORE_RETRIES,
            backoff_ms: DEFAULT_STORE_BACKOFF_MS,
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrataConfig {
    /// Prefix of every named graph URI.
    pub base_uri: String,
    /// Forward-chaining round cap.
    pub max_iterations: u32,
    /// Cross-layer numeric tolerance.
    pub tolerance: Decimal,
    pub store: StoreConfig,
    /// TOML rule set; the standard rules when absent.
    pub rules_file: Option<PathBuf>,
    pub constraints: OntologyConstraints,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            base_uri: DEFAULT_BASE_URI.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: Decimal::from_millionths(DEFAULT_TOLERANCE_MILLIONTHS),
            store: StoreConfig::default(),
            rules_file: None,
            constraints: OntologyConstraints::standard(),
        }
    }
}

impl StrataConfig {
    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> Result<Self, StrataError> {
        let config: Self =
            toml::from_str(text).map_err(|e| StrataError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, StrataError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| StrataError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), StrataError> {
        Iri::new(self.base_uri.as_str())
            .map_err(|e| StrataError::Config(format!("base_uri: {e}")))?;
        if self.base_uri.ends_with('/') {
            return Err(StrataError::Config(
                "base_uri must not end with '/'".to_string(),
            ));
        }
        if self.max_iterations == 0 || self.max_iterations > MAX_ITERATIONS_LIMIT {
            return Err(StrataError::Config(format!(
                "max_iterations must be 1..={MAX_ITERATIONS_LIMIT}"
            )));
        }
        if self.tolerance < Decimal::ZERO {
            return Err(StrataError::Config("tolerance must not be negative".to_string()));
        }
        if self.store.timeout_ms == 0 {
            return Err(StrataError::Config("store.timeout_ms must be positive".to_string()));
        }
        for range in &self.constraints.ranges {
            if range.min > range.max {
                return Err(StrataError::Config(format!(
                    "range for {} has min above max",
                    range.property
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            timeout: Duration::from_millis(self.store.timeout_ms),
            max_retries: self.store.max_retries,
            backoff: Duration::from_millis(self.store.backoff_ms),
        }
    }

    /// Constraint declarations with the configured tolerance applied.
    #[must_use]
    pub fn constraints(&self) -> OntologyConstraints {
        self.constraints.clone().with_tolerance(self.tolerance)
    }

    /// The configured rule set.
    pub fn rule_set(&self) -> Result<RuleSet, StrataError> {
        match &self.rules_file {
            None => Ok(RuleSet::standard()),
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| StrataError::Io(format!("{}: {e}", path.display())))?;
                RuleSet::from_toml(&text)
            }
        }
    }
}
