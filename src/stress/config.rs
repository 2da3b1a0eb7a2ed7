//! Configuration for randomized rect sessions
//!
//! [`RectStressConfig`] controls how many buffers a session allocates, how
//! large they may get and how many random operations are performed.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{io_context, RectResult};
use crate::verify::Verifier;

/// Environment variable overriding the session seed
pub const SEED_ENV: &str = "RECTCHECK_SEED";

/// Environment variable overriding the number of random operations
pub const NUM_TRIES_ENV: &str = "RECTCHECK_NUM_TRIES";

/// Configuration for a randomized rect session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectStressConfig {
    /// Number of buffer pairs (device buffer + shadow)
    pub num_buffers: usize,

    /// Number of randomly selected operations
    pub num_tries: usize,

    /// Divisor applied to the guessed maximum dimension
    pub alloc_scale: usize,

    /// Largest allowed single allocation in bytes
    pub max_alloc_bytes: usize,

    /// Bytes per element
    pub element_size: usize,

    /// Seed for every random choice in the session
    pub seed: u64,

    /// Mismatches logged and kept per failed verification
    pub max_reported_mismatches: usize,

    /// Verify src and dst after every operation instead of only at the end
    pub verify_each_operation: bool,
}

impl Default for RectStressConfig {
    fn default() -> Self {
        RectStressConfig {
            num_buffers: 8,
            num_tries: 50,
            alloc_scale: 2,
            max_alloc_bytes: 64 * 1024 * 1024,
            element_size: 1,
            seed: 0,
            max_reported_mismatches: Verifier::DEFAULT_MAX_REPORTED,
            verify_each_operation: false,
        }
    }
}

impl RectStressConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_buffers(mut self, num_buffers: usize) -> Self {
        self.num_buffers = num_buffers;
        self
    }

    pub fn with_num_tries(mut self, num_tries: usize) -> Self {
        self.num_tries = num_tries;
        self
    }

    pub fn with_alloc_scale(mut self, alloc_scale: usize) -> Self {
        self.alloc_scale = alloc_scale;
        self
    }

    pub fn with_max_alloc_bytes(mut self, max_alloc_bytes: usize) -> Self {
        self.max_alloc_bytes = max_alloc_bytes;
        self
    }

    pub fn with_element_size(mut self, element_size: usize) -> Self {
        self.element_size = element_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_reported_mismatches(mut self, max_reported_mismatches: usize) -> Self {
        self.max_reported_mismatches = max_reported_mismatches;
        self
    }

    pub fn with_verify_each_operation(mut self, verify_each_operation: bool) -> Self {
        self.verify_each_operation = verify_each_operation;
        self
    }

    /// Check that a session can be planned from this configuration.
    ///
    /// # Errors
    /// `InvalidConfiguration` naming the first offending field.
    pub fn validate(&self) -> RectResult<()> {
        if self.num_buffers == 0 {
            return Err(crate::config_error!("num_buffers must be at least 1"));
        }
        if self.element_size == 0 {
            return Err(crate::config_error!("element_size must be at least 1"));
        }
        if self.alloc_scale == 0 {
            return Err(crate::config_error!("alloc_scale must be at least 1"));
        }
        if self.max_alloc_bytes < self.element_size {
            return Err(crate::config_error!(
                "max_alloc_bytes ({}) is smaller than one element ({} bytes)",
                self.max_alloc_bytes,
                self.element_size
            ));
        }
        if self.max_reported_mismatches == 0 {
            return Err(crate::config_error!("max_reported_mismatches must be at least 1"));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file. Missing fields take their
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> RectResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| io_context(e, &format!("reading config {}", path.display())))?;
        let config: RectStressConfig = serde_json::from_str(&text)?;
        config.validate()?;
        tracing::debug!("RectStressConfig::from_json_file: loaded {}", path.display());
        Ok(config)
    }

    /// Apply `RECTCHECK_SEED` and `RECTCHECK_NUM_TRIES` if set.
    pub fn apply_env_overrides(mut self) -> RectResult<Self> {
        if let Some(seed) = env_value::<u64>(SEED_ENV)? {
            self.seed = seed;
        }
        if let Some(num_tries) = env_value::<usize>(NUM_TRIES_ENV)? {
            self.num_tries = num_tries;
        }
        Ok(self)
    }

    /// Guessed upper bound (exclusive) for each buffer dimension
    ///
    /// `cbrt(max_alloc_bytes / element_size) / alloc_scale`, falling back to
    /// `max_alloc_bytes` when that rounds down to zero.
    pub fn max_dimension(&self) -> usize {
        let elements = self.max_alloc_bytes / self.element_size.max(1);
        let dim = (elements as f64).cbrt() as usize / self.alloc_scale.max(1);
        if dim == 0 {
            self.max_alloc_bytes
        } else {
            dim
        }
    }
}

fn env_value<T: std::str::FromStr>(name: &str) -> RectResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| crate::config_error!("{} has invalid value '{}'", name, raw)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = RectStressConfig::default();
        assert_eq!(config.num_buffers, 8);
        assert_eq!(config.num_tries, 50);
        assert_eq!(config.alloc_scale, 2);
        assert_eq!(config.max_alloc_bytes, 64 * 1024 * 1024);
        assert_eq!(config.element_size, 1);
        assert_eq!(config.seed, 0);
        assert_eq!(config.max_reported_mismatches, 5);
        assert!(!config.verify_each_operation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = RectStressConfig::new()
            .with_num_buffers(3)
            .with_num_tries(7)
            .with_alloc_scale(4)
            .with_max_alloc_bytes(4096)
            .with_element_size(4)
            .with_seed(99)
            .with_max_reported_mismatches(1)
            .with_verify_each_operation(true);

        assert_eq!(config.num_buffers, 3);
        assert_eq!(config.num_tries, 7);
        assert_eq!(config.alloc_scale, 4);
        assert_eq!(config.max_alloc_bytes, 4096);
        assert_eq!(config.element_size, 4);
        assert_eq!(config.seed, 99);
        assert_eq!(config.max_reported_mismatches, 1);
        assert!(config.verify_each_operation);
    }

    #[test]
    fn test_validate_rejects_zero_fields() {
        assert!(RectStressConfig::new().with_num_buffers(0).validate().is_err());
        assert!(RectStressConfig::new().with_element_size(0).validate().is_err());
        assert!(RectStressConfig::new().with_alloc_scale(0).validate().is_err());
        assert!(RectStressConfig::new()
            .with_max_reported_mismatches(0)
            .validate()
            .is_err());
        assert!(RectStressConfig::new()
            .with_element_size(8)
            .with_max_alloc_bytes(4)
            .validate()
            .is_err());
    }

    #[test]
    fn test_max_dimension() {
        // 64 MiB / 1 byte -> cbrt = 406 -> / 2
        assert_eq!(RectStressConfig::default().max_dimension(), 203);
        let config = RectStressConfig::new()
            .with_max_alloc_bytes(4096)
            .with_element_size(4)
            .with_alloc_scale(1);
        assert_eq!(config.max_dimension(), 10);
        // cbrt(7) / 2 rounds to zero
        let tiny = RectStressConfig::new().with_max_alloc_bytes(7);
        assert_eq!(tiny.max_dimension(), 7);
    }

    #[test]
    fn test_from_json_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "num_tries": 12, "seed": 5 }}"#).unwrap();

        let config = RectStressConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.num_tries, 12);
        assert_eq!(config.seed, 5);
        assert_eq!(config.num_buffers, 8);
    }

    #[test]
    fn test_from_json_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "num_buffers": 0 }}"#).unwrap();
        assert!(RectStressConfig::from_json_file(file.path()).is_err());

        let missing = RectStressConfig::from_json_file("/nonexistent/rectcheck.json");
        assert!(matches!(missing, Err(crate::error::RectCheckError::IoError(_))));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var(SEED_ENV, "1234");
        std::env::set_var(NUM_TRIES_ENV, " 9 ");
        let config = RectStressConfig::default().apply_env_overrides().unwrap();
        std::env::remove_var(SEED_ENV);
        std::env::remove_var(NUM_TRIES_ENV);

        assert_eq!(config.seed, 1234);
        assert_eq!(config.num_tries, 9);
    }

    #[test]
    #[serial]
    fn test_env_override_invalid() {
        std::env::set_var(SEED_ENV, "not-a-number");
        let result = RectStressConfig::default().apply_env_overrides();
        std::env::remove_var(SEED_ENV);
        assert!(result.is_err());
    }
}
