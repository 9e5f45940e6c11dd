use crate::error::ConfigError;
use crate::response::ModuleInfo;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "ANNOTATOR";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Number of frames handed to the inference hook per call.
    pub batch_size: usize,
    /// Maximum number of items admitted into a drive cycle.
    pub buffer_size: usize,
    /// Expression selecting previous regions of interest, e.g. `area > 100`.
    pub prev_pois: Option<String>,
    /// Fetch media on background tasks instead of inline.
    pub concurrency_enabled: bool,
    pub fetch_timeout_secs: u64,
    pub max_problematic_batches: usize,
    pub poll_interval_ms: u64,
    /// Nominal frame rate of a directory of frames.
    pub frame_directory_fps: f64,
    pub log_level: String,
    /// Reported on every response along with `module_version`.
    pub module_name: String,
    pub module_version: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            batch_size: 1,
            buffer_size: 1,
            prev_pois: None,
            concurrency_enabled: false,
            fetch_timeout_secs: 60,
            max_problematic_batches: 10,
            poll_interval_ms: 50,
            frame_directory_fps: 1.0,
            log_level: "info".to_string(),
            module_name: env!("CARGO_PKG_NAME").to_string(),
            module_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Configuration {
    /// Layers the defaults, an optional config file and `ANNOTATOR_*`
    /// environment variables, in that order.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let configuration: Configuration = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn module_info(&self) -> ModuleInfo {
        ModuleInfo::new(&self.module_name, &self.module_version)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        if self.max_problematic_batches == 0 {
            return Err(ConfigError::Invalid(
                "Max problematic batches must be greater than 0".to_string(),
            ));
        }

        if !(self.frame_directory_fps > 0.0) {
            return Err(ConfigError::Invalid(
                "Frame directory fps must be positive".to_string(),
            ));
        }

        if self.module_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Module name must not be empty".to_string(),
            ));
        }

        if let Some(prev_pois) = &self.prev_pois {
            if prev_pois.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "Previous regions of interest expression is empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_configuration_is_valid() {
        let configuration = Configuration::default();
        assert!(configuration.validate().is_ok());
        assert_eq!(configuration.fetch_timeout(), Duration::from_secs(60));
        assert_eq!(configuration.max_problematic_batches, 10);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let configuration = Configuration {
            batch_size: 0,
            ..Configuration::default()
        };
        assert!(matches!(
            configuration.validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn blank_predicate_is_rejected() {
        let configuration = Configuration {
            prev_pois: Some("   ".to_string()),
            ..Configuration::default()
        };
        assert!(configuration.validate().is_err());
    }

    #[test]
    fn load_reads_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "batch_size = 4").unwrap();
        writeln!(file, "buffer_size = 8").unwrap();
        writeln!(file, "prev_pois = \"area > 100\"").unwrap();
        writeln!(file, "module_name = \"colour-stats\"").unwrap();
        writeln!(file, "module_version = \"3.0.1\"").unwrap();
        drop(file);

        let configuration = Configuration::load(Some(&path)).unwrap();
        assert_eq!(configuration.batch_size, 4);
        assert_eq!(configuration.buffer_size, 8);
        assert_eq!(configuration.prev_pois.as_deref(), Some("area > 100"));
        assert_eq!(configuration.fetch_timeout_secs, 60);
        assert_eq!(
            configuration.module_info(),
            ModuleInfo::new("colour-stats", "3.0.1")
        );
    }

    #[test]
    fn module_defaults_to_the_package() {
        let info = Configuration::default().module_info();
        assert_eq!(info.name, "annotation-worker");
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));

        let configuration = Configuration {
            module_name: " ".to_string(),
            ..Configuration::default()
        };
        assert!(configuration.validate().is_err());
    }

    #[test]
    fn load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.toml");
        std::fs::write(&path, "buffer_size = 0\n").unwrap();
        assert!(Configuration::load(Some(&path)).is_err());
    }
}
