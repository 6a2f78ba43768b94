use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PerfwatchConfig {
    pub sampler: SamplerConfig,
    pub tiers: TierThresholds,
    pub quality: QualityScaling,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Length of the frame counting window in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Heap sampling period in seconds
    #[serde(default = "default_memory_interval_seconds")]
    pub memory_interval_seconds: u64,

    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

/// FPS breakpoints between device tiers
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    /// Minimum FPS for the high tier
    #[serde(default = "default_high_fps")]
    pub high_fps: f64,

    /// Minimum FPS for the medium tier; anything below is low
    #[serde(default = "default_low_fps")]
    pub low_fps: f64,
}

/// Per-tier multipliers applied by the quality provider. High tier is always 1.0.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct QualityScaling {
    #[serde(default = "default_medium_particle_multiplier")]
    pub medium_particle_multiplier: f64,

    #[serde(default = "default_low_particle_multiplier")]
    pub low_particle_multiplier: f64,

    #[serde(default = "default_medium_duration_multiplier")]
    pub medium_duration_multiplier: f64,

    #[serde(default = "default_low_duration_multiplier")]
    pub low_duration_multiplier: f64,
}

impl SamplerConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn memory_interval(&self) -> Duration {
        Duration::from_secs(self.memory_interval_seconds)
    }
}

impl PerfwatchConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("perfwatch.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("sampler.window_ms", default_window_ms() as i64)?
            .set_default(
                "sampler.memory_interval_seconds",
                default_memory_interval_seconds() as i64,
            )?
            .set_default(
                "sampler.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("tiers.high_fps", default_high_fps())?
            .set_default("tiers.low_fps", default_low_fps())?
            .set_default(
                "quality.medium_particle_multiplier",
                default_medium_particle_multiplier(),
            )?
            .set_default(
                "quality.low_particle_multiplier",
                default_low_particle_multiplier(),
            )?
            .set_default(
                "quality.medium_duration_multiplier",
                default_medium_duration_multiplier(),
            )?
            .set_default(
                "quality.low_duration_multiplier",
                default_low_duration_multiplier(),
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // PERFWATCH_SAMPLER__WINDOW_MS style overrides
            .add_source(
                Environment::with_prefix("PERFWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: PerfwatchConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampler.window_ms == 0 {
            return Err(ConfigError::Message(
                "Sampler window_ms must be greater than 0".to_string(),
            ));
        }

        if self.sampler.memory_interval_seconds == 0 {
            return Err(ConfigError::Message(
                "Sampler memory_interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.sampler.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        if !self.tiers.low_fps.is_finite() || !self.tiers.high_fps.is_finite() {
            return Err(ConfigError::Message(
                "Tier thresholds must be finite".to_string(),
            ));
        }

        if self.tiers.high_fps <= self.tiers.low_fps {
            return Err(ConfigError::Message(format!(
                "Tier high_fps ({}) must be greater than low_fps ({})",
                self.tiers.high_fps, self.tiers.low_fps
            )));
        }

        let q = &self.quality;
        if !(0.0 < q.low_particle_multiplier
            && q.low_particle_multiplier <= q.medium_particle_multiplier
            && q.medium_particle_multiplier <= 1.0)
        {
            return Err(ConfigError::Message(
                "Particle multipliers must satisfy 0 < low <= medium <= 1".to_string(),
            ));
        }

        if !(1.0 <= q.medium_duration_multiplier
            && q.medium_duration_multiplier <= q.low_duration_multiplier
            && q.low_duration_multiplier.is_finite())
        {
            return Err(ConfigError::Message(
                "Duration multipliers must satisfy 1 <= medium <= low".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for PerfwatchConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            tiers: TierThresholds::default(),
            quality: QualityScaling::default(),
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            memory_interval_seconds: default_memory_interval_seconds(),
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            high_fps: default_high_fps(),
            low_fps: default_low_fps(),
        }
    }
}

impl Default for QualityScaling {
    fn default() -> Self {
        Self {
            medium_particle_multiplier: default_medium_particle_multiplier(),
            low_particle_multiplier: default_low_particle_multiplier(),
            medium_duration_multiplier: default_medium_duration_multiplier(),
            low_duration_multiplier: default_low_duration_multiplier(),
        }
    }
}

// Default value functions
fn default_window_ms() -> u64 {
    1000
}
fn default_memory_interval_seconds() -> u64 {
    5
}
fn default_event_bus_capacity() -> usize {
    64
}

fn default_high_fps() -> f64 {
    50.0
}
fn default_low_fps() -> f64 {
    30.0
}

fn default_medium_particle_multiplier() -> f64 {
    0.7
}
fn default_low_particle_multiplier() -> f64 {
    0.4
}
fn default_medium_duration_multiplier() -> f64 {
    1.2
}
fn default_low_duration_multiplier() -> f64 {
    1.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{const_mutex, Mutex};
    use std::io::Write;

    // Serializes tests that load config, since PERFWATCH_* variables are process-wide
    static ENV_LOCK: Mutex<()> = const_mutex(());

    #[test]
    fn test_default_config() {
        let config = PerfwatchConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.sampler.window(), Duration::from_secs(1));
        assert_eq!(config.sampler.memory_interval(), Duration::from_secs(5));
        assert_eq!(config.tiers.high_fps, 50.0);
        assert_eq!(config.tiers.low_fps, 30.0);
    }

    #[test]
    fn test_load_from_file() {
        let _env = ENV_LOCK.lock();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[sampler]\nwindow_ms = 500\n\n[tiers]\nhigh_fps = 55.0\n\n[quality]\nlow_particle_multiplier = 0.25"
        )
        .unwrap();

        let config = PerfwatchConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.sampler.window_ms, 500);
        assert_eq!(config.sampler.memory_interval_seconds, 5);
        assert_eq!(config.tiers.high_fps, 55.0);
        assert_eq!(config.tiers.low_fps, 30.0);
        assert_eq!(config.quality.low_particle_multiplier, 0.25);
        assert_eq!(config.quality.medium_particle_multiplier, 0.7);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let _env = ENV_LOCK.lock();
        let dir = tempfile::tempdir().unwrap();
        let config = PerfwatchConfig::load_from_file(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config, PerfwatchConfig::default());
    }

    #[test]
    fn test_environment_overrides_file() {
        let _env = ENV_LOCK.lock();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[tiers]\nhigh_fps = 55.0\nlow_fps = 25.0").unwrap();

        std::env::set_var("PERFWATCH_TIERS__HIGH_FPS", "72.5");
        std::env::set_var("PERFWATCH_SAMPLER__WINDOW_MS", "250");
        let result = PerfwatchConfig::load_from_file(file.path());
        std::env::remove_var("PERFWATCH_TIERS__HIGH_FPS");
        std::env::remove_var("PERFWATCH_SAMPLER__WINDOW_MS");

        let config = result.unwrap();
        assert_eq!(config.tiers.high_fps, 72.5);
        assert_eq!(config.tiers.low_fps, 25.0);
        assert_eq!(config.sampler.window_ms, 250);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = PerfwatchConfig::default();

        config.tiers.high_fps = 30.0;
        assert!(config.validate().is_err());
        config.tiers.high_fps = 50.0;

        config.sampler.window_ms = 0;
        assert!(config.validate().is_err());
        config.sampler.window_ms = 1000;

        config.quality.low_particle_multiplier = 0.9;
        assert!(config.validate().is_err());
        config.quality.low_particle_multiplier = 0.4;

        config.quality.low_duration_multiplier = 1.1;
        assert!(config.validate().is_err());
        config.quality.low_duration_multiplier = 1.5;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_output_parses_back() {
        let config = PerfwatchConfig::default();
        let rendered = config.to_toml().unwrap();

        assert!(rendered.contains("[tiers]"));
        let parsed: PerfwatchConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
