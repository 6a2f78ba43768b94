use thiserror::Error;

#[derive(Error, Debug)]
pub enum PerfwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Capability unavailable: {capability}")]
    Unavailable { capability: String },

    #[error("Failed to parse {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },
}

impl PerfwatchError {
    pub fn unavailable<S: Into<String>>(capability: S) -> Self {
        Self::Unavailable {
            capability: capability.into(),
        }
    }

    pub fn parse<S: Into<String>>(source_name: S, message: S) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error only means a host capability is missing
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, PerfwatchError>;
