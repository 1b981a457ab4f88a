use airlock_core::directory::ConnectionError;

/// A configuration value that cannot be used.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Parse(String),
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "failed to parse config: {e}"),
            Self::Invalid { field, reason } => write!(f, "{field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Only one tick driver may be active per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    AlreadyActive,
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyActive => write!(f, "a host tick driver is already registered"),
        }
    }
}

impl std::error::Error for DriverError {}

/// Errors that reach the top-level caller of the host process.
#[derive(Debug)]
pub enum HostError {
    Config(ConfigError),
    Connection(ConnectionError),
    Driver(DriverError),
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config error: {e}"),
            Self::Connection(e) => write!(f, "connection error: {e}"),
            Self::Driver(e) => write!(f, "driver error: {e}"),
        }
    }
}

impl std::error::Error for HostError {}

impl From<ConfigError> for HostError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ConnectionError> for HostError {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

impl From<DriverError> for HostError {
    fn from(e: DriverError) -> Self {
        Self::Driver(e)
    }
}
