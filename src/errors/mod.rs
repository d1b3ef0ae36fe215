pub mod handlers;

use std::time::Duration;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Session Error: {0}")]
    Session(String),

    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    #[error("{missing} host(s) requested were not found: {}", .names.join(", "))]
    HostNotFound {
        missing: usize,
        names: Vec<String>,
    },

    #[error("Virtual machine(s) not found: {}", .0.join(", "))]
    WorkloadNotFound(Vec<String>),

    #[error("Migration of {workload} to {host} failed: {reason}")]
    MigrationFailed {
        workload: String,
        host: String,
        reason: String,
    },

    #[error("Migration of {workload} to {host} still running after {waited:?}")]
    MigrationTimedOut {
        workload: String,
        host: String,
        waited: Duration,
    },

    #[error("Migration of {workload} to {host} cancelled")]
    MigrationCancelled {
        workload: String,
        host: String,
    },

    #[error("Configuration Error: {0}")]
    Config(String),
}

impl ManagerError {
    /// Process exit code the CLI layer reports for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ManagerError::InvalidInput(_) => 2,
            ManagerError::HostNotFound { .. } | ManagerError::WorkloadNotFound(_) => 3,
            _ => 1,
        }
    }

    /// Dispatch-time errors are isolated to one workload; everything else stops the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ManagerError::MigrationFailed { .. }
                | ManagerError::MigrationTimedOut { .. }
                | ManagerError::MigrationCancelled { .. }
        )
    }

    pub fn host_not_found<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        ManagerError::HostNotFound {
            missing: names.len(),
            names,
        }
    }
}

impl From<std::io::Error> for ManagerError {
    fn from(err: std::io::Error) -> Self {
        ManagerError::Config(err.to_string())
    }
}

impl From<config::ConfigError> for ManagerError {
    fn from(err: config::ConfigError) -> Self {
        ManagerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ManagerError {
    fn from(err: toml::ser::Error) -> Self {
        ManagerError::Config(err.to_string())
    }
}

// Error context for tracking which operation blew up
#[derive(Debug)]
pub struct ErrorContext {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub source_location: &'static str,
    pub operation: String,
}

impl ErrorContext {
    pub fn log(&self, error: &ManagerError) {
        error!(
            error = %error,
            operation = %self.operation,
            location = self.source_location,
            at = %self.timestamp,
            "Operation failed"
        );
    }
}

// Result type alias for convenience
pub type ManagerResult<T> = Result<T, ManagerError>;

// Helper macro for context addition
#[macro_export]
macro_rules! with_context {
    ($result:expr, $operation:expr) => {
        $result.map_err(|e: $crate::errors::ManagerError| {
            let context = $crate::errors::ErrorContext {
                timestamp: chrono::Utc::now(),
                source_location: std::file!(),
                operation: $operation.to_string(),
            };
            context.log(&e);
            e
        })
    };
}
