//! CLI error handling with user-friendly messages.

use std::fmt;
use std::io;
use std::process;

use tilemirror::config::ConfigFileError;
use tilemirror::coord::CoordError;
use tilemirror::provider::ProviderError;
use tilemirror::session::SessionError;

/// CLI-specific errors. Every variant exits with status 1.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(io::Error),
    /// Configuration file could not be loaded
    Config(ConfigFileError),
    /// A command-line value is out of range
    InvalidArgument(String),
    /// Bounding box is invalid
    Coord(CoordError),
    /// Provider selection or HTTP client setup failed
    Provider(ProviderError),
    /// Session failed to start or aborted
    Session(SessionError),
}

impl CliError {
    /// Exit the process with an error message and status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Provider(ProviderError::UnknownProvider(_)) = self {
            eprintln!();
            eprintln!("Built-in providers:");
            for provider in tilemirror::provider::NamedProvider::ALL {
                eprintln!("  {}", provider);
            }
            eprintln!("Other names need a URL template: --url 'https://host/{{z}}/{{x}}/{{y}}.png'");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Coord(e) => write!(f, "Invalid bounding box: {}", e),
            CliError::Provider(e) => write!(f, "Provider error: {}", e),
            CliError::Session(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::Coord(e) => Some(e),
            CliError::Provider(e) => Some(e),
            CliError::Session(e) => Some(e),
            CliError::InvalidArgument(_) => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::Coord(e)
    }
}

impl From<ProviderError> for CliError {
    fn from(e: ProviderError) -> Self {
        CliError::Provider(e)
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        CliError::Session(e)
    }
}
