use std::error::Error;
use std::fmt;
use tokio_cron_scheduler::JobSchedulerError;

/// Custom Error and Result types to unify errors from all sources.
pub type OverlayResult<T> = Result<T, OverlayError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayError {
    Http(String),
    Parse(String),
    // The page was fetched but nothing could be recognized in it.
    Structure(String),
    // Same logical request already running. Callers should try again later.
    InFlight(String),
    // A newer trigger replaced this one before it ran.
    Superseded(String),
    Storage(String),
    Config(String),
    Scheduler(String),
    Template(String),
}

impl OverlayError {
    /// Contention errors are expected under load and never shown to the user.
    pub fn is_contention(&self) -> bool {
        matches!(self, OverlayError::InFlight(_) | OverlayError::Superseded(_))
    }
}

impl fmt::Display for OverlayError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OverlayError::Http(s) => write!(f, "HTTP Error: {}", s),
            OverlayError::Parse(s) => write!(f, "Parse Error: {}", s),
            OverlayError::Structure(s) => write!(f, "Structure Error: {}", s),
            OverlayError::InFlight(key) => write!(f, "Request already in progress: {}", key),
            OverlayError::Superseded(key) => write!(f, "Request superseded: {}", key),
            OverlayError::Storage(s) => write!(f, "Storage Error: {}", s),
            OverlayError::Config(s) => write!(f, "Config Error: {}", s),
            OverlayError::Scheduler(s) => write!(f, "Scheduler Error: {}", s),
            OverlayError::Template(s) => write!(f, "Template Error: {}", s),
        }
    }
}

impl Error for OverlayError {}

impl From<reqwest::Error> for OverlayError {
    fn from(error: reqwest::Error) -> Self {
        OverlayError::Http(error.to_string())
    }
}

impl From<serde_json::Error> for OverlayError {
    fn from(error: serde_json::Error) -> Self {
        OverlayError::Parse(error.to_string())
    }
}

impl From<std::io::Error> for OverlayError {
    fn from(error: std::io::Error) -> Self {
        OverlayError::Storage(error.to_string())
    }
}

impl From<figment::Error> for OverlayError {
    fn from(error: figment::Error) -> Self {
        OverlayError::Config(error.to_string())
    }
}

impl From<JobSchedulerError> for OverlayError {
    fn from(error: JobSchedulerError) -> Self {
        OverlayError::Scheduler(error.to_string())
    }
}

impl From<minijinja::Error> for OverlayError {
    fn from(error: minijinja::Error) -> Self {
        OverlayError::Template(error.to_string())
    }
}
