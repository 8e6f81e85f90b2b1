//! User-facing notifications for register / recognize outcomes.

use facedb_core::{MatchOutcome, Registration, ServiceError};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub title: &'static str,
    pub message: String,
}

impl Notice {
    fn new(level: Level, title: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            title,
            message: message.into(),
        }
    }

    pub fn registered(registration: &Registration) -> Self {
        Self::new(
            Level::Info,
            "Success",
            format!("Face registered for {}.", registration.label),
        )
    }

    /// A miss is a warning, not an error.
    pub fn recognized(outcome: &MatchOutcome) -> Self {
        match outcome {
            MatchOutcome::Match { label, .. } => {
                Self::new(Level::Info, "Match Found", format!("Hello, {label}!"))
            }
            MatchOutcome::NoMatch => Self::new(Level::Warning, "No Match", "No match found."),
        }
    }

    pub fn failed(error: &ServiceError) -> Self {
        let message = match error {
            ServiceError::InvalidLabel => "Please enter a valid name.".to_string(),
            ServiceError::NoFaceDetected => "No face detected. Try again.".to_string(),
            ServiceError::Provider(e) => format!("Face analysis failed: {e}"),
            ServiceError::Storage(e) => format!("Face database unavailable: {e}"),
        };
        Self::new(Level::Error, "Error", message)
    }

    pub fn no_frame() -> Self {
        Self::new(Level::Error, "Error", "No camera frame captured yet. Try again.")
    }

    pub fn for_register(result: &Result<Registration, ServiceError>) -> Self {
        match result {
            Ok(registration) => Self::registered(registration),
            Err(e) => Self::failed(e),
        }
    }

    pub fn for_recognize(result: &Result<MatchOutcome, ServiceError>) -> Self {
        match result {
            Ok(outcome) => Self::recognized(outcome),
            Err(e) => Self::failed(e),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            Level::Info => "info",
            Level::Warning => "warn",
            Level::Error => "error",
        };
        write!(f, "[{tag}] {}: {}", self.title, self.message)
    }
}
