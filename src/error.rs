use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// A numeric parameter was given a value that is not a finite number.
    NotANumber { param: &'static str, value: f64 },
    /// A configuration was present but malformed.
    InvalidConfig(String),
    /// A configuration object had a field of the wrong type.
    Json(serde_json::Error),
}

/// Alias for a `Result` with our error type.
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotANumber { param, value } => {
                write!(f, "`{param}` expects a number, got {value}")
            }
            Error::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Error::Json(e) => write!(f, "invalid configuration field: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

// every numeric setter goes through here before mutating anything
pub fn check(param: &'static str, value: f32) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::NotANumber { param, value: value as f64 })
    }
}

pub fn check_f64(param: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::NotANumber { param, value })
    }
}
