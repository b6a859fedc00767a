//! Crate-wide error type

use std::fmt;

#[derive(Debug)]
pub enum RateWatchError {
    /// Any failure reported by the sample store
    DataAccess(rusqlite::Error),
    InsufficientData { required: usize, available: usize },
    NoData(String),
    InvalidInput(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RateWatchError>;

impl From<rusqlite::Error> for RateWatchError {
    fn from(err: rusqlite::Error) -> Self {
        RateWatchError::DataAccess(err)
    }
}

impl From<std::io::Error> for RateWatchError {
    fn from(err: std::io::Error) -> Self {
        RateWatchError::Io(err)
    }
}

impl From<serde_json::Error> for RateWatchError {
    fn from(err: serde_json::Error) -> Self {
        RateWatchError::Serialization(err)
    }
}

impl fmt::Display for RateWatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateWatchError::DataAccess(e) => write!(f, "Data access error: {}", e),
            RateWatchError::InsufficientData { required, available } => write!(
                f,
                "insufficient historical data: need at least {} samples, have {}",
                required, available
            ),
            RateWatchError::NoData(msg) => write!(f, "{}", msg),
            RateWatchError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            RateWatchError::Io(e) => write!(f, "I/O error: {}", e),
            RateWatchError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for RateWatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RateWatchError::DataAccess(e) => Some(e),
            RateWatchError::Io(e) => Some(e),
            RateWatchError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_message() {
        let err = RateWatchError::InsufficientData {
            required: 100,
            available: 99,
        };
        assert_eq!(
            err.to_string(),
            "insufficient historical data: need at least 100 samples, have 99"
        );
    }

    #[test]
    fn test_sqlite_error_converts_to_data_access() {
        let err: RateWatchError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, RateWatchError::DataAccess(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
