//! Error types for TailStat

use thiserror::Error;

/// TailStat error type
#[derive(Error, Debug)]
pub enum Error {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::Validation("nbins must be > 0".to_string());
        assert_eq!(e.to_string(), "Validation error: nbins must be > 0");

        let e = Error::Computation("bin mass diverged".to_string());
        assert_eq!(e.to_string(), "Computation error: bin mass diverged");
    }
}
