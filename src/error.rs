//! Error types and handling for rtalloc
//!
//! Only construction can fail. Running out of space is reported by
//! `allocate` returning `None`, never through [`AllocError`].

/// Result type alias for rtalloc operations
pub type Result<T> = std::result::Result<T, AllocError>;

/// Errors raised while constructing an allocator or reserving its region
#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// The platform could not supply the backing region
    #[error("Reservation failed: {size} bytes aligned to {alignment}")]
    Reservation { size: usize, alignment: usize },
}

impl AllocError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a reservation failure error
    pub fn reservation(size: usize, alignment: usize) -> Self {
        Self::Reservation { size, alignment }
    }

    /// Name of the offending parameter, if this is a parameter error
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::InvalidParameter { parameter, .. } => Some(parameter),
            Self::Reservation { .. } => None,
        }
    }
}
