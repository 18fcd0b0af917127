//! Error types for sensor operations.
//!
//! Each variant corresponds to a distinct sensor outcome. Callers that only
//! care about "did the attempt succeed" (the match worker) fold several of
//! them into a single unsuccessful result; administrative callers report them
//! individually.

use fpterm_core::TemplateId;

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during fingerprint sensor operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// No finger on the sensor window.
    #[error("No finger detected")]
    NoFinger,

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Image could not be converted into a feature template.
    #[error("Image conversion failed: {message}")]
    ImageConversion { message: String },

    /// Search completed without a matching template.
    #[error("No matching template")]
    NoMatch,

    /// The two enrollment captures do not belong to the same finger.
    #[error("Enrollment captures do not match")]
    EnrollMismatch,

    /// Storing a model into flash failed.
    #[error("Store failed: {message}")]
    StoreFailed { message: String },

    /// The addressed slot holds no template.
    #[error("Template slot {id} is empty")]
    EmptySlot { id: TemplateId },

    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Operation is not supported by this device.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new image conversion error.
    pub fn image_conversion(message: impl Into<String>) -> Self {
        Self::ImageConversion {
            message: message.into(),
        }
    }

    /// Create a new store failure.
    pub fn store_failed(message: impl Into<String>) -> Self {
        Self::StoreFailed {
            message: message.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Whether the error describes the finger rather than the device.
    ///
    /// These are expected during normal use and are not logged as faults.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NoFinger
                | Self::Timeout { .. }
                | Self::ImageConversion { .. }
                | Self::NoMatch
                | Self::EnrollMismatch
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_error() {
        let error = HardwareError::timeout(15000);
        assert!(matches!(error, HardwareError::Timeout { .. }));
        assert_eq!(error.to_string(), "Operation timeout after 15000ms");
    }

    #[test]
    fn test_empty_slot_error() {
        let error = HardwareError::EmptySlot {
            id: TemplateId::new(7).unwrap(),
        };
        assert_eq!(error.to_string(), "Template slot 7 is empty");
    }

    #[test]
    fn test_user_errors() {
        assert!(HardwareError::NoFinger.is_user_error());
        assert!(HardwareError::NoMatch.is_user_error());
        assert!(HardwareError::image_conversion("feature_fail").is_user_error());
        assert!(!HardwareError::disconnected("R305").is_user_error());
        assert!(!HardwareError::communication("packet").is_user_error());
    }
}
