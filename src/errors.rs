use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Permission denied error: {0}")]
    PermissionDenied(String),
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Camera disconnected: {0}")]
    DeviceDisconnected(String),
    #[error("Camera device error {code} on {device_id}")]
    DeviceError { device_id: String, code: i32 },
    #[error("Capture session configuration failed: {0}")]
    SessionConfigurationFailed(String),
    #[error("Invalid capture configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Operation not allowed while {state}: {operation}")]
    InvalidState { state: String, operation: String },
    #[error("Timed out waiting for {0}")]
    Timeout(String),
    #[error("Encoding error: {0}")]
    EncoderError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl CameraError {
    pub(crate) fn invalid_state(state: impl ToString, operation: &str) -> Self {
        CameraError::InvalidState {
            state: state.to_string(),
            operation: operation.to_string(),
        }
    }
}

impl From<std::io::Error> for CameraError {
    fn from(e: std::io::Error) -> Self {
        CameraError::Io(e.to_string())
    }
}
