//! Errors raised by the provisioning bridge.

use devsim_core::ConnectionStringError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeviceError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// No twin is registered under this id
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Registered but not connected
    #[error("Device not connected: {0}")]
    Offline(String),

    /// The device model does not declare the method
    #[error("Method {method} not implemented by device {device_id}")]
    MethodNotImplemented { device_id: String, method: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(#[from] ConnectionStringError),

    /// Transient hub failure
    #[error("IoT Hub error: {0}")]
    Hub(String),
}

impl DeviceError {
    /// Status code a direct method call reports for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::Offline(_) => 404,
            Self::MethodNotImplemented { .. } => 501,
            Self::Authentication(_) => 401,
            Self::InvalidConnectionString(_) => 400,
            Self::Hub(_) => 500,
        }
    }

    /// Only hub failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Hub(_))
    }
}

impl From<DeviceError> for devsim_core::Error {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Authentication(_) | DeviceError::InvalidConnectionString(_) => {
                devsim_core::ValidationError::new("IoTHub.ConnectionString", e.to_string()).into()
            }
            DeviceError::NotFound(id) => devsim_core::Error::NotFound(format!("Device {id}")),
            other => devsim_core::Error::Provisioning(other.to_string()),
        }
    }
}
