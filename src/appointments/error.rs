use thiserror::Error;

use crate::auth::PolicyDenial;
use crate::database::manager::DatabaseError;
use crate::rate_limit::RateLimitExceeded;

/// Failures of a lifecycle operation. Nothing is written when one is returned.
#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Cita no encontrada")]
    NotFound,

    #[error("Mascota no encontrada")]
    PetNotFound,

    #[error("{message}")]
    Validation {
        field: Option<&'static str>,
        message: String,
    },

    #[error(transparent)]
    Forbidden(#[from] PolicyDenial),

    /// The stored status moved between read and write
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),

    #[error(transparent)]
    Persistence(#[from] DatabaseError),
}

impl AppointmentError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppointmentError::Validation {
            field: None,
            message: message.into(),
        }
    }

    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        AppointmentError::Validation {
            field: Some(field),
            message: message.into(),
        }
    }
}

pub type AppointmentResult<T> = Result<T, AppointmentError>;
