use thiserror::Error;

use crate::execution_context::RegistrationId;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service not registered: {0}")]
    ServiceNotFound(RegistrationId),
}
