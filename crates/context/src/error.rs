use sling_mock_adapter::IsolationError;
use sling_mock_common::ServiceError;

use crate::{lifecycle::LifecyclePhase, resolver_type::ResourceResolverType};

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Invalid context state: {0}")]
    InvalidState(String),
    #[error("{phase} callback failed: {error:#}")]
    Callback {
        phase: LifecyclePhase,
        error: anyhow::Error,
    },
    #[error("No resource store available for resource resolver type {0}")]
    NoResourceStore(ResourceResolverType),
    #[error("{0}")]
    Isolation(#[from] IsolationError),
    #[error("{0}")]
    Service(#[from] ServiceError),
    #[error("{0}")]
    Resource(#[from] ResourceError),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ResourceError {
    #[error("Invalid resource path: {0}")]
    InvalidPath(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SettingsError {
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}
