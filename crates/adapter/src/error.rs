use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum IsolationError {
    #[error("AdapterManager not registered in execution context {context}")]
    AdapterManagerNotRegistered { context: Uuid },
}
