use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Entity not found: {0}")]
    EntityNotFound(crate::core::types::EntityId),

    #[error("Invalid intent shape for '{kind}': {reason}")]
    InvalidIntentShape { kind: String, reason: String },

    #[error("Provider already registered for capability {0:?}")]
    DuplicateCapability(crate::service::registry::Capability),

    #[error("No provider registered for capability {0:?}")]
    CapabilityNotFound(crate::service::registry::Capability),

    #[error("Registry is frozen; providers can only be registered during startup")]
    RegistryFrozen,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Entity store invariant violated: {0}")]
    StoreCorrupted(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
