//! Error types for the factory system

/// Result type alias for factory operations
pub type FactoryResult<T> = Result<T, FactoryError>;

/// Error types for factory operations
///
/// `UnknownDefinition` and `UnknownState` are the only failures the
/// resolution pipeline itself produces; everything else is propagated from
/// materialization or the persistence backend.
#[derive(thiserror::Error, Debug)]
pub enum FactoryError {
    /// No generator registered for the (model, definition name) pair
    #[error("Unable to locate factory with name [{name}] [{model}].")]
    UnknownDefinition { model: &'static str, name: String },

    /// An active state resolves to neither a state entry nor a callback
    #[error("Unable to locate [{state}] state for [{model}].")]
    UnknownState { model: &'static str, state: String },

    /// A referenced or nested model has no primary key value
    #[error("Model [{0}] has no primary key value.")]
    MissingPrimaryKey(&'static str),

    /// Attribute mapping could not be converted to or from a model
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistence backend failure, passed through unmodified
    #[error("Persistence error: {0}")]
    Persistence(String),
}
