use thiserror::Error;

/// Errors raised while loading a schema document or parsing a name from it.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML schema: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error(
        "invalid qualified name {0:?}; expected [application.]service[.item][:member] \
         made of letters, digits, '_' and '-'"
    )]
    InvalidQualifiedName(String),
}
