use hyperwire_schema::{MetaKind, SchemaError};
use thiserror::Error;

use crate::transport::HttpResponse;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the client can report.
#[derive(Debug, Error)]
pub enum Error {
    /// No declaration of this kind exists under this name.
    #[error("no {kind} is declared as {name:?}")]
    UnknownSchemaReference { kind: MetaKind, name: String },

    /// A versioned media-type table has several entries and no version was given.
    #[error("{owner} declares several media types; a version must be selected")]
    AmbiguousVersion { owner: String },

    /// The requested version is not in the media-type table.
    #[error("{owner} declares no media type for version {version}")]
    UnknownVersion { owner: String, version: u32 },

    /// The server answered with a status the operation does not accept.
    #[error("{message} (HTTP {})", .response.status)]
    Api {
        message: String,
        response: Box<HttpResponse>,
    },

    /// A body could not be parsed or built.
    #[error("marshalling failed: {0}")]
    Marshalling(String),

    #[error("{owner} has no field {name:?}")]
    NoSuchField { owner: String, name: String },

    #[error("Task {0} does not seem to be progressing")]
    TaskNotProgressing(String),

    #[error("failed to delete queue {queue} (HTTP {status})")]
    TeardownFailure { queue: String, status: u16 },

    /// The caller combined options that cannot be combined.
    #[error("invalid usage: {0}")]
    Usage(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl Error {
    pub(crate) fn api(message: impl Into<String>, response: HttpResponse) -> Self {
        Self::Api {
            message: message.into(),
            response: Box::new(response),
        }
    }

    /// The offending response, for [`Error::Api`].
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Self::Api { response, .. } => Some(response.as_ref()),
            _ => None,
        }
    }
}
