use axum::http::StatusCode;
use thiserror::Error;

/// Metadata inconsistencies found while converting rows or attaching
/// associations. These are server-side faults and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("attribute '{path}' not found on type '{type_name}'")]
    AttributeNotFound { type_name: String, path: String },

    #[error("navigation property '{name}' not found on type '{type_name}'")]
    AssociationNotFound { type_name: String, name: String },

    #[error("path '{path}' on type '{type_name}' ends on a complex attribute")]
    NotPrimitive { type_name: String, path: String },

    #[error("attribute '{name}' declared twice on type '{type_name}'")]
    DuplicateAttribute { type_name: String, name: String },

    #[error("key attribute '{name}' is not a primitive or embedded attribute of '{type_name}'")]
    InvalidKey { type_name: String, name: String },

    #[error("join column '{alias}' missing from row")]
    MissingJoinColumn { alias: String },

    #[error("key property '{alias}' missing from row of type '{type_name}'")]
    MissingKey { type_name: String, alias: String },
}

/// Client addressing errors raised while projecting an update path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("update path is empty")]
    EmptyPath,

    #[error("property '{name}' not found on type '{type_name}'")]
    UnknownProperty { type_name: String, name: String },

    #[error("primitive property '{name}' can only be the last path segment")]
    PrimitiveNotTerminal { name: String },

    #[error("property '{name}' is addressed as {expected} but is {actual}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("navigation property '{name}' cannot be modified through a property path")]
    NavigationNotSupported { name: String },

    #[error("$value must directly follow a primitive property")]
    MisplacedRawValue,

    #[error("complex property '{name}' can only be cleared")]
    ComplexValueNotSupported { name: String },

    #[error("value {value} does not match the type of property '{name}'")]
    TypeMismatch { name: String, value: String },

    #[error("invalid key predicate '{text}'")]
    InvalidKeyPredicate { text: String },

    #[error("entity set '{name}' not found")]
    UnknownEntitySet { name: String },
}

/// An error raised by a write handler that knows which status to report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProcessError {
    pub message: String,
    pub status: StatusCode,
}

impl ProcessError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::NOT_IMPLEMENTED)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }
}

/// Top-level error surfaced to callers of the engine.
#[derive(Debug, Error)]
pub enum ODataError {
    #[error("Mapping Error: {0}")]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Internal Error: {message}")]
    Internal { message: String },
}

impl ODataError {
    pub fn internal(message: impl Into<String>) -> Self {
        ODataError::Internal {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ODataError::Mapping(MappingError::MissingKey { .. }) => StatusCode::BAD_REQUEST,
            ODataError::Mapping(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ODataError::Request(RequestError::UnknownEntitySet { .. }) => StatusCode::NOT_FOUND,
            ODataError::Request(_) => StatusCode::BAD_REQUEST,
            ODataError::Process(e) => e.status,
            ODataError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Recover the recognized error kinds from a boundary error; anything else
/// is internal.
impl From<anyhow::Error> for ODataError {
    fn from(error: anyhow::Error) -> Self {
        let error = match error.downcast::<ProcessError>() {
            Ok(process) => return ODataError::Process(process),
            Err(other) => other,
        };
        let error = match error.downcast::<RequestError>() {
            Ok(request) => return ODataError::Request(request),
            Err(other) => other,
        };
        match error.downcast::<MappingError>() {
            Ok(mapping) => ODataError::Mapping(mapping),
            Err(other) => ODataError::internal(format!("{:#}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let mapping: ODataError = MappingError::AssociationNotFound {
            type_name: "Organization".to_string(),
            name: "Roles".to_string(),
        }
        .into();
        assert_eq!(mapping.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let missing_key: ODataError = MappingError::MissingKey {
            type_name: "Organization".to_string(),
            alias: "ID".to_string(),
        }
        .into();
        assert_eq!(missing_key.status_code(), StatusCode::BAD_REQUEST);

        let request: ODataError = RequestError::EmptyPath.into();
        assert_eq!(request.status_code(), StatusCode::BAD_REQUEST);

        let process: ODataError = ProcessError::not_implemented("delete not supported").into();
        assert_eq!(process.status_code(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(process.to_string(), "delete not supported");

        assert_eq!(ODataError::internal("boom").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_boundary_errors_are_recovered() {
        let process = anyhow::Error::new(ProcessError::not_implemented("read only"));
        assert_eq!(ODataError::from(process).status_code(), StatusCode::NOT_IMPLEMENTED);

        let request = anyhow::Error::new(RequestError::UnknownEntitySet {
            name: "Planets".to_string(),
        });
        assert_eq!(ODataError::from(request).status_code(), StatusCode::NOT_FOUND);

        let other = ODataError::from(anyhow::anyhow!("disk full"));
        assert!(matches!(other, ODataError::Internal { .. }));
        assert_eq!(other.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
