//! Compiler error types

use crate::operation::NodeOperation;
use nodeops_cloud::{CloudError, CloudType};
use thiserror::Error;

/// Errors raised while compiling or running a node command
///
/// Every variant is fatal for the call that raised it; nothing here is
/// retried and no partial command is returned.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("{params} parameters cannot be used for operation {operation}")]
    TypeMismatch {
        operation: NodeOperation,
        params: &'static str,
    },

    #[error("Missing state: {0}")]
    MissingState(String),

    #[error("Missing certificate: {0}")]
    MissingCert(String),

    #[error("Invalid certificate type: {0}")]
    InvalidCertType(String),

    #[error("Invalid certificate rotation: {0}")]
    InvalidRotation(String),

    #[error("Tags are unsupported for {0}")]
    UnsupportedProvider(CloudType),

    #[error("Invalid params: no tags to add or remove")]
    NoTags,

    #[error("Public key content is empty")]
    EmptyPublicKey,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("GFlag {flag} is managed by the platform: user value {user_value}, platform value {platform_value}")]
    GFlagConflict {
        flag: String,
        user_value: String,
        platform_value: String,
    },

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Command execution failed: {0}")]
    Execution(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("State error: {0}")]
    State(#[from] CloudError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rcgen::Error> for CompileError {
    fn from(err: rcgen::Error) -> Self {
        CompileError::Certificate(err.to_string())
    }
}

/// Stable classification of [`CompileError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TypeMismatch,
    MissingState,
    MissingCert,
    InvalidCertType,
    InvalidRotation,
    UnsupportedProvider,
    NoTags,
    EmptyPublicKey,
    InvalidParameter,
    GFlagConflict,
    Certificate,
    Execution,
    Query,
    Io,
    Serialization,
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            CompileError::MissingState(_) => ErrorKind::MissingState,
            CompileError::MissingCert(_) => ErrorKind::MissingCert,
            CompileError::InvalidCertType(_) => ErrorKind::InvalidCertType,
            CompileError::InvalidRotation(_) => ErrorKind::InvalidRotation,
            CompileError::UnsupportedProvider(_) => ErrorKind::UnsupportedProvider,
            CompileError::NoTags => ErrorKind::NoTags,
            CompileError::EmptyPublicKey => ErrorKind::EmptyPublicKey,
            CompileError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            CompileError::GFlagConflict { .. } => ErrorKind::GFlagConflict,
            CompileError::Certificate(_) => ErrorKind::Certificate,
            CompileError::Execution(_) => ErrorKind::Execution,
            CompileError::Query(_) => ErrorKind::Query,
            CompileError::State(CloudError::Io(_)) | CompileError::Io(_) => ErrorKind::Io,
            CompileError::State(CloudError::Json(_)) | CompileError::Serialization(_) => {
                ErrorKind::Serialization
            }
            CompileError::State(_) => ErrorKind::MissingState,
        }
    }

    pub(crate) fn missing(what: impl std::fmt::Display) -> Self {
        CompileError::MissingState(what.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
