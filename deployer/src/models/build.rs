//! Build failure models

use serde::{Deserialize, Serialize};

/// Known build failure categories. New patterns may add variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorKind {
    MissingModule,
    SyntaxError,
    UnresolvedImport,
    Unknown,
}

/// Classifier verdict for a build log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub solution: String,
    /// Only set for `MissingModule`
    pub module_name: Option<String>,
}

/// Structured detail for a failed build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildError {
    pub message: String,
    pub output: String,
    pub details: Option<ErrorDetail>,
}
