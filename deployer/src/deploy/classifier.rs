//! Build output classification
//!
//! A best-effort heuristic over the captured build log. It looks for a few
//! well-known bundler messages and is not a diagnostic parser: anything it
//! does not recognise is reported as [`ErrorKind::Unknown`].

use std::sync::LazyLock;

use regex::Regex;

use crate::models::build::{ErrorDetail, ErrorKind};

static MISSING_MODULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Module not found: Error: Can't resolve '([^']+)'").unwrap());

const SYNTAX_ERROR_SOLUTION: &str =
    "Check the reported file for mismatched brackets, parentheses or quotes and fix the syntax.";
const UNRESOLVED_IMPORT_SOLUTION: &str =
    "Verify the import path is correct and that the dependency is listed in package.json and installed.";
const UNKNOWN_SOLUTION: &str = "Review the build output for details about the failure.";

/// Classify a build log. First matching rule wins.
pub fn classify(output: &str) -> ErrorDetail {
    if output.contains("Module not found") {
        if let Some(name) = missing_module_name(output) {
            return ErrorDetail {
                kind: ErrorKind::MissingModule,
                solution: format!("npm install {}", name),
                module_name: Some(name),
            };
        }
    }

    if output.contains("SyntaxError") {
        return detail(ErrorKind::SyntaxError, SYNTAX_ERROR_SOLUTION);
    }

    if output.contains("Failed to resolve import") {
        return detail(ErrorKind::UnresolvedImport, UNRESOLVED_IMPORT_SOLUTION);
    }

    detail(ErrorKind::Unknown, UNKNOWN_SOLUTION)
}

fn missing_module_name(output: &str) -> Option<String> {
    MISSING_MODULE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn detail(kind: ErrorKind, solution: &str) -> ErrorDetail {
    ErrorDetail {
        kind,
        solution: solution.to_string(),
        module_name: None,
    }
}
