//! Runtime error types
//!
//! The taxonomy callers see. Lower-layer errors are folded into it so a
//! caller can match on what went wrong without knowing which crate raised it.

use thiserror::Error;

use uiforge_codegen::{DefectClass, Violation};
use uiforge_core::schema::SchemaIssue;

use crate::state::RollbackReport;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// The requirements text maps to more than one plausible structure
    #[error("ambiguous requirement '{fragment}': could mean {}", .alternatives.join(" or "))]
    AmbiguousRequirement {
        /// Offending text fragment
        fragment: String,
        /// Competing readings
        alternatives: Vec<String>,
    },

    /// The component IR failed validation
    #[error("component IR failed validation: {}", join(.issues))]
    SchemaViolation {
        /// Every issue found
        issues: Vec<SchemaIssue>,
    },

    /// Generated code used a literal where a design token is required
    #[error("token contract violation in '{component}' (from \"{fragment}\"): {}", join(.violations))]
    TokenContractViolation {
        /// Offending component
        component: String,
        /// Requirement text the component was derived from
        fragment: String,
        /// Validator findings
        violations: Vec<Violation>,
    },

    /// Generated code is not well-formed
    #[error("syntax defect in '{component}' (from \"{fragment}\"): {}", join(.violations))]
    SyntaxDefect {
        /// Offending component
        component: String,
        /// Requirement text the component was derived from
        fragment: String,
        /// Validator findings
        violations: Vec<Violation>,
    },

    /// Generated code drops or mistypes a declared member
    #[error("type defect in '{component}' (from \"{fragment}\"): {}", join(.violations))]
    TypeDefect {
        /// Offending component
        component: String,
        /// Requirement text the component was derived from
        fragment: String,
        /// Validator findings
        violations: Vec<Violation>,
    },

    /// An unscoped change request matched no component, or several equally
    #[error("cannot tell which component '{request}' is about{}", candidates_suffix(.candidates))]
    UnscopedAmbiguous {
        /// Change request text
        request: String,
        /// Equally plausible components, empty when nothing matched
        candidates: Vec<String>,
    },

    /// The remote provider exhausted its retries
    #[error("provider unavailable after {attempts} attempt(s): {last_error}")]
    ProviderUnavailable {
        /// Attempts made
        attempts: u32,
        /// Final provider error
        last_error: String,
    },

    /// A change request was reverted; the project is unchanged
    #[error("change request rolled back: {}", .0.reason)]
    RolledBack(Box<RollbackReport>),

    /// One or more components failed and blocked their ancestors
    #[error("build blocked: {} failed ({}), {} blocked ({})",
        .failed.len(), .failed.join("; "), .blocked.len(), .blocked.join(", "))]
    BuildBlocked {
        /// One line per failed component
        failed: Vec<String>,
        /// Ancestors that could not be generated
        blocked: Vec<String>,
    },

    /// An explicit scope names components the project does not have
    #[error("change request scope names unknown component(s): {}", .unknown.join(", "))]
    InvalidScope {
        /// Unknown names
        unknown: Vec<String>,
    },

    /// The operation was cancelled before it wrote anything
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration, design-system or provider-answer failure
    #[error(transparent)]
    Core(uiforge_core::Error),

    /// Generation failure that is not a validation defect
    #[error("generation failed: {0}")]
    Generation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Validator findings carried by a defect, empty otherwise
    pub fn violations(&self) -> &[Violation] {
        match self {
            Error::TokenContractViolation { violations, .. }
            | Error::SyntaxDefect { violations, .. }
            | Error::TypeDefect { violations, .. } => violations,
            _ => &[],
        }
    }

    /// Requirement text behind a defect, when the error is one
    pub fn fragment(&self) -> Option<&str> {
        match self {
            Error::TokenContractViolation { fragment, .. }
            | Error::SyntaxDefect { fragment, .. }
            | Error::TypeDefect { fragment, .. } => Some(fragment),
            _ => None,
        }
    }

    /// Defect class of a validation failure
    pub fn defect_class(&self) -> Option<DefectClass> {
        match self {
            Error::TokenContractViolation { .. } => Some(DefectClass::TokenContract),
            Error::SyntaxDefect { .. } => Some(DefectClass::Syntax),
            Error::TypeDefect { .. } => Some(DefectClass::Type),
            _ => None,
        }
    }

    /// The rollback report, when the error is a rollback
    pub fn rollback(&self) -> Option<&RollbackReport> {
        match self {
            Error::RolledBack(report) => Some(report.as_ref()),
            _ => None,
        }
    }
}

impl From<uiforge_core::Error> for Error {
    fn from(err: uiforge_core::Error) -> Self {
        match err {
            uiforge_core::Error::SchemaViolation { issues } => Error::SchemaViolation { issues },
            uiforge_core::Error::ProviderUnavailable {
                attempts,
                last_error,
            } => Error::ProviderUnavailable {
                attempts,
                last_error,
            },
            uiforge_core::Error::Io(e) => Error::Io(e),
            other => Error::Core(other),
        }
    }
}

impl From<uiforge_codegen::Error> for Error {
    fn from(err: uiforge_codegen::Error) -> Self {
        use uiforge_codegen::Error as Codegen;
        match err {
            Codegen::Core(e) => e.into(),
            Codegen::AmbiguousRequirement {
                fragment,
                alternatives,
            } => Error::AmbiguousRequirement {
                fragment,
                alternatives,
            },
            Codegen::UnitRejected {
                component,
                fragment,
                class,
                result,
            } => {
                let violations = result.violations;
                match class {
                    DefectClass::Syntax => Error::SyntaxDefect {
                        component,
                        fragment,
                        violations,
                    },
                    DefectClass::Type => Error::TypeDefect {
                        component,
                        fragment,
                        violations,
                    },
                    DefectClass::TokenContract => Error::TokenContractViolation {
                        component,
                        fragment,
                        violations,
                    },
                }
            }
            other => Error::Generation(other.to_string()),
        }
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn candidates_suffix(candidates: &[String]) -> String {
    if candidates.is_empty() {
        String::new()
    } else {
        format!(" (could be {})", candidates.join(" or "))
    }
}
