//! Error types for code generation

use thiserror::Error;

use crate::ir::{DefectClass, ValidationResult};

/// Result type for codegen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing requirements or generating units
#[derive(Error, Debug)]
pub enum Error {
    /// Lower-layer failure (schema violation, provider exhausted, config)
    #[error(transparent)]
    Core(#[from] uiforge_core::Error),

    /// The requirements text maps to more than one plausible structure
    #[error("ambiguous requirement '{fragment}': could mean {}", .alternatives.join(" or "))]
    AmbiguousRequirement {
        /// Offending text fragment
        fragment: String,
        /// Plausible readings reported by the parser
        alternatives: Vec<String>,
    },

    /// A generated unit failed validation and could not be corrected
    #[error("generated unit '{component}' for \"{fragment}\" rejected ({class}): {} violation(s)", .result.violations.len())]
    UnitRejected {
        /// Component name
        component: String,
        /// Requirement text the component was derived from
        fragment: String,
        /// Dominant defect class
        class: DefectClass,
        /// Final validation result
        result: Box<ValidationResult>,
    },

    /// Failed to generate source
    #[error("code generation failed: {0}")]
    GenerationError(String),

    /// Invalid prompt template
    #[error("invalid template: {0}")]
    InvalidTemplate(#[from] minijinja::Error),
}
