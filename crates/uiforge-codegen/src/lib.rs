//! UIForge Code Generation
//!
//! This crate turns requirements into validated React components.
//!
//! # Pipeline Overview
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌─────────────┐     ┌────────────┐
//! │ Requirements │────▶│ ComponentSpec │────▶│  TSX / CSS  │────▶│ Validation │
//! │    (text)    │     │   (Parse)     │     │ (Generate)  │     │ (Comply)   │
//! └──────────────┘     └───────────────┘     └─────────────┘     └────────────┘
//!                                                   ▲                  │
//!                                                   └── corrections ───┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use uiforge_codegen::{RequirementsParser, TemplateGenerator, UnitCompiler};
//!
//! let batch = RequirementsParser::new(client).parse("A counter with +/- buttons").await?;
//! let compiler = UnitCompiler::new(Arc::new(TemplateGenerator::new()));
//! let unit = compiler.compile(&batch.specs[0], &contract, &children).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod emit;
pub mod error;
pub mod generator;
pub mod ir;
pub mod parser;
pub mod prompts;
pub mod validator;

pub use compiler::{CompiledUnit, UnitCompiler};
pub use error::{Error, Result};
pub use generator::{ComponentGenerator, GenerationRequest, ProviderGenerator, TemplateGenerator};
pub use ir::{
    ComponentSignature, DefectClass, GeneratedUnit, SourceFile, ValidationResult, Violation,
    ViolationKind,
};
pub use parser::{NameAllocator, ParsedBatch, RequirementsParser};
pub use validator::{ComplianceValidator, ValidationInput};
