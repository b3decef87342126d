//! uiforge Core Library
//!
//! This crate provides the shared foundation for uiforge:
//! - The design-system contract (the closed set of tokens generated code may use)
//! - The component IR (`ComponentSpec`) with fingerprints and batch validation
//! - The provider capability used for parsing and generation, with bounded retry
//! - Project configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Requirements│────▶│ ComponentSpec│────▶│  Generated  │
//! │    (text)   │     │     (IR)     │     │    Units    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            ▲
//!                    DesignSystemContract
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use uiforge_core::{Config, DesignSystemContract};
//!
//! let config = Config::load("./my-app")?;
//! let contract = config.load_contract()?;
//! println!("{} tokens in {}", contract.len(), contract.name());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod component;
pub mod config;
pub mod design;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod provider;
pub mod retry;
pub mod schema;

pub use component::ComponentSpec;
pub use config::{Config, ForgeConfig};
pub use design::DesignSystemContract;
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use provider::{Provider, ProviderClient};
