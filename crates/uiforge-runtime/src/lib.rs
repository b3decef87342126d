//! UIForge Runtime
//!
//! Project state, dependency-ordered generation and change requests.
//!
//! # Overview
//!
//! ```text
//!                 build(text)
//!                     │
//!                     ▼
//!   ┌──────────┐  waves   ┌───────────┐  commit  ┌──────────────┐
//!   │  Parser  │─────────▶│ Scheduler │─────────▶│ ProjectState │
//!   └──────────┘          └───────────┘          └──────────────┘
//!                               ▲                        │
//!                  dirty set    │                        │ apply_feedback
//!                               │                        ▼
//!                        ┌──────────────────────────────────┐
//!                        │ FeedbackProcessor                │
//!                        │ scope → mutate → reconcile → ... │
//!                        └──────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use uiforge_runtime::{ChangeRequest, Pipeline};
//!
//! let pipeline = Pipeline::from_config(&config, provider)?;
//! let state = pipeline.build("counter with increment, decrement, reset").await?;
//! let state = pipeline
//!     .apply_feedback(&ChangeRequest::new("make the increment button danger"), &state)
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod feedback;
pub mod mutation;
pub mod pipeline;
pub mod scheduler;
pub mod state;

pub use error::{Error, Result};
pub use feedback::{FeedbackProcessor, Phase, Proposal};
pub use mutation::{Mutation, MutationBatch};
pub use pipeline::{Pipeline, Session};
pub use scheduler::{ScheduleError, Scheduler};
pub use state::{
    ChangeDiff, ChangeKind, ChangeRequest, ComponentEntry, Iteration, Outcome, ProjectState,
    RollbackReport, SpecChange,
};
