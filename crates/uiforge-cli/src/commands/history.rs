//! Show iteration history

use anyhow::{Context, Result};
use std::path::Path;

use uiforge_runtime::{Outcome, ProjectState};

/// Run the history command
pub fn run(state_path: &Path, json: bool) -> Result<()> {
    let state = ProjectState::load(state_path)
        .with_context(|| format!("Failed to read project state {}", state_path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(state.history())?);
        return Ok(());
    }

    if state.history().is_empty() {
        println!("No change requests applied to {}", state.root());
        return Ok(());
    }
    for (index, iteration) in state.history().iter().enumerate() {
        let outcome = match iteration.outcome {
            Outcome::Committed => "committed",
            Outcome::RolledBack => "rolled back",
        };
        println!(
            "{:>3}. [{}] {} ({})",
            index + 1,
            iteration.request.submitted_at.format("%Y-%m-%d %H:%M:%S"),
            iteration.request.text,
            outcome
        );
        if !iteration.diff.regenerated.is_empty() {
            println!("     regenerated: {}", iteration.diff.regenerated.join(", "));
        }
        if let Some(reason) = &iteration.reason {
            println!("     reason: {}", reason);
        }
    }
    Ok(())
}
