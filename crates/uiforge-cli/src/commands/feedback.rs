//! Apply a change request to a saved project

use anyhow::{Context, Result};
use std::path::Path;

use uiforge_runtime::{ChangeKind, ChangeRequest, Error, ProjectState};

use super::{cancel_on_interrupt, emit_units, load_config, pipeline};

/// Run the feedback command
pub async fn run(
    config_path: &Path,
    text: &str,
    state_path: &Path,
    scope: Vec<String>,
    emit: Option<&Path>,
    replay: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let state = ProjectState::load(state_path)
        .with_context(|| format!("Failed to read project state {}", state_path.display()))?;
    let pipeline = pipeline(&config, replay)?;

    let request = if scope.is_empty() {
        ChangeRequest::new(text)
    } else {
        ChangeRequest::scoped(text, scope)
    };

    match pipeline
        .apply_feedback_with(&request, &state, &cancel_on_interrupt())
        .await
    {
        Ok(next) => {
            next.save(state_path)
                .with_context(|| format!("Failed to write {}", state_path.display()))?;
            if let Some(dir) = emit {
                emit_units(&next, dir)?;
            }
            if let Some(iteration) = next.history().last() {
                println!("Committed: {}", request.text);
                for change in &iteration.diff.specs {
                    let kind = match change.kind {
                        ChangeKind::Added => "added",
                        ChangeKind::Modified => "modified",
                        ChangeKind::Removed => "removed",
                    };
                    println!("  {:<9} {}", kind, change.component);
                }
                println!("  regenerated: {}", iteration.diff.regenerated.join(", "));
            }
            Ok(())
        }
        Err(Error::RolledBack(report)) => {
            println!("Rolled back during {}: {}", report.phase, report.reason);
            for mutation in &report.attempted.mutations {
                println!("  attempted {}", mutation);
            }
            for violation in &report.violations {
                println!("  {}", violation);
            }
            anyhow::bail!("change request was rolled back; {} is unchanged", state_path.display())
        }
        Err(other) => Err(other).context("Change request failed"),
    }
}
