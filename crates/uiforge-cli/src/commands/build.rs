//! Build a component tree from requirements

use anyhow::{Context, Result};
use std::path::Path;

use super::{cancel_on_interrupt, emit_units, load_config, pipeline};

/// Run the build command
pub async fn run(
    config_path: &Path,
    requirements_path: &Path,
    out: &Path,
    emit: Option<&Path>,
    replay: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let requirements = std::fs::read_to_string(requirements_path)
        .with_context(|| format!("Failed to read {}", requirements_path.display()))?;
    if requirements.trim().is_empty() {
        anyhow::bail!("{} is empty", requirements_path.display());
    }

    let pipeline = pipeline(&config, replay)?;
    tracing::info!(
        project = %config.project.name,
        backend = pipeline.backend(),
        "building from {}",
        requirements_path.display()
    );

    let state = pipeline
        .build_with(&requirements, &cancel_on_interrupt())
        .await
        .context("Build failed")?;
    state
        .save(out)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    if let Some(dir) = emit {
        emit_units(&state, dir)?;
    }

    let usage = pipeline.usage();
    println!(
        "Built {} component(s), root {} -> {}",
        state.len(),
        state.root(),
        out.display()
    );
    for (name, entry) in state.entries() {
        println!(
            "  {:<24} {} prop(s), {} state, {} handler(s)",
            name,
            entry.spec.props.len(),
            entry.spec.state.len(),
            entry.spec.handlers.len()
        );
    }
    tracing::info!(
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        "provider usage"
    );
    Ok(())
}
