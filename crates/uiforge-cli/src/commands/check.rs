//! Check existing components against the design system

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use uiforge_codegen::ComplianceValidator;

use super::load_config;

/// Run the check command
pub fn run(config_path: &Path, target: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let contract = config.load_contract().context("Failed to load design system")?;
    let validator = ComplianceValidator::new();

    let components = find_components(target)?;
    if components.is_empty() {
        anyhow::bail!("No .tsx components found under {}", target.display());
    }

    let mut failed = 0;
    for tsx_path in &components {
        let name = tsx_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Component");
        let tsx = std::fs::read_to_string(tsx_path)
            .with_context(|| format!("Failed to read {}", tsx_path.display()))?;
        let css_path = tsx_path.with_extension("css");
        let css = if css_path.exists() {
            std::fs::read_to_string(&css_path)
                .with_context(|| format!("Failed to read {}", css_path.display()))?
        } else {
            String::new()
        };

        let result = validator.validate_source(name, &tsx, &css, &contract);
        if result.passed {
            println!("ok    {}", tsx_path.display());
        } else {
            failed += 1;
            println!("FAIL  {}", tsx_path.display());
            for violation in &result.violations {
                println!("      {}", violation);
            }
        }
    }

    tracing::info!(checked = components.len(), failed, "check finished");
    if failed > 0 {
        anyhow::bail!("{} of {} component(s) violate the design system", failed, components.len());
    }
    Ok(())
}

fn find_components(target: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in walkdir::WalkDir::new(target).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let skipped = path
            .components()
            .any(|c| c.as_os_str() == "node_modules");
        if entry.file_type().is_file()
            && !skipped
            && path.extension().is_some_and(|ext| ext == "tsx")
        {
            found.push(path.to_path_buf());
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_components_skips_node_modules() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/node_modules/lib")).unwrap();
        std::fs::write(dir.path().join("src/Badge.tsx"), "").unwrap();
        std::fs::write(dir.path().join("src/Badge.css"), "").unwrap();
        std::fs::write(dir.path().join("src/node_modules/lib/Thing.tsx"), "").unwrap();

        let found = find_components(dir.path()).unwrap();
        assert_eq!(found, vec![dir.path().join("src/Badge.tsx")]);
    }
}
