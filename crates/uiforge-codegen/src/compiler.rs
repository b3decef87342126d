//! Generate-then-validate loop for a single component
//!
//! The compiler asks its generator for a unit, runs the compliance validator
//! on it, and decides what happens to a failure:
//!
//! - syntax defects and token-contract violations are re-generated with the
//!   violations appended, up to `corrective_retries` extra attempts
//! - type defects are rejected at once
//!
//! Passing verdicts are cached by content so an unchanged unit is not
//! validated twice.

use moka::sync::Cache;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use uiforge_core::{ComponentSpec, DesignSystemContract, Fingerprint};

use crate::error::{Error, Result};
use crate::generator::{ComponentGenerator, GenerationRequest};
use crate::ir::{ComponentSignature, GeneratedUnit, ValidationResult, Violation};
use crate::validator::{ComplianceValidator, ValidationInput};

const CACHE_CAPACITY: u64 = 1024;

/// A unit that passed validation
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    /// The accepted unit
    pub unit: GeneratedUnit,
    /// Its passing verdict
    pub validation: ValidationResult,
    /// Generation attempts it took
    pub attempts: u32,
    /// True if the verdict came from the cache
    pub cached: bool,
}

/// Generates and validates units with bounded correction
#[derive(Clone)]
pub struct UnitCompiler {
    generator: Arc<dyn ComponentGenerator>,
    validator: ComplianceValidator,
    verdicts: Cache<Fingerprint, ValidationResult>,
    corrective_retries: u32,
}

impl UnitCompiler {
    /// Create a compiler around a generator
    pub fn new(generator: Arc<dyn ComponentGenerator>) -> Self {
        Self {
            generator,
            validator: ComplianceValidator::new(),
            verdicts: Cache::new(CACHE_CAPACITY),
            corrective_retries: 1,
        }
    }

    /// Set the number of corrective re-generations for correctable defects
    pub fn with_corrective_retries(mut self, retries: u32) -> Self {
        self.corrective_retries = retries;
        self
    }

    /// Backend name of the generator
    pub fn backend(&self) -> &'static str {
        self.generator.name()
    }

    /// Produce a validated unit for `spec`.
    ///
    /// `children` must hold the current signature of every child the spec
    /// composes.
    pub async fn compile(
        &self,
        spec: &ComponentSpec,
        contract: &DesignSystemContract,
        children: &BTreeMap<String, ComponentSignature>,
    ) -> Result<CompiledUnit> {
        let mut corrections: Vec<Violation> = Vec::new();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let unit = self
                .generator
                .generate(&GenerationRequest {
                    spec,
                    contract,
                    children,
                    corrections: &corrections,
                })
                .await?;

            let key = Fingerprint::of_parts([
                unit.spec_fingerprint.as_str(),
                unit.contract_fingerprint.as_str(),
                unit.code_digest().as_str(),
            ]);
            if let Some(validation) = self.verdicts.get(&key) {
                debug!(component = %spec.name, "validation cache hit");
                return Ok(CompiledUnit {
                    unit,
                    validation,
                    attempts,
                    cached: true,
                });
            }

            let validation = self.validator.validate(&ValidationInput {
                unit: &unit,
                spec,
                contract,
                children,
            });

            let Some(class) = validation.defect_class() else {
                info!(
                    component = %spec.name,
                    backend = self.generator.name(),
                    attempts,
                    "unit accepted"
                );
                self.verdicts.insert(key, validation.clone());
                return Ok(CompiledUnit {
                    unit,
                    validation,
                    attempts,
                    cached: false,
                });
            };

            if class.is_correctable() && attempts <= self.corrective_retries {
                warn!(
                    component = %spec.name,
                    %class,
                    violations = validation.violations.len(),
                    attempt = attempts,
                    "re-generating with corrections"
                );
                corrections = validation.violations;
                continue;
            }

            warn!(
                component = %spec.name,
                %class,
                violations = validation.violations.len(),
                "unit rejected"
            );
            return Err(Error::UnitRejected {
                component: spec.name.clone(),
                fragment: spec.fragment().to_string(),
                class,
                result: Box::new(validation),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{ProviderGenerator, TemplateGenerator};
    use crate::ir::DefectClass;
    use std::time::Duration;
    use uiforge_core::component::{HandlerAction, HandlerSpec, Interaction, StateSpec, TypeRef};
    use uiforge_core::provider::{ProviderClient, ScriptedProvider, Stage};
    use uiforge_core::retry::RetryPolicy;

    fn toggle() -> ComponentSpec {
        let mut spec = ComponentSpec::new("Toggle");
        spec.state.push(StateSpec {
            name: "on".into(),
            ty: TypeRef::Boolean,
            initial: serde_json::json!(false),
        });
        spec.handlers.push(HandlerSpec {
            name: "flip".into(),
            trigger: Interaction::Click,
            effect: "flip the switch".into(),
            affects: "on".into(),
            action: HandlerAction::Toggle,
            label: None,
        });
        spec
    }

    const GOOD_TSX: &str = "```tsx
import { useState } from 'react';
import './Toggle.css';

export interface ToggleProps {}

export function Toggle(_props: ToggleProps) {
  const [on, setOn] = useState<boolean>(false);
  const flip = () => {
    setOn((current) => !current);
  };
  return (
    <div className=\"toggle\">
      <button type=\"button\" onClick={flip}>{on ? \"On\" : \"Off\"}</button>
    </div>
  );
}
```";

    fn scripted(replies: &[String]) -> (Arc<ScriptedProvider>, UnitCompiler) {
        let provider = replies
            .iter()
            .fold(ScriptedProvider::new(), |p, r| p.reply(Stage::Generate, r.clone()));
        let provider = Arc::new(provider);
        let client = Arc::new(ProviderClient::new(
            provider.clone(),
            RetryPolicy::immediate(1, Duration::from_secs(5)),
        ));
        (provider, UnitCompiler::new(Arc::new(ProviderGenerator::new(client))))
    }

    fn with_css(css: &str) -> String {
        format!("{}\n```css\n{}\n```", GOOD_TSX, css)
    }

    #[tokio::test]
    async fn test_template_units_pass_first_time_and_cache() {
        let compiler = UnitCompiler::new(Arc::new(TemplateGenerator::new()));
        let contract = DesignSystemContract::builtin();
        let first = compiler.compile(&toggle(), &contract, &BTreeMap::new()).await.unwrap();
        assert_eq!(first.attempts, 1);
        assert!(!first.cached);

        let second = compiler.compile(&toggle(), &contract, &BTreeMap::new()).await.unwrap();
        assert!(second.cached);
        assert_eq!(first.unit, second.unit);
    }

    #[tokio::test]
    async fn test_token_violation_is_corrected() {
        let (provider, compiler) = scripted(&[
            with_css(".toggle {\n  color: #ff0000;\n}"),
            with_css(".toggle {\n  color: var(--color-danger-default);\n}"),
        ]);
        let contract = DesignSystemContract::builtin();

        let compiled = compiler.compile(&toggle(), &contract, &BTreeMap::new()).await.unwrap();
        assert_eq!(compiled.attempts, 2);
        assert!(compiled.validation.passed);

        let requests = provider.requests();
        assert!(requests[1].prompt.contains("#ff0000"));
    }

    #[tokio::test]
    async fn test_uncorrected_violation_is_rejected() {
        let bad = with_css(".toggle {\n  padding: 12px;\n}");
        let (_, compiler) = scripted(&[bad.clone(), bad]);
        let contract = DesignSystemContract::builtin();

        let err = compiler.compile(&toggle(), &contract, &BTreeMap::new()).await.unwrap_err();
        match err {
            Error::UnitRejected { class, .. } => assert_eq!(class, DefectClass::TokenContract),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_type_defect_is_not_retried() {
        let untyped = GOOD_TSX.replace("useState<boolean>(false)", "useState(false)");
        let reply = format!("{}\n```css\n.toggle {{\n  display: flex;\n}}\n```", untyped);
        let (provider, compiler) = scripted(&[reply.clone(), reply]);
        let contract = DesignSystemContract::builtin();

        let err = compiler.compile(&toggle(), &contract, &BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, Error::UnitRejected { class: DefectClass::Type, .. }));
        assert_eq!(provider.calls(Stage::Generate), 1);
    }
}
