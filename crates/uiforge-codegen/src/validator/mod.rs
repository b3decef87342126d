//! Design-system compliance validation
//!
//! The validator inspects one [`GeneratedUnit`] against its source spec and
//! the contract. Checks run in order and short-circuit on structural
//! failures:
//!
//! 1. syntax: the TSX parses with the TSX grammar, JSX tags pair up, the
//!    component is exported, the CSS parses
//! 2. members: every prop, state variable, handler and child is present and typed
//! 3. literals: no color/spacing/typography/radius/shadow/breakpoint literal,
//!    no `var(--…)` outside the contract
//! 4. escapes: no `any` or `@ts-ignore`-style escape hatch
//!
//! Checks 3 and 4 both run once the structure is sound, so one pass reports
//! every literal and escape in the unit. The TSX is parsed once and every
//! check walks the same tree.

mod escapes;
mod literals;
mod members;
pub mod source;
pub mod stylesheet;
mod syntax;
mod tree;

use std::collections::BTreeMap;
use tracing::debug;

use uiforge_core::{ComponentSpec, DesignSystemContract};

use crate::ir::{
    ComponentSignature, GeneratedUnit, SourceFile, ValidationResult, Violation, ViolationKind,
};
use tree::TsxTree;

/// Everything one validation pass needs
#[derive(Debug, Clone, Copy)]
pub struct ValidationInput<'a> {
    /// Unit under validation
    pub unit: &'a GeneratedUnit,
    /// Spec the unit claims to implement
    pub spec: &'a ComponentSpec,
    /// Contract in force
    pub contract: &'a DesignSystemContract,
    /// Finalized signatures of the spec's children
    pub children: &'a BTreeMap<String, ComponentSignature>,
}

/// Stateless compliance checker
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplianceValidator;

impl ComplianceValidator {
    /// Create a validator
    pub fn new() -> Self {
        Self
    }

    /// Validate a unit against its spec and the contract
    pub fn validate(&self, input: &ValidationInput<'_>) -> ValidationResult {
        let name = input.unit.component.as_str();
        let tree = match TsxTree::parse(&input.unit.tsx) {
            Ok(tree) => tree,
            Err(e) => return unparsed(name, e),
        };

        let violations = syntax::check(name, &tree, &input.unit.css);
        if !violations.is_empty() {
            debug!(component = name, count = violations.len(), "syntax check failed");
            return ValidationResult::new(name, violations);
        }

        let violations = members::check(input, &tree);
        if !violations.is_empty() {
            debug!(component = name, count = violations.len(), "member check failed");
            return ValidationResult::new(name, violations);
        }

        let mut violations = literals::check(name, &tree, &input.unit.css, input.contract);
        violations.extend(escapes::check(name, &tree));
        debug!(component = name, count = violations.len(), "validated");
        ValidationResult::new(name, violations)
    }

    /// Validate hand-written or previously generated source with no spec.
    ///
    /// Runs the syntax, literal and escape checks; member coverage needs a
    /// spec and is skipped.
    pub fn validate_source(
        &self,
        name: &str,
        tsx: &str,
        css: &str,
        contract: &DesignSystemContract,
    ) -> ValidationResult {
        let tree = match TsxTree::parse(tsx) {
            Ok(tree) => tree,
            Err(e) => return unparsed(name, e),
        };
        let violations = syntax::check(name, &tree, css);
        if !violations.is_empty() {
            return ValidationResult::new(name, violations);
        }
        let mut violations = literals::check(name, &tree, css, contract);
        violations.extend(escapes::check(name, &tree));
        ValidationResult::new(name, violations)
    }
}

fn unparsed(name: &str, reason: String) -> ValidationResult {
    let violation = Violation::new(ViolationKind::Syntax, name, reason).at(SourceFile::Tsx, 1);
    ValidationResult::new(name, vec![violation])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ViolationKind;

    const TSX: &str = r#"import './Badge.css';

export interface BadgeProps {
  text: string;
}

export function Badge({ text }: BadgeProps) {
  return <span className="badge">{text}</span>;
}
"#;

    fn badge() -> ComponentSpec {
        let mut spec = ComponentSpec::new("Badge");
        spec.props.push(uiforge_core::component::PropSpec {
            name: "text".into(),
            ty: uiforge_core::component::TypeRef::String,
            required: true,
            default: None,
        });
        spec
    }

    fn unit(spec: &ComponentSpec, contract: &DesignSystemContract, tsx: &str, css: &str) -> GeneratedUnit {
        GeneratedUnit {
            component: spec.name.clone(),
            tsx: tsx.to_string(),
            css: css.to_string(),
            spec_fingerprint: spec.fingerprint(),
            contract_fingerprint: contract.fingerprint().clone(),
            signature: ComponentSignature::of(spec),
            child_surfaces: BTreeMap::new(),
        }
    }

    #[test]
    fn test_compliant_unit_passes() {
        let contract = DesignSystemContract::builtin();
        let spec = badge();
        let unit = unit(&spec, &contract, TSX, ".badge { color: var(--color-primary-default); }");
        let children = BTreeMap::new();
        let result = ComplianceValidator::new().validate(&ValidationInput {
            unit: &unit,
            spec: &spec,
            contract: &contract,
            children: &children,
        });
        assert!(result.passed, "{:?}", result.violations);
    }

    #[test]
    fn test_syntax_failure_short_circuits() {
        let contract = DesignSystemContract::builtin();
        let spec = badge();
        let broken = TSX.replace("</span>", "");
        let unit = unit(&spec, &contract, &broken, ".badge { color: red; }");
        let children = BTreeMap::new();
        let result = ComplianceValidator::new().validate(&ValidationInput {
            unit: &unit,
            spec: &spec,
            contract: &contract,
            children: &children,
        });
        assert!(!result.passed);
        assert!(result.violations.iter().all(|v| v.kind == ViolationKind::Syntax));
    }

    #[test]
    fn test_literals_and_escapes_reported_together() {
        let contract = DesignSystemContract::builtin();
        let spec = badge();
        let tsx = TSX.replace("{text}</span>", "{text as any}</span>");
        let unit = unit(&spec, &contract, &tsx, ".badge { color: red; }");
        let children = BTreeMap::new();
        let result = ComplianceValidator::new().validate(&ValidationInput {
            unit: &unit,
            spec: &spec,
            contract: &contract,
            children: &children,
        });
        assert_eq!(result.of_kind(ViolationKind::ForbiddenLiteral).count(), 1);
        assert_eq!(result.of_kind(ViolationKind::MissingType).count(), 1);
    }

    #[test]
    fn test_validate_source_skips_member_coverage() {
        let contract = DesignSystemContract::builtin();
        let result = ComplianceValidator::new().validate_source(
            "Badge",
            TSX,
            ".badge { padding: 12px; }",
            &contract,
        );
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].kind, ViolationKind::ForbiddenLiteral);
    }

    #[test]
    fn test_validate_source_rejects_unparseable_expressions() {
        let contract = DesignSystemContract::builtin();
        let result = ComplianceValidator::new().validate_source(
            "Box",
            "export function Box() {\n  const x = ;\n  return <div className=\"box\">{x +}</div>;\n}\n",
            ".box {}\n",
            &contract,
        );
        assert!(!result.passed);
        assert!(result.violations.iter().all(|v| v.kind == ViolationKind::Syntax));
        assert!(result.violations.iter().any(|v| v.line == Some(2)), "{:?}", result.violations);
    }
}
