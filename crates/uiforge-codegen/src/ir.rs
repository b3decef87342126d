//! Generated units and validation results
//!
//! A [`GeneratedUnit`] is the TSX and CSS produced for one `ComponentSpec`,
//! stamped with the fingerprints it was derived from. A [`ValidationResult`]
//! is the verdict of the compliance validator on one unit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use uiforge_core::component::{ComponentSpec, capitalize};
use uiforge_core::{DesignSystemContract, Fingerprint};

/// Source produced for one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedUnit {
    /// Component name
    pub component: String,

    /// Component source and type declarations (`<Name>.tsx`)
    pub tsx: String,

    /// Stylesheet (`<Name>.css`)
    pub css: String,

    /// Fingerprint of the spec this unit was derived from
    pub spec_fingerprint: Fingerprint,

    /// Fingerprint of the contract in force at generation
    pub contract_fingerprint: Fingerprint,

    /// Composition surface this unit exposes to its parents
    pub signature: ComponentSignature,

    /// Surface fingerprints of the children composed at generation
    #[serde(default)]
    pub child_surfaces: BTreeMap<String, Fingerprint>,
}

impl GeneratedUnit {
    /// Digest over the generated text and the child surfaces it was built against
    pub fn code_digest(&self) -> Fingerprint {
        let mut parts = vec![self.tsx.clone(), self.css.clone()];
        parts.extend(
            self.child_surfaces
                .iter()
                .map(|(name, fp)| format!("{}={}", name, fp)),
        );
        Fingerprint::of_parts(parts)
    }

    /// True while the unit was derived from the spec's current content
    pub fn matches(&self, spec: &ComponentSpec) -> bool {
        self.component == spec.name && self.spec_fingerprint == spec.fingerprint()
    }

    /// True if the unit must be regenerated for this spec and contract
    pub fn is_stale(&self, spec: &ComponentSpec, contract: &DesignSystemContract) -> bool {
        !self.matches(spec) || &self.contract_fingerprint != contract.fingerprint()
    }

    /// File name of the component source
    pub fn tsx_file(&self) -> String {
        format!("{}.tsx", self.component)
    }

    /// File name of the stylesheet
    pub fn css_file(&self) -> String {
        format!("{}.css", self.component)
    }
}

/// A prop as seen by a composing parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureProp {
    /// Prop name
    pub name: String,
    /// TypeScript type
    pub ty: String,
    /// Whether the parent must pass it
    pub required: bool,
}

/// A change callback as seen by a composing parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureCallback {
    /// Callback prop name (`onValueChange`)
    pub name: String,
    /// Prop the callback reports on
    pub prop: String,
    /// TypeScript type of the reported value
    pub ty: String,
}

/// Composition surface of a component: what a parent needs to invoke it.
///
/// Ancestors are regenerated after a change only when this surface changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSignature {
    /// Component name
    pub name: String,
    /// Props in declaration order
    pub props: Vec<SignatureProp>,
    /// Change callbacks in declaration order
    pub callbacks: Vec<SignatureCallback>,
}

impl ComponentSignature {
    /// Derive the surface of a spec
    pub fn of(spec: &ComponentSpec) -> Self {
        Self {
            name: spec.name.clone(),
            props: spec
                .props
                .iter()
                .map(|p| SignatureProp {
                    name: p.name.clone(),
                    ty: p.ty.ts(),
                    required: p.required,
                })
                .collect(),
            callbacks: spec
                .notified_props()
                .into_iter()
                .map(|p| SignatureCallback {
                    name: callback_name(&p.name),
                    prop: p.name.clone(),
                    ty: p.ty.ts(),
                })
                .collect(),
        }
    }

    /// Fingerprint of the surface
    pub fn fingerprint(&self) -> Fingerprint {
        let mut parts = vec![self.name.clone()];
        for prop in &self.props {
            parts.push(format!("{}:{}:{}", prop.name, prop.ty, prop.required));
        }
        for callback in &self.callbacks {
            parts.push(format!("{}({})", callback.name, callback.ty));
        }
        Fingerprint::of_parts(parts)
    }

    /// Props a parent must pass
    pub fn required_props(&self) -> impl Iterator<Item = &SignatureProp> {
        self.props.iter().filter(|p| p.required)
    }

    /// Callback reporting on `prop`, if any
    pub fn callback_for(&self, prop: &str) -> Option<&SignatureCallback> {
        self.callbacks.iter().find(|c| c.prop == prop)
    }
}

/// `value` → `onValueChange`
pub fn callback_name(prop: &str) -> String {
    format!("on{}Change", capitalize(prop))
}

/// `count` → `setCount`
pub fn setter_name(state: &str) -> String {
    format!("set{}", capitalize(state))
}

/// Kind of compliance violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    /// Malformed TSX or CSS
    Syntax,
    /// A literal where a design token is required
    ForbiddenLiteral,
    /// A declared member missing or mistyped, or an untyped escape hatch
    MissingType,
    /// A `var(--…)` reference to a token the contract does not declare
    UndeclaredToken,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViolationKind::Syntax => "syntax",
            ViolationKind::ForbiddenLiteral => "forbidden-literal",
            ViolationKind::MissingType => "missing-type",
            ViolationKind::UndeclaredToken => "undeclared-token",
        })
    }
}

/// File of a generated unit a violation points into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFile {
    /// The component source
    Tsx,
    /// The stylesheet
    Css,
}

/// One compliance finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Violation kind
    pub kind: ViolationKind,
    /// Component name
    pub component: String,
    /// File the finding is in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<SourceFile>,
    /// Approximate 1-based line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Spec attribute involved (`state.count`, `color`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Description
    pub message: String,
}

impl Violation {
    /// A violation with no location yet
    pub fn new(kind: ViolationKind, component: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            component: component.to_string(),
            file: None,
            line: None,
            attribute: None,
            message: message.into(),
        }
    }

    /// Point the violation at a file line
    pub fn at(mut self, file: SourceFile, line: usize) -> Self {
        self.file = Some(file);
        self.line = Some(line);
        self
    }

    /// Name the spec attribute involved
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.component)?;
        match (self.file, self.line) {
            (Some(SourceFile::Tsx), Some(line)) => write!(f, ".tsx:{}", line)?,
            (Some(SourceFile::Css), Some(line)) => write!(f, ".css:{}", line)?,
            _ => {}
        }
        if let Some(attribute) = &self.attribute {
            write!(f, " ({})", attribute)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Defect class of a failed unit, used to pick the recovery policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectClass {
    /// Malformed source; retried with the violations as context
    Syntax,
    /// Missing or mistyped members; not retried
    Type,
    /// Literal or undeclared token; retried with the violations as context
    TokenContract,
}

impl DefectClass {
    /// Whether a corrective re-generation is attempted
    pub fn is_correctable(self) -> bool {
        matches!(self, DefectClass::Syntax | DefectClass::TokenContract)
    }
}

impl fmt::Display for DefectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DefectClass::Syntax => "syntax defect",
            DefectClass::Type => "type defect",
            DefectClass::TokenContract => "token contract violation",
        })
    }
}

/// Verdict of the compliance validator on one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Component name
    pub component: String,
    /// True only when there are no violations
    pub passed: bool,
    /// Findings in check order
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    /// Build a result; a unit with any violation fails as a whole
    pub fn new(component: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self {
            component: component.into(),
            passed: violations.is_empty(),
            violations,
        }
    }

    /// Dominant defect class, none when passed
    pub fn defect_class(&self) -> Option<DefectClass> {
        let has = |kind: ViolationKind| self.violations.iter().any(|v| v.kind == kind);
        if self.passed {
            None
        } else if has(ViolationKind::Syntax) {
            Some(DefectClass::Syntax)
        } else if has(ViolationKind::MissingType) {
            Some(DefectClass::Type)
        } else {
            Some(DefectClass::TokenContract)
        }
    }

    /// Violations of one kind
    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uiforge_core::component::{PropSpec, TypeRef};

    fn prop(name: &str, ty: TypeRef, required: bool) -> PropSpec {
        PropSpec {
            name: name.to_string(),
            ty,
            required,
            default: None,
        }
    }

    #[test]
    fn test_signature_ignores_internal_state() {
        let mut spec = ComponentSpec::new("TodoItem");
        spec.props.push(prop("text", TypeRef::String, true));
        let before = ComponentSignature::of(&spec).fingerprint();

        spec.description = "A single todo".into();
        spec.state.push(uiforge_core::component::StateSpec {
            name: "hovered".into(),
            ty: TypeRef::Boolean,
            initial: serde_json::json!(false),
        });
        assert_eq!(ComponentSignature::of(&spec).fingerprint(), before);

        spec.props.push(prop("done", TypeRef::Boolean, false));
        assert_ne!(ComponentSignature::of(&spec).fingerprint(), before);
    }

    #[test]
    fn test_defect_class_precedence() {
        let token = Violation::new(ViolationKind::ForbiddenLiteral, "A", "red");
        let missing = Violation::new(ViolationKind::MissingType, "A", "count");
        let syntax = Violation::new(ViolationKind::Syntax, "A", "unbalanced");

        let result = ValidationResult::new("A", vec![token.clone()]);
        assert_eq!(result.defect_class(), Some(DefectClass::TokenContract));

        let result = ValidationResult::new("A", vec![token.clone(), missing.clone()]);
        assert_eq!(result.defect_class(), Some(DefectClass::Type));
        assert!(!DefectClass::Type.is_correctable());

        let result = ValidationResult::new("A", vec![missing, syntax]);
        assert_eq!(result.defect_class(), Some(DefectClass::Syntax));

        let result = ValidationResult::new("A", vec![]);
        assert!(result.passed);
        assert_eq!(result.defect_class(), None);
    }

    #[test]
    fn test_violation_display() {
        let v = Violation::new(ViolationKind::ForbiddenLiteral, "Counter", "literal 'red'")
            .at(SourceFile::Css, 12)
            .attribute("color");
        assert_eq!(
            v.to_string(),
            "[forbidden-literal] Counter.css:12 (color): literal 'red'"
        );
    }
}
