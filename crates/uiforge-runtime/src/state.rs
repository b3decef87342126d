//! Project state and iteration history
//!
//! [`ProjectState`] is an immutable snapshot: every pipeline operation takes a
//! state by reference and returns a new one. Rolling back is therefore just
//! returning the input untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use uiforge_codegen::{DefectClass, GeneratedUnit, ValidationResult, Violation};
use uiforge_core::graph::ComponentGraph;
use uiforge_core::{ComponentSpec, DesignSystemContract, Fingerprint};

use crate::error::Result;
use crate::feedback::Phase;
use crate::mutation::Mutation;

/// One component: its spec, accepted unit and last verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// Current IR
    pub spec: ComponentSpec,
    /// Accepted generated source
    pub unit: GeneratedUnit,
    /// Verdict the unit was accepted with
    pub validation: ValidationResult,
}

/// Everything the pipeline knows about one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    root: String,
    contract: Fingerprint,
    components: BTreeMap<String, ComponentEntry>,
    #[serde(default)]
    history: Vec<Iteration>,
}

impl ProjectState {
    pub(crate) fn new(
        root: String,
        contract: Fingerprint,
        components: BTreeMap<String, ComponentEntry>,
    ) -> Self {
        Self {
            root,
            contract,
            components,
            history: Vec::new(),
        }
    }

    pub(crate) fn with_components(
        &self,
        root: String,
        contract: Fingerprint,
        components: BTreeMap<String, ComponentEntry>,
    ) -> Self {
        Self {
            root,
            contract,
            components,
            history: self.history.clone(),
        }
    }

    pub(crate) fn record(&mut self, iteration: Iteration) {
        self.history.push(iteration);
    }

    /// Name of the root component
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Fingerprint of the contract the project was last generated against
    pub fn contract_fingerprint(&self) -> &Fingerprint {
        &self.contract
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True if the project has no components
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Look up a component
    pub fn entry(&self, name: &str) -> Option<&ComponentEntry> {
        self.components.get(name)
    }

    /// Look up a component's spec
    pub fn spec(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.get(name).map(|e| &e.spec)
    }

    /// Look up a component's accepted unit
    pub fn unit(&self, name: &str) -> Option<&GeneratedUnit> {
        self.components.get(name).map(|e| &e.unit)
    }

    /// All entries by name
    pub fn entries(&self) -> &BTreeMap<String, ComponentEntry> {
        &self.components
    }

    /// All specs in name order
    pub fn specs(&self) -> impl Iterator<Item = &ComponentSpec> {
        self.components.values().map(|e| &e.spec)
    }

    /// Generated units keyed by component name, for materialization
    pub fn units(&self) -> BTreeMap<&str, &GeneratedUnit> {
        self.components
            .iter()
            .map(|(name, e)| (name.as_str(), &e.unit))
            .collect()
    }

    /// Parent/child graph of the current specs
    pub fn graph(&self) -> ComponentGraph {
        ComponentGraph::new(self.specs())
    }

    /// Components whose unit no longer matches its spec or the contract
    pub fn stale(&self, contract: &DesignSystemContract) -> Vec<&str> {
        self.components
            .iter()
            .filter(|(_, e)| e.unit.is_stale(&e.spec, contract))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Applied change requests, oldest first
    pub fn history(&self) -> &[Iteration] {
        &self.history
    }

    /// Digest of the whole serialized state
    pub fn digest(&self) -> Result<Fingerprint> {
        Ok(Fingerprint::of_parts([serde_json::to_vec(self)?]))
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the state to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a state file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

/// A natural-language change, optionally scoped to named components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    /// Request id
    pub id: Uuid,
    /// Instruction text
    pub text: String,
    /// Components the request is about; empty means infer
    #[serde(default)]
    pub scope: Vec<String>,
    /// Submission time
    pub submitted_at: DateTime<Utc>,
}

impl ChangeRequest {
    /// An unscoped request
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            scope: Vec::new(),
            submitted_at: Utc::now(),
        }
    }

    /// A request scoped to the given components
    pub fn scoped<I, S>(text: impl Into<String>, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scope: scope.into_iter().map(Into::into).collect(),
            ..Self::new(text)
        }
    }

    /// True when the caller named the affected components
    pub fn is_scoped(&self) -> bool {
        !self.scope.is_empty()
    }
}

/// How one spec changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// New component
    Added,
    /// Existing component with new content
    Modified,
    /// Component removed
    Removed,
}

/// Fingerprint movement of one spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecChange {
    /// Component name
    pub component: String,
    /// Kind of change
    pub kind: ChangeKind,
    /// Spec fingerprint before, if it existed
    pub before: Option<Fingerprint>,
    /// Spec fingerprint after, if it still exists
    pub after: Option<Fingerprint>,
}

/// What a change request did, or tried to do
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeDiff {
    /// Mutations proposed for the request
    pub mutations: Vec<Mutation>,
    /// Specs whose content changed
    pub specs: Vec<SpecChange>,
    /// Components whose units were regenerated
    pub regenerated: Vec<String>,
}

/// Result of a change request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Applied
    Committed,
    /// Reverted; the project was left as it was
    RolledBack,
}

/// One entry of the iteration history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
    /// The request
    pub request: ChangeRequest,
    /// Its diff
    pub diff: ChangeDiff,
    /// How it ended
    pub outcome: Outcome,
    /// Why it was rolled back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Why a change request was reverted, with what it attempted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackReport {
    /// The reverted request
    pub request: ChangeRequest,
    /// Phase that failed
    pub phase: Phase,
    /// Everything attempted before the failure
    pub attempted: ChangeDiff,
    /// Human-readable cause
    pub reason: String,
    /// Defect class when validation rejected a unit
    pub defect: Option<DefectClass>,
    /// Validator findings behind the rejection
    pub violations: Vec<Violation>,
}

impl RollbackReport {
    /// History entry for this rollback
    pub fn to_iteration(&self) -> Iteration {
        Iteration {
            request: self.request.clone(),
            diff: self.attempted.clone(),
            outcome: Outcome::RolledBack,
            reason: Some(self.reason.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_request() {
        let request = ChangeRequest::scoped("make it red", ["Counter"]);
        assert!(request.is_scoped());
        assert_eq!(request.scope, vec!["Counter".to_string()]);
        assert!(!ChangeRequest::new("anything").is_scoped());
    }

    #[test]
    fn test_rollback_becomes_history_entry() {
        let report = RollbackReport {
            request: ChangeRequest::new("make the increment button red"),
            phase: Phase::Regenerating,
            attempted: ChangeDiff::default(),
            reason: "token contract violation".into(),
            defect: Some(DefectClass::TokenContract),
            violations: Vec::new(),
        };
        let entry = report.to_iteration();
        assert_eq!(entry.outcome, Outcome::RolledBack);
        assert_eq!(entry.reason.as_deref(), Some("token contract violation"));
    }

    #[test]
    fn test_state_file_round_trip() {
        let state = ProjectState::new("App".into(), Fingerprint::of_str("contract"), BTreeMap::new());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        state.save(&path).unwrap();
        let loaded = ProjectState::load(&path).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.digest().unwrap(), state.digest().unwrap());
    }
}
