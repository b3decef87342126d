//! Change-request processing
//!
//! Every request walks the same state machine:
//!
//! ```text
//!   Scoping ──► Mutating ──► Reconciling ──► Regenerating ──► Committed
//!      │            │              │                │
//!      └── error    └── error      └────────────────┴──► RolledBack
//! ```
//!
//! Scoping resolves the affected components. Mutating asks the provider for a
//! mutation list confined to that subtree. Reconciling applies it to a copy of
//! the specs and re-validates the batch. Regenerating compiles the components
//! whose spec changed plus any ancestor whose composition surface changed.
//!
//! Nothing here touches the input state. A successful run yields a
//! [`Proposal`] holding the new snapshot; the pipeline commits it. Any failure
//! after Scoping is reported as [`Error::RolledBack`], and the caller keeps the
//! state it passed in.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use uiforge_codegen::prompts::{FEEDBACK_SYSTEM, feedback_prompt};
use uiforge_codegen::{ComponentSignature, DefectClass, RequirementsParser, Violation};
use uiforge_core::component::humanize;
use uiforge_core::provider::{ProviderRequest, Stage, extract_json};
use uiforge_core::schema::validate_batch;
use uiforge_core::{ComponentSpec, DesignSystemContract, ProviderClient};

use crate::error::{Error, Result};
use crate::mutation::{Mutation, MutationBatch, allocate_names};
use crate::scheduler::{ScheduleError, Scheduler};
use crate::state::{
    ChangeDiff, ChangeKind, ChangeRequest, ComponentEntry, Iteration, Outcome, ProjectState,
    RollbackReport, SpecChange,
};

/// Phase of a change request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Resolving the affected components
    Scoping,
    /// Obtaining the mutation list
    Mutating,
    /// Applying mutations to a working copy and re-validating the IR
    Reconciling,
    /// Compiling changed components and affected ancestors
    Regenerating,
    /// Accepted
    Committed,
    /// Reverted
    RolledBack,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Scoping => "scoping",
            Phase::Mutating => "mutating",
            Phase::Reconciling => "reconciling",
            Phase::Regenerating => "regenerating",
            Phase::Committed => "committed",
            Phase::RolledBack => "rolled_back",
        })
    }
}

/// A processed change request, not yet committed
#[derive(Debug, Clone)]
pub struct Proposal {
    /// The state the request produces
    pub state: ProjectState,
    /// What changed
    pub diff: ChangeDiff,
}

impl Proposal {
    /// Append the request to the new state's history and return it
    pub fn commit(self, request: &ChangeRequest) -> ProjectState {
        let Proposal { mut state, diff } = self;
        state.record(Iteration {
            request: request.clone(),
            diff,
            outcome: Outcome::Committed,
            reason: None,
        });
        info!(request = %request.id, phase = %Phase::Committed, "change request committed");
        state
    }
}

/// Turns change requests into new project snapshots
pub struct FeedbackProcessor {
    client: Arc<ProviderClient>,
    scheduler: Scheduler,
    /// Names created components, the same way parsing names a fresh tree
    parser: Arc<RequirementsParser>,
}

impl FeedbackProcessor {
    /// Create a processor
    pub fn new(
        client: Arc<ProviderClient>,
        scheduler: Scheduler,
        parser: Arc<RequirementsParser>,
    ) -> Self {
        Self {
            client,
            scheduler,
            parser,
        }
    }

    /// Run a change request against `state`.
    ///
    /// Cancelling before Reconciling returns [`Error::Cancelled`]; after that
    /// point it is reported as a rollback. Either way `state` is untouched.
    pub async fn process(
        &self,
        request: &ChangeRequest,
        state: &ProjectState,
        contract: &DesignSystemContract,
        cancel: &CancellationToken,
    ) -> Result<Proposal> {
        enter(request, Phase::Scoping);
        let scope = resolve_scope(request, state)?;
        let graph = state.graph();
        let mut subtree: BTreeSet<String> = BTreeSet::new();
        for name in &scope {
            subtree.insert(name.clone());
            subtree.extend(graph.descendants(name));
        }
        debug!(request = %request.id, scope = ?scope, subtree = subtree.len(), "scope resolved");

        enter(request, Phase::Mutating);
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let in_scope: Vec<&ComponentSpec> = subtree.iter().filter_map(|n| state.spec(n)).collect();
        let others: Vec<String> = state
            .entries()
            .keys()
            .filter(|n| !subtree.contains(*n))
            .cloned()
            .collect();
        let prompt = feedback_prompt(&request.text, &in_scope, &others, contract)?;
        let provider_request =
            ProviderRequest::new(Stage::Feedback, prompt).with_system(FEEDBACK_SYSTEM);
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.client.complete(&provider_request) => response?,
        };

        let mut diff = ChangeDiff::default();
        let mut mutations = match decode(&response.text) {
            Ok(batch) => batch.mutations,
            Err(reason) => {
                return Err(rollback(request, Phase::Mutating, diff, reason, None, Vec::new()));
            }
        };
        let mut allocator = self
            .parser
            .name_allocator(state.entries().keys().map(String::as_str));
        let created = allocate_names(&mut mutations, &mut allocator);
        for mutation in &mut mutations {
            if let Mutation::CreateComponent { spec, .. } = mutation {
                if spec.source.trim().is_empty() {
                    spec.source = request.text.clone();
                }
            }
        }
        diff.mutations = mutations.clone();

        if mutations.is_empty() {
            return Err(rollback(
                request,
                Phase::Mutating,
                diff,
                "no mutations were proposed".into(),
                None,
                Vec::new(),
            ));
        }
        let outside: Vec<String> = mutations
            .iter()
            .map(Mutation::component)
            .filter(|c| !subtree.contains(*c) && !created.contains(*c))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !outside.is_empty() {
            return Err(rollback(
                request,
                Phase::Mutating,
                diff,
                format!("mutations reach outside the affected subtree: {}", outside.join(", ")),
                None,
                Vec::new(),
            ));
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        enter(request, Phase::Reconciling);
        let mut specs: BTreeMap<String, ComponentSpec> = state
            .entries()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.spec.clone()))
            .collect();
        for mutation in &mutations {
            if let Err(issue) = mutation.apply(&mut specs) {
                return Err(rollback(
                    request,
                    Phase::Reconciling,
                    diff,
                    format!("cannot apply '{}': {}", mutation, issue),
                    None,
                    Vec::new(),
                ));
            }
        }
        let batch: Vec<ComponentSpec> = specs.values().cloned().collect();
        let root = match validate_batch(&batch) {
            Ok(root) => root,
            Err(e) => {
                return Err(rollback(
                    request,
                    Phase::Reconciling,
                    diff,
                    e.to_string(),
                    None,
                    Vec::new(),
                ));
            }
        };
        diff.specs = spec_changes(state, &specs);

        if cancel.is_cancelled() {
            return Err(rollback(request, Phase::Reconciling, diff, "cancelled".into(), None, Vec::new()));
        }
        enter(request, Phase::Regenerating);
        let mut dirty: BTreeSet<String> = diff
            .specs
            .iter()
            .filter(|c| c.kind != ChangeKind::Removed)
            .map(|c| c.component.clone())
            .collect();
        dirty.extend(
            state
                .stale(contract)
                .into_iter()
                .filter(|n| specs.contains_key(*n))
                .map(str::to_string),
        );
        let previous: BTreeMap<String, ComponentSignature> = state
            .entries()
            .iter()
            .filter(|(name, _)| specs.contains_key(*name))
            .map(|(name, entry)| (name.clone(), entry.unit.signature.clone()))
            .collect();

        let compiled = match self
            .scheduler
            .run(&specs, contract, &dirty, &previous, cancel)
            .await
        {
            Ok(compiled) => compiled,
            Err(ScheduleError::Cancelled) => {
                return Err(rollback(
                    request,
                    Phase::Regenerating,
                    diff,
                    "cancelled".into(),
                    None,
                    Vec::new(),
                ));
            }
            Err(failure) => {
                let error = Error::from(failure);
                let defect = error.defect_class();
                let violations = error.violations().to_vec();
                return Err(rollback(
                    request,
                    Phase::Regenerating,
                    diff,
                    error.to_string(),
                    defect,
                    violations,
                ));
            }
        };
        diff.regenerated = compiled.keys().cloned().collect();

        let mut components: BTreeMap<String, ComponentEntry> = BTreeMap::new();
        let mut compiled = compiled;
        for (name, spec) in specs {
            let entry = match compiled.remove(&name) {
                Some(unit) => ComponentEntry {
                    spec,
                    unit: unit.unit,
                    validation: unit.validation,
                },
                None => match state.entry(&name) {
                    Some(existing) => existing.clone(),
                    None => {
                        return Err(rollback(
                            request,
                            Phase::Regenerating,
                            diff,
                            format!("'{}' has no accepted unit", name),
                            None,
                            Vec::new(),
                        ));
                    }
                },
            };
            components.insert(name, entry);
        }

        info!(
            request = %request.id,
            changed = diff.specs.len(),
            regenerated = diff.regenerated.len(),
            "change request ready to commit"
        );
        Ok(Proposal {
            state: state.with_components(root, contract.fingerprint().clone(), components),
            diff,
        })
    }
}

fn enter(request: &ChangeRequest, phase: Phase) {
    debug!(request = %request.id, phase = %phase, "change request phase");
}

fn decode(text: &str) -> std::result::Result<MutationBatch, String> {
    let json = extract_json(text).ok_or_else(|| "provider answer contains no JSON".to_string())?;
    serde_json::from_str(json).map_err(|e| format!("provider answer is not a mutation list: {}", e))
}

fn rollback(
    request: &ChangeRequest,
    phase: Phase,
    attempted: ChangeDiff,
    reason: String,
    defect: Option<DefectClass>,
    violations: Vec<Violation>,
) -> Error {
    warn!(
        request = %request.id,
        phase = %Phase::RolledBack,
        failed_in = %phase,
        reason = %reason,
        "change request rolled back"
    );
    Error::RolledBack(Box::new(RollbackReport {
        request: request.clone(),
        phase,
        attempted,
        reason,
        defect,
        violations,
    }))
}

/// Components the request is about: the explicit scope, or the single best
/// match of the request text against component and member names.
fn resolve_scope(request: &ChangeRequest, state: &ProjectState) -> Result<Vec<String>> {
    if request.is_scoped() {
        let unknown: Vec<String> = request
            .scope
            .iter()
            .filter(|n| state.entry(n).is_none())
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(Error::InvalidScope { unknown });
        }
        return Ok(request.scope.clone());
    }

    let text = words(&request.text);
    let scores: Vec<(usize, &str)> = state
        .specs()
        .map(|spec| (score(&text, spec), spec.name.as_str()))
        .collect();
    let best = scores.iter().map(|(s, _)| *s).max().unwrap_or(0);
    let leaders: Vec<String> = scores
        .iter()
        .filter(|(s, _)| best > 0 && *s == best)
        .map(|(_, n)| n.to_string())
        .collect();

    match leaders.as_slice() {
        [single] => Ok(vec![single.clone()]),
        _ => Err(Error::UnscopedAmbiguous {
            request: request.text.clone(),
            candidates: leaders,
        }),
    }
}

fn score(text: &str, spec: &ComponentSpec) -> usize {
    let mentions = |identifier: &str| text.contains(&words(&humanize(identifier)));
    let mut total = 0;
    if mentions(&spec.name) {
        total += 3;
    }
    let members = spec
        .props
        .iter()
        .map(|p| p.name.as_str())
        .chain(spec.state.iter().map(|s| s.name.as_str()))
        .chain(spec.handlers.iter().map(|h| h.name.as_str()));
    total + 2 * members.filter(|m| mentions(m)).count()
}

/// Lowercase words padded with spaces, so `contains(" a b ")` matches whole words
fn words(text: &str) -> String {
    let joined = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    format!(" {} ", joined)
}

fn spec_changes(state: &ProjectState, specs: &BTreeMap<String, ComponentSpec>) -> Vec<SpecChange> {
    let mut changes = Vec::new();
    for (name, spec) in specs {
        let after = spec.fingerprint();
        match state.spec(name) {
            None => changes.push(SpecChange {
                component: name.clone(),
                kind: ChangeKind::Added,
                before: None,
                after: Some(after),
            }),
            Some(old) => {
                let before = old.fingerprint();
                if before != after {
                    changes.push(SpecChange {
                        component: name.clone(),
                        kind: ChangeKind::Modified,
                        before: Some(before),
                        after: Some(after),
                    });
                }
            }
        }
    }
    for old in state.specs().filter(|s| !specs.contains_key(&s.name)) {
        changes.push(SpecChange {
            component: old.name.clone(),
            kind: ChangeKind::Removed,
            before: Some(old.fingerprint()),
            after: None,
        });
    }
    changes
}
