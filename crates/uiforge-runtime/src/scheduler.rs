//! Dependency-ordered generation
//!
//! Components are generated in waves, children before parents. Members of one
//! wave have no dependency on each other and run concurrently, bounded by a
//! semaphore. A parent is generated only after every child it composes has
//! passed validation, because it needs the child's final signature.
//!
//! ```text
//!   wave 0: Logo   TodoItem        (leaves)
//!   wave 1: Header TodoList
//!   wave 2: App                    (root)
//! ```
//!
//! A component that fails blocks every ancestor; independent branches still
//! finish so the failure report is complete.

use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use uiforge_codegen::{CompiledUnit, ComponentSignature, UnitCompiler};
use uiforge_core::graph::ComponentGraph;
use uiforge_core::{ComponentSpec, DesignSystemContract};

use crate::error::Error;

/// Why a schedule did not complete
#[derive(Debug)]
pub enum ScheduleError {
    /// The cancellation token fired between or during waves
    Cancelled,
    /// Some components failed
    Failed {
        /// Each failed component with its error
        failures: Vec<(String, Error)>,
        /// Ancestors skipped because a descendant failed
        blocked: Vec<String>,
    },
}

impl From<ScheduleError> for Error {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Cancelled => Error::Cancelled,
            ScheduleError::Failed {
                mut failures,
                blocked,
            } => {
                if failures.len() == 1 && blocked.is_empty() {
                    if let Some((_, error)) = failures.pop() {
                        return error;
                    }
                }
                Error::BuildBlocked {
                    failed: failures
                        .iter()
                        .map(|(name, error)| format!("{}: {}", name, error))
                        .collect(),
                    blocked,
                }
            }
        }
    }
}

/// Walks the component graph and compiles what needs compiling
#[derive(Clone)]
pub struct Scheduler {
    compiler: UnitCompiler,
    max_concurrency: usize,
}

impl Scheduler {
    /// Create a scheduler; `max_concurrency` is clamped to at least 1
    pub fn new(compiler: UnitCompiler, max_concurrency: usize) -> Self {
        Self {
            compiler,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Generator backend in use
    pub fn backend(&self) -> &'static str {
        self.compiler.backend()
    }

    /// Compile every component that is `dirty`, has no previous signature,
    /// or composes a child whose signature changed in this run.
    ///
    /// `previous` holds the signatures of units already accepted; components
    /// that need no work keep them. Returns only the units compiled here.
    pub async fn run(
        &self,
        specs: &BTreeMap<String, ComponentSpec>,
        contract: &DesignSystemContract,
        dirty: &BTreeSet<String>,
        previous: &BTreeMap<String, ComponentSignature>,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, CompiledUnit>, ScheduleError> {
        let graph = ComponentGraph::new(specs.values());
        let semaphore = Semaphore::new(self.max_concurrency);

        let mut signatures = previous.clone();
        let mut surface_changed: BTreeSet<String> = BTreeSet::new();
        let mut compiled: BTreeMap<String, CompiledUnit> = BTreeMap::new();
        let mut failures: Vec<(String, Error)> = Vec::new();
        let mut failed: BTreeSet<String> = BTreeSet::new();
        let mut blocked: BTreeSet<String> = BTreeSet::new();

        for (index, wave) in graph.waves().into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ScheduleError::Cancelled);
            }

            let mut work = Vec::new();
            for name in wave {
                let Some(spec) = specs.get(&name) else {
                    continue;
                };
                let children = graph.children_of(&name);
                if children
                    .iter()
                    .any(|c| failed.contains(c) || blocked.contains(c))
                {
                    debug!(component = %name, "blocked by a failed descendant");
                    blocked.insert(name);
                    continue;
                }

                let needed = dirty.contains(&name)
                    || !signatures.contains_key(&name)
                    || children.iter().any(|c| surface_changed.contains(c));
                if !needed {
                    continue;
                }

                let child_signatures: BTreeMap<String, ComponentSignature> = children
                    .iter()
                    .filter_map(|c| signatures.get(c).map(|s| (c.clone(), s.clone())))
                    .collect();
                let compiler = &self.compiler;
                let semaphore = &semaphore;
                work.push(async move {
                    let _permit = semaphore.acquire().await.ok();
                    let result = compiler.compile(spec, contract, &child_signatures).await;
                    (name, result)
                });
            }

            if work.is_empty() {
                continue;
            }
            info!(wave = index, units = work.len(), "generating wave");

            let results = tokio::select! {
                _ = cancel.cancelled() => return Err(ScheduleError::Cancelled),
                results = join_all(work) => results,
            };

            for (name, result) in results {
                match result {
                    Ok(unit) => {
                        let fingerprint = unit.unit.signature.fingerprint();
                        if previous.get(&name).map(ComponentSignature::fingerprint)
                            != Some(fingerprint)
                        {
                            surface_changed.insert(name.clone());
                        }
                        signatures.insert(name.clone(), unit.unit.signature.clone());
                        compiled.insert(name, unit);
                    }
                    Err(error) => {
                        warn!(component = %name, error = %error, "component failed");
                        failed.insert(name.clone());
                        failures.push((name, error.into()));
                    }
                }
            }
        }

        if failures.is_empty() {
            Ok(compiled)
        } else {
            Err(ScheduleError::Failed {
                failures,
                blocked: blocked.into_iter().collect(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uiforge_codegen::TemplateGenerator;
    use uiforge_core::component::{PropSpec, StyleHint, StyleProperty, TypeRef};

    fn tree() -> BTreeMap<String, ComponentSpec> {
        let mut app = ComponentSpec::new("App");
        app.children = vec!["Header".into(), "Footer".into()];
        let mut header = ComponentSpec::new("Header");
        header.children = vec!["Logo".into()];
        let logo = ComponentSpec::new("Logo");
        let footer = ComponentSpec::new("Footer");
        [app, header, logo, footer]
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect()
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(UnitCompiler::new(Arc::new(TemplateGenerator::new())), 2)
    }

    fn everything(specs: &BTreeMap<String, ComponentSpec>) -> BTreeSet<String> {
        specs.keys().cloned().collect()
    }

    fn signatures(units: &BTreeMap<String, CompiledUnit>) -> BTreeMap<String, ComponentSignature> {
        units
            .iter()
            .map(|(n, u)| (n.clone(), u.unit.signature.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_full_run_compiles_every_component() {
        let specs = tree();
        let units = scheduler()
            .run(
                &specs,
                &DesignSystemContract::builtin(),
                &everything(&specs),
                &BTreeMap::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(units.len(), 4);
        assert!(units["App"].unit.tsx.contains("<Header />"));
    }

    #[tokio::test]
    async fn test_surface_change_reaches_parent_only() {
        let contract = DesignSystemContract::builtin();
        let scheduler = scheduler();
        let mut specs = tree();
        let first = scheduler
            .run(&specs, &contract, &everything(&specs), &BTreeMap::new(), &CancellationToken::new())
            .await
            .unwrap();
        let previous = signatures(&first);

        specs.get_mut("Logo").unwrap().props.push(PropSpec {
            name: "alt".into(),
            ty: TypeRef::String,
            required: false,
            default: None,
        });
        let dirty = BTreeSet::from(["Logo".to_string()]);
        let second = scheduler
            .run(&specs, &contract, &dirty, &previous, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.keys().collect::<Vec<_>>(), vec!["Header", "Logo"]);
    }

    #[tokio::test]
    async fn test_unchanged_surface_stops_at_child() {
        let contract = DesignSystemContract::builtin();
        let scheduler = scheduler();
        let mut specs = tree();
        let first = scheduler
            .run(&specs, &contract, &everything(&specs), &BTreeMap::new(), &CancellationToken::new())
            .await
            .unwrap();

        specs.get_mut("Logo").unwrap().layout.styles.push(StyleHint {
            target: "root".into(),
            property: StyleProperty::Color,
            value: "primary-default".into(),
        });
        let dirty = BTreeSet::from(["Logo".to_string()]);
        let second = scheduler
            .run(&specs, &contract, &dirty, &signatures(&first), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.keys().collect::<Vec<_>>(), vec!["Logo"]);
    }

    #[tokio::test]
    async fn test_failure_blocks_ancestors_but_not_siblings() {
        let mut specs = tree();
        specs.get_mut("Logo").unwrap().layout.styles.push(StyleHint {
            target: "root".into(),
            property: StyleProperty::Color,
            value: "red".into(),
        });
        let err = scheduler()
            .run(
                &specs,
                &DesignSystemContract::builtin(),
                &everything(&specs),
                &BTreeMap::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        let ScheduleError::Failed { failures, blocked } = err else {
            panic!("expected failure");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "Logo");
        assert_eq!(blocked, vec!["App".to_string(), "Header".to_string()]);

        let error: Error = ScheduleError::Failed { failures, blocked }.into();
        assert!(matches!(error, Error::BuildBlocked { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_wave() {
        let specs = tree();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = scheduler()
            .run(&specs, &DesignSystemContract::builtin(), &everything(&specs), &BTreeMap::new(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Cancelled));
    }
}
