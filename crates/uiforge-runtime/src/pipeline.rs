//! The orchestrator and the shared session
//!
//! [`Pipeline`] is the external contract: `build`, `apply_feedback` and
//! `history`. It never mutates a state in place; every call returns a new
//! snapshot or an error, and the snapshot passed in is still valid afterwards.
//!
//! [`Session`] holds one current snapshot for callers that share a project.
//! Commits go through a single writer; readers always see the last commit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use uiforge_codegen::{
    ComponentGenerator, ProviderGenerator, RequirementsParser, TemplateGenerator, UnitCompiler,
};
use uiforge_core::config::{Backend, PipelineSettings};
use uiforge_core::provider::Usage;
use uiforge_core::retry::RetryPolicy;
use uiforge_core::{ComponentSpec, Config, DesignSystemContract, Provider, ProviderClient};

use crate::error::{Error, Result};
use crate::feedback::FeedbackProcessor;
use crate::scheduler::Scheduler;
use crate::state::{ChangeRequest, ComponentEntry, Iteration, ProjectState};

/// Requirements in, validated component tree out; change requests applied
/// surgically on top
pub struct Pipeline {
    contract: Arc<DesignSystemContract>,
    client: Arc<ProviderClient>,
    parser: Arc<RequirementsParser>,
    scheduler: Scheduler,
    feedback: FeedbackProcessor,
}

impl Pipeline {
    /// Assemble a pipeline from its collaborators
    pub fn new(
        contract: Arc<DesignSystemContract>,
        client: Arc<ProviderClient>,
        settings: &PipelineSettings,
    ) -> Self {
        let generator: Arc<dyn ComponentGenerator> = match settings.backend {
            Backend::Template => Arc::new(TemplateGenerator::new()),
            Backend::Provider => Arc::new(ProviderGenerator::new(client.clone())),
        };
        let compiler =
            UnitCompiler::new(generator).with_corrective_retries(settings.corrective_retries);
        let scheduler = Scheduler::new(compiler, settings.max_concurrency);

        let parser = Arc::new(
            RequirementsParser::new(client.clone()).with_schema_retries(settings.schema_retries),
        );

        Self {
            feedback: FeedbackProcessor::new(client.clone(), scheduler.clone(), parser.clone()),
            parser,
            scheduler,
            client,
            contract,
        }
    }

    /// Assemble a pipeline from project configuration and a provider
    pub fn from_config(config: &Config, provider: Arc<dyn Provider>) -> Result<Self> {
        config.project.validate()?;
        let contract = config.load_contract()?;
        let client = Arc::new(ProviderClient::new(
            provider,
            RetryPolicy::from_settings(&config.project.provider),
        ));
        Ok(Self::new(contract, client, &config.project.pipeline))
    }

    /// The contract every unit is generated against
    pub fn contract(&self) -> &DesignSystemContract {
        &self.contract
    }

    /// Name of the generator backend
    pub fn backend(&self) -> &'static str {
        self.scheduler.backend()
    }

    /// Provider token usage so far
    pub fn usage(&self) -> Usage {
        self.client.usage()
    }

    /// Parse requirements and generate every component, children first
    pub async fn build(&self, requirements: &str) -> Result<ProjectState> {
        self.build_with(requirements, &CancellationToken::new()).await
    }

    /// [`build`](Self::build) with a cancellation token
    pub async fn build_with(
        &self,
        requirements: &str,
        cancel: &CancellationToken,
    ) -> Result<ProjectState> {
        let batch = self.parser.parse(requirements).await?;
        let specs: BTreeMap<String, ComponentSpec> = batch
            .specs
            .into_iter()
            .map(|spec| (spec.name.clone(), spec))
            .collect();
        let everything: BTreeSet<String> = specs.keys().cloned().collect();

        let mut compiled = self
            .scheduler
            .run(&specs, &self.contract, &everything, &BTreeMap::new(), cancel)
            .await?;

        let mut components = BTreeMap::new();
        for (name, spec) in specs {
            let unit = compiled
                .remove(&name)
                .ok_or_else(|| Error::Generation(format!("no unit was produced for '{}'", name)))?;
            components.insert(
                name,
                ComponentEntry {
                    spec,
                    unit: unit.unit,
                    validation: unit.validation,
                },
            );
        }

        info!(
            root = %batch.root,
            components = components.len(),
            backend = self.backend(),
            "project built"
        );
        Ok(ProjectState::new(
            batch.root,
            self.contract.fingerprint().clone(),
            components,
        ))
    }

    /// Apply a change request; on rollback the caller keeps `state`
    pub async fn apply_feedback(
        &self,
        request: &ChangeRequest,
        state: &ProjectState,
    ) -> Result<ProjectState> {
        self.apply_feedback_with(request, state, &CancellationToken::new())
            .await
    }

    /// [`apply_feedback`](Self::apply_feedback) with a cancellation token
    pub async fn apply_feedback_with(
        &self,
        request: &ChangeRequest,
        state: &ProjectState,
        cancel: &CancellationToken,
    ) -> Result<ProjectState> {
        let proposal = self
            .feedback
            .process(request, state, &self.contract, cancel)
            .await?;
        Ok(proposal.commit(request))
    }

    /// Committed change requests with their diffs, oldest first
    pub fn history<'a>(&self, state: &'a ProjectState) -> &'a [Iteration] {
        state.history()
    }
}

/// A shared project with single-writer commits
pub struct Session {
    pipeline: Arc<Pipeline>,
    state: RwLock<Arc<ProjectState>>,
    writer: Mutex<()>,
    journal: Mutex<Vec<Iteration>>,
}

impl Session {
    /// Start a session on an existing snapshot
    pub fn new(pipeline: Arc<Pipeline>, state: ProjectState) -> Self {
        Self {
            pipeline,
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// The last committed snapshot
    pub async fn current(&self) -> Arc<ProjectState> {
        self.state.read().await.clone()
    }

    /// Apply a change request and publish the result.
    ///
    /// Requests are serialized; readers keep seeing the previous snapshot
    /// until the new one is published.
    pub async fn apply(
        &self,
        request: ChangeRequest,
        cancel: &CancellationToken,
    ) -> Result<Arc<ProjectState>> {
        let _writer = self.writer.lock().await;
        let base = self.current().await;

        match self.pipeline.apply_feedback_with(&request, &base, cancel).await {
            Ok(next) => {
                let next = Arc::new(next);
                if let Some(iteration) = next.history().last() {
                    self.journal.lock().await.push(iteration.clone());
                }
                *self.state.write().await = next.clone();
                Ok(next)
            }
            Err(error) => {
                if let Some(report) = error.rollback() {
                    self.journal.lock().await.push(report.to_iteration());
                }
                warn!(request = %request.id, error = %error, "session kept its previous state");
                Err(error)
            }
        }
    }

    /// Every request this session handled, rollbacks included
    pub async fn journal(&self) -> Vec<Iteration> {
        self.journal.lock().await.clone()
    }
}
