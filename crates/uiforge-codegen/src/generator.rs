//! Component generators
//!
//! A generator turns one `ComponentSpec` into a [`GeneratedUnit`]. Two
//! backends exist: [`TemplateGenerator`] emits deterministic source with no
//! provider involved, and [`ProviderGenerator`] asks the provider for a TSX
//! and a CSS block, passing along any violations from a previous attempt.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use uiforge_core::provider::{ProviderClient, ProviderRequest, Stage, extract_fenced};
use uiforge_core::{ComponentSpec, DesignSystemContract};

use crate::emit;
use crate::error::Result;
use crate::ir::{ComponentSignature, GeneratedUnit, Violation};
use crate::prompts::{self, GENERATE_SYSTEM};

/// Everything a generator needs for one component
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// Component to generate
    pub spec: &'a ComponentSpec,
    /// Design system in force
    pub contract: &'a DesignSystemContract,
    /// Signatures of the children this component composes
    pub children: &'a BTreeMap<String, ComponentSignature>,
    /// Violations from the previous attempt, empty on the first
    pub corrections: &'a [Violation],
}

/// Produces source for one component
#[async_trait]
pub trait ComponentGenerator: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Generate TSX and CSS for the request
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<GeneratedUnit>;
}

/// Wrap generated text with the fingerprints it derives from
fn stamp(request: &GenerationRequest<'_>, tsx: String, css: String) -> GeneratedUnit {
    let child_surfaces = request
        .spec
        .children
        .iter()
        .filter_map(|name| {
            request
                .children
                .get(name)
                .map(|sig| (name.clone(), sig.fingerprint()))
        })
        .collect();

    GeneratedUnit {
        component: request.spec.name.clone(),
        tsx,
        css,
        spec_fingerprint: request.spec.fingerprint(),
        contract_fingerprint: request.contract.fingerprint().clone(),
        signature: ComponentSignature::of(request.spec),
        child_surfaces,
    }
}

/// Deterministic generator backed by the built-in emitter
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

impl TemplateGenerator {
    /// Create a template generator
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ComponentGenerator for TemplateGenerator {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<GeneratedUnit> {
        if !request.corrections.is_empty() {
            debug!(
                component = %request.spec.name,
                corrections = request.corrections.len(),
                "template output is deterministic; corrections do not change it"
            );
        }
        let emitted = emit::emit(request.spec, request.contract, request.children);
        Ok(stamp(request, emitted.tsx, emitted.css))
    }
}

/// Generator that delegates to the provider
pub struct ProviderGenerator {
    client: Arc<ProviderClient>,
}

impl ProviderGenerator {
    /// Create a provider-backed generator
    pub fn new(client: Arc<ProviderClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ComponentGenerator for ProviderGenerator {
    fn name(&self) -> &'static str {
        "provider"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<GeneratedUnit> {
        let children: Vec<&ComponentSignature> = request
            .spec
            .children
            .iter()
            .filter_map(|name| request.children.get(name))
            .collect();
        let prompt = prompts::generate_prompt(
            request.spec,
            request.contract,
            &children,
            request.corrections,
        )?;
        let provider_request =
            ProviderRequest::new(Stage::Generate, prompt).with_system(GENERATE_SYSTEM);

        let response = self.client.complete(&provider_request).await?;
        let (tsx, css) = split_response(&response.text);
        debug!(
            component = %request.spec.name,
            tsx_bytes = tsx.len(),
            css_bytes = css.len(),
            "provider returned unit"
        );
        Ok(stamp(request, tsx, css))
    }
}

/// Pull the TSX and CSS blocks out of a provider reply.
///
/// A missing TSX block yields empty source, which the validator reports as
/// a syntax defect and the corrective loop can act on.
fn split_response(text: &str) -> (String, String) {
    let tsx = extract_fenced(text, "tsx")
        .or_else(|| extract_fenced(text, "typescript"))
        .unwrap_or_default();
    let css = extract_fenced(text, "css").unwrap_or("/* no styles */");
    (tsx.trim().to_string() + "\n", css.trim().to_string() + "\n")
}
