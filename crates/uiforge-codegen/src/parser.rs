//! Requirements text to component IR
//!
//! The provider proposes a component tree as JSON; the parser decodes it,
//! allocates unique component names, and validates the batch before anything enters
//! the pipeline. A schema violation earns one corrective re-prompt (bounded by
//! `schema_retries`) with the issue list appended, then fails hard.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use uiforge_core::graph::ComponentGraph;
use uiforge_core::provider::{ProviderClient, ProviderRequest, Stage, extract_json};
use uiforge_core::schema::{SchemaIssue, validate_batch};
use uiforge_core::ComponentSpec;

use crate::error::{Error, Result};
use crate::prompts::{self, PARSE_SYSTEM};

/// A validated batch: one acyclic tree, root first
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBatch {
    /// Name of the single root component
    pub root: String,
    /// Components in pre-order from the root
    pub specs: Vec<ComponentSpec>,
}

/// Sole authority for component names.
///
/// Names are normalized to PascalCase and made unique against everything
/// already taken by appending a counter (`Button`, `Button2`, ...).
#[derive(Debug, Clone, Default)]
pub struct NameAllocator {
    taken: BTreeSet<String>,
}

impl NameAllocator {
    /// An allocator that will not hand out any of `taken`
    pub fn new<I, S>(taken: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            taken: taken.into_iter().map(Into::into).collect(),
        }
    }

    /// `todo item` / `todo-item` / `todoItem` → `TodoItem`
    pub fn normalize(raw: &str) -> String {
        let mut out = String::new();
        for piece in raw.split(|c: char| !c.is_ascii_alphanumeric()) {
            let mut chars = piece.chars();
            if let Some(first) = chars.next() {
                out.push(first.to_ascii_uppercase());
                out.extend(chars);
            }
        }
        if out.is_empty() {
            return "Component".to_string();
        }
        if out.starts_with(|c: char| c.is_ascii_digit()) {
            out.insert_str(0, "Component");
        }
        out
    }

    /// Allocate a unique name derived from `proposed`
    pub fn allocate(&mut self, proposed: &str) -> String {
        let base = Self::normalize(proposed);
        let mut candidate = base.clone();
        let mut counter = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{}{}", base, counter);
            counter += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}

#[derive(Debug, Deserialize)]
struct RawParse {
    #[serde(default)]
    ambiguities: Vec<RawAmbiguity>,
    #[serde(default)]
    root: Option<String>,
    #[serde(default)]
    components: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawAmbiguity {
    fragment: String,
    #[serde(default)]
    alternatives: Vec<String>,
}

/// Natural language → validated `ComponentSpec` batch
pub struct RequirementsParser {
    client: Arc<ProviderClient>,
    schema_retries: u32,
}

impl RequirementsParser {
    /// Create a parser with one corrective retry
    pub fn new(client: Arc<ProviderClient>) -> Self {
        Self {
            client,
            schema_retries: 1,
        }
    }

    /// Set the number of corrective re-prompts after a schema violation
    pub fn with_schema_retries(mut self, retries: u32) -> Self {
        self.schema_retries = retries;
        self
    }

    /// Name allocator seeded with the names already in use
    pub fn name_allocator<'a>(&self, existing: impl IntoIterator<Item = &'a str>) -> NameAllocator {
        NameAllocator::new(existing)
    }

    /// Parse requirements text into a validated batch
    pub async fn parse(&self, requirements: &str) -> Result<ParsedBatch> {
        let mut issues: Vec<String> = Vec::new();
        let mut attempt = 0;

        loop {
            let prompt = prompts::parse_prompt(requirements, &issues)?;
            let request = ProviderRequest::new(Stage::Parse, prompt).with_system(PARSE_SYSTEM);
            let response = self.client.complete(&request).await?;

            match self.interpret(&response.text) {
                Ok(batch) => {
                    info!(
                        root = %batch.root,
                        components = batch.specs.len(),
                        attempts = attempt + 1,
                        "parsed requirements"
                    );
                    return Ok(batch);
                }
                Err(Error::Core(uiforge_core::Error::SchemaViolation { issues: found }))
                    if attempt < self.schema_retries =>
                {
                    attempt += 1;
                    warn!(
                        attempt = attempt,
                        issues = found.len(),
                        "parsed IR failed validation, re-prompting with corrections"
                    );
                    issues = found.iter().map(ToString::to_string).collect();
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Decode and validate one provider answer
    pub fn interpret(&self, text: &str) -> Result<ParsedBatch> {
        let json = extract_json(text).ok_or_else(|| {
            violation(vec![SchemaIssue::batch("response contains no JSON object")])
        })?;
        let raw: RawParse = serde_json::from_str(json).map_err(|e| {
            violation(vec![SchemaIssue::batch(format!(
                "response does not match the component tree shape: {}",
                e
            ))])
        })?;

        if let Some(ambiguity) = raw.ambiguities.into_iter().next() {
            return Err(Error::AmbiguousRequirement {
                fragment: ambiguity.fragment,
                alternatives: ambiguity.alternatives,
            });
        }

        let mut specs = Vec::with_capacity(raw.components.len());
        let mut issues = Vec::new();
        for (index, value) in raw.components.into_iter().enumerate() {
            let label = value
                .get("name")
                .and_then(|n| n.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("components[{}]", index));
            match serde_json::from_value::<ComponentSpec>(value) {
                Ok(spec) => specs.push(spec),
                Err(e) => issues.push(SchemaIssue::at(&label, "shape", e.to_string())),
            }
        }
        if !issues.is_empty() {
            return Err(violation(issues));
        }

        self.assign_names(&mut specs);

        let root = validate_batch(&specs)?;
        if let Some(proposed) = raw.root.as_deref() {
            if NameAllocator::normalize(proposed) != root {
                debug!(proposed = proposed, root = %root, "provider named a different root");
            }
        }

        Ok(ParsedBatch {
            specs: preorder(&root, specs),
            root,
        })
    }
}

impl RequirementsParser {
    /// Give every proposed component a unique PascalCase name and point
    /// child references at the renamed components.
    ///
    /// A child reference resolves to the component proposed under exactly
    /// that spelling, else to the first one that normalizes the same way.
    fn assign_names(&self, specs: &mut [ComponentSpec]) {
        let mut allocator = self.name_allocator(std::iter::empty());
        let mut exact: BTreeMap<String, String> = BTreeMap::new();
        let mut normalized: BTreeMap<String, String> = BTreeMap::new();

        for spec in specs.iter_mut() {
            let base = NameAllocator::normalize(&spec.name);
            let name = allocator.allocate(&spec.name);
            if name != base {
                debug!(proposed = %spec.name, name = %name, "component name already taken");
            }
            exact.entry(spec.name.clone()).or_insert_with(|| name.clone());
            normalized.entry(base).or_insert_with(|| name.clone());
            spec.name = name;
        }

        for spec in specs.iter_mut() {
            for child in &mut spec.children {
                let base = NameAllocator::normalize(child);
                *child = exact
                    .get(child.as_str())
                    .or_else(|| normalized.get(&base))
                    .cloned()
                    .unwrap_or(base);
            }
        }
    }
}

fn violation(issues: Vec<SchemaIssue>) -> Error {
    Error::Core(uiforge_core::Error::SchemaViolation { issues })
}

fn preorder(root: &str, specs: Vec<ComponentSpec>) -> Vec<ComponentSpec> {
    let graph = ComponentGraph::new(&specs);
    let mut order = Vec::new();
    let mut seen = BTreeSet::new();
    let mut stack = vec![root.to_string()];
    while let Some(name) = stack.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        stack.extend(graph.children_of(&name).iter().rev().cloned());
        order.push(name);
    }

    let mut specs = specs;
    specs.sort_by_key(|s| order.iter().position(|n| *n == s.name).unwrap_or(usize::MAX));
    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use uiforge_core::provider::ScriptedProvider;
    use uiforge_core::retry::RetryPolicy;

    const COUNTER: &str = r#"```json
{
  "root": "Counter",
  "components": [{
    "name": "Counter",
    "description": "counter with increment, decrement, reset",
    "state": [{"name": "count", "type": "number", "initial": 0}],
    "handlers": [
      {"name": "increment", "trigger": "click", "effect": "adds one", "affects": "count", "action": {"kind": "increment"}},
      {"name": "decrement", "trigger": "click", "effect": "subtracts one", "affects": "count", "action": {"kind": "decrement"}},
      {"name": "reset", "trigger": "click", "effect": "back to zero", "affects": "count", "action": {"kind": "reset"}}
    ]
  }]
}
```"#;

    fn parser(provider: ScriptedProvider) -> (RequirementsParser, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let client = ProviderClient::new(provider.clone(), RetryPolicy::default());
        (RequirementsParser::new(Arc::new(client)), provider)
    }

    #[rstest]
    #[case("todo item", "TodoItem")]
    #[case("todo-item", "TodoItem")]
    #[case("todoItem", "TodoItem")]
    #[case("Header", "Header")]
    #[case("3d view", "Component3dView")]
    #[case("", "Component")]
    fn test_normalize(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(NameAllocator::normalize(raw), expected);
    }

    #[test]
    fn test_allocate_is_unique() {
        let mut names = NameAllocator::new(["Button", "Button2"]);
        assert_eq!(names.allocate("button"), "Button3");
        assert_eq!(names.allocate("badge"), "Badge");
        assert_eq!(names.allocate("badge"), "Badge2");
    }

    #[tokio::test]
    async fn test_parse_counter() {
        let (parser, _) = parser(ScriptedProvider::new().reply(Stage::Parse, COUNTER));
        let batch = parser.parse("counter with increment, decrement, reset, starting at 0").await.unwrap();

        assert_eq!(batch.root, "Counter");
        assert_eq!(batch.specs.len(), 1);
        let counter = &batch.specs[0];
        assert_eq!(counter.state[0].name, "count");
        assert_eq!(counter.state[0].initial, serde_json::json!(0));
        assert_eq!(counter.handlers.len(), 3);
    }

    #[tokio::test]
    async fn test_schema_violation_retried_once_with_issues() {
        let broken = r#"{"components": [{"name": "Counter", "state": [{"name": "count", "type": "number", "initial": "zero"}]}]}"#;
        let (parser, provider) = parser(
            ScriptedProvider::new()
                .reply(Stage::Parse, broken)
                .reply(Stage::Parse, COUNTER),
        );

        let batch = parser.parse("a counter").await.unwrap();
        assert_eq!(batch.root, "Counter");

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].prompt.contains("Counter.state.count"));
    }

    #[tokio::test]
    async fn test_schema_violation_after_bound_is_hard_failure() {
        let cyclic = r#"{"components": [
            {"name": "Root", "children": ["A"]},
            {"name": "A", "children": ["B"]},
            {"name": "B", "children": ["A"]}
        ]}"#;
        let (parser, provider) = parser(
            ScriptedProvider::new()
                .reply(Stage::Parse, cyclic)
                .reply(Stage::Parse, cyclic),
        );

        let err = parser.parse("tree").await.unwrap_err();
        match err {
            Error::Core(uiforge_core::Error::SchemaViolation { issues }) => {
                assert!(issues.iter().any(|i| i.message.contains("cycle")));
            }
            other => panic!("expected schema violation, got {:?}", other),
        }
        assert_eq!(provider.calls(Stage::Parse), 2);
    }

    #[tokio::test]
    async fn test_ambiguity_is_surfaced() {
        let answer = r#"{"ambiguities": [{"fragment": "a list of cards", "alternatives": ["a grid of cards", "a carousel"]}], "components": []}"#;
        let (parser, provider) = parser(ScriptedProvider::new().reply(Stage::Parse, answer));

        let err = parser.parse("show a list of cards").await.unwrap_err();
        match err {
            Error::AmbiguousRequirement { fragment, alternatives } => {
                assert_eq!(fragment, "a list of cards");
                assert_eq!(alternatives.len(), 2);
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
        assert_eq!(provider.calls(Stage::Parse), 1);
    }

    #[test]
    fn test_interpret_normalizes_names_and_orders_from_root() {
        let (parser, _) = parser(ScriptedProvider::new());
        let answer = r#"{"components": [
            {"name": "todo item", "props": [{"name": "text", "type": "string"}]},
            {"name": "todo app", "children": ["todo list"]},
            {"name": "todo list", "children": ["todo item"]}
        ]}"#;
        let batch = parser.interpret(answer).unwrap();
        assert_eq!(batch.root, "TodoApp");
        let names: Vec<_> = batch.specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["TodoApp", "TodoList", "TodoItem"]);
    }

    #[test]
    fn test_interpret_reports_unknown_type() {
        let (parser, _) = parser(ScriptedProvider::new());
        let answer = r#"{"components": [{"name": "Clock", "state": [{"name": "now", "type": "Date", "initial": 0}]}]}"#;
        let err = parser.interpret(answer).unwrap_err();
        assert!(err.to_string().contains("Clock.shape"));
    }

    #[test]
    fn test_interpret_allocates_unique_names_for_colliding_spellings() {
        let (parser, _) = parser(ScriptedProvider::new());
        let answer = r#"{"components": [
            {"name": "todo app", "children": ["todo-item", "TodoItem"]},
            {"name": "todo-item", "props": [{"name": "text", "type": "string"}]},
            {"name": "TodoItem", "props": [{"name": "done", "type": "boolean"}]}
        ]}"#;
        let batch = parser.interpret(answer).unwrap();

        let names: Vec<_> = batch.specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["TodoApp", "TodoItem", "TodoItem2"]);
        assert_eq!(batch.specs[0].children, vec!["TodoItem", "TodoItem2"]);
        assert_eq!(batch.specs[1].props[0].name, "text");
        assert_eq!(batch.specs[2].props[0].name, "done");
    }

    #[test]
    fn test_interpret_keeps_source_fragments() {
        let (parser, _) = parser(ScriptedProvider::new());
        let answer = r#"{"components": [
            {"name": "Counter", "source": "a counter starting at 0", "description": "counts"}
        ]}"#;
        let batch = parser.interpret(answer).unwrap();
        assert_eq!(batch.specs[0].fragment(), "a counter starting at 0");
    }
}
