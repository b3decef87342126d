//! Integration tests: build, change requests, rollback and sessions

use rstest::{fixture, rstest};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use uiforge_codegen::DefectClass;
use uiforge_core::config::{Backend, PipelineSettings};
use uiforge_core::provider::{ProviderClient, ProviderError, ScriptedProvider, Stage};
use uiforge_core::retry::RetryPolicy;
use uiforge_core::{DesignSystemContract, Provider};
use uiforge_runtime::{
    ChangeKind, ChangeRequest, Error, Outcome, Phase, Pipeline, ProjectState, Session,
};

const COUNTER: &str = r#"{
  "root": "Counter",
  "components": [
    {
      "name": "Counter",
      "description": "A counter starting at 0",
      "state": [{"name": "count", "type": "number", "initial": 0}],
      "handlers": [
        {"name": "increment", "trigger": "click", "effect": "adds one", "affects": "count", "action": {"kind": "increment"}},
        {"name": "decrement", "trigger": "click", "effect": "subtracts one", "affects": "count", "action": {"kind": "decrement"}},
        {"name": "reset", "trigger": "click", "effect": "back to zero", "affects": "count", "action": {"kind": "reset"}}
      ]
    }
  ]
}"#;

const DASHBOARD: &str = r#"{
  "root": "Dashboard",
  "components": [
    {
      "name": "Dashboard",
      "description": "A greeting banner above a counter",
      "state": [{"name": "message", "type": "string", "initial": "Hello"}],
      "children": ["Banner", "Counter"],
      "layout": {"spacing": "lg"}
    },
    {
      "name": "Banner",
      "description": "Shows a message",
      "props": [{"name": "message", "type": "string"}]
    },
    {
      "name": "Counter",
      "description": "A counter starting at 0",
      "state": [{"name": "count", "type": "number", "initial": 0}],
      "handlers": [
        {"name": "increment", "trigger": "click", "effect": "adds one", "affects": "count", "action": {"kind": "increment"}}
      ]
    }
  ]
}"#;

struct Harness {
    provider: Arc<ScriptedProvider>,
    pipeline: Pipeline,
}

fn harness(provider: ScriptedProvider) -> Harness {
    let provider = Arc::new(provider);
    let client = Arc::new(ProviderClient::new(
        provider.clone() as Arc<dyn Provider>,
        RetryPolicy::immediate(2, Duration::from_secs(5)),
    ));
    let pipeline = Pipeline::new(
        Arc::new(DesignSystemContract::builtin()),
        client,
        &PipelineSettings::default(),
    );
    Harness { provider, pipeline }
}

/// A pipeline that asks the provider for source instead of using templates
fn provider_backed(provider: Arc<ScriptedProvider>) -> Pipeline {
    let client = Arc::new(ProviderClient::new(
        provider as Arc<dyn Provider>,
        RetryPolicy::immediate(2, Duration::from_secs(5)),
    ));
    let settings = PipelineSettings {
        backend: Backend::Provider,
        ..PipelineSettings::default()
    };
    Pipeline::new(Arc::new(DesignSystemContract::builtin()), client, &settings)
}

fn feedback(mutations: &str) -> String {
    format!("```json\n{{\"mutations\": [{}]}}\n```", mutations)
}

#[fixture]
fn dashboard() -> ScriptedProvider {
    ScriptedProvider::new().reply(Stage::Parse, DASHBOARD)
}

async fn built(harness: &Harness) -> ProjectState {
    harness.pipeline.build("a dashboard").await.unwrap()
}

#[tokio::test]
async fn test_counter_builds_clean() {
    let harness = harness(ScriptedProvider::new().reply(Stage::Parse, COUNTER));
    let state = harness
        .pipeline
        .build("counter with increment, decrement, reset, starting at 0")
        .await
        .unwrap();

    assert_eq!(state.root(), "Counter");
    assert_eq!(state.len(), 1);
    let entry = state.entry("Counter").unwrap();
    assert_eq!(entry.spec.state.len(), 1);
    assert_eq!(entry.spec.state[0].name, "count");
    assert_eq!(entry.spec.state[0].ty.ts(), "number");
    assert_eq!(entry.spec.state[0].initial, serde_json::json!(0));
    assert_eq!(entry.spec.handlers.len(), 3);
    assert!(entry.validation.passed);
    assert!(entry.validation.violations.is_empty());
    assert!(state.history().is_empty());
    assert!(state.stale(harness.pipeline.contract()).is_empty());
}

#[tokio::test]
async fn test_red_increment_button_rolls_back() {
    let harness = harness(
        ScriptedProvider::new().reply(Stage::Parse, COUNTER).reply(
            Stage::Feedback,
            feedback(
                r#"{"op": "set_style", "component": "Counter", "target": "increment", "property": "background", "value": "red"}"#,
            ),
        ),
    );
    let state = harness.pipeline.build("counter").await.unwrap();
    let before = state.digest().unwrap();

    let err = harness
        .pipeline
        .apply_feedback(&ChangeRequest::new("make the increment button red"), &state)
        .await
        .unwrap_err();

    let report = err.rollback().expect("rollback report");
    assert_eq!(report.phase, Phase::Regenerating);
    assert_eq!(report.defect, Some(DefectClass::TokenContract));
    assert!(!report.violations.is_empty());
    assert_eq!(report.attempted.mutations.len(), 1);
    assert_eq!(report.attempted.specs[0].kind, ChangeKind::Modified);
    assert_eq!(state.digest().unwrap(), before);
    assert!(state.history().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_leaf_style_change_leaves_parent_alone(dashboard: ScriptedProvider) {
    let harness = harness(dashboard.reply(
        Stage::Feedback,
        feedback(
            r#"{"op": "set_style", "component": "Banner", "target": "root", "property": "color", "value": "primary-default"}"#,
        ),
    ));
    let state = built(&harness).await;

    let next = harness
        .pipeline
        .apply_feedback(
            &ChangeRequest::scoped("use the primary color", ["Banner"]),
            &state,
        )
        .await
        .unwrap();

    let iteration = &next.history()[0];
    assert_eq!(iteration.outcome, Outcome::Committed);
    assert_eq!(iteration.diff.regenerated, vec!["Banner".to_string()]);
    assert!(next.unit("Banner").unwrap().css.contains("var(--color-primary-default)"));
    assert_eq!(next.unit("Dashboard"), state.unit("Dashboard"));
    assert_eq!(next.unit("Counter"), state.unit("Counter"));
}

#[rstest]
#[tokio::test]
async fn test_surface_change_regenerates_ancestors_only(dashboard: ScriptedProvider) {
    let harness = harness(dashboard.reply(
        Stage::Feedback,
        feedback(
            r#"{"op": "add_prop", "component": "Banner", "prop": {"name": "tone", "type": "\"info\" | \"warning\"", "required": false, "default": "info"}}"#,
        ),
    ));
    let state = built(&harness).await;

    let next = harness
        .pipeline
        .apply_feedback(&ChangeRequest::new("give the banner a tone"), &state)
        .await
        .unwrap();

    let diff = &harness.pipeline.history(&next)[0].diff;
    assert_eq!(diff.regenerated, vec!["Banner".to_string(), "Dashboard".to_string()]);
    assert_eq!(next.unit("Counter"), state.unit("Counter"));
    assert_ne!(
        next.unit("Banner").unwrap().signature,
        state.unit("Banner").unwrap().signature
    );
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let harness = harness(
        ScriptedProvider::new()
            .reply(Stage::Parse, DASHBOARD)
            .reply(Stage::Parse, DASHBOARD),
    );
    let first = built(&harness).await;
    let second = built(&harness).await;

    for (name, entry) in first.entries() {
        let again = second.entry(name).unwrap();
        assert_eq!(entry.unit.code_digest(), again.unit.code_digest());
        assert_eq!(entry.validation.passed, again.validation.passed);
    }
}

#[rstest]
#[tokio::test]
async fn test_mutation_outside_scope_rolls_back(dashboard: ScriptedProvider) {
    let harness = harness(dashboard.reply(
        Stage::Feedback,
        feedback(r#"{"op": "remove_handler", "component": "Counter", "name": "increment"}"#),
    ));
    let state = built(&harness).await;

    let err = harness
        .pipeline
        .apply_feedback(&ChangeRequest::scoped("shorten the text", ["Banner"]), &state)
        .await
        .unwrap_err();

    let report = err.rollback().unwrap();
    assert_eq!(report.phase, Phase::Mutating);
    assert!(report.reason.contains("Counter"));
}

#[rstest]
#[tokio::test]
async fn test_created_component_gets_unique_name(dashboard: ScriptedProvider) {
    let harness = harness(dashboard.reply(
        Stage::Feedback,
        feedback(
            r#"{"op": "create_component", "parent": "Dashboard", "spec": {"name": "counter", "description": "A second counter", "state": [{"name": "count", "type": "number", "initial": 0}]}}"#,
        ),
    ));
    let state = built(&harness).await;

    let next = harness
        .pipeline
        .apply_feedback(
            &ChangeRequest::scoped("add another counter", ["Dashboard"]),
            &state,
        )
        .await
        .unwrap();

    assert!(next.entry("Counter2").is_some());
    assert_eq!(next.spec("Counter2").unwrap().fragment(), "add another counter");
    assert_eq!(
        next.spec("Dashboard").unwrap().children,
        vec!["Banner", "Counter", "Counter2"]
    );
    assert!(next.unit("Dashboard").unwrap().tsx.contains("<Counter2 />"));
    let added: Vec<_> = next.history()[0]
        .diff
        .specs
        .iter()
        .filter(|c| c.kind == ChangeKind::Added)
        .map(|c| c.component.as_str())
        .collect();
    assert_eq!(added, vec!["Counter2"]);
}

#[rstest]
#[tokio::test]
async fn test_unscoped_request_without_match(dashboard: ScriptedProvider) {
    let harness = harness(dashboard);
    let state = built(&harness).await;

    let err = harness
        .pipeline
        .apply_feedback(&ChangeRequest::new("make it pop"), &state)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnscopedAmbiguous { .. }));
    assert_eq!(harness.provider.calls(Stage::Feedback), 0);
}

#[rstest]
#[tokio::test]
async fn test_cancel_while_waiting_on_provider(dashboard: ScriptedProvider) {
    let harness = harness(dashboard.stall(Stage::Feedback, Duration::from_secs(3)));
    let state = built(&harness).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = harness
        .pipeline
        .apply_feedback_with(&ChangeRequest::scoped("anything", ["Banner"]), &state, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_provider_exhaustion_surfaces() {
    let harness = harness(
        ScriptedProvider::new()
            .fail(Stage::Parse, ProviderError::transient("503 service unavailable"))
            .fail(Stage::Parse, ProviderError::transient("503 service unavailable")),
    );

    let err = harness.pipeline.build("a counter").await.unwrap_err();
    assert!(matches!(err, Error::ProviderUnavailable { attempts: 2, .. }));
}

#[rstest]
#[tokio::test]
async fn test_session_journals_commits_and_rollbacks(dashboard: ScriptedProvider) {
    let harness = harness(
        dashboard
            .reply(
                Stage::Feedback,
                feedback(
                    r#"{"op": "set_layout", "component": "Counter", "container": "card"}"#,
                ),
            )
            .reply(
                Stage::Feedback,
                feedback(
                    r#"{"op": "set_style", "component": "Counter", "target": "root", "property": "padding", "value": "12px"}"#,
                ),
            ),
    );
    let state = built(&harness).await;
    let session = Session::new(Arc::new(harness.pipeline), state);
    let cancel = CancellationToken::new();

    let committed = session
        .apply(ChangeRequest::scoped("put the counter in a card", ["Counter"]), &cancel)
        .await
        .unwrap();
    assert_eq!(committed.history().len(), 1);

    let err = session
        .apply(ChangeRequest::scoped("pad the counter", ["Counter"]), &cancel)
        .await
        .unwrap_err();
    let report = err.rollback().expect("rollback report");
    assert_eq!(report.defect, Some(DefectClass::TokenContract));

    let current = session.current().await;
    assert_eq!(current.digest().unwrap(), committed.digest().unwrap());

    let journal = session.journal().await;
    let outcomes: Vec<Outcome> = journal.iter().map(|i| i.outcome).collect();
    assert_eq!(outcomes, vec![Outcome::Committed, Outcome::RolledBack]);
}

#[tokio::test]
async fn test_cancel_during_regeneration_rolls_back() {
    let harness = harness(ScriptedProvider::new().reply(Stage::Parse, COUNTER));
    let state = harness.pipeline.build("counter").await.unwrap();
    let before = state.digest().unwrap();

    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(
                Stage::Feedback,
                feedback(r#"{"op": "set_layout", "component": "Counter", "container": "card"}"#),
            )
            .stall(Stage::Generate, Duration::from_secs(3)),
    );
    let pipeline = provider_backed(provider.clone());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = pipeline
        .apply_feedback_with(
            &ChangeRequest::scoped("put the counter in a card", ["Counter"]),
            &state,
            &cancel,
        )
        .await
        .unwrap_err();

    let report = err.rollback().expect("rollback report");
    assert_eq!(report.reason, "cancelled");
    assert_eq!(report.phase, Phase::Regenerating);
    assert_eq!(report.attempted.mutations.len(), 1);
    assert_eq!(provider.calls(Stage::Generate), 1);
    assert_eq!(state.digest().unwrap(), before);
    assert!(state.history().is_empty());
}

#[tokio::test]
async fn test_failed_build_quotes_requirement_fragments() {
    let tree = r#"{
      "root": "Dashboard",
      "components": [
        {"name": "Dashboard", "source": "a dashboard", "children": ["Banner", "Counter"]},
        {"name": "Banner", "source": "a banner that greets the user", "props": [{"name": "message", "type": "string"}]},
        {"name": "Counter", "source": "a counter starting at 0", "state": [{"name": "count", "type": "number", "initial": 0}]}
      ]
    }"#;
    let broken = "```tsx\nexport function Broken() {\n  const x = ;\n  return <div>{x +}</div>;\n}\n```\n```css\n.broken {}\n```";
    let mut provider = ScriptedProvider::new().reply(Stage::Parse, tree);
    for _ in 0..4 {
        provider = provider.reply(Stage::Generate, broken);
    }
    let pipeline = provider_backed(Arc::new(provider));

    let err = pipeline.build("a dashboard").await.unwrap_err();
    match &err {
        Error::BuildBlocked { failed, blocked } => {
            assert_eq!(blocked, &vec!["Dashboard".to_string()]);
            assert_eq!(failed.len(), 2);
            assert!(failed.iter().any(|f| f.contains("a banner that greets the user")));
            assert!(failed.iter().any(|f| f.contains("a counter starting at 0")));
            assert!(failed.iter().all(|f| f.contains("syntax defect")));
        }
        other => panic!("expected a blocked build, got {:?}", other),
    }
    assert!(err.to_string().contains("a counter starting at 0"));
}
