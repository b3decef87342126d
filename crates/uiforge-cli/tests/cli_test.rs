use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::path::Path;

const COUNTER: &str = r#"{"root": "Counter", "components": [{"name": "Counter", "description": "A counter starting at 0", "state": [{"name": "count", "type": "number", "initial": 0}], "handlers": [{"name": "increment", "trigger": "click", "effect": "adds one", "affects": "count", "action": {"kind": "increment"}}, {"name": "decrement", "trigger": "click", "effect": "subtracts one", "affects": "count", "action": {"kind": "decrement"}}, {"name": "reset", "trigger": "click", "effect": "back to zero", "affects": "count", "action": {"kind": "reset"}}]}]}"#;

fn fixture(dir: &Path, file: &str, stage: &str, reply: &str) -> String {
    let path = dir.join(file);
    std::fs::write(&path, format!("{}:\n  - reply: '{}'\n", stage, reply)).unwrap();
    path.to_str().unwrap().to_string()
}

fn uiforge(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("uiforge");
    cmd.current_dir(dir)
        .env_remove("UIFORGE_BACKEND")
        .env_remove("RUST_LOG")
        .args(["--config", dir.to_str().unwrap()]);
    cmd
}

#[test]
fn test_tokens_lists_builtin_contract() {
    let dir = tempfile::tempdir().unwrap();

    uiforge(dir.path())
        .arg("tokens")
        .assert()
        .success()
        .stdout(predicate::str::contains("--color-danger-default"))
        .stdout(predicate::str::contains("--spacing-md"));

    uiforge(dir.path())
        .args(["tokens", "--category", "spacing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--spacing-md"))
        .stdout(predicate::str::contains("--color-").not());
}

#[test]
fn test_build_feedback_history() {
    let dir = tempfile::tempdir().unwrap();
    let requirements = dir.path().join("requirements.md");
    std::fs::write(&requirements, "counter with increment, decrement, reset, starting at 0").unwrap();
    let parse = fixture(dir.path(), "parse.yaml", "parse", COUNTER);

    uiforge(dir.path())
        .args(["build", requirements.to_str().unwrap(), "--replay", &parse, "--emit", "src"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Built 1 component(s), root Counter"));
    assert!(dir.path().join("uiforge.state.json").exists());
    assert!(dir.path().join("src/Counter.tsx").exists());
    assert!(dir.path().join("src/Counter.css").exists());

    uiforge(dir.path())
        .args(["check", "src"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));

    uiforge(dir.path())
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No change requests"));

    let card = fixture(
        dir.path(),
        "card.yaml",
        "feedback",
        r#"{"mutations": [{"op": "set_layout", "component": "Counter", "container": "card"}]}"#,
    );
    uiforge(dir.path())
        .args(["feedback", "put the counter in a card", "--replay", &card])
        .assert()
        .success()
        .stdout(predicate::str::contains("modified  Counter"));

    let before = std::fs::read(dir.path().join("uiforge.state.json")).unwrap();
    let red = fixture(
        dir.path(),
        "red.yaml",
        "feedback",
        r#"{"mutations": [{"op": "set_style", "component": "Counter", "target": "increment", "property": "background", "value": "red"}]}"#,
    );
    uiforge(dir.path())
        .args(["feedback", "make the increment button red", "--replay", &red])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Rolled back during regenerating"))
        .stdout(predicate::str::contains("forbidden-literal"));
    let after = std::fs::read(dir.path().join("uiforge.state.json")).unwrap();
    assert_eq!(before, after);

    uiforge(dir.path())
        .args(["history", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("put the counter in a card"))
        .stdout(predicate::str::contains("\"committed\""));
}

#[test]
fn test_check_reports_literals() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Badge.tsx"),
        "import './Badge.css';\n\nexport interface BadgeProps {}\n\nexport function Badge(_props: BadgeProps) {\n  return <span className=\"badge\">New</span>;\n}\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("Badge.css"), ".badge {\n  color: #333;\n}\n").unwrap();

    uiforge(dir.path())
        .args(["check", "."])
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAIL"))
        .stdout(predicate::str::contains("forbidden-literal"));
}

#[test]
fn test_build_without_provider_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("requirements.md"), "a counter").unwrap();

    uiforge(dir.path())
        .env_remove("ANTHROPIC_API_KEY")
        .args(["build", "requirements.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ANTHROPIC_API_KEY"));
}
