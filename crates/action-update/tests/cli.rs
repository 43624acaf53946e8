//! Command line surface of the action-update binary

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use git2::{Repository, RepositoryInitOptions, Signature};
use predicates::prelude::*;
use tempfile::tempdir;

fn action_update() -> Command {
    let mut cmd = Command::cargo_bin("action-update").unwrap();
    cmd.env_clear().env("RUST_LOG", "warn");
    cmd
}

fn write_event(dir: &Path, json: &str) -> String {
    let path = dir.join("event.json");
    fs::write(&path, json).unwrap();
    path.to_str().unwrap().to_string()
}

fn init_git_repo(path: &Path) {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = Repository::init_opts(path, &opts).unwrap();
    fs::write(path.join("go.mod"), "module example.com/m\n\nrequire p v1.0.0\n").unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("go.mod")).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Test", "test@example.com").unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
        .unwrap();
}

#[test]
fn test_help_lists_subcommands() {
    action_update()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("update-all"))
        .stdout(predicate::str::contains("dependencies"));
}

#[test]
fn test_dependencies_json_for_dockerfiles() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("Dockerfile"),
        "FROM alpine\nARG TOOL_VERSION=v1.2.0\n\
         RUN wget https://github.com/acme/tool/releases/download/${TOOL_VERSION}/tool.tgz\n",
    )
    .unwrap();

    action_update()
        .args(["--json", "--updater", "dockerurl", "--root"])
        .arg(dir.path())
        .arg("dependencies")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ok\": true"))
        .stdout(predicate::str::contains("\"updater\": \"dockerurl\""))
        .stdout(predicate::str::contains("\"path\": \"github.com/acme/tool/releases\""))
        .stdout(predicate::str::contains("\"version\": \"v1.2.0\""));
}

#[test]
fn test_dependencies_table_for_dockerfiles() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("Containerfile"),
        "FROM alpine\nRUN wget https://github.com/acme/tool/releases/download/v1.2.0/tool.tgz\n",
    )
    .unwrap();

    action_update()
        .args(["--updater", "dockerurl", "--root"])
        .arg(dir.path())
        .arg("dependencies")
        .assert()
        .success()
        .stdout(predicate::str::contains("github.com/acme/tool/releases"))
        .stdout(predicate::str::contains("Version"));
}

#[test]
fn test_run_issue_comment() {
    let dir = tempdir().unwrap();
    let event = write_event(
        dir.path(),
        r#"{"action": "created", "comment": {"body": "looks good"}}"#,
    );

    action_update()
        .env("GITHUB_EVENT_NAME", "issue_comment")
        .env("GITHUB_EVENT_PATH", event)
        .args(["--json", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"handled\": \"comment\""))
        .stdout(predicate::str::contains("\"body\": \"looks good\""));
}

#[test]
fn test_run_unknown_event() {
    action_update()
        .env("GITHUB_EVENT_NAME", "star")
        .args(["--json", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"handled\": \"unknown\""))
        .stdout(predicate::str::contains("\"event\": \"star\""));
}

#[test]
fn test_run_without_event_path() {
    action_update()
        .env("GITHUB_EVENT_NAME", "issue_comment")
        .args(["--json", "run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("\"code\": \"config_invalid\""));
}

#[test]
fn test_run_dispatch_for_other_updater_is_skipped() {
    let dir = tempdir().unwrap();
    let event = write_event(
        dir.path(),
        r#"{
            "action": "update-dependency",
            "client_payload": {"updater": "dockerurl", "path": "github.com/acme/tool/releases", "next": "v2.0.0"},
            "repository": {"name": "r", "full_name": "o/r", "owner": {"login": "o"}, "default_branch": "main"}
        }"#,
    );

    action_update()
        .env("GITHUB_EVENT_NAME", "repository_dispatch")
        .env("GITHUB_EVENT_PATH", event)
        .args(["--json", "--updater", "gomod", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"handled\": \"skipped\""));
}

#[test]
fn test_run_pull_request_opened_is_ignored() {
    let repo_dir = tempdir().unwrap();
    init_git_repo(repo_dir.path());
    let event_dir = tempdir().unwrap();
    let event = write_event(
        event_dir.path(),
        r#"{
            "action": "opened",
            "pull_request": {
                "number": 7,
                "state": "open",
                "body": "Here is p v1.0.1, I hope it works.",
                "base": {"ref": "main"},
                "head": {"ref": "action-update-go/main/p/v1.0.1"}
            },
            "repository": {"name": "r", "full_name": "o/r", "owner": {"login": "o"}}
        }"#,
    );

    action_update()
        .env("GITHUB_EVENT_NAME", "pull_request")
        .env("GITHUB_EVENT_PATH", event)
        .args(["--json", "--root"])
        .arg(repo_dir.path())
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"handled\": \"pull_request\""))
        .stdout(predicate::str::contains("\"outcome\": \"ignored\""));
}

#[test]
fn test_invalid_boolean_input_exits_with_config_error() {
    action_update()
        .env("INPUT_NO_PUSH", "maybe")
        .args(["--json", "dependencies"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("config_invalid"));
}

#[test]
fn test_dirty_tree_exit_code() {
    let repo_dir = tempdir().unwrap();
    init_git_repo(repo_dir.path());
    fs::write(repo_dir.path().join("stray.txt"), "x").unwrap();

    action_update()
        .args(["--json", "--root"])
        .arg(repo_dir.path())
        .args(["update-all", "--branch", "main"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("dirty_tree"));
}
