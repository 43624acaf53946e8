//! Engine and reconciler behaviour against in-memory repo and updater fakes

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{Duration, Utc};
use libupdate_core::signed::{self, SigningKey};
use libupdate_core::version::{self, PrereleasePolicy};
use libupdate_core::{
    reconcile, Context, Dependency, ExistingUpdate, ExistingUpdates, Group, Groups, Reconciled,
    Repo, RepoUpdater, ReviewRequestEvent, Update, UpdateError, UpdateGroup, Updater,
    VersionFilter,
};
use tempfile::TempDir;

#[derive(Debug, Default)]
struct RepoLog {
    branch: String,
    known_branches: Vec<String>,
    created: Vec<(String, String)>,
    pushed: Vec<(String, UpdateGroup)>,
    fetched: Vec<String>,
    existing: Vec<ExistingUpdate>,
}

struct FakeRepo {
    root: PathBuf,
    branch: String,
    log: Rc<RefCell<RepoLog>>,
}

impl Repo for FakeRepo {
    fn root(&self) -> &Path {
        &self.root
    }

    fn branch(&self) -> &str {
        &self.branch
    }

    fn set_branch(&mut self, branch: &str) -> Result<(), UpdateError> {
        if !self.log.borrow().known_branches.iter().any(|b| b == branch) {
            return Err(UpdateError::RefNotFound(branch.to_string()));
        }
        self.branch = branch.to_string();
        self.log.borrow_mut().branch = branch.to_string();
        Ok(())
    }

    fn new_branch(&mut self, base: &str, branch: &str) -> Result<(), UpdateError> {
        self.branch = branch.to_string();
        let mut log = self.log.borrow_mut();
        log.branch = branch.to_string();
        log.created.push((base.to_string(), branch.to_string()));
        Ok(())
    }

    fn push(&mut self, _ctx: &Context, group: &UpdateGroup) -> Result<(), UpdateError> {
        self.log
            .borrow_mut()
            .pushed
            .push((self.branch.clone(), group.clone()));
        Ok(())
    }

    fn fetch(&mut self, _ctx: &Context, branch: &str) -> Result<(), UpdateError> {
        self.log.borrow_mut().fetched.push(branch.to_string());
        Ok(())
    }

    fn existing_updates(
        &self,
        _ctx: &Context,
        base_branch: &str,
    ) -> Result<ExistingUpdates, UpdateError> {
        Ok(ExistingUpdates::new(
            self.log
                .borrow()
                .existing
                .iter()
                .filter(|u| u.base_branch == base_branch)
                .cloned()
                .collect(),
        ))
    }
}

#[derive(Default)]
struct FakeUpdater {
    deps: Vec<Dependency>,
    available: HashMap<String, Vec<String>>,
    broken_check: Vec<String>,
    broken_apply: Vec<String>,
    applied: Rc<RefCell<Vec<Update>>>,
}

impl Updater for FakeUpdater {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn dependencies(&self, _ctx: &Context) -> Result<Vec<Dependency>, UpdateError> {
        Ok(self.deps.clone())
    }

    fn check(
        &self,
        _ctx: &Context,
        dep: &Dependency,
        filter: VersionFilter<'_>,
    ) -> Result<Option<Update>, UpdateError> {
        if self.broken_check.contains(&dep.path) {
            return Err(UpdateError::RegistryUnavailable(dep.path.clone()));
        }
        let Some(versions) = self.available.get(&dep.path) else {
            return Ok(None);
        };
        let next = version::highest_upgrade(
            &dep.version,
            versions.iter().map(String::as_str),
            PrereleasePolicy::Auto,
            filter,
        );
        Ok(next.map(|next| Update::new(&dep.path, &dep.version, next)))
    }

    fn apply_update(&self, _ctx: &Context, update: &Update) -> Result<(), UpdateError> {
        if self.broken_apply.contains(&update.path) {
            return Err(UpdateError::ToolFailure(format!("cannot apply {}", update.path)));
        }
        self.applied.borrow_mut().push(update.clone());
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    root: PathBuf,
    log: Rc<RefCell<RepoLog>>,
    applied: Rc<RefCell<Vec<Update>>>,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let log = Rc::new(RefCell::new(RepoLog {
            branch: "main".to_string(),
            known_branches: vec!["main".to_string(), "develop".to_string()],
            ..Default::default()
        }));
        Self {
            _dir: dir,
            root,
            log,
            applied: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn engine(&self, mut updater: FakeUpdater, groups: Groups) -> RepoUpdater {
        updater.applied = Rc::clone(&self.applied);
        let repo = FakeRepo {
            root: self.root.clone(),
            branch: self.log.borrow().branch.clone(),
            log: Rc::clone(&self.log),
        };
        RepoUpdater::new(Box::new(repo), Box::new(updater)).with_groups(groups)
    }

    fn pushed_branches(&self) -> Vec<String> {
        self.log.borrow().pushed.iter().map(|(b, _)| b.clone()).collect()
    }
}

fn updater(deps: &[(&str, &str)], available: &[(&str, &[&str])]) -> FakeUpdater {
    FakeUpdater {
        deps: deps.iter().map(|(p, v)| Dependency::new(*p, *v)).collect(),
        available: available
            .iter()
            .map(|(p, vs)| (p.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect(),
        ..Default::default()
    }
}

fn branches(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_singleton_update() {
    let h = Harness::new();
    let mut engine = h.engine(updater(&[("p", "v1.0.0")], &[("p", &["v1.0.1"])]), Groups::default());

    let report = engine.update_all(&Context::background(), &branches(&["main"])).unwrap();

    assert_eq!(report.pushed, vec!["action-update-go/main/p/v1.0.1"]);
    let log = h.log.borrow();
    assert_eq!(log.created, vec![("main".to_string(), "action-update-go/main/p/v1.0.1".to_string())]);
    let (_, group) = &log.pushed[0];
    assert_eq!(group.name, "");
    assert_eq!(group.updates, vec![Update::new("p", "v1.0.0", "v1.0.1")]);
    assert_eq!(h.applied.borrow().len(), 1);
}

#[test]
fn test_no_update_available() {
    let h = Harness::new();
    let mut engine = h.engine(updater(&[("p", "v1.0.1")], &[("p", &["v1.0.0", "v1.0.1"])]), Groups::default());
    let report = engine.update_all(&Context::background(), &branches(&["main"])).unwrap();
    assert!(report.pushed.is_empty());
    assert!(h.log.borrow().created.is_empty());
}

#[test]
fn test_group_range_excludes_major() {
    let h = Harness::new();
    let groups = Groups::new(vec![Group::new("foo", "github.com/foo").with_range("<2.0")]).unwrap();
    let mut engine = h.engine(
        updater(&[("github.com/foo/bar", "v1.9")], &[("github.com/foo/bar", &["v2.0"])]),
        groups,
    );

    let report = engine.update_all(&Context::background(), &branches(&["main"])).unwrap();

    assert!(report.pushed.is_empty());
    assert!(h.log.borrow().created.is_empty());
}

#[test]
fn test_group_update_single_branch() {
    let h = Harness::new();
    let mut foo = Group::new("foo", "github.com/foo").with_range("<2.0");
    foo.pre_script = "touch pre-ran".to_string();
    foo.post_script = "touch post-ran".to_string();
    let groups = Groups::new(vec![foo]).unwrap();
    let mut engine = h.engine(
        updater(
            &[("github.com/foo/a", "v1.0.0"), ("github.com/foo/b", "v1.1.0"), ("other", "v0.1.0")],
            &[
                ("github.com/foo/a", &["v1.2.0", "v2.0.0"]),
                ("github.com/foo/b", &["v1.1.1"]),
                ("other", &["v0.2.0"]),
            ],
        ),
        groups,
    );

    let report = engine.update_all(&Context::background(), &branches(&["main"])).unwrap();

    assert_eq!(
        report.pushed,
        vec!["action-update-go/main/foo", "action-update-go/main/other/v0.2.0"]
    );
    let log = h.log.borrow();
    let (branch, group) = &log.pushed[0];
    assert_eq!(branch, "action-update-go/main/foo");
    assert_eq!(group.name, "foo");
    assert_eq!(
        group.updates,
        vec![
            Update::new("github.com/foo/a", "v1.0.0", "v1.2.0"),
            Update::new("github.com/foo/b", "v1.1.0", "v1.1.1"),
        ]
    );
    assert!(h.root.join("pre-ran").exists());
    assert!(h.root.join("post-ran").exists());
}

#[test]
fn test_group_in_cooldown_is_skipped() {
    let h = Harness::new();
    h.log.borrow_mut().existing.push(ExistingUpdate {
        base_branch: "main".to_string(),
        last_update: Utc::now() - Duration::days(2),
        group: UpdateGroup::new("g", vec![Update::new("github.com/g/a", "v1.0.0", "v1.0.1")]),
        open: true,
        merged: false,
    });
    let groups = Groups::new(vec![Group::new("g", "github.com/g").with_frequency("weekly")]).unwrap();
    let mut engine = h.engine(
        updater(&[("github.com/g/a", "v1.0.1")], &[("github.com/g/a", &["v1.0.2"])]),
        groups,
    );

    let report = engine.update_all(&Context::background(), &branches(&["main"])).unwrap();

    assert_eq!(report.cooled_down, vec!["g"]);
    assert!(report.pushed.is_empty());
    assert!(h.log.borrow().created.is_empty());
}

#[test]
fn test_cooldown_elapsed_allows_group() {
    let h = Harness::new();
    h.log.borrow_mut().existing.push(ExistingUpdate {
        base_branch: "main".to_string(),
        last_update: Utc::now() - Duration::days(8),
        group: UpdateGroup::new("g", vec![]),
        open: false,
        merged: true,
    });
    let groups = Groups::new(vec![Group::new("g", "github.com/g").with_frequency("weekly")]).unwrap();
    let mut engine = h.engine(
        updater(&[("github.com/g/a", "v1.0.1")], &[("github.com/g/a", &["v1.0.2"])]),
        groups,
    );
    let report = engine.update_all(&Context::background(), &branches(&["main"])).unwrap();
    assert_eq!(report.pushed, vec!["action-update-go/main/g"]);
}

#[test]
fn test_failures_do_not_stop_pass() {
    let h = Harness::new();
    let mut fake = updater(
        &[("a", "v1.0.0"), ("b", "v1.0.0"), ("c", "v1.0.0")],
        &[("a", &["v1.0.1"]), ("b", &["v1.0.1"]), ("c", &["v1.0.1"])],
    );
    fake.broken_check = vec!["a".to_string()];
    fake.broken_apply = vec!["b".to_string()];
    let mut engine = h.engine(fake, Groups::default());

    let report = engine.update_all(&Context::background(), &branches(&["main"])).unwrap();

    assert_eq!(report.pushed, vec!["action-update-go/main/c/v1.0.1"]);
    assert_eq!(report.failed, vec!["b"]);
}

#[test]
fn test_ignored_dependencies_are_not_checked() {
    let h = Harness::new();
    let mut engine = h
        .engine(
            updater(&[("github.com/internal/x", "v1.0.0"), ("y", "v1.0.0")], &[
                ("github.com/internal/x", &["v1.0.1"]),
                ("y", &["v1.0.1"]),
            ]),
            Groups::default(),
        )
        .with_ignore(vec![glob::Pattern::new("github.com/internal/*").unwrap()]);

    let report = engine.update_all(&Context::background(), &branches(&["main"])).unwrap();

    assert_eq!(report.dependencies, 1);
    assert_eq!(report.pushed, vec!["action-update-go/main/y/v1.0.1"]);
}

#[test]
fn test_update_all_is_idempotent() {
    let h = Harness::new();
    let make = || {
        updater(
            &[("a", "v1.0.0"), ("github.com/foo/b", "v0.1.0")],
            &[("a", &["v1.1.0"]), ("github.com/foo/b", &["v0.2.0"])],
        )
    };
    let groups = || Groups::new(vec![Group::new("foo", "github.com/foo")]).unwrap();

    let first = h
        .engine(make(), groups())
        .update_all(&Context::background(), &branches(&["main", "develop"]))
        .unwrap();
    let second = h
        .engine(make(), groups())
        .update_all(&Context::background(), &branches(&["main", "develop"]))
        .unwrap();

    assert_eq!(first.pushed, second.pushed);
    assert_eq!(first.pushed.len(), 4);
}

#[test]
fn test_unknown_base_branch_aborts() {
    let h = Harness::new();
    let mut engine = h.engine(updater(&[("p", "v1.0.0")], &[("p", &["v1.0.1"])]), Groups::default());

    let err = engine
        .update_all(&Context::background(), &branches(&["missing", "main"]))
        .unwrap_err();

    assert!(matches!(err, UpdateError::RefNotFound(_)));
    assert!(h.log.borrow().created.is_empty());
}

#[test]
fn test_initial_branch_restored() {
    let h = Harness::new();
    let mut engine = h.engine(updater(&[("p", "v1.0.0")], &[("p", &["v1.0.1"])]), Groups::default());
    engine.update_all(&Context::background(), &branches(&["develop"])).unwrap();
    assert_eq!(engine.repo().branch(), "main");
    assert_eq!(h.pushed_branches(), vec!["action-update-go/develop/p/v1.0.1"]);
}

#[test]
fn test_cancelled_context_stops_pass() {
    let h = Harness::new();
    let mut engine = h.engine(updater(&[("p", "v1.0.0")], &[("p", &["v1.0.1"])]), Groups::default());
    let ctx = Context::background();
    ctx.cancel();
    let err = engine.update_all(&ctx, &branches(&["main"])).unwrap_err();
    assert!(matches!(err, UpdateError::Cancelled));
    assert!(h.log.borrow().pushed.is_empty());
}

fn pr_event(action: &str, body: &str) -> ReviewRequestEvent {
    ReviewRequestEvent {
        action: action.to_string(),
        body: body.to_string(),
        base: "main".to_string(),
        head: "action-update-go/main/p/v1.0.1".to_string(),
    }
}

#[test]
fn test_reopen_recreates_branch() {
    let h = Harness::new();
    let key = SigningKey::from_input("secret");
    let group = UpdateGroup::singleton(Update::new("p", "v1.0.0", "v1.0.1"));
    let body = format!("Here is p v1.0.1, I hope it works.\n{}", signed::sign_block(&key, &group).unwrap());
    let mut engine = h.engine(updater(&[], &[]), Groups::default());

    let outcome = reconcile(&Context::background(), &mut engine, &key, &pr_event("reopened", &body)).unwrap();

    assert_eq!(
        outcome,
        Reconciled::Recreated {
            branch: "action-update-go/main/p/v1.0.1".to_string(),
            updates: 1
        }
    );
    let log = h.log.borrow();
    assert_eq!(log.fetched, vec!["main"]);
    assert_eq!(log.created, vec![("main".to_string(), "action-update-go/main/p/v1.0.1".to_string())]);
    assert_eq!(log.pushed[0].1, group);
    assert_eq!(h.applied.borrow().as_slice(), &group.updates[..]);
}

#[test]
fn test_reopen_with_tampered_signature() {
    let h = Harness::new();
    let key = SigningKey::from_input("secret");
    let group = UpdateGroup::singleton(Update::new("p", "v1.0.0", "v1.0.1"));
    let mut signed_group = signed::sign(&key, &group).unwrap();
    signed_group.signature[10] ^= 0x01;
    let body = format!("body{}", signed::encode_block(&signed_group).unwrap());
    let mut engine = h.engine(updater(&[], &[]), Groups::default());

    let err = reconcile(&Context::background(), &mut engine, &key, &pr_event("reopened", &body)).unwrap_err();

    assert!(matches!(err, UpdateError::InvalidSignature));
    let log = h.log.borrow();
    assert!(log.created.is_empty());
    assert!(log.fetched.is_empty());
    assert!(log.pushed.is_empty());
}

#[test]
fn test_reopen_without_manifest() {
    let h = Harness::new();
    let mut engine = h.engine(updater(&[], &[]), Groups::default());
    let outcome = reconcile(
        &Context::background(),
        &mut engine,
        &SigningKey::from_input("secret"),
        &pr_event("reopened", "hand written pull request"),
    )
    .unwrap();
    assert_eq!(outcome, Reconciled::NoManifest);
    assert!(h.log.borrow().created.is_empty());
}

#[test]
fn test_other_actions_ignored() {
    let h = Harness::new();
    let mut engine = h.engine(updater(&[], &[]), Groups::default());
    let key = SigningKey::from_input("secret");
    for action in ["opened", "closed", "labeled", "synchronize"] {
        let outcome = reconcile(&Context::background(), &mut engine, &key, &pr_event(action, "")).unwrap();
        assert_eq!(outcome, Reconciled::Ignored { action: action.to_string() });
    }
    assert!(h.log.borrow().created.is_empty());
}
