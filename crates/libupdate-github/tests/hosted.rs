//! HostedRepo, content generation and notifications against an in-memory API

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{Duration, TimeZone, Utc};
use libupdate_core::signed::{extract_verified, sign, encode_block};
use libupdate_core::{
    Context, ExistingUpdates, Repo, SigningKey, Update, UpdateError, UpdateGroup,
};
use libupdate_github::events::{Feedback, ReleaseEvent, UPDATE_DEPENDENCY};
use libupdate_github::types::{
    DispatchRequest, Issue, NewIssue, NewPullRequest, PullRequest, PullRequestQuery,
    PullRequestRef, Release, Repository, User,
};
use libupdate_github::{
    notify_release, send_feedback, GitHubApi, GitHubError, HostedRepo, PullRequestContent,
    ReleaseNotice,
};

#[derive(Default)]
struct ApiLog {
    pulls: Vec<PullRequest>,
    created: Vec<NewPullRequest>,
    create_error: Option<(u16, String)>,
    changelogs: HashMap<String, String>,
    issues: Vec<NewIssue>,
    comments: Vec<(String, String, u64, String)>,
    dispatches: Vec<(String, String, DispatchRequest)>,
    dispatch_fails: Vec<String>,
    queries: Vec<PullRequestQuery>,
}

#[derive(Default)]
struct FakeApi {
    log: Mutex<ApiLog>,
}

impl GitHubApi for FakeApi {
    fn list_pulls(
        &self,
        _ctx: &Context,
        _owner: &str,
        _repo: &str,
        query: &PullRequestQuery,
    ) -> Result<Vec<PullRequest>, GitHubError> {
        let mut log = self.log.lock().unwrap();
        log.queries.push(query.clone());
        Ok(log.pulls.clone())
    }

    fn create_pull(
        &self,
        _ctx: &Context,
        _owner: &str,
        _repo: &str,
        pull: &NewPullRequest,
    ) -> Result<PullRequest, GitHubError> {
        let mut log = self.log.lock().unwrap();
        if let Some((status, message)) = log.create_error.clone() {
            return Err(GitHubError::Api { status, message });
        }
        log.created.push(pull.clone());
        Ok(PullRequest {
            number: log.created.len() as u64,
            state: "open".into(),
            body: Some(pull.body.clone()),
            html_url: format!("https://github.com/o/r/pull/{}", log.created.len()),
            created_at: Some(Utc::now()),
            merged_at: None,
            base: PullRequestRef { ref_name: pull.base.clone() },
            head: PullRequestRef { ref_name: pull.head.clone() },
        })
    }

    fn changelog_url(
        &self,
        _ctx: &Context,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> Result<Option<String>, GitHubError> {
        let key = format!("{}/{}@{}", owner, repo, git_ref);
        Ok(self.log.lock().unwrap().changelogs.get(&key).cloned())
    }

    fn create_issue(
        &self,
        _ctx: &Context,
        _owner: &str,
        _repo: &str,
        issue: &NewIssue,
    ) -> Result<Issue, GitHubError> {
        let mut log = self.log.lock().unwrap();
        log.issues.push(issue.clone());
        Ok(Issue {
            number: 40 + log.issues.len() as u64,
            html_url: String::new(),
        })
    }

    fn create_comment(
        &self,
        _ctx: &Context,
        owner: &str,
        repo: &str,
        issue: u64,
        body: &str,
    ) -> Result<(), GitHubError> {
        self.log
            .lock()
            .unwrap()
            .comments
            .push((owner.into(), repo.into(), issue, body.into()));
        Ok(())
    }

    fn dispatch(
        &self,
        _ctx: &Context,
        owner: &str,
        repo: &str,
        request: &DispatchRequest,
    ) -> Result<(), GitHubError> {
        let mut log = self.log.lock().unwrap();
        let full = format!("{}/{}", owner, repo);
        if log.dispatch_fails.contains(&full) {
            return Err(GitHubError::Api {
                status: 404,
                message: "Not Found".into(),
            });
        }
        log.dispatches.push((owner.into(), repo.into(), request.clone()));
        Ok(())
    }
}

/// Working tree stand-in that records pushes
struct MemoryRepo {
    root: PathBuf,
    branch: String,
    pushed: Vec<String>,
}

impl MemoryRepo {
    fn new() -> Self {
        Self {
            root: PathBuf::from("/work"),
            branch: "main".into(),
            pushed: Vec::new(),
        }
    }
}

impl Repo for MemoryRepo {
    fn root(&self) -> &Path {
        &self.root
    }

    fn branch(&self) -> &str {
        &self.branch
    }

    fn set_branch(&mut self, branch: &str) -> Result<(), UpdateError> {
        self.branch = branch.into();
        Ok(())
    }

    fn new_branch(&mut self, _base: &str, branch: &str) -> Result<(), UpdateError> {
        self.branch = branch.into();
        Ok(())
    }

    fn push(&mut self, _ctx: &Context, _group: &UpdateGroup) -> Result<(), UpdateError> {
        self.pushed.push(self.branch.clone());
        Ok(())
    }

    fn fetch(&mut self, _ctx: &Context, _branch: &str) -> Result<(), UpdateError> {
        Ok(())
    }

    fn existing_updates(&self, _ctx: &Context, _base: &str) -> Result<ExistingUpdates, UpdateError> {
        Ok(ExistingUpdates::default())
    }
}

fn key() -> SigningKey {
    SigningKey::from_input("signing-secret")
}

fn hosted(api: &Arc<FakeApi>) -> HostedRepo<MemoryRepo> {
    let api: Arc<dyn GitHubApi> = api.clone();
    HostedRepo::new(MemoryRepo::new(), api, key(), "o/r").unwrap()
}

fn pr(number: u64, state: &str, body: String, created_days_ago: i64, merged: bool) -> PullRequest {
    let created = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap() - Duration::days(created_days_ago);
    PullRequest {
        number,
        state: state.into(),
        body: Some(body),
        html_url: format!("https://github.com/o/r/pull/{}", number),
        created_at: Some(created),
        merged_at: merged.then(|| created + Duration::hours(1)),
        base: PullRequestRef { ref_name: "main".into() },
        head: PullRequestRef { ref_name: format!("topic-{}", number) },
    }
}

fn manifest(group: &UpdateGroup) -> String {
    encode_block(&sign(&key(), group).unwrap()).unwrap()
}

#[test]
fn test_push_opens_pull_request() {
    let api = Arc::new(FakeApi::default());
    let mut repo = hosted(&api);
    let ctx = Context::background();
    let branch = "action-update-go/main/p/v1.0.1";
    repo.new_branch("main", branch).unwrap();

    let group = UpdateGroup::singleton(Update::new("p", "v1.0.0", "v1.0.1"));
    repo.push(&ctx, &group).unwrap();

    assert_eq!(repo.local().pushed, vec![branch.to_string()]);
    assert_eq!(repo.branch(), branch);
    let log = api.log.lock().unwrap();
    let created = &log.created[0];
    assert_eq!(created.base, "main");
    assert_eq!(created.head, branch);
    assert_eq!(created.title, "Update p from v1.0.0 to v1.0.1");
    assert!(created.body.starts_with("Here is p v1.0.1, I hope it works.\n"));
    let verified = extract_verified(&key(), &created.body).unwrap().unwrap();
    assert_eq!(verified.updates, vec![Update::new("p", "v1.0.0", "v1.0.1")]);
}

#[test]
fn test_push_swallows_existing_pull_request() {
    let api = Arc::new(FakeApi::default());
    api.log.lock().unwrap().create_error = Some((
        422,
        "Validation Failed: A pull request already exists for o:action-update-go/main/p/v2."
            .into(),
    ));
    let mut repo = hosted(&api);
    repo.new_branch("main", "action-update-go/main/p/v2").unwrap();

    let group = UpdateGroup::singleton(Update::new("p", "v1", "v2"));
    assert!(repo.push(&Context::background(), &group).is_ok());
}

#[test]
fn test_push_reports_api_failure() {
    let api = Arc::new(FakeApi::default());
    api.log.lock().unwrap().create_error = Some((500, "boom".into()));
    let mut repo = hosted(&api);
    repo.new_branch("main", "action-update-go/main/p/v2").unwrap();

    let group = UpdateGroup::singleton(Update::new("p", "v1", "v2"));
    let err = repo.push(&Context::background(), &group).unwrap_err();
    assert!(matches!(err, UpdateError::PublishFailure(_)));
}

#[test]
fn test_no_push_skips_pull_request() {
    let api = Arc::new(FakeApi::default());
    let mut repo = hosted(&api).with_no_push(true);
    repo.new_branch("main", "action-update-go/main/p/v2").unwrap();

    repo.push(&Context::background(), &UpdateGroup::singleton(Update::new("p", "v1", "v2")))
        .unwrap();
    assert_eq!(repo.local().pushed.len(), 1);
    assert!(api.log.lock().unwrap().created.is_empty());
}

#[test]
fn test_push_uses_base_with_slash() {
    let api = Arc::new(FakeApi::default());
    let mut repo = hosted(&api);
    let branch = "action-update-go/release/1.x/p/v2";
    repo.new_branch("release/1.x", branch).unwrap();

    repo.push(&Context::background(), &UpdateGroup::singleton(Update::new("p", "v1", "v2")))
        .unwrap();
    let log = api.log.lock().unwrap();
    assert_eq!(log.created[0].base, "release/1.x");
    assert_eq!(log.created[0].head, branch);
}

#[test]
fn test_branch_without_base_segment_fails() {
    let api = Arc::new(FakeApi::default());
    let mut repo = hosted(&api);
    repo.set_branch("lonely").unwrap();

    let err = repo
        .push(&Context::background(), &UpdateGroup::singleton(Update::new("p", "v1", "v2")))
        .unwrap_err();
    assert!(matches!(err, UpdateError::PublishFailure(_)));
}

#[test]
fn test_existing_updates_from_pull_requests() {
    let api = Arc::new(FakeApi::default());
    let weekly = UpdateGroup::new("weekly", vec![Update::new("a", "v1", "v2")]);
    let single = UpdateGroup::singleton(Update::new("b", "v1", "v2"));
    let forged = {
        let mut signed = sign(&key(), &single).unwrap();
        signed.signature[0] ^= 0xff;
        encode_block(&signed).unwrap()
    };
    api.log.lock().unwrap().pulls = vec![
        pr(1, "open", format!("body{}", manifest(&weekly)), 2, false),
        pr(2, "closed", format!("body{}", manifest(&single)), 10, true),
        pr(3, "closed", format!("body{}", manifest(&weekly)), 1, false),
        pr(4, "open", format!("body{}", forged), 1, false),
        pr(5, "open", "hand written".into(), 1, false),
    ];
    let repo = hosted(&api);

    let existing = repo.existing_updates(&Context::background(), "main").unwrap();

    let numbers: Vec<(bool, bool)> = existing.iter().map(|u| (u.open, u.merged)).collect();
    assert_eq!(numbers, vec![(true, false), (false, true), (false, false)]);
    assert!(existing.iter().all(|u| u.base_branch == "main"));
    assert_eq!(existing.0[1].group, single);
    assert_eq!(
        existing.0[1].last_update,
        Utc.with_ymd_and_hms(2024, 5, 31, 1, 0, 0).unwrap()
    );
    // The closed-unmerged proposal does not count toward the group's cooldown
    assert_eq!(
        existing.latest_group_update("weekly"),
        Some(Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap())
    );

    let log = api.log.lock().unwrap();
    assert_eq!(log.queries, vec![PullRequestQuery::all_for_base("main")]);
}

#[test]
fn test_group_body_with_changelogs() {
    let api = Arc::new(FakeApi::default());
    api.log.lock().unwrap().changelogs.insert(
        "foo/bar@v1.1.0".into(),
        "https://github.com/foo/bar/blob/v1.1.0/CHANGELOG.md".into(),
    );
    let content = PullRequestContent::new(api.clone(), key());
    let group = UpdateGroup::new(
        "foo",
        vec![
            Update::new("github.com/foo/bar", "v1.0.0", "v1.1.0"),
            Update::new("golang.org/x/text", "v0.3.0", "v0.3.5"),
        ],
    );

    let text = content.generate(&Context::background(), &group).unwrap();

    assert_eq!(text.title, "Dependency Updates");
    let expected_prefix = "Here are some updates, I hope they work.\n\n\
        #### github.com/foo/bar@v1.1.0\n\
        \n[changelog](https://github.com/foo/bar/blob/v1.1.0/CHANGELOG.md)\n\n\
        #### golang.org/x/text@v0.3.5\n\
        \n<!--::action-update-go::\n";
    assert!(text.body.starts_with(expected_prefix), "{}", text.body);
    assert!(text.body.ends_with("\n-->"));
    assert_eq!(
        extract_verified(&key(), &text.body).unwrap().unwrap(),
        group.sorted()
    );
}

#[test]
fn test_single_body_with_changelog() {
    let api = Arc::new(FakeApi::default());
    api.log
        .lock()
        .unwrap()
        .changelogs
        .insert("foo/bar@v2.0.0".into(), "https://example.test/cl".into());
    let content = PullRequestContent::new(api.clone(), key());
    let group = UpdateGroup::singleton(Update::new("github.com/foo/bar", "v1.0.0", "v2.0.0"));

    let text = content.generate(&Context::background(), &group).unwrap();
    assert!(text.body.starts_with(
        "Here is github.com/foo/bar v2.0.0, I hope it works.\n\n[changelog](https://example.test/cl)\n\n<!--::action-update-go::"
    ));
}

fn release_event(action: &str) -> ReleaseEvent {
    ReleaseEvent {
        action: action.into(),
        release: Release {
            tag_name: "v1.2.0".into(),
            draft: false,
            prerelease: false,
            html_url: String::new(),
            assets: Vec::new(),
        },
        repository: Repository {
            name: "lib".into(),
            full_name: "o/lib".into(),
            owner: User { login: "o".into() },
            default_branch: "main".into(),
        },
    }
}

#[test]
fn test_release_notifies_repositories() {
    let api = FakeApi::default();
    api.log.lock().unwrap().dispatch_fails = vec!["o/broken".into()];
    let repos = vec!["o/app".to_string(), "o/broken".to_string(), "nonsense".to_string()];

    let notice = notify_release(&Context::background(), &api, &release_event("released"), &repos).unwrap();

    assert_eq!(
        notice,
        ReleaseNotice::Notified {
            issue: 41,
            dispatched: vec!["o/app".into()],
            failed: vec!["o/broken".into(), "nonsense".into()],
        }
    );
    let log = api.log.lock().unwrap();
    assert_eq!(log.issues[0].title, "Release feedback: v1.2.0");
    let (owner, name, request) = &log.dispatches[0];
    assert_eq!((owner.as_str(), name.as_str()), ("o", "app"));
    assert_eq!(request.event_type, UPDATE_DEPENDENCY);
    assert_eq!(
        request.client_payload,
        serde_json::json!({
            "updater": "",
            "path": "github.com/o/lib",
            "next": "v1.2.0",
            "feedback": {"owner": "o", "name": "lib", "issue": 41}
        })
    );
}

#[test]
fn test_release_ignores_other_actions() {
    let api = FakeApi::default();
    let notice = notify_release(
        &Context::background(),
        &api,
        &release_event("created"),
        &["o/app".to_string()],
    )
    .unwrap();
    assert!(matches!(notice, ReleaseNotice::Ignored { .. }));
    assert!(api.log.lock().unwrap().issues.is_empty());
}

#[test]
fn test_feedback_comment() {
    let api = FakeApi::default();
    let repository = release_event("released").repository;
    let feedback = Feedback {
        owner: "up".into(),
        name: "stream".into(),
        issue: 9,
    };

    send_feedback(&Context::background(), &api, &repository, &feedback, "topic", false);
    api.log.lock().unwrap().pulls = vec![pr(7, "open", String::new(), 0, false)];
    send_feedback(&Context::background(), &api, &repository, &feedback, "topic", true);

    let log = api.log.lock().unwrap();
    assert_eq!(log.comments[0], ("up".into(), "stream".into(), 9, "o/lib - topic - false".into()));
    assert_eq!(log.comments[1].3, "https://github.com/o/r/pull/7");
    assert_eq!(log.queries[0], PullRequestQuery::for_head("o", "topic"));
}
