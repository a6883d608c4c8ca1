mod common;

use serde_json::json;
use tempfile::TempDir;

use amandus::types::{CommitIdentity, UserRole};
use amandus::workspace::FileChange;
use common::{Remote, TestApp, error_codes, error_messages, git, init_github_workspace};

const GITHUB_URL: &str = "https://github.com/owner/repo";

const SAVE_CHANGES: &str = r#"
    mutation save($files: [FileInput!]!, $branch: String!, $commitMessage: String) {
        saveChanges(files: $files, branch: $branch, commitMessage: $commitMessage)
    }
"#;

const REPO_STATE: &str = r#"
    query state($url: String!) {
        getRepoState(url: $url) {
            currentBranch
            files { name content }
            branches
            url
            commitMessage
        }
    }
"#;

const CLONE: &str = "query clone($url: String!) { cloneRepository(url: $url) }";

#[tokio::test]
async fn test_save_changes_then_repo_state() {
    let app = TestApp::new();
    let user = app.create_user("testuser", UserRole::NonAdmin);
    init_github_workspace(&app, "testuser");

    let saved = app
        .run(
            Some(&user),
            SAVE_CHANGES,
            json!({
                "files": [{"name": "testuser/github/owner/repo/file.txt", "content": "test content"}],
                "branch": "master",
                "commitMessage": "Add test file",
            }),
        )
        .await;
    assert_eq!(saved, json!({"data": {"saveChanges": "Saved"}}));

    let state = app
        .run(Some(&user), REPO_STATE, json!({"url": GITHUB_URL}))
        .await;
    assert_eq!(
        state["data"]["getRepoState"],
        json!({
            "currentBranch": "master",
            "files": [{"name": "testuser/github/owner/repo/file.txt", "content": "test content"}],
            "branches": ["master"],
            "url": GITHUB_URL,
            "commitMessage": "Add test file",
        })
    );
}

#[tokio::test]
async fn test_save_changes_default_message_and_branch() {
    let app = TestApp::new();
    let user = app.create_user("testuser", UserRole::NonAdmin);
    let workspace = init_github_workspace(&app, "testuser");

    let first = app
        .run(
            Some(&user),
            SAVE_CHANGES,
            json!({
                "files": [{"name": "testuser/github/owner/repo/a.robot", "content": "a"}],
                "branch": "master",
            }),
        )
        .await;
    assert!(error_messages(&first).is_empty(), "{first}");

    let second = app
        .run(
            Some(&user),
            SAVE_CHANGES,
            json!({
                "files": [
                    {"name": "testuser/github/owner/repo/a.robot", "content": "a2"},
                    {"name": "testuser/github/owner/repo/tests/b.robot", "content": "b"},
                ],
                "branch": "feature",
                "commitMessage": "   ",
            }),
        )
        .await;
    assert!(error_messages(&second).is_empty(), "{second}");

    let state = app
        .run(Some(&user), REPO_STATE, json!({"url": GITHUB_URL}))
        .await;
    let state = &state["data"]["getRepoState"];
    assert_eq!(state["currentBranch"], "feature");
    assert_eq!(state["branches"], json!(["feature", "master"]));
    assert_eq!(
        state["commitMessage"],
        "User testuser modified file(s) a.robot,tests/b.robot"
    );

    let author = git(&workspace, &["log", "-1", "--format=%an <%ae>"]);
    assert_eq!(author, "testuser <testuser@test.fi>");
}

#[tokio::test]
async fn test_long_commit_message_is_truncated() {
    let app = TestApp::new();
    let user = app.create_user("testuser", UserRole::NonAdmin);
    init_github_workspace(&app, "testuser");

    let message = "x".repeat(100);
    app.run(
        Some(&user),
        SAVE_CHANGES,
        json!({
            "files": [{"name": "testuser/github/owner/repo/file.txt", "content": "c"}],
            "branch": "master",
            "commitMessage": message,
        }),
    )
    .await;

    let state = app
        .run(Some(&user), REPO_STATE, json!({"url": GITHUB_URL}))
        .await;
    assert_eq!(
        state["data"]["getRepoState"]["commitMessage"],
        format!("{}...", "x".repeat(72))
    );
}

#[tokio::test]
async fn test_files_must_belong_to_the_caller() {
    let app = TestApp::new();
    let user = app.create_user("testuser", UserRole::NonAdmin);
    init_github_workspace(&app, "other");

    let foreign = app
        .run(
            Some(&user),
            SAVE_CHANGES,
            json!({
                "files": [{"name": "other/github/owner/repo/file.txt", "content": "x"}],
                "branch": "master",
            }),
        )
        .await;
    assert_eq!(error_codes(&foreign), vec!["FORBIDDEN"]);

    let mixed = app
        .run(
            Some(&user),
            SAVE_CHANGES,
            json!({
                "files": [
                    {"name": "testuser/github/owner/repo/file.txt", "content": "x"},
                    {"name": "testuser/github/owner/other-repo/file.txt", "content": "y"},
                ],
                "branch": "master",
            }),
        )
        .await;
    assert_eq!(
        error_messages(&mixed),
        vec!["All files must belong to the same repository"]
    );

    let escape = app
        .run(
            Some(&user),
            "mutation s($file: FileInput!) { localSave(file: $file) }",
            json!({"file": {"name": "testuser/github/owner/repo/../../x", "content": "x"}}),
        )
        .await;
    assert_eq!(error_codes(&escape), vec!["BAD_USER_INPUT"]);
}

#[tokio::test]
async fn test_workspace_operations_require_login() {
    let app = TestApp::new();

    let state = app.run(None, REPO_STATE, json!({"url": GITHUB_URL})).await;
    assert_eq!(error_messages(&state), vec!["You have to login"]);

    let save = app
        .run(
            None,
            SAVE_CHANGES,
            json!({
                "files": [{"name": "testuser/github/owner/repo/file.txt", "content": "x"}],
                "branch": "master",
            }),
        )
        .await;
    assert_eq!(error_messages(&save), vec!["You have to login"]);
}

#[tokio::test]
async fn test_repo_state_of_missing_workspace() {
    let app = TestApp::new();
    let user = app.create_user("testuser", UserRole::NonAdmin);

    let state = app
        .run(Some(&user), REPO_STATE, json!({"url": GITHUB_URL}))
        .await;
    assert_eq!(error_codes(&state), vec!["NOT_FOUND"]);
}

#[tokio::test]
async fn test_local_save_commit_and_reset() {
    let app = TestApp::new();
    let user = app.create_user("testuser", UserRole::NonAdmin);
    let workspace = init_github_workspace(&app, "testuser");
    let name = "testuser/github/owner/repo/file.txt";

    app.run(
        Some(&user),
        SAVE_CHANGES,
        json!({"files": [{"name": name, "content": "committed"}], "branch": "master", "commitMessage": "First"}),
    )
    .await;

    let local_save = "mutation s($file: FileInput!) { localSave(file: $file) }";
    let saved = app
        .run(
            Some(&user),
            local_save,
            json!({"file": {"name": name, "content": "draft"}}),
        )
        .await;
    assert_eq!(saved["data"]["localSave"], "Saved locally");
    assert_eq!(
        std::fs::read_to_string(workspace.join("file.txt")).expect("read file"),
        "draft"
    );

    let reset_file = app
        .run(
            Some(&user),
            "mutation r($url: String!, $fileName: String!) { resetCurrentFile(url: $url, fileName: $fileName) }",
            json!({"url": GITHUB_URL, "fileName": name}),
        )
        .await;
    assert_eq!(
        reset_file["data"]["resetCurrentFile"],
        format!("reset file {name}")
    );
    assert_eq!(
        std::fs::read_to_string(workspace.join("file.txt")).expect("read file"),
        "committed"
    );

    app.run(
        Some(&user),
        local_save,
        json!({"file": {"name": name, "content": "second draft"}}),
    )
    .await;
    let committed = app
        .run(
            Some(&user),
            "mutation c($url: String!, $fileName: String!, $msg: String) { commitLocalChanges(url: $url, fileName: $fileName, commitMessage: $msg) }",
            json!({"url": GITHUB_URL, "fileName": name, "msg": "Second"}),
        )
        .await;
    assert_eq!(committed["data"]["commitLocalChanges"], "Committed");
    assert_eq!(git(&workspace, &["log", "-1", "--format=%s"]), "Second");

    app.run(
        Some(&user),
        local_save,
        json!({"file": {"name": name, "content": "throwaway"}}),
    )
    .await;
    let reset = app
        .run(
            Some(&user),
            "mutation r($url: String!) { resetLocalChanges(url: $url) }",
            json!({"url": GITHUB_URL}),
        )
        .await;
    let summary = reset["data"]["resetLocalChanges"]
        .as_str()
        .expect("reset summary");
    assert!(summary.starts_with("HEAD is now at "), "{summary}");
    assert!(summary.ends_with(" Second"), "{summary}");
    assert_eq!(
        std::fs::read_to_string(workspace.join("file.txt")).expect("read file"),
        "second draft"
    );
}

#[tokio::test]
async fn test_switch_branch() {
    let app = TestApp::new();
    let user = app.create_user("testuser", UserRole::NonAdmin);
    init_github_workspace(&app, "testuser");

    app.run(
        Some(&user),
        SAVE_CHANGES,
        json!({"files": [{"name": "testuser/github/owner/repo/file.txt", "content": "c"}], "branch": "master"}),
    )
    .await;

    let switch = "mutation s($url: String!, $branch: String!) { switchBranch(url: $url, branch: $branch) }";
    let switched = app
        .run(
            Some(&user),
            switch,
            json!({"url": GITHUB_URL, "branch": "develop"}),
        )
        .await;
    assert_eq!(switched["data"]["switchBranch"], "develop");

    let invalid = app
        .run(
            Some(&user),
            switch,
            json!({"url": GITHUB_URL, "branch": "bad..name"}),
        )
        .await;
    assert_eq!(error_codes(&invalid), vec!["BAD_USER_INPUT"]);
}

#[tokio::test]
async fn test_clone_then_pull_through_api() {
    let app = TestApp::new();
    let user = app.create_user("testuser", UserRole::NonAdmin);
    let remotes = TempDir::new().expect("create remotes dir");
    let remote = Remote::create(remotes.path());
    let url = remote.url();

    let cloned = app.run(Some(&user), CLONE, json!({"url": url})).await;
    assert_eq!(cloned, json!({"data": {"cloneRepository": "Cloned"}}));

    let state = app.run(Some(&user), REPO_STATE, json!({"url": url})).await;
    let files = &state["data"]["getRepoState"]["files"];
    assert_eq!(files.as_array().map(Vec::len), Some(1));
    assert_eq!(files[0]["content"], "base\n");
    assert_eq!(state["data"]["getRepoState"]["commitMessage"], "Initial commit");

    remote.push_change("file.txt", "updated\n", "Update upstream");

    let pulled = app
        .run(
            Some(&user),
            "mutation p($url: String!) { pullRepository(url: $url) }",
            json!({"url": url}),
        )
        .await;
    assert_eq!(pulled["data"]["pullRepository"], "Pulled", "{pulled}");

    let state = app.run(Some(&user), REPO_STATE, json!({"url": url})).await;
    assert_eq!(state["data"]["getRepoState"]["files"][0]["content"], "updated\n");

    // Cloning an existing workspace pulls.
    remote.push_change("file.txt", "again\n", "Update again");
    let recloned = app.run(Some(&user), CLONE, json!({"url": url})).await;
    assert_eq!(recloned["data"]["cloneRepository"], "Cloned");
    let state = app.run(Some(&user), REPO_STATE, json!({"url": url})).await;
    assert_eq!(state["data"]["getRepoState"]["files"][0]["content"], "again\n");
}

#[tokio::test]
async fn test_conflicting_pull_reports_merge_conflict() {
    let app = TestApp::new();
    let user = app.create_user("testuser", UserRole::NonAdmin);
    let remotes = TempDir::new().expect("create remotes dir");
    let remote = Remote::create(remotes.path());
    let url = remote.url();

    app.run(Some(&user), CLONE, json!({"url": url})).await;
    let workspace = amandus::workspace::path::resolve_workspace_path(
        &app.repositories(),
        &url,
        "testuser",
    )
    .expect("resolve workspace");

    std::fs::write(workspace.join("file.txt"), "local\n").expect("write local change");
    git(&workspace, &["commit", "-am", "Local change"]);
    remote.push_change("file.txt", "remote\n", "Remote change");

    let conflicted = app.run(Some(&user), CLONE, json!({"url": url})).await;
    assert_eq!(error_messages(&conflicted), vec!["Merge conflict detected"]);
    assert_eq!(error_codes(&conflicted), vec!["MERGE_CONFLICT"]);

    let again = app
        .run(
            Some(&user),
            "mutation p($url: String!) { pullRepository(url: $url) }",
            json!({"url": url}),
        )
        .await;
    assert_eq!(error_codes(&again), vec!["MERGE_CONFLICT"]);
}

#[tokio::test]
async fn test_merge_edit_resolves_and_pushes() {
    let app = TestApp::new();
    let remotes = TempDir::new().expect("create remotes dir");
    let remote = Remote::create(remotes.path());
    let workspaces = &app.state.workspaces;
    let workspace = app.repositories().join("testuser/other/owner/repo");
    let identity = CommitIdentity {
        name: "testuser".to_string(),
        email: "testuser@test.fi".to_string(),
    };

    workspaces
        .clone_repository(&workspace, &remote.url(), &identity)
        .await
        .expect("clone");

    let local = [FileChange {
        relative: "file.txt".to_string(),
        content: "local\n".to_string(),
    }];
    workspaces
        .save_changes(&workspace, &local, "master", "Local change", &identity, None)
        .await
        .expect("save and push");
    assert_eq!(remote.head_message(), "Local change");

    git(&remote.upstream, &["pull", "--no-rebase", "origin", "master"]);
    remote.push_change("file.txt", "remote\n", "Remote change");

    std::fs::write(workspace.join("file.txt"), "local again\n").expect("write");
    git(&workspace, &["commit", "-am", "Local again"]);

    let err = workspaces
        .pull(&workspace, &identity, None)
        .await
        .expect_err("pull conflicts");
    assert!(err.to_string().contains("Merge conflict"), "{err}");

    let resolved = [FileChange {
        relative: "file.txt".to_string(),
        content: "resolved\n".to_string(),
    }];
    workspaces
        .save_merge_edit(&workspace, &resolved, "Resolve conflict", &identity, None)
        .await
        .expect("save merge edit");

    assert_eq!(remote.head_message(), "Resolve conflict");
    let parents = git(&workspace, &["log", "-1", "--format=%P"]);
    assert_eq!(parents.split_whitespace().count(), 2);

    workspaces
        .pull(&workspace, &identity, None)
        .await
        .expect("pull after resolving");
}

#[tokio::test]
async fn test_git_metadata_can_not_be_edited() {
    let app = TestApp::new();
    let user = app.create_user("testuser", UserRole::NonAdmin);
    let workspace = init_github_workspace(&app, "testuser");
    let config = workspace.join(".git/config");
    let original = std::fs::read_to_string(&config).expect("read git config");

    let local = app
        .run(
            Some(&user),
            "mutation s($file: FileInput!) { localSave(file: $file) }",
            json!({"file": {
                "name": "testuser/github/owner/repo/.git/config",
                "content": "[core]\n\tfsmonitor = \"touch pwned; false\"\n",
            }}),
        )
        .await;
    assert_eq!(error_codes(&local), vec!["BAD_USER_INPUT"]);

    let saved = app
        .run(
            Some(&user),
            SAVE_CHANGES,
            json!({
                "files": [{"name": "testuser/github/owner/repo/.GIT/hooks/pre-commit", "content": "x"}],
                "branch": "master",
            }),
        )
        .await;
    assert_eq!(error_codes(&saved), vec!["BAD_USER_INPUT"]);

    assert_eq!(
        std::fs::read_to_string(&config).expect("read git config"),
        original
    );
    assert!(!workspace.join(".git/hooks/pre-commit").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_committed_symlink_does_not_escape_workspace() {
    let app = TestApp::new();
    let user = app.create_user("testuser", UserRole::NonAdmin);
    let workspace = init_github_workspace(&app, "testuser");
    let outside = TempDir::new().expect("create outside dir");

    std::os::unix::fs::symlink(outside.path(), workspace.join("link")).expect("create symlink");
    git(&workspace, &["add", "link"]);
    git(&workspace, &["commit", "-m", "Add link"]);

    let local = app
        .run(
            Some(&user),
            "mutation s($file: FileInput!) { localSave(file: $file) }",
            json!({"file": {"name": "testuser/github/owner/repo/link/evil.txt", "content": "x"}}),
        )
        .await;
    assert_eq!(error_codes(&local), vec!["BAD_USER_INPUT"]);

    let saved = app
        .run(
            Some(&user),
            SAVE_CHANGES,
            json!({
                "files": [{"name": "testuser/github/owner/repo/link/evil.txt", "content": "x"}],
                "branch": "master",
            }),
        )
        .await;
    assert_eq!(error_codes(&saved), vec!["BAD_USER_INPUT"]);

    assert!(!outside.path().join("evil.txt").exists());
}

#[tokio::test]
async fn test_failed_clone_leaves_no_workspace() {
    let app = TestApp::new();
    let remotes = TempDir::new().expect("create remotes dir");
    let remote = Remote::create(remotes.path());
    let workspaces = &app.state.workspaces;
    let workspace = app.repositories().join("testuser/other/owner/repo");
    let identity = CommitIdentity {
        name: "testuser".to_string(),
        email: "testuser@test.fi".to_string(),
    };

    // Leftovers of an interrupted clone.
    std::fs::create_dir_all(&workspace).expect("create leftover dir");
    std::fs::write(workspace.join("partial"), "x").expect("write leftover file");

    let missing = format!("file://{}", remotes.path().join("missing.git").display());
    workspaces
        .clone_repository(&workspace, &missing, &identity)
        .await
        .expect_err("clone of a missing remote");
    assert!(!workspace.exists());

    let outcome = workspaces
        .clone_repository(&workspace, &remote.url(), &identity)
        .await
        .expect("retry clone");
    assert_eq!(outcome, amandus::workspace::CloneOutcome::Cloned);
    assert_eq!(
        std::fs::read_to_string(workspace.join("file.txt")).expect("read cloned file"),
        "base\n"
    );
}
