mod common;
use common::cli::{BtWorkspace, run_bt, run_bt_with_env};
use std::fs;

const FEED: &str = r#"{"id":"884","summary":"Search box loses focus","project":"maps","status":"Assigned","url":"https://maps.example.com/search"}
{"id":"885","title":"Tiles flicker","project":"maps","status":"Fixed","url":"https://maps.example.com/tiles","reporter":"sam"}
{"id":"886","title":"Docs typo","status":"WontFix"}
"#;

fn write_feed(workspace: &BtWorkspace, contents: &str) {
    let dir = workspace.bugs_dir().join("issuetracker");
    fs::create_dir_all(&dir).expect("feed dir");
    fs::write(dir.join("feed.jsonl"), contents).expect("write feed");
}

#[test]
fn test_crawl_imports_and_indexes_feed() {
    let workspace = BtWorkspace::initialized();
    write_feed(&workspace, FEED);

    let out = run_bt(&workspace, ["--json", "crawl", "issuetracker"], "crawl");
    assert!(out.status.success(), "{}", out.stderr);
    let report = out.json();
    assert_eq!(report["provider"], "issuetracker");
    assert_eq!(report["fetched"], 3);
    assert_eq!(report["created"], 3);
    assert_eq!(report["indexed"], 2);

    let resolved = run_bt(
        &workspace,
        ["--json", "list", "--provider", "issuetracker", "--state", "resolved"],
        "list_resolved",
    )
    .json();
    assert_eq!(resolved["count"], 1);
    assert_eq!(resolved["bugs"][0]["bug_id"], "885");
    assert_eq!(resolved["bugs"][0]["author"], "sam");

    let mapped = run_bt(
        &workspace,
        ["--json", "urls", "https://maps.example.com/search"],
        "urls",
    )
    .json();
    assert_eq!(mapped["bugs"][0]["bug_id"], "884");

    let again = run_bt(&workspace, ["--json", "crawl", "issuetracker"], "recrawl").json();
    assert_eq!(again["created"], 0);
    assert_eq!(again["unchanged"], 3);
}

#[test]
fn test_crawl_text_summary() {
    let workspace = BtWorkspace::initialized();
    write_feed(&workspace, FEED);
    let out = run_bt(&workspace, ["crawl", "issuetracker"], "crawl_text");
    assert!(out.status.success());
    assert!(out.stdout.contains("Crawled issuetracker: 3 fetched, 3 created"));
}

#[test]
fn test_crawl_without_feed_is_empty() {
    let workspace = BtWorkspace::initialized();
    let out = run_bt(&workspace, ["--json", "crawl", "issuetracker"], "crawl_nofeed");
    assert!(out.status.success(), "{}", out.stderr);
    assert_eq!(out.json()["fetched"], 0);

    let datastore = run_bt(&workspace, ["--json", "crawl", "datastore"], "crawl_datastore");
    assert!(datastore.status.success());
    assert_eq!(datastore.json()["created"], 0);
}

#[test]
fn test_crawl_rejects_bad_input() {
    let workspace = BtWorkspace::initialized();
    let unknown = run_bt(&workspace, ["crawl", "jira"], "crawl_unknown");
    assert!(!unknown.status.success());
    assert!(unknown.stderr.contains("Invalid provider"));

    write_feed(&workspace, "{\"id\":\"1\",\"title\":\"ok\"}\nnot json\n");
    let broken = run_bt(&workspace, ["crawl", "issuetracker"], "crawl_broken");
    assert!(!broken.status.success());
    assert!(broken.stderr.contains("crawl failed"));
}

#[test]
fn test_push_stamps_and_writes_outbox() {
    let workspace = BtWorkspace::initialized();
    write_feed(&workspace, FEED);
    run_bt(&workspace, ["crawl", "issuetracker"], "crawl");

    let out = run_bt(&workspace, ["--json", "--actor", "alice", "push", "1"], "push");
    assert!(out.status.success(), "{}", out.stderr);
    let bug = out.json();
    assert_eq!(bug["last_updater"], "alice");
    assert_eq!(bug["metadata"]["pushed_by"], "alice");

    let outbox = fs::read_to_string(workspace.bugs_dir().join("issuetracker/outbox.jsonl"))
        .expect("outbox written");
    assert_eq!(outbox.lines().count(), 1);
    assert!(outbox.contains("\"pushed_by\":\"alice\""));

    // Stamps survive a re-crawl of an unchanged feed.
    run_bt(&workspace, ["crawl", "issuetracker"], "recrawl");
    let shown = run_bt(&workspace, ["--json", "show", "1"], "show").json();
    assert_eq!(shown[0]["last_updater"], "alice");
}

#[test]
fn test_push_actor_precedence() {
    let workspace = BtWorkspace::initialized();
    let created = run_bt(&workspace, ["--json", "create", "Local bug"], "create").json();
    let id = created["id"].to_string();

    let from_env = run_bt_with_env(
        &workspace,
        ["--json", "push", &id],
        &[("BT_ACTOR", "carol")],
        "push_env",
    );
    assert_eq!(from_env.json()["last_updater"], "carol");

    let from_flag = run_bt_with_env(
        &workspace,
        ["--json", "--actor", "dave", "push", &id],
        &[("BT_ACTOR", "carol")],
        "push_flag",
    );
    assert_eq!(from_flag.json()["last_updater"], "dave");

    let from_user = run_bt(&workspace, ["--json", "push", &id], "push_user");
    assert_eq!(from_user.json()["last_updater"], "tester");
}

#[test]
fn test_index_command() {
    let workspace = BtWorkspace::initialized();
    run_bt(
        &workspace,
        ["create", "Has url", "--url", "https://shop.example.com/cart"],
        "create_url",
    );
    run_bt(&workspace, ["create", "No url"], "create_plain");

    let indexed = run_bt(&workspace, ["--json", "index", "1"], "index");
    assert!(indexed.status.success(), "{}", indexed.stderr);
    assert!(indexed.json()["mapping"].is_i64());

    let skipped = run_bt(&workspace, ["index", "2"], "index_none");
    assert!(skipped.status.success());
    assert!(skipped.stdout.contains("no URL"));
}
