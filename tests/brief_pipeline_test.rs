use chrono::{Datelike, Days, Local};
use predicates::str::contains;
use serde_json::{Value, json};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::tempdir;
use tiny_http::{Header, Response, Server};

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    url: String,
    body: String,
}

/// One local server standing in for the tracker, the wiki and Ollama.
fn start_backend(issues: Value) -> (String, Arc<Mutex<Vec<Seen>>>) {
    let server = Server::http("127.0.0.1:0").expect("bind backend");
    let addr = server.server_addr().to_ip().expect("ip listener");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    thread::spawn(move || {
        for mut request in server.incoming_requests() {
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let method = request.method().as_str().to_string();
            let url = request.url().to_string();

            let reply = if url.starts_with("/rest/api/2/search") {
                issues.clone()
            } else if url.starts_with("/rest/api/content/") && method == "GET" {
                json!({"id": "4242", "title": "Apollo status", "version": {"number": 1}})
            } else if url.starts_with("/rest/api/content/") {
                json!({"id": "4242"})
            } else if url == "/api/chat" {
                ollama_reply(&body)
            } else {
                json!({})
            };

            log.lock().expect("log").push(Seen { method, url, body });
            let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                .expect("header");
            let _ = request.respond(Response::from_string(reply.to_string()).with_header(header));
        }
    });

    (format!("http://{addr}"), seen)
}

fn ollama_reply(raw: &str) -> Value {
    let request: Value = serde_json::from_str(raw).unwrap_or(Value::Null);
    let prompt = request["messages"][1]["content"].as_str().unwrap_or_default();
    let content = if request.get("format").is_some() {
        let key = if prompt.contains("\"key\":\"APO-1\"") {
            "APO-1"
        } else {
            "APO-2"
        };
        json!({
            "key": key,
            "summary": format!("{key} summary"),
            "achievements": format!("{key} shipped"),
            "deliverable": format!("{key} deliverable"),
            "focus": "backend",
            "risks": "capacity"
        })
        .to_string()
    } else if prompt.starts_with("Create one line summary") {
        "Month of steady delivery".to_string()
    } else {
        "Rollup line one\nRollup line two\nRollup line one".to_string()
    };
    json!({
        "message": {"role": "assistant", "content": content},
        "done": true,
        "done_reason": "stop"
    })
}

fn jira_issue(key: &str, created: &str, status: &str) -> Value {
    json!({
        "key": key,
        "fields": {
            "summary": format!("{key} title"),
            "description": "Work item",
            "status": {"name": status},
            "created": created,
            "assignee": {"emailAddress": "dev@example.com"},
            "labels": ["backend"],
            "priority": {"name": "High"}
        }
    })
}

fn write_config(path: &Path, base: &str) {
    let raw = format!(
        r#"
[tracker]
base_url = "{base}"
token = "jira-token"

[wiki]
base_url = "{base}"
token = "wiki-token"

[llm]
provider = "ollama"
model = "granite4"
base_url = "{base}"

[[projects]]
name = "Apollo"
page_id = "4242"
epic = "APO-100"
jql = "project = APO"
due_date = "2030-06-30"
deliverables = "Billing API###Portal"
success_criteria = "Portal###99% uptime"
"#
    );
    fs::write(path, raw).expect("write config");
}

#[test]
fn run_distills_publishes_and_then_reuses_the_cache() {
    let tmp = tempdir().expect("tempdir");
    // a recent day strictly inside its month, so it lands in a timeline bucket
    let today = Local::now().date_naive();
    let day = (2..=10)
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .find(|d| d.day() != 1 && d.succ_opt().is_some_and(|next| next.day() != 1))
        .expect("recent day");
    let recent = day.format("%Y-%m-%dT10:00:00.000+0000").to_string();
    let year = day.year().to_string();
    let issues = json!({"issues": [
        jira_issue("APO-1", &recent, "Done"),
        jira_issue("APO-2", &recent, "In Progress"),
    ]});
    let (base, seen) = start_backend(issues);
    let config = tmp.path().join("brief.toml");
    write_config(&config, &base);

    let run = || {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("pm-brief");
        cmd.current_dir(tmp.path())
            .env("HOME", tmp.path())
            .env("BRIEF_HOME", tmp.path())
            .env("BRIEF_CONFIG_PATH", &config)
            .env_remove("RUST_LOG")
            .args(["run", "--year", year.as_str()]);
        cmd
    };

    run()
        .assert()
        .success()
        .stdout(contains("Apollo: fetched=2 cached=0 distilled=2 skipped=0"))
        .stdout(contains("Apollo: published version=2"));

    let preview = fs::read_to_string(tmp.path().join("preview/4242.html")).expect("preview");
    assert!(preview.contains("Rollup line one"));
    assert!(preview.contains("Month of steady delivery"));
    assert!(preview.contains("99% uptime"));
    assert!(preview.contains(&format!("{base}/browse/APO-100")));

    let requests = seen.lock().expect("log").clone();
    let put = requests
        .iter()
        .find(|r| r.method == "PUT")
        .expect("page update");
    let sent: Value = serde_json::from_str(&put.body).expect("json body");
    assert_eq!(sent["version"]["number"], 2);
    assert_eq!(sent["body"]["storage"]["representation"], "storage");

    let distill_calls = |log: &[Seen]| {
        log.iter()
            .filter(|r| r.url == "/api/chat" && r.body.contains("\"format\""))
            .count()
    };
    assert_eq!(distill_calls(&requests), 2);

    run()
        .assert()
        .success()
        .stdout(contains("Apollo: fetched=2 cached=2 distilled=0 skipped=0"));
    let requests = seen.lock().expect("log").clone();
    assert_eq!(distill_calls(&requests), 2);

    let audit = fs::read_to_string(tmp.path().join("logs/audit.log")).expect("audit log");
    assert!(audit.contains("\"phase\":\"publish\""));
}

#[test]
fn dry_run_reports_pending_keys_and_publishes_nothing() {
    let tmp = tempdir().expect("tempdir");
    let issues = json!({"issues": [
        jira_issue("APO-1", "2025-01-10T10:00:00.000+0000", "Done"),
    ]});
    let (base, seen) = start_backend(issues);
    let config = tmp.path().join("brief.toml");
    write_config(&config, &base);

    assert_cmd::cargo::cargo_bin_cmd!("pm-brief")
        .current_dir(tmp.path())
        .env("HOME", tmp.path())
        .env("BRIEF_HOME", tmp.path())
        .env("BRIEF_CONFIG_PATH", &config)
        .args(["run", "--dry-run", "--year", "2025"])
        .assert()
        .success()
        .stdout(contains("Apollo: would_distill=APO-1"));

    let requests = seen.lock().expect("log").clone();
    assert!(requests.iter().all(|r| r.method != "PUT"));
    assert!(requests.iter().all(|r| !r.body.contains("\"format\"")));
    assert!(tmp.path().join("preview/4242.html").exists());
}
