//! End-to-end tests: the real `agentpipe` binary against a fake agent CLI.
//!
//! The fake agent is a small /bin/sh script that speaks just enough of the
//! stream-JSON protocol: it reads the initialize request and the task,
//! prints scripted events, and echoes back any permission reply it gets.

#![cfg(unix)]

use agentpipe::approval::handoff::write_answer_file;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Reads the two opening lines and records them (plus argv) next to the script.
const PREAMBLE: &str = r#"#!/bin/sh
dir=$(dirname "$0")
printf '%s\n' "$@" > "$dir/argv.txt"
read -r init
printf '%s\n' "$init" > "$dir/init.json"
read -r task
printf '%s\n' "$task" > "$dir/task.json"
"#;

const SIMPLE_RUN: &str = r#"
echo '{"type":"system","subtype":"init","session_id":"sess-e2e","tools":["Read"]}'
echo 'agent warming up (not json)'
echo '{"type":"assistant","message":{"content":[{"type":"text","text":"Looking."}]},"session_id":"sess-e2e"}'
echo '{"type":"result","subtype":"success","is_error":false,"result":"done","session_id":"sess-e2e"}'
cat > /dev/null
"#;

const ASKS_QUESTION: &str = r#"
echo '{"type":"system","subtype":"init","session_id":"sess-q"}'
echo '{"type":"control_request","request_id":"req-1","request":{"subtype":"can_use_tool","tool_name":"AskUserQuestion","input":{"questions":[{"question":"Pick"}]},"tool_use_id":"toolu_e2e"}}'
read -r reply
printf '{"type":"user","permission_reply":%s}\n' "$reply"
echo '{"type":"result","subtype":"success","is_error":false}'
cat > /dev/null
"#;

const RUNS_BASH: &str = r#"
echo '{"type":"control_request","request_id":"req-2","request":{"subtype":"can_use_tool","tool_name":"Bash","input":{"command":"ls"},"tool_use_id":"toolu_bash"}}'
read -r reply
printf '{"type":"user","permission_reply":%s}\n' "$reply"
echo '{"type":"result","subtype":"success","is_error":false}'
cat > /dev/null
"#;

const CRASHES: &str = r#"
echo '{"type":"system","subtype":"init","session_id":"sess-crash"}'
exit 3
"#;

struct Harness {
    dir: TempDir,
    agent: PathBuf,
    scratch: PathBuf,
    settings: PathBuf,
}

impl Harness {
    fn new(body: &str) -> Self {
        Self::with_settings(body, "")
    }

    fn with_settings(body: &str, settings: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let agent = dir.path().join("fake-agent.sh");
        std::fs::write(&agent, format!("{}{}", PREAMBLE, body)).unwrap();
        std::fs::set_permissions(&agent, std::fs::Permissions::from_mode(0o755)).unwrap();

        let scratch = dir.path().join("answers");
        let settings_path = dir.path().join("settings.yaml");
        std::fs::write(&settings_path, settings).unwrap();

        Self {
            dir,
            agent,
            scratch,
            settings: settings_path,
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `agentpipe` with a clean, isolated environment.
    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("agentpipe").unwrap();
        cmd.current_dir(self.path())
            .env("ANTHROPIC_API_KEY", "sk-test")
            .env("AGENT_TASK", "Summarize the repo")
            .env_remove("AGENT_IMAGES")
            .env_remove("AGENTPIPE_CONFIG")
            .env_remove("AGENTPIPE_CLI")
            .env_remove("AGENTPIPE_SCRATCH_DIR")
            .env_remove("RUST_LOG")
            .arg("--cli-path")
            .arg(&self.agent)
            .arg("--scratch-dir")
            .arg(&self.scratch)
            .arg("--config")
            .arg(&self.settings)
            .timeout(Duration::from_secs(30));
        cmd
    }

    fn agent_was_started(&self) -> bool {
        self.path().join("init.json").exists()
    }

    fn read_json(&self, name: &str) -> Value {
        let raw = std::fs::read_to_string(self.path().join(name)).unwrap();
        serde_json::from_str(raw.trim()).unwrap()
    }
}

fn events(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| {
            serde_json::from_str(line)
                .unwrap_or_else(|e| panic!("stdout line is not JSON ({}): {}", e, line))
        })
        .collect()
}

#[test]
fn test_streams_events_in_order() {
    let harness = Harness::new(SIMPLE_RUN);
    let output = harness.command().output().unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let events = events(&output.stdout);
    let kinds: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, ["system", "assistant", "result"]);
    assert_eq!(events[1]["message"]["content"][0]["text"], "Looking.");
    assert_eq!(events[2]["result"], "done");

    let init = harness.read_json("init.json");
    assert_eq!(init["type"], "control_request");
    assert_eq!(init["request"]["subtype"], "initialize");

    let task = harness.read_json("task.json");
    assert_eq!(task["type"], "user");
    assert_eq!(task["message"]["content"][0]["text"], "Summarize the repo");
}

#[test]
fn test_passes_flags_to_agent() {
    let harness = Harness::with_settings(
        SIMPLE_RUN,
        "allowed_tools: [Read, AskUserQuestion]\npermission_mode: plan\nmodel: test-model\n",
    );
    harness
        .command()
        .args(["--append-system-prompt", "Answer in French.", "--continue"])
        .args(["--resume", "sess-old"])
        .assert()
        .success();

    let argv = std::fs::read_to_string(harness.path().join("argv.txt")).unwrap();
    let argv: Vec<&str> = argv.lines().collect();
    for pair in [
        ["--output-format", "stream-json"],
        ["--input-format", "stream-json"],
        ["--permission-prompt-tool", "stdio"],
        ["--allowedTools", "Read,AskUserQuestion"],
        ["--permission-mode", "plan"],
        ["--model", "test-model"],
        ["--append-system-prompt", "Answer in French."],
        ["--resume", "sess-old"],
    ] {
        assert!(argv.windows(2).any(|w| w == pair), "missing {:?} in {:?}", pair, argv);
    }
    assert!(argv.contains(&"--continue"));
}

#[test]
fn test_sends_images() {
    let harness = Harness::new(SIMPLE_RUN);
    std::fs::write(harness.path().join("screen.png"), b"\x89PNG").unwrap();

    harness
        .command()
        .env(
            "AGENT_IMAGES",
            r#"[{"path":"screen.png","mediaType":"image/png"}]"#,
        )
        .assert()
        .success();

    let task = harness.read_json("task.json");
    let content = task["message"]["content"].as_array().unwrap();
    assert_eq!(content.len(), 2);
    assert_eq!(content[1]["source"]["media_type"], "image/png");
    assert_eq!(content[1]["source"]["data"], "iVBORw==");
}

#[test]
fn test_task_file() {
    let harness = Harness::new(SIMPLE_RUN);
    std::fs::write(harness.path().join("task.md"), "Task from a file").unwrap();

    harness
        .command()
        .env_remove("AGENT_TASK")
        .args(["--task-file", "task.md"])
        .assert()
        .success();

    let task = harness.read_json("task.json");
    assert_eq!(task["message"]["content"][0]["text"], "Task from a file");
}

#[test]
fn test_rust_log_enables_info_output() {
    let harness = Harness::new(SIMPLE_RUN);
    let log_path = harness.path().join("decisions.jsonl");

    harness
        .command()
        .env("RUST_LOG", "agentpipe=info")
        .arg("--decision-log")
        .arg(&log_path)
        .assert()
        .success()
        .stderr(predicate::str::contains("Starting agent"))
        .stderr(predicate::str::contains("Answers for AskUserQuestion are read from"))
        .stderr(predicate::str::contains("Logging decisions to"));
}

#[test]
fn test_quiet_by_default() {
    let harness = Harness::new(SIMPLE_RUN);

    harness
        .command()
        .assert()
        .success()
        .stderr(predicate::str::contains("Starting agent").not());
}

#[test]
fn test_missing_credential_fails_before_agent() {
    let harness = Harness::new(SIMPLE_RUN);

    harness
        .command()
        .env_remove("ANTHROPIC_API_KEY")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("ANTHROPIC_API_KEY"));

    assert!(!harness.agent_was_started());
}

#[test]
fn test_missing_task_fails() {
    let harness = Harness::new(SIMPLE_RUN);

    harness
        .command()
        .env_remove("AGENT_TASK")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("AGENT_TASK"));

    assert!(!harness.agent_was_started());
}

#[test]
fn test_malformed_image_list_fails_before_agent() {
    let harness = Harness::new(SIMPLE_RUN);

    harness
        .command()
        .env("AGENT_IMAGES", "[{\"path\": ")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("AGENT_IMAGES"));

    assert!(!harness.agent_was_started());
}

#[test]
fn test_question_answered_through_file() {
    let harness = Harness::new(ASKS_QUESTION);
    let scratch = harness.scratch.clone();

    let answerer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(500));
        let mut answers = BTreeMap::new();
        answers.insert("Pick".to_string(), "Blue".to_string());
        write_answer_file(&scratch, "toolu_e2e", &answers).unwrap();
    });

    let output = harness.command().output().unwrap();
    answerer.join().unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let events = events(&output.stdout);
    assert!(
        events.iter().all(|e| e["type"] != "control_request"),
        "control traffic must not be printed"
    );

    let reply = events
        .iter()
        .find(|e| e.get("permission_reply").is_some())
        .expect("fake agent should echo our reply")["permission_reply"]
        .clone();
    assert_eq!(reply["type"], "control_response");
    assert_eq!(reply["response"]["subtype"], "success");
    assert_eq!(reply["response"]["request_id"], "req-1");

    let decision = &reply["response"]["response"];
    assert_eq!(decision["behavior"], "allow");
    assert_eq!(decision["updatedInput"]["answers"]["Pick"], "Blue");
    assert_eq!(decision["updatedInput"]["questions"][0]["question"], "Pick");

    assert!(!harness.scratch.join("toolu_e2e.json").exists());
    assert_eq!(events.last().unwrap()["type"], "result");
}

#[test]
fn test_unanswered_question_is_denied_and_logged() {
    let harness = Harness::with_settings(
        ASKS_QUESTION,
        "approval:\n  poll_interval_ms: 50\n  timeout_ms: 400\n",
    );
    let log_path = harness.path().join("decisions.jsonl");

    let output = harness
        .command()
        .arg("--decision-log")
        .arg(&log_path)
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let events = events(&output.stdout);
    let reply = events
        .iter()
        .find_map(|e| e.get("permission_reply"))
        .expect("fake agent should echo our reply");
    assert_eq!(reply["response"]["response"]["behavior"], "deny");
    assert!(!reply["response"]["response"]["message"]
        .as_str()
        .unwrap()
        .is_empty());

    let log = std::fs::read_to_string(&log_path).unwrap();
    let record: Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(record["tool_name"], "AskUserQuestion");
    assert_eq!(record["tool_use_id"], "toolu_e2e");
    assert_eq!(record["decision"], "deny");
    assert_eq!(record["session_id"], "sess-q");
}

#[test]
fn test_other_tools_allowed_unchanged() {
    let harness = Harness::new(RUNS_BASH);
    let output = harness.command().output().unwrap();

    assert!(output.status.success());
    let events = events(&output.stdout);
    let decision = &events[0]["permission_reply"]["response"]["response"];
    assert_eq!(decision["behavior"], "allow");
    assert_eq!(decision["updatedInput"], serde_json::json!({"command": "ls"}));
}

#[test]
fn test_agent_crash_exits_nonzero() {
    let harness = Harness::new(CRASHES);

    harness
        .command()
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("sess-crash"))
        .stderr(predicate::str::contains("Agent exited"));
}
