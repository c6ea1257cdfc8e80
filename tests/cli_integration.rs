#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;
use std::process::{Command, Stdio};

fn redmon() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_redmon"));
    // Keep user-level config and env out of the tests.
    cmd.env_remove("REDMON_COMMAND_CASE")
        .env_remove("REDMON_ARGS_CASE")
        .env_remove("REDMON_UNQUOTED_ARGS")
        .env("XDG_CONFIG_HOME", env!("CARGO_TARGET_TMPDIR"))
        .current_dir(env!("CARGO_TARGET_TMPDIR"));
    cmd
}

fn fixture() -> String {
    format!("{}/tests/fixtures/monitor.log", env!("CARGO_MANIFEST_DIR"))
}

fn run_with_stdin(args: &[&str], stdin: &str) -> std::process::Output {
    let mut child = redmon()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    drop(child.stdin.take());
    child.wait_with_output().unwrap()
}

fn json_lines(output: &std::process::Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

// --- redmon parse ---

#[test]
fn parse_fixture_skips_unrecognized_lines() {
    let output = redmon().args(["parse", &fixture()]).output().unwrap();
    assert!(output.status.success());
    let records = json_lines(&output);
    assert_eq!(records.len(), 7);
    assert_eq!(records[0]["command"], "SELECT");
    assert_eq!(records[0]["args"][0], "0");
    assert_eq!(records[1]["args"].as_array().unwrap().len(), 0);
    assert_eq!(records[2]["args"][1], "KEY2");
    assert_eq!(records[5]["db"], "2");
    assert_eq!(records[5]["args"][0], "KEY \" 1");
    assert_eq!(records[6]["args"][0], "K\\E\\Y2");
    assert_eq!(records[6]["args"][1], "\\x00\\xff\\n");
    assert_eq!(records[6]["escaped_args"], serde_json::json!([1]));
}

#[test]
fn parse_reads_stdin() {
    let output = run_with_stdin(
        &["parse"],
        "1424186960.663817 [0 127.0.0.1:60475] \"MgEt\" \"KeY1\"\n",
    );
    assert!(output.status.success());
    let records = json_lines(&output);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["timestamp"], "1424186960.663817");
    assert_eq!(records[0]["command"], "MgEt");
    assert_eq!(records[0]["args"][0], "KeY1");
}

#[test]
fn parse_json_keeps_utf8_keys_intact() {
    let output = run_with_stdin(
        &["parse"],
        "1424186960.1 [0 127.0.0.1:1] \"SET\" \"caf\\xc3\\xa9\" \"v\"\n",
    );
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    assert!(stdout.contains("\"caf\u{e9}\""), "stdout: {stdout}");
    let records = json_lines(&output);
    assert_eq!(records[0]["args"][0], "caf\u{e9}");
    assert!(records[0].get("escaped_args").is_none());
}

#[test]
fn parse_verbose_reports_skipped_lines() {
    let output = redmon()
        .args(["parse", "--verbose", &fixture()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[redmon] skipped line 1"), "stderr: {stderr}");
    assert!(stderr.contains("[redmon] 2 line(s) skipped"), "stderr: {stderr}");
}

#[test]
fn parse_strict_fails_on_first_bad_line() {
    let output = redmon()
        .args(["parse", "--strict", &fixture()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("[redmon] error: line 1: not a monitor line"),
        "stderr: {stderr}"
    );
}

#[test]
fn parse_tsv_with_raw_column() {
    let line = "1424186960.1 [0 127.0.0.1:1] \"SET\" \"k\" \"a\\tb\"";
    let output = run_with_stdin(&["parse", "--format", "tsv", "--raw"], line);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim_end(),
        format!("1424186960.1\t0\tSET\tk\ta\\tb\t{}", line.replace('\\', "\\\\"))
    );
}

#[test]
fn parse_case_flags_override_defaults() {
    let output = run_with_stdin(
        &["parse", "--command-case", "upper", "--args-case", "lower"],
        "1424186960.1 [0 127.0.0.1:1] \"get\" \"KEY\"\n",
    );
    let records = json_lines(&output);
    assert_eq!(records[0]["command"], "GET");
    assert_eq!(records[0]["args"][0], "key");
}

#[test]
fn parse_lenient_accepts_unquoted_argument() {
    let line = "1424186960.1 [0 127.0.0.1:1] \"GET\" KEY\n";
    assert!(json_lines(&run_with_stdin(&["parse"], line)).is_empty());
    let records = json_lines(&run_with_stdin(&["parse", "--lenient"], line));
    assert_eq!(records[0]["args"][0], "KEY");
}

#[test]
fn parse_env_overrides_case() {
    let mut child = redmon()
        .args(["parse"])
        .env("REDMON_COMMAND_CASE", "lower")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(b"1424186960.1 [0 127.0.0.1:1] \"PING\"\n")
        .unwrap();
    drop(child.stdin.take());
    let output = child.wait_with_output().unwrap();
    assert_eq!(json_lines(&output)[0]["command"], "ping");
}

#[test]
fn parse_missing_file_is_an_error() {
    let output = redmon()
        .args(["parse", "/no/such/monitor.log"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to open"), "stderr: {stderr}");
}

// --- redmon stats ---

#[test]
fn stats_summary_json() {
    let output = redmon()
        .args(["stats", "--json", "--top", "2", &fixture()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["total_lines"], 9);
    assert_eq!(summary["decoded"], 7);
    assert_eq!(summary["unrecognized"], 2);
    assert_eq!(summary["dbs"]["0"], 6);
    assert_eq!(summary["dbs"]["2"], 1);
    assert_eq!(summary["top_keys"][0][0], "KEY1");
    assert_eq!(summary["top_keys"][0][1], 2);
    assert_eq!(summary["top_commands"].as_array().unwrap().len(), 2);
}

#[test]
fn stats_plain_text() {
    let output = redmon().args(["stats", &fixture()]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("lines: 9  decoded: 7  unrecognized: 2"), "{stdout}");
    assert!(stdout.contains("top commands:"), "{stdout}");
    assert!(stdout.contains("db 2: 1"), "{stdout}");
    assert!(stdout.contains("       2  KEY1"), "{stdout}");
}

// --- redmon config ---

#[test]
fn config_prints_defaults() {
    let output = redmon().args(["config"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[parser]"), "{stdout}");
    assert!(stdout.contains("command_case = \"preserve\""), "{stdout}");
    assert!(stdout.contains("unquoted_args = \"reject\""), "{stdout}");
}

#[test]
fn config_check_valid_and_invalid_files() {
    let dir = tempfile::TempDir::new().unwrap();
    let good = dir.path().join("good.toml");
    std::fs::write(&good, "[parser]\nargs_case = \"upper\"\n").unwrap();
    let output = redmon()
        .args(["config", "--check", good.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[parser]\nargs_case = 3\n").unwrap();
    let output = redmon()
        .args(["config", "--check", bad.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to parse config file"), "{stderr}");
}

#[test]
fn project_config_is_picked_up() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join(".redmon")).unwrap();
    std::fs::write(
        dir.path().join(".redmon/config.toml"),
        "[parser]\ncommand_case = \"lower\"\n",
    )
    .unwrap();
    let output = redmon()
        .current_dir(dir.path())
        .args(["config"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("command_case = \"lower\""), "{stdout}");
}

#[test]
fn explicit_config_flag_wins() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("redmon.toml");
    std::fs::write(&path, "[parser]\nunquoted_args = \"lenient\"\n").unwrap();
    let output = redmon()
        .args(["--config", path.to_str().unwrap(), "config"])
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("unquoted_args = \"lenient\""), "{stdout}");
}
