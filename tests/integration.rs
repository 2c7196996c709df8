use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn pagectx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pagectx");
    path
}

fn transcript_json() -> String {
    let page = |n: u32, lines: &[&str]| {
        let lines: Vec<serde_json::Value> = lines
            .iter()
            .enumerate()
            .map(|(i, t)| serde_json::json!({"text": t, "line_number": i + 1, "column": 0}))
            .collect();
        serde_json::json!({"page_number": n, "lines": lines})
    };
    serde_json::json!({
        "pages": [
            page(1, &[
                r"\section*{Chapter 1: Arrival}",
                "The ferry docked at dawn.",
                "The bell rang twice over the harbour.",
                "Gulls circled the pier.",
            ]),
            page(2, &[
                r"\section*{Chapter 3: Origins}",
                "Long before the town, there was the river.",
                "The bell rang twice over the harbour.",
                "Nobody remembered who cast it.",
            ]),
        ]
    })
    .to_string()
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(data_dir.join("transcript.json"), transcript_json()).unwrap();
    fs::write(
        data_dir.join("document.md"),
        "Chapter 1: Arrival\n\nThe ferry docked at dawn.\n\nThe bell rang twice over the harbour.\n\n\
         Chapter 3: Origins\n\nLong before the town, there was the river.\n\n\
         The bell rang twice over the harbour.",
    )
    .unwrap();

    let config_content = format!(
        r#"[transcript]
path = "{root}/data/transcript.json"
document = "{root}/data/document.md"

[retrieval]
budget = 4000

[server]
bind = "127.0.0.1:7341"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("pagectx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_pagectx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pagectx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pagectx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_locate_prints_sorted_lines() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pagectx(&config_path, &["locate", "bell rang twice"]);
    assert!(success, "locate failed: stdout={}, stderr={}", stdout, stderr);

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("2\tpage 1\t"));
    assert!(lines[1].starts_with("6\tpage 2\t"));
}

#[test]
fn test_locate_no_matches() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_pagectx(&config_path, &["locate", "submarine"]);
    assert!(success);
    assert!(stdout.contains("No matches."));
}

#[test]
fn test_occurrences_respects_limit() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_pagectx(&config_path, &["occurrences", "bell rang", "--limit", "1"]);
    assert!(success, "occurrences failed: {}", stderr);
    assert!(stdout.contains("1. line 2 (page 1)"));
    assert!(!stdout.contains("2. line"));
}

#[test]
fn test_headings_by_number() {
    let (_tmp, config_path) = setup_test_env();

    for query in ["Chapter 3", "3"] {
        let (stdout, stderr, success) = run_pagectx(&config_path, &["headings", query]);
        assert!(success, "headings failed: {}", stderr);
        assert!(stdout.contains("Chapter 3: Origins (page 2, line 4)"), "{}", stdout);
    }
}

#[test]
fn test_structure_json() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pagectx(&config_path, &["structure", "--json"]);
    assert!(success, "structure failed: {}", stderr);

    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["total_pages"], 2);
    assert_eq!(value["total_lines"], 8);
    assert_eq!(value["headings"].as_array().unwrap().len(), 2);
    assert_eq!(value["fingerprint"].as_str().unwrap().len(), 64);
}

#[test]
fn test_context_with_repeated_excerpt() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pagectx(
        &config_path,
        &[
            "context",
            "--instruction",
            "make it louder",
            "--excerpt",
            "The bell rang twice over the harbour.",
            "--json",
        ],
    );
    assert!(success, "context failed: {}", stderr);

    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let text = value["text"].as_str().unwrap();
    assert_eq!(text.matches("--- [LOCATION CHANGE] ---").count(), 1);
    assert!(value["annotations"].as_str().unwrap().contains('2'));
}

#[test]
fn test_context_fallback_within_budget() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pagectx(
        &config_path,
        &["context", "--instruction", "", "--budget", "60", "--json"],
    );
    assert!(success, "context failed: {}", stderr);

    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let text = value["text"].as_str().unwrap();
    assert!(text.chars().count() <= 60);
    assert!(text.contains("[... DOCUMENT CONTINUES ...]"));
}

#[test]
fn test_context_rejects_zero_budget() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_pagectx(
        &config_path,
        &["context", "--instruction", "x", "--budget", "0"],
    );
    assert!(!success);
    assert!(stderr.contains("budget"));
}

#[test]
fn test_missing_transcript_fails_cleanly() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("nope.json");

    let (_, stderr, success) = run_pagectx(
        &config_path,
        &["--transcript", missing.to_str().unwrap(), "structure"],
    );
    assert!(!success);
    assert!(stderr.contains("Failed to build index"));
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config").join("bad.toml");
    fs::write(&bad, "[retrieval]\nbudget = 0\n").unwrap();

    let (_, stderr, success) = run_pagectx(&bad, &["structure"]);
    assert!(!success);
    assert!(stderr.contains("retrieval.budget"));
}
