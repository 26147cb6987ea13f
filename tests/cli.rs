// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Tests for the `share2md` binary on saved share pages.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn share2md(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_share2md"))
        .args(args)
        .env_remove("SHARE2MD_LOG")
        .output()
        .expect("Failed to run share2md")
}

#[test]
fn renders_saved_page_to_stdout() {
    let page = fixture_path("basic.html");
    let output = share2md(&["--html", page.to_str().unwrap(), "--hide-source"]);

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "# ChatGPT Conversation\n\n## User\n\nHello\n\n## Assistant\n\nHi!\n\n"
    );
    assert!(output.stderr.is_empty(), "Unexpected stderr output");
}

#[test]
fn emits_json_messages() {
    let page = fixture_path("basic.html");
    let output = share2md(&["--json", "--html", page.to_str().unwrap()]);

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {"role": "user", "content": "Hello"},
            {"role": "assistant", "content": "Hi!"}
        ])
    );
}

#[test]
fn concatenates_directory_inputs_into_file() {
    let dir = tempfile::tempdir().unwrap();
    let pages = dir.path().join("pages");
    fs::create_dir(&pages).unwrap();
    fs::copy(fixture_path("basic.html"), pages.join("a.html")).unwrap();
    fs::copy(fixture_path("legacy.html"), pages.join("b.html")).unwrap();
    fs::write(pages.join("notes.txt"), "ignored").unwrap();
    let out = dir.path().join("out").join("chats.md");

    let output = share2md(&[
        "-q",
        "--title",
        "Shared chats",
        "--hide-source",
        "--html",
        pages.to_str().unwrap(),
        "-o",
        out.to_str().unwrap(),
    ]);

    assert!(output.status.success());
    let markdown = fs::read_to_string(&out).unwrap();
    assert_eq!(markdown.matches("# Shared chats").count(), 2);
    assert!(markdown.contains("\n---\n"));
    assert!(markdown.find("Hello").unwrap() < markdown.find("Draw a cat").unwrap());
}

#[test]
fn refuses_to_overwrite_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("chat.md");
    fs::write(&out, "keep me").unwrap();
    let page = fixture_path("basic.html");

    let output = share2md(&["--html", page.to_str().unwrap(), "-o", out.to_str().unwrap()]);
    assert!(output.status.success());
    assert_eq!(fs::read_to_string(&out).unwrap(), "keep me");

    let output = share2md(&["-f", "-q", "--html", page.to_str().unwrap(), "-o", out.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(fs::read_to_string(&out).unwrap().contains("Hi!"));
}

#[test]
fn page_without_data_fails_with_code() {
    let dir = tempfile::tempdir().unwrap();
    let page = dir.path().join("empty.html");
    fs::write(&page, "<html><body>Conversation not found</body></html>").unwrap();

    let output = share2md(&["--html", page.to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("E-PARSE-001"));
}

#[test]
fn rejects_unsupported_provider() {
    let output = share2md(&["https://claude.ai/share/abc"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not supported"));
}

#[test]
fn rejects_invalid_heading_offset() {
    let output = share2md(&["--heading-offset", "9", "https://chatgpt.com/share/abc"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("heading-offset"));
}
