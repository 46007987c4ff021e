use std::process::Command;

fn sample_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("jobs.py"),
        "class Queue:\n    \"\"\"FIFO of jobs.\"\"\"\n\n    def push(self, job):\n        self.items.append(job)\n\n\ndef drain(queue):\n    run(queue)\n",
    )
    .unwrap();
    std::fs::create_dir(dir.path().join("venv")).unwrap();
    std::fs::write(dir.path().join("venv").join("site.py"), "def hidden():\n    pass\n").unwrap();
    dir
}

#[test]
fn chunks_json_lists_definitions() {
    let dir = sample_repo();

    let output = Command::new(env!("CARGO_BIN_EXE_reposeek"))
        .args(["chunks", "--format", "json", "--path"])
        .arg(dir.path())
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "reposeek chunks failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let chunks: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let chunks = chunks.as_array().unwrap();
    let names: Vec<&str> = chunks.iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Queue", "push", "drain"]);
    assert_eq!(chunks[1]["parentClass"], "Queue");
    assert_eq!(chunks[1]["chunkType"], "method");
    assert_eq!(chunks[0]["docstring"], "FIFO of jobs.");
    assert_eq!(chunks[2]["calls"][0], "run");
}

#[test]
fn chunks_text_shows_qualified_names() {
    let dir = sample_repo();

    let output = Command::new(env!("CARGO_BIN_EXE_reposeek"))
        .args(["chunks", "--path"])
        .arg(dir.path())
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("jobs.py:4-5"));
    assert!(stdout.contains("Queue.push"));
    assert!(!stdout.contains("hidden"));
}

#[test]
fn search_without_index_fails_with_hint() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_reposeek"))
        .args(["search", "anything", "--path"])
        .arg(dir.path())
        .current_dir(dir.path())
        .env("NO_COLOR", "1")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No index found"));
}
