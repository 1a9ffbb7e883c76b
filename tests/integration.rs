use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn crag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("crag");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(files_dir.join("nested")).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha\n\nThe alpha notes talk about Rust programming and cargo.",
    )
    .unwrap();
    fs::write(
        files_dir.join("nested").join("beta.txt"),
        "Beta notes cover deployment with Kubernetes.",
    )
    .unwrap();
    fs::write(files_dir.join("skip.log"), "log line that must not be imported").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/crag.sqlite"

[chunking]
chunk_size = 40

[retrieval]
limit = 3

[server]
bind = "127.0.0.1:7341"
"#,
        root.display()
    );

    let config_path = config_dir.join("crag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_crag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = crag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("OPENAI_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run crag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_crag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("crag.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_crag(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_crag(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_save_get_search_delete() {
    let (_tmp, config_path) = setup_test_env();
    run_crag(&config_path, &["init"]);

    let (stdout, stderr, success) = run_crag(
        &config_path,
        &[
            "save",
            "--owner",
            "alice",
            "--category",
            "profile",
            "--text",
            "My name is Alice and I live in Lisbon.",
        ],
    );
    assert!(success, "save failed: {}", stderr);
    assert!(stdout.contains("Saved content"));

    let (stdout, _, success) = run_crag(
        &config_path,
        &["get", "--owner", "alice", "--category", "profile"],
    );
    assert!(success);
    assert!(stdout.contains("Content (1 chunks)"), "got: {}", stdout);
    assert!(stdout.contains("Lisbon"));

    let (stdout, _, success) = run_crag(
        &config_path,
        &["search", "--owner", "alice", "--category", "profile", "where do I live"],
    );
    assert!(success);
    assert!(stdout.contains("1. "), "got: {}", stdout);

    // Other owners see nothing.
    let (stdout, _, _) = run_crag(&config_path, &["search", "--owner", "bob", "Lisbon"]);
    assert!(stdout.contains("No results."));

    let (stdout, _, success) = run_crag(&config_path, &["delete", "--owner", "alice"]);
    assert!(success);
    assert!(stdout.contains("Deleted 1 chunks"));

    let (stdout, _, _) = run_crag(&config_path, &["get", "--owner", "alice"]);
    assert!(stdout.contains("No content."));
}

#[test]
fn test_save_replaces_scope() {
    let (_tmp, config_path) = setup_test_env();
    run_crag(&config_path, &["init"]);

    run_crag(
        &config_path,
        &["save", "--owner", "u", "--category", "c", "--text", "old text"],
    );
    run_crag(
        &config_path,
        &["save", "--owner", "u", "--category", "c", "--text", "new text"],
    );

    let (stdout, _, _) = run_crag(&config_path, &["get", "--owner", "u", "--category", "c"]);
    assert!(stdout.contains("new text"));
    assert!(!stdout.contains("old text"));
}

#[test]
fn test_save_requires_text_or_file() {
    let (_tmp, config_path) = setup_test_env();
    let (_, _, success) = run_crag(&config_path, &["save", "--owner", "u"]);
    assert!(!success);
}

#[test]
fn test_save_empty_text_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_crag(&config_path, &["init"]);
    let (_, stderr, success) = run_crag(&config_path, &["save", "--owner", "u", "--text", ""]);
    assert!(!success);
    assert!(stderr.contains("invalid input"), "got: {}", stderr);
}

#[test]
fn test_import_directory_with_globs() {
    let (tmp, config_path) = setup_test_env();
    run_crag(&config_path, &["init"]);

    let files = tmp.path().join("files");
    let (stdout, stderr, success) = run_crag(
        &config_path,
        &[
            "import",
            "--owner",
            "team",
            files.to_str().unwrap(),
            "--exclude",
            "**/*.log",
        ],
    );
    assert!(success, "import failed: {}", stderr);
    assert!(stdout.contains("Loaded 2 files"), "got: {}", stdout);

    let (stdout, _, _) = run_crag(&config_path, &["get", "--owner", "team"]);
    assert!(stdout.contains("Alpha"));
    assert!(!stdout.contains("must not be imported"));
}

#[test]
fn test_import_missing_path_fails() {
    let (tmp, config_path) = setup_test_env();
    run_crag(&config_path, &["init"]);

    let missing = tmp.path().join("nope.txt");
    let (_, _, success) = run_crag(
        &config_path,
        &["import", "--owner", "u", missing.to_str().unwrap()],
    );
    assert!(!success);
}

#[test]
fn test_ask_errors_when_llm_disabled() {
    let (_tmp, config_path) = setup_test_env();
    run_crag(&config_path, &["init"]);
    run_crag(&config_path, &["save", "--owner", "u", "--text", "cats purr"]);

    let (_, stderr, success) = run_crag(&config_path, &["ask", "--owner", "u", "do cats purr?"]);
    assert!(!success);
    assert!(stderr.contains("language model is disabled"), "got: {}", stderr);
}

#[test]
fn test_stats() {
    let (_tmp, config_path) = setup_test_env();
    run_crag(&config_path, &["init"]);
    run_crag(&config_path, &["save", "--owner", "u", "--text", "hello"]);

    let (stdout, _, success) = run_crag(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Chunks:      1"), "got: {}", stdout);
    assert!(stdout.contains("(none)"));
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config").join("bad.toml");
    fs::write(
        &bad,
        format!(
            "[db]\npath = \"{}/x.sqlite\"\n\n[chunking]\nchunk_size = 10\nchunk_overlap = 10\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_crag(&bad, &["init"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "got: {}", stderr);
}

#[test]
fn test_missing_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_crag(&tmp.path().join("absent.toml"), &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
