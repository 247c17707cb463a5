//! End-to-end tests for the `vault` binary over a temporary SQLite database,
//! using the offline hashing embedder and the SQLite vector store.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("france.txt"),
        "The capital of France is Paris. Paris sits on the Seine.",
    )
    .unwrap();
    fs::write(
        files_dir.join("rust.md"),
        "# Rust\n\nCargo builds crates and resolves dependencies.",
    )
    .unwrap();
    fs::write(files_dir.join("blank.txt"), "   \n\n").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/vault.sqlite"

[storage]
root = "{root}/objects"

[chunking]
chunk_size = 200
chunk_overlap = 40

[embedding]
provider = "hashing"
dims = 512

[vector_store]
provider = "sqlite"

[extraction]
pdf_reader = "local"

[server]
bind = "127.0.0.1:0"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("vault.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_vault(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_vault"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("GOOGLE_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env("SUPABASE_JWT_SECRET", "cli-test-secret")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run vault binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn files_dir(config_path: &Path) -> PathBuf {
    config_path.parent().unwrap().parent().unwrap().join("files")
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vault(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/vault.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();
    let (_, _, first) = run_vault(&config_path, &["init"]);
    assert!(first, "First init failed");
    let (_, _, second) = run_vault(&config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_then_search_and_list() {
    let (tmp, config_path) = setup_test_env();
    let file = files_dir(&config_path).join("france.txt");

    let (stdout, stderr, success) = run_vault(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--owner", "alice"],
    );
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Indexed france.txt"));
    assert!(stdout.contains("status: indexed"));
    assert!(tmp.path().join("objects/alice").is_dir());

    let (stdout, _, success) = run_vault(
        &config_path,
        &["search", "capital of France", "--owner", "alice"],
    );
    assert!(success);
    assert!(stdout.contains("Paris"), "search output: {}", stdout);

    let (stdout, _, success) = run_vault(&config_path, &["documents", "--owner", "alice"]);
    assert!(success);
    assert!(stdout.contains("france.txt"));
    assert!(stdout.contains("indexed"));
}

#[test]
fn test_offline_commands_need_no_model_key() {
    let (_tmp, config_path) = setup_test_env();
    // Default llm and pdf_reader settings point at Gemini.
    let content = fs::read_to_string(&config_path).unwrap();
    fs::write(
        &config_path,
        content.replace("[extraction]\npdf_reader = \"local\"\n", ""),
    )
    .unwrap();
    let file = files_dir(&config_path).join("france.txt");

    let (stdout, stderr, success) = run_vault(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--owner", "alice"],
    );
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);

    let (stdout, stderr, success) = run_vault(&config_path, &["documents", "--owner", "alice"]);
    assert!(success, "documents failed: {}", stderr);
    assert!(stdout.contains("france.txt"));

    let (stdout, _, success) = run_vault(&config_path, &["search", "Paris", "--owner", "alice"]);
    assert!(success);
    assert!(stdout.contains("Paris"));
}

#[test]
fn test_chat_with_documents_reports_missing_model_key() {
    let (_tmp, config_path) = setup_test_env();
    let file = files_dir(&config_path).join("france.txt");
    let (_, stderr, success) = run_vault(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--owner", "alice"],
    );
    assert!(success, "ingest failed: {}", stderr);

    let (_, stderr, success) = run_vault(
        &config_path,
        &["chat", "What is the capital of France?", "--owner", "alice"],
    );
    assert!(!success);
    assert!(stderr.contains("GOOGLE_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn test_search_is_owner_scoped() {
    let (_tmp, config_path) = setup_test_env();
    let file = files_dir(&config_path).join("rust.md");
    let (_, stderr, success) = run_vault(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--owner", "alice"],
    );
    assert!(success, "ingest failed: {}", stderr);

    let (stdout, _, success) =
        run_vault(&config_path, &["search", "cargo crates", "--owner", "bob"]);
    assert!(success);
    assert!(stdout.contains("No results."));

    let (stdout, _, success) = run_vault(&config_path, &["documents", "--owner", "bob"]);
    assert!(success);
    assert!(stdout.contains("No documents."));
}

#[test]
fn test_chat_without_documents_answers_without_model() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_vault(
        &config_path,
        &["chat", "What is the capital of France?", "--owner", "nobody"],
    );
    assert!(success, "chat failed: {}", stderr);
    assert!(stdout.contains("I couldn't find any information about that in your documents."));
}

#[test]
fn test_blank_file_fails_and_stays_uploaded() {
    let (_tmp, config_path) = setup_test_env();
    let file = files_dir(&config_path).join("blank.txt");
    let (_, stderr, success) = run_vault(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--owner", "alice"],
    );
    assert!(!success);
    assert!(stderr.contains("extraction failed"), "stderr: {}", stderr);

    let (stdout, _, _) = run_vault(&config_path, &["documents", "--owner", "alice"]);
    assert!(stdout.contains("uploaded"));
}

#[test]
fn test_empty_search_query_errors() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_vault(&config_path, &["search", "  ", "--owner", "alice"]);
    assert!(!success);
    assert!(stderr.contains("query must not be empty"));
}

#[test]
fn test_token_command_mints_verifiable_token() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_vault(&config_path, &["token", "--owner", "alice"]);
    assert!(success);
    let token = stdout.trim();
    let auth = memory_vault::auth::Authenticator::new("cli-test-secret", None);
    assert_eq!(auth.verify(token).unwrap().sub, "alice");
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config_path) = setup_test_env();
    let content = fs::read_to_string(&config_path).unwrap();
    fs::write(
        &config_path,
        content.replace("chunk_overlap = 40", "chunk_overlap = 200"),
    )
    .unwrap();
    let (_, stderr, success) = run_vault(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"));
}
