//! End-to-end tests for the corpusql binary
//!
//! Every test points the config directory at an empty temp dir so a user's
//! own config file never leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn corpusql(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("corpusql").unwrap();
    cmd.env("CORPUSQL_CONFIG_DIR", temp.path().join("config"))
        .env_remove("CORPUSQL_RESULTS_TABLE")
        .env_remove("CORPUSQL_LOG")
        .env_remove("RUST_LOG");
    cmd
}

const MATRIX: &str = r#"{"columns": [{"layers": [{"layer_id": "word", "pattern": "needle"}]}]}"#;

// ============================================================================
// Translators
// ============================================================================

#[test]
fn test_transcripts_text() {
    let temp = TempDir::new().unwrap();
    corpusql(&temp)
        .args(["transcripts", "id == 'a.trs'"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "SELECT transcript.* FROM transcript WHERE transcript.transcript_id = 'a.trs' \
             ORDER BY transcript.transcript_id;",
        ));
}

#[test]
fn test_annotations_json() {
    let temp = TempDir::new().unwrap();
    let output = corpusql(&temp)
        .args(["--format", "json", "annotations", "layer.id == 'word' && label == 'x'"])
        .args(["--limit", "5"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let sql = value["sql"].as_str().unwrap();
    assert!(sql.starts_with("SELECT DISTINCT annotation.*, 'word' AS layer"));
    assert!(sql.ends_with(" LIMIT 5"));
    assert_eq!(value["parameters"], serde_json::json!([]));
}

#[test]
fn test_annotations_without_target_fails() {
    let temp = TempDir::new().unwrap();
    corpusql(&temp)
        .args(["annotations", "label == 'x'"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not identify the target layer"));
}

#[test]
fn test_every_unknown_layer_is_reported() {
    let temp = TempDir::new().unwrap();
    corpusql(&temp)
        .args(["transcripts", "my('x').label == 'a' && labels('y').includes('b')"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid layer: x"))
        .stderr(predicate::str::contains("Invalid layer: y"));
}

#[test]
fn test_parse_error_reports_position() {
    let temp = TempDir::new().unwrap();
    corpusql(&temp)
        .args(["transcripts", "id =="])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Parse error"));
}

// ============================================================================
// Search
// ============================================================================

#[test]
fn test_search_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("matrix.json");
    fs::write(&path, MATRIX).unwrap();

    corpusql(&temp)
        .args(["search", path.to_str().unwrap(), "--search-id", "7"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("INSERT INTO _result ("))
        .stdout(predicate::str::contains("SELECT 7, turn.ag_id"))
        .stdout(predicate::str::contains("search_0_0.label REGEXP ?"))
        .stdout(predicate::str::contains(r#"-- ?1 = "^(needle)$""#));
}

#[test]
fn test_search_from_stdin_with_participants() {
    let temp = TempDir::new().unwrap();
    corpusql(&temp)
        .args(["search", "-", "-p", "ada", "--main-only"])
        .write_stdin(MATRIX)
        .assert()
        .success()
        .stdout(predicate::str::contains("transcript_speaker.main_speaker <> 0"))
        .stdout(predicate::str::contains(r#"-- ?2 = "ada""#));
}

#[test]
fn test_search_rejects_empty_matrix() {
    let temp = TempDir::new().unwrap();
    corpusql(&temp)
        .args(["search", "-"])
        .write_stdin(r#"{"columns": []}"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no columns"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_results_table_precedence() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("corpusql.toml");
    fs::write(&config, "[search]\nresults_table = \"_from_file\"\n").unwrap();

    corpusql(&temp)
        .args(["--config", config.to_str().unwrap(), "search", "-"])
        .write_stdin(MATRIX)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("INSERT INTO _from_file ("));

    corpusql(&temp)
        .env("CORPUSQL_RESULTS_TABLE", "_from_env")
        .args(["--config", config.to_str().unwrap(), "search", "-"])
        .write_stdin(MATRIX)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("INSERT INTO _from_env ("));

    corpusql(&temp)
        .env("CORPUSQL_RESULTS_TABLE", "_from_env")
        .args(["--config", config.to_str().unwrap(), "search", "-"])
        .args(["--results-table", "_from_flag"])
        .write_stdin(MATRIX)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("INSERT INTO _from_flag ("));
}

#[test]
fn test_default_config_dir_is_used() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("config");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), "[search]\nresults_table = \"_default_dir\"\n").unwrap();

    corpusql(&temp)
        .args(["search", "-"])
        .write_stdin(MATRIX)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("INSERT INTO _default_dir ("));
}

#[test]
fn test_missing_config_file_fails() {
    let temp = TempDir::new().unwrap();
    corpusql(&temp)
        .args(["--config", "/nonexistent/corpusql.toml", "layers"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_layers_from_configured_schema() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("corpusql.toml");
    fs::write(
        &config,
        r#"
[schema]

[[schema.layers]]
id = "transcript"
storage = { kind = "pseudo", pseudo = "transcript" }

[[schema.layers]]
id = "participant"
storage = { kind = "pseudo", pseudo = "participant" }

[[schema.layers]]
id = "corpus"
storage = { kind = "pseudo", pseudo = "corpus" }

[[schema.layers]]
id = "episode"
storage = { kind = "pseudo", pseudo = "episode" }

[[schema.layers]]
id = "turn"
scope = "M"
storage = { kind = "table", layer_id = 11 }

[[schema.layers]]
id = "utterance"
scope = "M"
storage = { kind = "table", layer_id = 12 }

[[schema.layers]]
id = "word"
scope = "W"
storage = { kind = "table", layer_id = 0 }

[[schema.layers]]
id = "phonemes"
scope = "W"
type = "ipa"
storage = { kind = "table", layer_id = 4 }
"#,
    )
    .unwrap();

    corpusql(&temp)
        .args(["--config", config.to_str().unwrap(), "layers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("phonemes"))
        .stdout(predicate::str::contains("table 4"))
        .stdout(predicate::str::contains("ipa"));
}

#[test]
fn test_layers_json() {
    let temp = TempDir::new().unwrap();
    let output = corpusql(&temp)
        .args(["layers", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let layers: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(layers
        .as_array()
        .unwrap()
        .iter()
        .any(|layer| layer["id"] == "word"));
}

#[test]
fn test_verbose_logs_to_stderr() {
    let temp = TempDir::new().unwrap();
    corpusql(&temp)
        .args(["--verbose", "transcripts", "id == 'a'"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SELECT transcript.*"))
        .stderr(predicate::str::contains("Translating expression"));
}

#[test]
fn test_log_env_sets_level() {
    let temp = TempDir::new().unwrap();
    corpusql(&temp)
        .env("CORPUSQL_LOG", "debug")
        .args(["transcripts", "id == 'a'"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Translating expression"));
}

#[test]
fn test_log_level_flag_beats_env() {
    let temp = TempDir::new().unwrap();
    corpusql(&temp)
        .env("CORPUSQL_LOG", "debug")
        .args(["--log-level", "error", "transcripts", "id == 'a'"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Translating expression").not());

    corpusql(&temp)
        .env("CORPUSQL_LOG", "off")
        .args(["--log-level", "debug", "transcripts", "id == 'a'"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Translating expression"));
}

#[test]
fn test_rust_log_beats_log_env() {
    let temp = TempDir::new().unwrap();
    corpusql(&temp)
        .env("CORPUSQL_LOG", "debug")
        .env("RUST_LOG", "error")
        .args(["transcripts", "id == 'a'"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Translating expression").not());
}

#[test]
fn test_log_env_beats_config_file() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("corpusql.toml");
    fs::write(&config, "[logging]\nlevel = \"off\"\n").unwrap();

    corpusql(&temp)
        .env("CORPUSQL_LOG", "debug")
        .args(["--config", config.to_str().unwrap(), "transcripts", "id == 'a'"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Translating expression"));
}
