#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const KEY_VARS: [&str; 4] = [
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GEMINI_API_KEY",
    "GOOGLE_AI_API_KEY",
];

fn reviewbench() -> Command {
    let mut cmd = Command::cargo_bin("reviewbench").unwrap();
    cmd.env("RUST_LOG", "warn")
        .env_remove("REVIEWBENCH_OUTPUT_DIR")
        .env_remove("REVIEWBENCH_REPETITIONS");
    for var in KEY_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn write_case(root: &Path, name: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("file.ts"), "export const total = (xs) => xs.length;\n").unwrap();
    fs::write(
        dir.join("diff.txt"),
        "@@ -1,0 +1,1 @@\n1 +export const total = (xs) => xs.length;\n",
    )
    .unwrap();
    fs::write(
        dir.join("suggestions.json"),
        r#"{
  "overallSummary": "Adds total()",
  "codeSuggestions": [{
    "relevantFile": "file.ts",
    "language": "typescript",
    "suggestionContent": "Guard against a null array.",
    "existingCode": "xs.length",
    "improvedCode": "(xs ?? []).length",
    "oneSentenceSummary": "Handle null input",
    "relevantLinesStart": 1,
    "relevantLinesEnd": 1,
    "label": "error_handling"
  }]
}"#,
    )
    .unwrap();
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("reviewbench.yaml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn help_lists_subcommands() {
    reviewbench()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run").and(predicate::str::contains("list")));
}

#[test]
fn list_prints_sorted_case_names() {
    let tmp = tempdir().unwrap();
    write_case(tmp.path(), "zeta");
    write_case(tmp.path(), "alpha");
    fs::create_dir_all(tmp.path().join(".git")).unwrap();

    reviewbench()
        .args(["list", "--examples"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout("alpha\nzeta\n");
}

#[test]
fn list_reads_corpus_from_config() {
    let tmp = tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    write_case(&corpus, "cart");
    let cfg = write_config(
        tmp.path(),
        &format!(
            "reviewer: {{ provider: gemini, model: gemini-2.5-pro }}\n\
             evaluator: {{ provider: openai, model: o3 }}\n\
             examples_dir: '{}'\n",
            corpus.display()
        ),
    );

    reviewbench()
        .args(["list", "--config"])
        .arg(&cfg)
        .assert()
        .success()
        .stdout("cart\n");
}

#[test]
fn list_missing_corpus_is_fatal() {
    let tmp = tempdir().unwrap();
    reviewbench()
        .args(["list", "--examples"])
        .arg(tmp.path().join("nope"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn run_without_config_exits_2() {
    let tmp = tempdir().unwrap();
    reviewbench()
        .args(["run", "--config"])
        .arg(tmp.path().join("missing.yaml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn unsupported_provider_exits_2() {
    let tmp = tempdir().unwrap();
    let cfg = write_config(
        tmp.path(),
        "reviewer: { provider: mistral, model: large, api_key: k }\n\
         evaluator: { provider: openai, model: o3, api_key: k }\n",
    );
    reviewbench()
        .args(["run", "--config"])
        .arg(&cfg)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unsupported provider: 'mistral'"));
}

#[test]
fn missing_api_key_exits_2() {
    let tmp = tempdir().unwrap();
    let cfg = write_config(
        tmp.path(),
        "reviewer: { provider: gemini, model: gemini-2.5-pro }\n\
         evaluator: { provider: openai, model: o3 }\n",
    );
    reviewbench()
        .args(["run", "--config"])
        .arg(&cfg)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("configuration error"));
}

#[test]
fn run_with_unreachable_models_reports_no_results() {
    let tmp = tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    write_case(&corpus, "cart");
    let out = tmp.path().join("runs");
    let cfg = write_config(
        tmp.path(),
        "reviewer: { provider: openai, model: gpt-4o, api_key: k, base_url: 'http://127.0.0.1:9' }\n\
         evaluator: { provider: anthropic, model: claude-sonnet-4-5, api_key: k, base_url: 'http://127.0.0.1:9' }\n\
         timeout_secs: 5\n",
    );

    reviewbench()
        .args(["run", "--config"])
        .arg(&cfg)
        .arg("--examples")
        .arg(&corpus)
        .arg("--out")
        .arg(&out)
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("SKIPPED [all_trials_failed]")
                .and(predicate::str::contains("Mean accuracy:      n/a")),
        );

    let run_dir = fs::read_dir(&out)
        .unwrap()
        .next()
        .expect("one run directory")
        .unwrap()
        .path();
    let summary: Value =
        serde_json::from_str(&fs::read_to_string(run_dir.join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["summary"]["cases_evaluated"], 0);
    assert_eq!(summary["failed_trials"][0]["kind"], "provider");
    assert_eq!(summary["failed_trials"][0]["stage"], "prompt_built");
    assert!(run_dir.join("cart").join("prompt.md").exists());

    let results: Value =
        serde_json::from_str(&fs::read_to_string(run_dir.join("evaluation_results.json")).unwrap())
            .unwrap();
    assert_eq!(results, Value::Array(vec![]));
}
