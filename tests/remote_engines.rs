mod http_stub;

use std::fs;

use predicates::prelude::*;

use http_stub::{HttpStub, StubResponse, chat_reply, chat_tool_call};

fn html_input(temp: &tempfile::TempDir) -> String {
    let input = temp.path().join("doc.html");
    fs::write(&input, "<p>Bonjour</p>").expect("write input");
    input.to_str().expect("utf8 path").to_owned()
}

#[test]
fn gateway_translation_goes_to_stdout() {
    let stub = HttpStub::gateway(chat_reply("<p>Hello</p>"));
    let temp = tempfile::tempdir().expect("tempdir");
    let input = html_input(&temp);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("govdoc");
    cmd.env("GOVDOC_GATEWAY_BASE_URL", stub.gateway_url())
        .env("GOVDOC_GATEWAY_API_KEY", "test-key")
        .env("GOVDOC_GATEWAY_MODEL", "stub-model")
        .args(["translate", "--input", &input, "--to", "en"])
        .assert()
        .success()
        .stdout("<p>Hello</p>\n");

    let requests = stub.requests();
    assert_eq!(requests[0].body["model"], "stub-model");
    let system = requests[0].body["messages"][0]["content"]
        .as_str()
        .expect("system prompt");
    assert!(system.contains("Auto-detect the language"), "{system}");
}

#[test]
fn gateway_rate_limit_is_reported() {
    let stub = HttpStub::gateway(StubResponse::json(
        429,
        serde_json::json!({ "error": { "message": "slow down" } }),
    ));
    let temp = tempfile::tempdir().expect("tempdir");
    let input = html_input(&temp);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("govdoc");
    cmd.env("GOVDOC_GATEWAY_BASE_URL", stub.gateway_url())
        .env("GOVDOC_GATEWAY_API_KEY", "test-key")
        .args(["translate", "--input", &input, "--to", "en"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Rate limit exceeded"));
}

#[test]
fn gateway_quota_is_reported() {
    let stub = HttpStub::gateway(StubResponse::json(402, serde_json::json!({})));
    let temp = tempfile::tempdir().expect("tempdir");
    let input = html_input(&temp);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("govdoc");
    cmd.env("GOVDOC_GATEWAY_BASE_URL", stub.gateway_url())
        .env("GOVDOC_GATEWAY_API_KEY", "test-key")
        .args(["translate", "--input", &input, "--to", "en"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage limit reached"));
}

#[test]
fn gateway_without_api_key_fails_before_calling_out() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = html_input(&temp);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("govdoc");
    cmd.env_remove("GOVDOC_GATEWAY_API_KEY")
        .args(["translate", "--input", &input, "--to", "en"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GOVDOC_GATEWAY_API_KEY is not set"));
}

#[test]
fn functions_error_body_is_surfaced() {
    let stub = HttpStub::spawn(vec![(
        "/functions/v1/translate",
        StubResponse::json(500, serde_json::json!({ "error": "AI gateway error" })),
    )]);
    let temp = tempfile::tempdir().expect("tempdir");
    let input = html_input(&temp);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("govdoc");
    cmd.args([
        "translate",
        "--input",
        &input,
        "--to",
        "en",
        "--engine",
        "functions",
        "--functions-url",
        &stub.functions_url(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("AI gateway error"));
}

#[test]
fn gateway_quiz_is_played_from_stdin() {
    let stub = HttpStub::gateway(chat_tool_call(
        "create_quiz",
        &serde_json::json!({
            "questions": [
                {
                    "type": "multiple_choice",
                    "question": "What is \"Décret\" in English?",
                    "options": ["Law", "Decree", "Budget"],
                    "correct_answer": "Decree"
                },
                {
                    "type": "fill_blank",
                    "question": "The ___ was approved.",
                    "correct_answer": "budget"
                }
            ]
        }),
    ));
    let temp = tempfile::tempdir().expect("tempdir");
    let store = temp.path().join("store");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("govdoc");
    cmd.env("GOVDOC_GATEWAY_BASE_URL", stub.gateway_url())
        .env("GOVDOC_GATEWAY_API_KEY", "test-key")
        .args([
            "quiz",
            "run",
            "--seed",
            "3",
            "--user",
            "agent-7",
            "--store-dir",
            store.to_str().expect("utf8 path"),
        ])
        .write_stdin("2\nBudget\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/2] Multiple Choice"))
        .stdout(predicate::str::contains("[2/2] Fill the Blank"))
        .stdout(predicate::str::contains("100%"))
        .stdout(predicate::str::contains("2/2 correct answers"));

    let requests = stub.requests();
    assert_eq!(
        requests[0].body["tool_choice"]["function"]["name"],
        "create_quiz"
    );

    let saved = fs::read_to_string(store.join("quiz_results.jsonl")).expect("read results");
    let attempt: serde_json::Value =
        serde_json::from_str(saved.lines().next().expect("one attempt")).expect("attempt json");
    assert_eq!(attempt["user_id"], "agent-7");
    assert_eq!(attempt["correct_answers"], 2);
    assert_eq!(attempt["total_questions"], 2);
    assert_eq!(attempt["questions"][1]["user_answer"], "Budget");
}

#[test]
fn functions_quiz_sends_terms_and_language() {
    let stub = HttpStub::spawn(vec![(
        "/functions/v1/generate-quiz",
        StubResponse::json(
            200,
            serde_json::json!({
                "questions": [{
                    "type": "multiple_choice",
                    "question": "Quel est le terme pour « Budget » ?",
                    "options": ["Loi", "Budget"],
                    "correct_answer": "Budget"
                }]
            }),
        ),
    )]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("govdoc");
    cmd.args([
        "quiz",
        "run",
        "--engine",
        "functions",
        "--functions-url",
        &stub.functions_url(),
        "--lang",
        "fr",
        "--seed",
        "5",
    ])
    .write_stdin("1\n")
    .assert()
    .success()
    .stdout(predicate::str::contains("Quiz terminé !"))
    .stdout(predicate::str::contains("0/1 réponses correctes"));

    let requests = stub.requests();
    assert_eq!(requests[0].body["lang"], "fr");
    let terms = requests[0].body["terms"].as_array().expect("terms");
    assert_eq!(terms.len(), 15);
    assert!(terms.iter().all(|t| t["fr"].is_string() && t["en"].is_string()));
}
