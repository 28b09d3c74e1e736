mod http_stub;

use std::fs;
use std::io::Write as _;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use predicates::prelude::*;

use http_stub::{HttpStub, StubResponse, chat_reply};

/// One page, Helvetica 12pt, one `Tj` per `(y, text)` line at the left margin.
fn write_pdf(path: &Path, lines: &[(i64, &str)]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = Vec::new();
    for (y, text) in lines {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        operations.push(Operation::new("Td", vec![72.into(), (*y).into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encode content"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("save pdf");
}

fn write_docx(path: &Path, body: &str) {
    let file = fs::File::create(path).expect("create docx");
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .expect("start document.xml");
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );
    zip.write_all(xml.as_bytes()).expect("write document.xml");
    zip.finish().expect("finish docx");
}

#[test]
fn pdf_lines_become_paragraphs_top_to_bottom() {
    let temp = tempfile::tempdir().expect("tempdir");
    let pdf = temp.path().join("avis.pdf");
    write_pdf(&pdf, &[(600, "Merci"), (700, "Bonjour")]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("govdoc");
    let assert = cmd
        .args(["import", "--input", pdf.to_str().expect("utf8 path")])
        .assert()
        .success();
    let html = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert_eq!(html, "<p>Bonjour</p><p>Merci</p>\n");
}

#[test]
fn docx_runs_keep_their_formatting() {
    let temp = tempfile::tempdir().expect("tempdir");
    let docx = temp.path().join("note.docx");
    write_docx(
        &docx,
        r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Avis</w:t></w:r><w:r><w:t xml:space="preserve"> important</w:t></w:r></w:p>"#,
    );

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("govdoc");
    cmd.args(["import", "--input", docx.to_str().expect("utf8 path")])
        .assert()
        .success()
        .stdout("<p><b>Avis</b> important</p>\n");
}

#[test]
fn unreadable_pdf_is_reported() {
    let temp = tempfile::tempdir().expect("tempdir");
    let pdf = temp.path().join("broken.pdf");
    fs::write(&pdf, b"definitely not a pdf").expect("write");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("govdoc");
    cmd.args(["import", "--input", pdf.to_str().expect("utf8 path")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unreadable PDF"));
}

#[test]
fn pipeline_translates_a_pdf_through_the_gateway_into_text() {
    let stub = HttpStub::gateway(chat_reply("<p>Hello</p><p>Thanks</p>"));

    let temp = tempfile::tempdir().expect("tempdir");
    let pdf = temp.path().join("avis.pdf");
    write_pdf(&pdf, &[(700, "Bonjour"), (600, "Merci")]);
    let out = temp.path().join("out/avis.en.txt");
    let source_html = temp.path().join("out/avis.fr.html");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("govdoc");
    cmd.env("GOVDOC_GATEWAY_BASE_URL", stub.gateway_url())
        .env("GOVDOC_GATEWAY_API_KEY", "test-key")
        .args([
            "pipeline",
            "--input",
            pdf.to_str().expect("utf8 path"),
            "--from",
            "fr",
            "--to",
            "en",
            "--format",
            "txt",
            "--source-html",
            source_html.to_str().expect("utf8 path"),
            "--out",
            out.to_str().expect("utf8 path"),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported!"));

    assert_eq!(fs::read_to_string(&out).expect("read output"), "Hello\n\nThanks");
    assert_eq!(
        fs::read_to_string(&source_html).expect("read source html"),
        "<p>Bonjour</p><p>Merci</p>"
    );

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer test-key"));
    let messages = requests[0].body["messages"].as_array().expect("messages");
    assert!(
        messages[0]["content"]
            .as_str()
            .expect("system prompt")
            .contains("from French to English")
    );
    assert_eq!(messages[1]["content"], "<p>Bonjour</p><p>Merci</p>");
}

#[test]
fn pipeline_through_hosted_functions_sends_the_portal_body() {
    let stub = HttpStub::spawn(vec![(
        "/functions/v1/translate",
        StubResponse::json(200, serde_json::json!({ "translated": "<p>Notice</p>" })),
    )]);

    let temp = tempfile::tempdir().expect("tempdir");
    let input = temp.path().join("avis.html");
    fs::write(&input, "<p>Avis</p>").expect("write input");
    let out = temp.path().join("avis.doc");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("govdoc");
    cmd.env("GOVDOC_FUNCTIONS_TOKEN", "anon")
        .args([
            "pipeline",
            "--input",
            input.to_str().expect("utf8 path"),
            "--to",
            "en",
            "--engine",
            "functions",
            "--functions-url",
            &stub.functions_url(),
            "--format",
            "doc",
            "--out",
            out.to_str().expect("utf8 path"),
        ])
        .assert()
        .success();

    let doc = fs::read_to_string(&out).expect("read output");
    assert!(doc.contains("Notice"), "{doc}");

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer anon"));
    assert_eq!(
        requests[0].body,
        serde_json::json!({ "text": "<p>Avis</p>", "sourceLang": "auto", "targetLang": "en" })
    );
}

#[test]
fn plain_pipeline_back_translates_through_the_gateway() {
    let stub = HttpStub::gateway(chat_reply("Hello"));

    let temp = tempfile::tempdir().expect("tempdir");
    let input = temp.path().join("note.txt");
    fs::write(&input, "Bonjour").expect("write input");
    let out = temp.path().join("note.fr.txt");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("govdoc");
    cmd.env("GOVDOC_GATEWAY_BASE_URL", stub.gateway_url())
        .env("GOVDOC_GATEWAY_API_KEY", "test-key")
        .args([
            "pipeline",
            "--input",
            input.to_str().expect("utf8 path"),
            "--plain",
            "--back-translate",
            "--from",
            "fr",
            "--to",
            "en",
            "--format",
            "txt",
            "--out",
            out.to_str().expect("utf8 path"),
        ])
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&out).expect("read output"), "Hello");

    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body["messages"][1]["content"], "Bonjour");
    assert_eq!(requests[1].body["messages"][1]["content"], "Hello");
    assert!(
        requests[1].body["messages"][0]["content"]
            .as_str()
            .expect("system prompt")
            .contains("from English to French")
    );
}

#[test]
fn back_translation_needs_a_source_language() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = temp.path().join("note.txt");
    fs::write(&input, "Bonjour").expect("write input");
    let out = temp.path().join("note.txt.out");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("govdoc");
    cmd.args([
        "pipeline",
        "--input",
        input.to_str().expect("utf8 path"),
        "--plain",
        "--back-translate",
        "--to",
        "en",
        "--engine",
        "noop",
        "--format",
        "txt",
        "--out",
        out.to_str().expect("utf8 path"),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("--back-translate needs an explicit --from"));
    assert!(!out.exists());
}
