mod docs_server;

use docs_server::{DocsServer, Route, doc_page};
use predicates::prelude::*;

#[test]
fn help_lists_subcommands() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("docmirror");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("bulk"));
}

#[test]
fn download_prints_site_report_and_writes_page() -> anyhow::Result<()> {
    let server = DocsServer::spawn(vec![("/", Route::html(doc_page("Home", &["/next"])))]);
    let temp = tempfile::TempDir::new()?;
    let out = temp.path().join("out");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("docmirror");
    let assert = cmd
        .args(["download", "--url", &server.url("/"), "--max-depth", "0"])
        .args(["--delay-ms", "0", "--retry-delay-ms", "10"])
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let report: serde_json::Value = serde_json::from_str(stdout.trim())?;
    assert_eq!(report["start_url"], server.url("/"));
    assert_eq!(report["stats"]["pages_written"], 1);
    assert!(report["error"].is_null());

    let index = std::fs::read_to_string(out.join("127_0_0_1").join("index.md"))?;
    assert!(index.contains("# Home"), "index={index}");
    assert_eq!(server.count("GET", "/next"), 0);
    Ok(())
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("docmirror");
    cmd.env("RUST_LOG", "debug")
        .args(["bulk", "--url", "ftp://example.com/"])
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
}

#[test]
fn bulk_reports_invalid_urls_and_keeps_going() -> anyhow::Result<()> {
    let server = DocsServer::spawn(vec![("/", Route::html(doc_page("Home", &[])))]);
    let temp = tempfile::TempDir::new()?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("docmirror");
    let assert = cmd
        .args(["bulk", "--url", "not a url", "--url", &server.url("/")])
        .args(["--max-depth", "0", "--delay-ms", "0"])
        .arg("--out")
        .arg(temp.path())
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let reports = stdout
        .lines()
        .map(serde_json::from_str::<serde_json::Value>)
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["start_url"], "not a url");
    assert!(reports[0]["error"].is_string());
    assert_eq!(reports[1]["stats"]["pages_written"], 1);
    assert!(temp.path().join("127_0_0_1").join("index.md").exists());
    Ok(())
}

#[test]
fn missing_config_file_fails() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("docmirror");
    cmd.args(["download", "--url", "http://127.0.0.1:9/"])
        .arg("--config")
        .arg(temp.path().join("missing.json"))
        .arg("--out")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("load --config"));
    Ok(())
}
