//! Integration tests for the solkit binary.
//!
//! These tests run the real CLI against solutions in temporary directories.
//! Every test points `SOLKIT_CONFIG` at its own file so the user's config is
//! never read or written.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for running solkit with an isolated config file.
fn solkit(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("solkit").unwrap();
    cmd.env("SOLKIT_CONFIG", config_dir.join("config.toml"))
        .env_remove("SOLKIT_LOG");
    cmd
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn acme(root: &Path) {
    write(
        root,
        "solution.json",
        r#"{
  "name": "acme${$tagSuffix(env.tag)}",
  "version": "1.0.0",
  "objects": [
    {"type": "acme:namespace", "objectsDir": "namespaces"},
    {"type": "acme:entity", "objectsDir": "entities"}
  ]
}"#,
    );
    write(root, ".tag", "stable");
    write(root, "namespaces/acme.json", r#"{"name": "acme"}"#);
    write(
        root,
        "entities/order.json",
        r#"{"owner": "${sys.solutionId}", "template": "${.item}", "ref": "acme:order"}"#,
    );
}

#[test]
fn help_flag_works() {
    let temp = TempDir::new().unwrap();
    solkit(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("isolate"))
        .stdout(predicate::str::contains("fork"));
}

#[test]
fn version_flag_works() {
    let temp = TempDir::new().unwrap();
    solkit(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("solkit"));
}

#[test]
fn isolate_with_tag() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("acme");
    acme(&src);
    let out = temp.path().join("out");

    solkit(temp.path())
        .arg("isolate")
        .arg("--source")
        .arg(&src)
        .args(["--tag", "dev", "--target-dir"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("entities/order.json: 1 marker"))
        .stdout(predicate::str::contains("Isolated 'acme-dev'"));

    let order = fs::read_to_string(out.join("entities/order.json")).unwrap();
    assert_eq!(
        order,
        r#"{"owner": "acme-dev", "template": "${.item}", "ref": "acme:order"}"#
    );
    let manifest = fs::read_to_string(out.join("solution.json")).unwrap();
    assert!(manifest.contains(r#""name": "acme-dev""#));
}

#[test]
fn isolate_with_env_file_into_zip() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("acme");
    acme(&src);
    write(
        temp.path(),
        "qa.json",
        r#"{"env": {"tag": "qa", "dependencyTags": {}}}"#,
    );
    let zip = temp.path().join("acme-qa.zip");

    solkit(temp.path())
        .arg("isolate")
        .arg("--source")
        .arg(&src)
        .arg("--env-file")
        .arg(temp.path().join("qa.json"))
        .arg("--target-file")
        .arg(&zip)
        .assert()
        .success();
    assert!(zip.is_file());

    solkit(temp.path())
        .arg("info")
        .arg("--source")
        .arg(&zip)
        .assert()
        .success()
        .stdout(predicate::str::contains("Solution: acme-qa"));
}

#[test]
fn isolate_without_environment_fails() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("acme");
    acme(&src);

    solkit(temp.path())
        .arg("isolate")
        .arg("--source")
        .arg(&src)
        .arg("--target-dir")
        .arg(temp.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("tag or an environment file"));
}

#[test]
fn isolate_rejects_tag_with_env_file() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("acme");
    acme(&src);
    write(temp.path(), "qa.json", r#"{"env": {"tag": "qa"}}"#);
    let out = temp.path().join("out");

    solkit(temp.path())
        .arg("isolate")
        .arg("--source")
        .arg(&src)
        .arg("--tag")
        .arg("dev")
        .arg("--env-file")
        .arg(temp.path().join("qa.json"))
        .arg("--target-dir")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
    assert!(!out.exists());
}

#[test]
fn isolate_refuses_non_empty_target() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("acme");
    acme(&src);
    let out = temp.path().join("out");
    write(&out, "existing.txt", "keep");

    solkit(temp.path())
        .arg("isolate")
        .arg("--source")
        .arg(&src)
        .args(["--tag", "dev", "--target-dir"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not empty"));
    assert!(!out.join("solution.json").exists());

    solkit(temp.path())
        .arg("isolate")
        .arg("--source")
        .arg(&src)
        .args(["--tag", "dev", "--force", "--target-dir"])
        .arg(&out)
        .assert()
        .success();
    assert!(out.join("solution.json").is_file());
}

#[test]
fn isolate_reports_bad_expression() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("acme");
    acme(&src);
    write(&src, "entities/bad.json", r#"{"x": "${env.missing}"}"#);

    solkit(temp.path())
        .arg("isolate")
        .arg("--source")
        .arg(&src)
        .args(["--tag", "dev", "--target-dir"])
        .arg(temp.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("entities/bad.json"));
    assert!(!temp.path().join("out").exists());
}

#[test]
fn fork_renames_solution() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("acme");
    acme(&src);
    let out = temp.path().join("globex");

    solkit(temp.path())
        .arg("fork")
        .arg("--source")
        .arg(&src)
        .args(["--name", "globex", "--target-dir"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "namespaces/acme.json -> namespaces/globex.json",
        ))
        .stdout(predicate::str::contains(".tag: removed"));

    assert!(out.join("namespaces/globex.json").is_file());
    assert!(!out.join("namespaces/acme.json").exists());
    assert!(!out.join(".tag").exists());
    let manifest = fs::read_to_string(out.join("solution.json")).unwrap();
    assert!(manifest.contains("globex${$tagSuffix(env.tag)}"));
    assert!(manifest.contains("globex:entity"));
}

#[test]
fn fork_dry_run_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("acme");
    acme(&src);

    solkit(temp.path())
        .arg("fork")
        .arg("--source")
        .arg(&src)
        .args(["--name", "globex", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"));
    assert!(src.join("namespaces/acme.json").is_file());
}

#[test]
fn fork_rejects_suffixed_name() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("acme");
    acme(&src);

    solkit(temp.path())
        .arg("fork")
        .arg("--source")
        .arg(&src)
        .args(["--name", "globex${env.tag}", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid solution name"));
}

#[test]
fn info_lists_files() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("acme");
    acme(&src);

    solkit(temp.path())
        .arg("info")
        .arg("--source")
        .arg(&src)
        .assert()
        .success()
        .stdout(predicate::str::contains("Version: 1.0.0"))
        .stdout(predicate::str::contains("entities/order.json"))
        .stdout(predicate::str::contains("acme:entity"));
}

#[test]
fn info_missing_source_fails() {
    let temp = TempDir::new().unwrap();
    solkit(temp.path())
        .args(["info", "--source"])
        .arg(temp.path().join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn config_set_get_list() {
    let temp = TempDir::new().unwrap();

    solkit(temp.path())
        .args(["config", "get", "isolation.default_tag"])
        .assert()
        .success()
        .stdout("stable\n");

    solkit(temp.path())
        .args(["config", "set", "isolation.default_tag", "prod"])
        .assert()
        .success();
    assert!(temp.path().join("config.toml").is_file());

    solkit(temp.path())
        .args(["config", "get", "isolation.default_tag"])
        .assert()
        .success()
        .stdout("prod\n");

    solkit(temp.path())
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("archive.skip_levels = 0"));
}

#[test]
fn config_rejects_unknown_key() {
    let temp = TempDir::new().unwrap();
    solkit(temp.path())
        .args(["config", "set", "nope.key", "1"])
        .assert()
        .failure();
}

#[test]
fn configured_default_tag_changes_suffix() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("acme");
    acme(&src);
    fs::write(
        temp.path().join("config.toml"),
        "[isolation]\ndefault_tag = \"dev\"\n",
    )
    .unwrap();
    let out = temp.path().join("out");

    solkit(temp.path())
        .arg("isolate")
        .arg("--source")
        .arg(&src)
        .args(["--tag", "dev", "--target-dir"])
        .arg(&out)
        .assert()
        .success();
    let manifest = fs::read_to_string(out.join("solution.json")).unwrap();
    assert!(manifest.contains(r#""name": "acme""#));
}

#[test]
fn completion_generates_script() {
    let temp = TempDir::new().unwrap();
    solkit(temp.path())
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("solkit"));
}
