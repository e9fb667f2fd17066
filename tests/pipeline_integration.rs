//! Library-level pipeline tests.
//!
//! These exercise the public API end to end: build a tree from disk,
//! transform it, write it out, and read it back.

use std::fs;
use std::path::Path;

use solution_kit::archive::{self, ArchiveError, RootedDir};
use solution_kit::core::manifest::ManifestFormat;
use solution_kit::core::tree::{FileKind, SolutionTree, TreeError};
use solution_kit::fork::{fork, ForkOptions};
use solution_kit::isolation::{find_leftover_markers, Environment, IsolationError, Isolator};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// A YAML solution with a knowledge type, an object file and an object dir.
fn fmm(root: &Path) {
    write(
        root,
        "solution.yaml",
        "name: fmm${$tagSuffix(env.tag)}
version: 2.1.0
dependencies:
  - name: core
    version: ${$dependencyTag(\"core\")}
knowledgeTypes:
  - knowledge/types.yaml
objects:
  - type: fmm:namespace
    objectsFile: namespaces/fmm.yaml
  - type: fmm:entity
    objectsDir: model
",
    );
    write(root, "knowledge/types.yaml", "type: fmm:entity\nsolution: ${sys.solutionId}\n");
    write(root, "namespaces/fmm.yaml", "name: fmm\nlabel: fmm namespace\n");
    write(root, "model/customers/customer.json", r#"{"id": "fmm:customer", "env": "${env.tag}"}"#);
    write(root, "model/orders/order.yaml", "id: fmm:order\nfmm: key stays\n");
    write(root, "README.md", "fmm solution for ${env.tag}\n");
}

#[test]
fn annotation_propagates_to_nested_directories() {
    let temp = TempDir::new().unwrap();
    fmm(temp.path());
    let tree = SolutionTree::build(temp.path()).unwrap();

    assert_eq!(tree.manifest.format(), ManifestFormat::Yaml);
    for path in ["model/customers/customer.json", "model/orders/order.yaml"] {
        let kind = &tree.file(path).unwrap().kind;
        assert_eq!(kind.object_type().unwrap().as_str(), "fmm:entity", "{path}");
    }
    assert_eq!(
        tree.file("knowledge/types.yaml").unwrap().kind,
        FileKind::KnowledgeType
    );
    assert_eq!(
        tree.file("namespaces/fmm.yaml").unwrap().kind.object_type().unwrap().kind(),
        "namespace"
    );
    assert_eq!(tree.file("README.md").unwrap().kind, FileKind::Unknown);
}

#[test]
fn ambiguous_declaration_fails_at_load() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "solution.json",
        r#"{"name": "x", "objects": [{"type": "x:e", "objectsFile": "a.json", "objectsDir": "d"}]}"#,
    );
    let err = SolutionTree::build(temp.path()).unwrap_err();
    assert!(matches!(err, TreeError::AmbiguousObjectDeclaration { .. }));
}

#[test]
fn isolate_then_write_yaml_solution() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    fmm(&src);
    let source = SolutionTree::build(&src).unwrap();

    let env = Environment::from_value(serde_json::json!({
        "env": {"tag": "qa", "dependencyTags": {"core": "beta"}}
    }))
    .unwrap();
    let mut isolator = Isolator::new("stable");
    let (tree, report) = isolator.isolate(&source, env).unwrap();
    assert_eq!(report.solution_id, "fmm-qa");

    let out = temp.path().join("out");
    tree.write(&out).unwrap();

    let manifest = fs::read_to_string(out.join("solution.yaml")).unwrap();
    assert!(manifest.contains("name: fmm-qa"));
    assert!(manifest.contains("version: beta"));
    assert_eq!(
        fs::read_to_string(out.join("knowledge/types.yaml")).unwrap(),
        "type: fmm:entity\nsolution: fmm-qa\n"
    );
    assert_eq!(
        fs::read_to_string(out.join("README.md")).unwrap(),
        "fmm solution for qa\n"
    );
    assert!(find_leftover_markers(&tree).unwrap().is_empty());
}

#[test]
fn isolation_is_idempotent() {
    let temp = TempDir::new().unwrap();
    fmm(temp.path());
    let source = SolutionTree::build(temp.path()).unwrap();
    let mut isolator = Isolator::new("stable");

    let (once, _) = isolator
        .isolate(&source, Environment::from_tag("dev"))
        .unwrap();
    let (twice, report) = isolator
        .isolate(&once, Environment::from_tag("dev"))
        .unwrap();

    assert!(report.changed.is_empty());
    let a: Vec<_> = once.files().map(|(p, f)| (p, f.contents.clone())).collect();
    let b: Vec<_> = twice.files().map(|(p, f)| (p, f.contents.clone())).collect();
    assert_eq!(a, b);
    assert_eq!(once.manifest, twice.manifest);
}

#[test]
fn isolation_error_leaves_source_untouched() {
    let temp = TempDir::new().unwrap();
    fmm(temp.path());
    write(temp.path(), "model/bad.json", r#"{"x": "${$nope()}"}"#);
    let source = SolutionTree::build(temp.path()).unwrap();

    let err = Isolator::new("stable")
        .isolate(&source, Environment::from_tag("dev"))
        .unwrap_err();
    assert!(matches!(err, IsolationError::ExpressionEvalError { .. }));
    assert!(fs::read_to_string(temp.path().join("model/bad.json"))
        .unwrap()
        .contains("$nope"));
}

#[test]
fn fork_yaml_solution() {
    let temp = TempDir::new().unwrap();
    fmm(temp.path());
    let mut tree = SolutionTree::build(temp.path()).unwrap();

    let report = fork(&mut tree, "crm", &ForkOptions::default()).unwrap();

    assert_eq!(tree.manifest.name, "crm${$tagSuffix(env.tag)}");
    assert_eq!(
        tree.manifest.objects[0].objects_file.as_deref(),
        Some("namespaces/crm.yaml")
    );
    let order = String::from_utf8(tree.file("model/orders/order.yaml").unwrap().contents.clone())
        .unwrap();
    assert!(order.contains("id: crm:order"));
    assert!(order.contains("fmm: key stays"));
    // Unknown encoding keeps its bytes, markers included
    assert_eq!(
        tree.file("README.md").unwrap().contents,
        b"fmm solution for ${env.tag}\n"
    );
    // namespaces/fmm.yaml is declared by path and warned about
    assert!(report.warnings.iter().any(|w| w.contains("namespaces/fmm.yaml")));
    // Dependencies are not renamed
    assert_eq!(tree.manifest.dependencies[0].name, "core");
}

#[test]
fn forked_tree_round_trips_through_archive() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    fmm(&src);
    let mut tree = SolutionTree::build(&src).unwrap();
    fork(&mut tree, "crm", &ForkOptions::default()).unwrap();

    let staged = temp.path().join("staged");
    tree.write(&staged).unwrap();
    let zip = temp.path().join("crm.zip");
    archive::pack(&staged, &zip).unwrap();

    let back = temp.path().join("back");
    archive::unpack(&zip, &RootedDir::new(&back), 0).unwrap();
    let reloaded = SolutionTree::build(&back).unwrap();

    assert_eq!(reloaded.manifest.name, "crm${$tagSuffix(env.tag)}");
    assert!(reloaded.file("namespaces/crm.yaml").is_some());
    assert_eq!(reloaded.file_count(), tree.file_count());
}

#[test]
fn zip_slip_archive_is_rejected_before_writing() {
    let temp = TempDir::new().unwrap();
    let zip_path = temp.path().join("evil.zip");
    {
        use std::io::Write;
        let file = fs::File::create(&zip_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("solution.json", options).unwrap();
        zip.write_all(br#"{"name": "x"}"#).unwrap();
        zip.start_file("../../etc/passwd", options).unwrap();
        zip.write_all(b"root:x:0:0").unwrap();
        zip.finish().unwrap();
    }

    let out = temp.path().join("out");
    let err = archive::unpack(&zip_path, &RootedDir::new(&out), 0).unwrap_err();
    assert!(matches!(err, ArchiveError::PathTraversalRejected { .. }));
    assert!(!out.exists());
    assert!(!temp.path().join("etc").exists());
}
