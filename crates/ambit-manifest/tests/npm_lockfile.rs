//! npm lockfile reading across the v1 and v3 shapes.

use ambit_manifest::model::{DepTypes, EcosystemDetails};
use ambit_manifest::npm;

const V3_LOCK: &str = r#"{
  "name": "web-app",
  "version": "2.1.0",
  "lockfileVersion": 3,
  "packages": {
    "": {
      "name": "web-app",
      "version": "2.1.0",
      "dependencies": {
        "express": "^4.18.0",
        "strwidth": "npm:string-width@^4.2.0"
      },
      "devDependencies": { "jest": "^29.0.0" }
    },
    "node_modules/express": {
      "version": "4.18.2",
      "dependencies": { "accepts": "~1.3.8" }
    },
    "node_modules/accepts": { "version": "1.3.8" },
    "node_modules/jest": { "version": "29.5.0", "dev": true },
    "node_modules/strwidth": {
      "name": "string-width",
      "version": "4.2.3"
    },
    "node_modules/express/node_modules/accepts": { "version": "1.3.9" }
  }
}"#;

fn write_lock(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("package-lock.json");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn v3_root_requirements_and_groups() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = npm::read(&write_lock(&dir, V3_LOCK)).unwrap();

    assert_eq!(manifest.root.name, "web-app");
    assert_eq!(manifest.root.constraint, "2.1.0");

    let mut names: Vec<&str> = manifest
        .requirements
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    names.sort_unstable();
    assert_eq!(names, vec!["express", "jest", "string-width"]);

    let jest = manifest
        .requirements
        .iter()
        .find(|r| r.name == "jest")
        .unwrap();
    assert!(jest.dep_types.contains(DepTypes::DEV));
    assert_eq!(manifest.groups_for(&jest.key()), &["dev".to_string()]);
}

#[test]
fn v3_nested_copy_shadows_the_top_level_one() {
    let dir = tempfile::tempdir().unwrap();
    let graph = npm::read_graph(&write_lock(&dir, V3_LOCK)).unwrap();

    let deps = graph.dependencies_of("node_modules/express");
    let (accepts, edge) = deps
        .iter()
        .find(|(node, _)| node.name == "accepts")
        .unwrap();
    // express sees its nested accepts, not the top-level 1.3.8.
    assert_eq!(accepts.version, "1.3.9");
    assert_eq!(
        accepts.lock_path,
        "node_modules/express/node_modules/accepts"
    );
    assert_eq!(edge.spec, "~1.3.8");
}

#[test]
fn v3_alias_is_renamed_after_edges_and_edge_keeps_disk_name() {
    let dir = tempfile::tempdir().unwrap();
    let graph = npm::read_graph(&write_lock(&dir, V3_LOCK)).unwrap();

    let deps = graph.dependencies_of("");
    let (node, edge) = deps
        .iter()
        .find(|(_, e)| e.known_as.is_some())
        .unwrap();
    assert_eq!(node.name, "string-width");
    assert_eq!(node.disk_name, "strwidth");
    assert_eq!(edge.known_as.as_deref(), Some("strwidth"));

    // Instances group by the real name.
    let instances = graph.instances();
    let sw = &instances["string-width"];
    assert_eq!(sw.len(), 1);
    assert_eq!(sw[0].known_as.as_deref(), Some("strwidth"));
}

#[test]
fn v1_shape_recovers_root_requirements_from_package_json() {
    let dir = tempfile::tempdir().unwrap();
    let lock = write_lock(
        &dir,
        r#"{
  "name": "legacy-app",
  "version": "0.1.0",
  "lockfileVersion": 1,
  "dependencies": {
    "minimist": {
      "version": "1.2.0",
      "requires": { "shim": "^1.0.0" }
    },
    "shim": { "version": "1.0.4" }
  }
}"#,
    );
    std::fs::write(
        dir.path().join("package.json"),
        r#"{
  "name": "legacy-app",
  "version": "0.1.0",
  "dependencies": { "minimist": "^1.2.0" }
}"#,
    )
    .unwrap();

    let manifest = npm::read(&lock).unwrap();
    assert_eq!(manifest.root.name, "legacy-app");
    assert_eq!(manifest.requirements.len(), 1);
    assert_eq!(manifest.requirements[0].name, "minimist");
    assert_eq!(manifest.requirements[0].constraint, "^1.2.0");

    match &manifest.ecosystem {
        EcosystemDetails::Npm(details) => {
            assert_eq!(details.lockfile_version, 1);
            assert!(details.instances.contains_key("minimist"));
            assert!(details.instances.contains_key("shim"));
        }
        other => panic!("expected npm details, got {other:?}"),
    }

    // The requires edge resolved against the top-level shim copy.
    let graph = npm::read_graph(&lock).unwrap();
    let deps = graph.dependencies_of("node_modules/minimist");
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].0.lock_path, "node_modules/shim");
}

#[test]
fn missing_dependency_is_logged_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let lock = write_lock(
        &dir,
        r#"{
  "name": "holey",
  "lockfileVersion": 3,
  "packages": {
    "": {
      "name": "holey",
      "version": "1.0.0",
      "dependencies": { "ghost": "^1.0.0" }
    }
  }
}"#,
    );
    let manifest = npm::read(&lock).unwrap();
    // The edge could not resolve, so no requirement was produced, but the
    // read succeeded.
    assert!(manifest.requirements.is_empty());
}
