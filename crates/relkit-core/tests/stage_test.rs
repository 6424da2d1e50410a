//! Release staging against real build output.
#![cfg(unix)]

mod common;

use std::fs;

use common::{Fixture, snapshot};
use relkit_core::build::BuildOrchestrator;
use relkit_core::stage::{StageError, list_contents, stage};
use relkit_core::version::parse;
use relkit_core::Platform;

fn built(platform: Platform) -> Fixture {
    let fixture = Fixture::new();
    BuildOrchestrator::new(fixture.workspace(), &fixture.config)
        .build(platform, false)
        .unwrap();
    fixture
}

fn staged_manifest(fixture: &Fixture, platform: Platform) -> serde_json::Value {
    let path = fixture.workspace().staging_dir(platform).join("package.json");
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn h5_stage_contains_bundles_types_and_docs() {
    let fixture = built(Platform::H5);
    let version = parse("1.0.1").unwrap();

    let staged = stage(&fixture.workspace(), Platform::H5, &version).unwrap();

    let paths: Vec<String> = list_contents(&staged.dir)
        .unwrap()
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(
        paths,
        [
            "CHANGELOG.md",
            "LICENSE",
            "README.md",
            "index.esm.js",
            "index.esm.js.map",
            "index.js",
            "index.js.map",
            "index.min.js",
            "index.min.js.map",
            "package.json",
            "types/index.d.ts",
        ]
    );
    assert!(staged.missing.is_empty());

    let manifest = staged_manifest(&fixture, Platform::H5);
    assert_eq!(manifest["version"], "1.0.1");
    assert_eq!(manifest["module"], "index.esm.js");
    assert_eq!(manifest["scripts"].as_object().unwrap().len(), 1);
    assert!(manifest.get("devDependencies").is_none());
    assert_eq!(
        manifest["files"],
        serde_json::json!([
            "index.esm.js",
            "index.esm.js.map",
            "index.js",
            "index.js.map",
            "index.min.js",
            "index.min.js.map",
            "types"
        ])
    );
    assert!(fs::read_to_string(staged.dir.join("package.json")).unwrap().ends_with("}\n"));
}

#[test]
fn wechat_stage_uses_its_profile() {
    let fixture = built(Platform::Wechat);

    let staged = stage(&fixture.workspace(), Platform::Wechat, &parse("2.0.0-beta.0").unwrap()).unwrap();

    assert!(!staged.dir.join("index.esm.js").exists());
    assert!(staged.dir.join("components/chart/chart.wxml").is_file());
    assert_eq!(
        staged.files,
        ["components", "index.js", "index.js.map", "index.min.js", "index.min.js.map", "types"]
    );
    let manifest = staged_manifest(&fixture, Platform::Wechat);
    assert!(manifest.get("module").is_none());
    assert_eq!(manifest["exports"]["."]["import"], "./index.js");
}

#[test]
fn staging_twice_is_byte_identical() {
    let fixture = built(Platform::Uniapp);
    let ws = fixture.workspace();
    let version = parse("1.1.0").unwrap();

    let first = stage(&ws, Platform::Uniapp, &version).unwrap();
    let before = snapshot(&first.dir);
    fs::write(first.dir.join("stray.txt"), "left over").unwrap();

    let second = stage(&ws, Platform::Uniapp, &version).unwrap();

    assert_eq!(snapshot(&second.dir), before);
}

#[test]
fn missing_bundle_is_warned_not_fatal() {
    let fixture = built(Platform::H5);
    fs::remove_file(fixture.output(Platform::H5).join("index.min.js.map")).unwrap();

    let staged = stage(&fixture.workspace(), Platform::H5, &parse("1.0.1").unwrap()).unwrap();

    assert_eq!(staged.missing, ["index.min.js.map"]);
    assert!(!staged.files.contains(&"index.min.js.map".to_string()));
}

#[test]
fn missing_build_output_fails() {
    let fixture = Fixture::new();
    let err = stage(&fixture.workspace(), Platform::H5, &parse("1.0.1").unwrap()).unwrap_err();
    assert!(matches!(err, StageError::MissingBuildOutput { .. }));
    assert!(!fixture.workspace().staging_dir(Platform::H5).exists());
}

#[test]
fn missing_license_fails() {
    let fixture = built(Platform::H5);
    fs::remove_file(fixture.root.join("LICENSE")).unwrap();

    let err = stage(&fixture.workspace(), Platform::H5, &parse("1.0.1").unwrap()).unwrap_err();

    assert!(matches!(err, StageError::MissingDocument { ref name, .. } if name == "LICENSE"));
}

#[test]
fn platform_docs_take_precedence() {
    let fixture = built(Platform::H5);
    let platform_root = fixture.workspace().platform_root(Platform::H5);
    fs::write(platform_root.join("README.md"), "# charts for h5\n").unwrap();
    fs::remove_file(fixture.root.join("CHANGELOG.md")).unwrap();

    let staged = stage(&fixture.workspace(), Platform::H5, &parse("1.0.1").unwrap()).unwrap();

    assert_eq!(
        fs::read_to_string(staged.dir.join("README.md")).unwrap(),
        "# charts for h5\n"
    );
    assert!(!staged.dir.join("CHANGELOG.md").exists());
}
