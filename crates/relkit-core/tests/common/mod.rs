//! Shared fixtures for relkit-core integration tests.
//!
//! A [`Fixture`] is a throwaway workspace with all three platforms and a fake
//! package manager: a shell script that logs every call, writes build output
//! into `dist/<platform>`, and records what it was asked to publish.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use relkit_core::config::{Config, ToolchainConfig};
use relkit_core::prompt::{PromptError, PromptResult, Prompter};
use relkit_core::{Platform, Workspace};
use tempfile::TempDir;
use walkdir::WalkDir;

const FAKE_PM: &str = r#"#!/bin/sh
echo "$(basename "$PWD") $*" >> "@STATE@/calls.log"
case "$1" in
  install)
    exit 0
    ;;
  whoami)
    if [ "@WHOAMI_FAIL@" = "1" ]; then echo "ENEEDAUTH need auth" >&2; exit 1; fi
    echo "tester"
    ;;
  run)
    platform="$(basename "$PWD")"
    case "$2" in
      build)
        if [ "$platform" = "@BUILD_FAIL@" ]; then echo "rollup exploded" >&2; exit 2; fi
        out="@ROOT@/dist/$platform"
        mkdir -p "$out/types"
        for f in index.js index.min.js index.esm.js; do
          echo "/* $platform $f */" > "$out/$f"
          echo "{\"file\":\"$f\"}" > "$out/$f.map"
        done
        echo "export declare const version: string;" > "$out/types/index.d.ts"
        ;;
      build:watch)
        exit 0
        ;;
      test)
        if [ "@TEST_FAIL@" = "1" ]; then echo "1 failing" >&2; exit 1; fi
        ;;
    esac
    ;;
  pack)
    echo "npm notice total files: 9"
    ;;
  publish)
    if [ "@PUBLISH_FAIL@" = "1" ]; then echo "E403 forbidden" >&2; exit 1; fi
    echo "pwd=$PWD" > "@STATE@/published.txt"
    echo "args=$*" >> "@STATE@/published.txt"
    ls -R . >> "@STATE@/published.txt"
    cat package.json >> "@STATE@/published.txt"
    echo "+ published"
    ;;
esac
exit 0
"#;

/// Behavior switches baked into the fake package manager.
#[derive(Debug, Clone, Default)]
pub struct FakePm {
    pub whoami_fails: bool,
    pub test_fails: bool,
    pub publish_fails: bool,
    pub build_fails_for: Option<Platform>,
}

pub struct Fixture {
    _tmp: TempDir,
    pub root: Utf8PathBuf,
    pub state: Utf8PathBuf,
    pub config: Config,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_pm(FakePm::default())
    }

    pub fn with_pm(pm: FakePm) -> Self {
        let tmp = TempDir::new().unwrap();
        let base = Utf8PathBuf::try_from(tmp.path().canonicalize().unwrap()).unwrap();
        let root = base.join("ws");
        let state = base.join("state");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&state).unwrap();

        let flag = |on: bool| if on { "1" } else { "0" };
        let script = FAKE_PM
            .replace("@STATE@", state.as_str())
            .replace("@ROOT@", root.as_str())
            .replace("@WHOAMI_FAIL@", flag(pm.whoami_fails))
            .replace("@TEST_FAIL@", flag(pm.test_fails))
            .replace("@PUBLISH_FAIL@", flag(pm.publish_fails))
            .replace("@BUILD_FAIL@", pm.build_fails_for.map_or("-", |p| p.id()));
        let script_path = state.join("fake-pm.sh");
        fs::write(&script_path, script).unwrap();

        let config = Config {
            toolchain: Some(ToolchainConfig {
                package_manager: Some(format!("sh {script_path}")),
            }),
            ..Config::default()
        };

        let fixture = Self {
            _tmp: tmp,
            root,
            state,
            config,
        };

        for platform in Platform::ALL {
            fixture.write_manifest(platform, &default_manifest(platform));
        }
        for (platform, file) in [
            (Platform::Wechat, "components/chart/chart.wxml"),
            (Platform::Uniapp, "components/chart/chart.vue"),
        ] {
            let path = fixture.workspace().platform_root(platform).join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, format!("<!-- {platform} chart -->\n")).unwrap();
        }
        fs::write(fixture.root.join("README.md"), "# charts\n").unwrap();
        fs::write(fixture.root.join("LICENSE"), "MIT\n").unwrap();
        fs::write(fixture.root.join("CHANGELOG.md"), "## 1.0.0\n").unwrap();

        fixture
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::from_config(self.root.clone(), &self.config).unwrap()
    }

    pub fn write_manifest(&self, platform: Platform, contents: &str) {
        let ws = self.workspace();
        fs::create_dir_all(ws.platform_root(platform)).unwrap();
        fs::write(ws.manifest_path(platform), contents).unwrap();
    }

    pub fn manifest_version(&self, platform: Platform) -> String {
        let text = fs::read_to_string(self.workspace().manifest_path(platform)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        value["version"].as_str().unwrap().to_string()
    }

    pub fn output(&self, platform: Platform) -> Utf8PathBuf {
        self.workspace().platform_output(platform)
    }

    /// Pretend a previous build happened so the release prerequisites pass.
    pub fn seed_output(&self, platform: Platform) {
        fs::create_dir_all(self.output(platform)).unwrap();
    }

    /// Logged calls as `<cwd basename> <args>`.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.state.join("calls.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn published(&self) -> Option<String> {
        fs::read_to_string(self.state.join("published.txt")).ok()
    }
}

pub fn default_manifest(platform: Platform) -> String {
    format!(
        r#"{{
  "name": "@acme/charts-{platform}",
  "version": "1.0.0",
  "main": "src/index.ts",
  "scripts": {{
    "build": "rollup -c",
    "build:watch": "rollup -c -w",
    "test": "jest"
  }},
  "dependencies": {{
    "tslib": "^2.6.0"
  }},
  "devDependencies": {{
    "rollup": "^4.0.0"
  }}
}}
"#
    )
}

/// Every file under `dir` with its bytes, keyed by relative path.
pub fn snapshot(dir: &Utf8Path) -> Vec<(String, Vec<u8>)> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .map(Result::unwrap)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let rel = entry.path().strip_prefix(dir).unwrap();
            let rel = Utf8Path::from_path(rel).unwrap().to_string();
            (rel, fs::read(entry.path()).unwrap())
        })
        .collect()
}

/// A prompter that replays queued answers and records every question.
///
/// Running out of answers behaves like the user pressing Esc.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    selects: VecDeque<usize>,
    inputs: VecDeque<String>,
    confirms: VecDeque<bool>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn choose(mut self, choice: usize) -> Self {
        self.selects.push_back(choice);
        self
    }

    pub fn type_text(mut self, text: &str) -> Self {
        self.inputs.push_back(text.to_string());
        self
    }

    pub fn answer(mut self, answer: bool) -> Self {
        self.confirms.push_back(answer);
        self
    }
}

impl Prompter for ScriptedPrompter {
    fn select(&mut self, message: &str, _options: &[String], _default: usize) -> PromptResult<usize> {
        self.asked.push(message.to_string());
        self.selects.pop_front().ok_or(PromptError::Cancelled)
    }

    fn input(&mut self, message: &str, _initial: &str) -> PromptResult<String> {
        self.asked.push(message.to_string());
        self.inputs.pop_front().ok_or(PromptError::Cancelled)
    }

    fn confirm(&mut self, message: &str, _default: bool) -> PromptResult<bool> {
        self.asked.push(message.to_string());
        self.confirms.pop_front().ok_or(PromptError::Cancelled)
    }
}
