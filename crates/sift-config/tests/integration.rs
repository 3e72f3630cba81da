//! Integration tests for sift-config.
//!
//! Tests the full configuration loading pipeline: parse -> merge -> validate.

// Integration tests live outside cfg(test) by design
#![allow(clippy::tests_outside_test_module)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use sift_config::{Config, ConfigError};

/// Test helper to create a temporary directory for config files.
struct TestEnv {
    root: tempfile::TempDir,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    /// Creates a file with content and returns its path.
    fn create_file(&self, rel_path: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }
}

#[test]
fn test_load_no_files_returns_default() {
    let config = Config::load_from_files(&[]).unwrap();
    assert!(config.suggest.exact_first);
    assert!(config.analysis.stemmer.is_none());
}

#[test]
fn test_load_layers_files() {
    let env = TestEnv::new();
    let local = env.create_file(
        "local.toml",
        r#"
[suggest]
max_surface_forms_per_analyzed_form = 4

[analysis]
stop_words = ["the", "of"]
"#,
    );
    let shared = env.create_file(
        "shared/sift.toml",
        r#"
[suggest]
max_surface_forms_per_analyzed_form = 16
preserve_separators = false

[build]
temp_dir = "/var/tmp/sift"
"#,
    );

    let config = Config::load_from_files(&[local, shared]).unwrap();
    assert_eq!(config.suggest.max_surface_forms_per_analyzed_form, 4);
    assert!(!config.suggest.preserve_separators);
    assert_eq!(config.analysis.stop_words, vec!["the", "of"]);
    assert_eq!(
        config.build.temp_dir,
        Some(PathBuf::from("/var/tmp/sift"))
    );
}

#[test]
fn test_load_missing_file() {
    let env = TestEnv::new();
    let missing = env.path().join("missing.toml");

    let err = Config::load_from_files(&[missing]).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
}

#[test]
fn test_load_rejects_invalid_merged_value() {
    let env = TestEnv::new();
    let file = env.create_file("sift.toml", "[suggest]\nmax_graph_expansions = 0\n");

    let err = Config::load_from_files(&[file]).unwrap_err();
    assert!(matches!(err, ConfigError::MaxGraphExpansions { value: 0 }));
}

#[test]
fn test_higher_layer_can_fix_lower_layer() {
    let env = TestEnv::new();
    let fix = env.create_file("fix.toml", "[build]\nmerge_factor = 8\n");
    let broken = env.create_file("broken.toml", "[build]\nmerge_factor = 1\n");

    let config = Config::load_from_files(&[fix, broken]).unwrap();
    assert_eq!(config.build.merge_factor, 8);
}
