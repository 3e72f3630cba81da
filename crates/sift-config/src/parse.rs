//! Configuration file parsing.
//!
//! Parses individual TOML files into intermediate `RawConfig` structures
//! that preserve the optional nature of all fields before merging.

use std::{fs, path::Path};

use serde::Deserialize;
use serde_with::{OneOrMany, serde_as};

use crate::ConfigError;

/// Raw configuration as parsed directly from a TOML file.
///
/// All fields are optional to support partial configs that will be merged.
/// This mirrors the TOML schema exactly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// Suggester behaviour section.
    pub suggest: Option<RawSuggestSettings>,
    /// Text analysis section.
    pub analysis: Option<RawAnalysisSettings>,
    /// Offline build section.
    pub build: Option<RawBuildSettings>,
}

/// Raw suggester settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSuggestSettings {
    /// Always return the exact match first.
    pub exact_first: Option<bool>,
    /// Keep token boundaries in the analyzed form.
    pub preserve_separators: Option<bool>,
    /// Keep position holes (e.g. removed stop words) in the token automaton.
    pub preserve_position_increments: Option<bool>,
    /// Maximum surface forms kept for one analyzed form.
    pub max_surface_forms_per_analyzed_form: Option<usize>,
    /// Maximum analyzed paths per entry, `-1` for no limit.
    pub max_graph_expansions: Option<i64>,
    /// Byte written for preserved token boundaries.
    pub separator_byte: Option<u8>,
    /// Work limit when determinizing query automata.
    pub max_determinized_states: Option<usize>,
}

/// Raw analysis settings.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawAnalysisSettings {
    /// Stemming language.
    pub stemmer: Option<String>,
    /// Words dropped by the analyzer.
    /// Accepts either a single string or an array of strings.
    #[serde_as(as = "Option<OneOrMany<_>>")]
    pub stop_words: Option<Vec<String>>,
    /// Tokens longer than this many bytes are dropped.
    pub max_token_length: Option<usize>,
}

/// Raw build settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawBuildSettings {
    /// Directory for temporary sort files.
    pub temp_dir: Option<String>,
    /// In-memory run size of the external sort.
    pub sort_buffer_bytes: Option<usize>,
    /// Maximum number of runs merged at once.
    pub merge_factor: Option<usize>,
}

/// Parses a configuration file from disk.
///
/// Returns a `RawConfig` with all fields as optionals, ready for merging.
pub fn parse_config_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config_str(&contents, path)
}

/// Parses configuration from a TOML string.
///
/// The `path` parameter is used for error reporting.
pub fn parse_config_str(contents: &str, path: &Path) -> Result<RawConfig, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}
