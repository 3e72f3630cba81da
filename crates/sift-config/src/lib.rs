//! Configuration system for sift.
//!
//! sift reads TOML configuration with three sections: `[suggest]` controls
//! how entries are keyed and looked up, `[analysis]` controls the text
//! analyzer, and `[build]` controls the offline external sort. Several files
//! may be layered; the first file that defines a field wins.

#![warn(missing_docs)]

mod error;
mod merge;
mod parse;
mod validate;

use std::{
    env,
    path::{Path, PathBuf},
};

pub use error::ConfigError;
pub use merge::{ParsedConfig, merge_configs};
pub use parse::{
    RawAnalysisSettings, RawBuildSettings, RawConfig, RawSuggestSettings, parse_config_file,
    parse_config_str,
};
use serde::{Deserialize, Serialize};
use validate::validate_config;

/// Legacy option bit: always return the exact match first.
pub const EXACT_FIRST: u32 = 1;

/// Legacy option bit: keep token boundaries in the analyzed form.
pub const PRESERVE_SEP: u32 = 2;

/// Byte marking a position hole in token automata.
pub const HOLE_BYTE: u8 = 0x1e;

/// Byte separating surface form and payload, and the default token separator.
pub const UNIT_SEPARATOR: u8 = 0x1f;

/// Byte terminating an analyzed form inside index keys.
pub const END_BYTE: u8 = 0x00;

/// Top-level merged configuration for sift.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Suggester behaviour.
    pub suggest: SuggestSettings,
    /// Text analysis.
    pub analysis: AnalysisSettings,
    /// Offline build.
    pub build: BuildSettings,
}

impl Config {
    /// Loads configuration from a list of config file paths.
    ///
    /// Files should be provided in precedence order: highest precedence first.
    /// The merged result is validated before it is returned.
    ///
    /// Returns `Ok(Config::default())` if the list is empty.
    pub fn load_from_files(files: &[PathBuf]) -> Result<Self, ConfigError> {
        if files.is_empty() {
            return Ok(Self::default());
        }

        let parsed: Vec<ParsedConfig> = files
            .iter()
            .map(|path| {
                let config = parse_config_file(path)?;
                Ok(ParsedConfig {
                    path: path.clone(),
                    config,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let config = merge_configs(&parsed);
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a single TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw = parse_config_str(contents, Path::new("<inline>"))?;
        let config = merge_configs(&[ParsedConfig {
            path: PathBuf::from("<inline>"),
            config: raw,
        }]);
        config.validate()?;
        Ok(config)
    }

    /// Checks every option and fails on the first invalid one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_config(self)
    }

    /// Serializes the effective settings to TOML format.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).expect("settings serialization should not fail")
    }
}

/// Suggester settings, fixed when a suggester is constructed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SuggestSettings {
    /// Always return the exact match first, even if it is not the top hit.
    pub exact_first: bool,
    /// Keep token boundaries, so "ab c" and "a bc" are different analyzed forms.
    pub preserve_separators: bool,
    /// Keep position holes left by removed tokens.
    pub preserve_position_increments: bool,
    /// At most this many surface forms survive for one analyzed form.
    pub max_surface_forms_per_analyzed_form: usize,
    /// Maximum analyzed paths indexed for one entry, `-1` for no limit.
    pub max_graph_expansions: i64,
    /// Byte written for preserved token boundaries.
    pub separator_byte: u8,
    /// Work limit when determinizing query automata.
    pub max_determinized_states: usize,
}

impl Default for SuggestSettings {
    fn default() -> Self {
        Self {
            exact_first: true,
            preserve_separators: true,
            preserve_position_increments: true,
            max_surface_forms_per_analyzed_form: 256,
            max_graph_expansions: -1,
            separator_byte: UNIT_SEPARATOR,
            max_determinized_states: 10_000,
        }
    }
}

impl SuggestSettings {
    /// Builds settings from the legacy `EXACT_FIRST | PRESERVE_SEP` bitmask.
    ///
    /// All other fields keep their defaults.
    pub fn from_flags(flags: u32) -> Result<Self, ConfigError> {
        if flags & !(EXACT_FIRST | PRESERVE_SEP) != 0 {
            return Err(ConfigError::InvalidOptions { flags });
        }
        Ok(Self {
            exact_first: flags & EXACT_FIRST != 0,
            preserve_separators: flags & PRESERVE_SEP != 0,
            ..Self::default()
        })
    }

    /// Returns the legacy bitmask for the two boolean options.
    pub fn flags(&self) -> u32 {
        let mut flags = 0;
        if self.exact_first {
            flags |= EXACT_FIRST;
        }
        if self.preserve_separators {
            flags |= PRESERVE_SEP;
        }
        flags
    }

    /// Graph expansion cap as an optional count (`None` means unlimited).
    pub fn graph_expansion_limit(&self) -> Option<usize> {
        usize::try_from(self.max_graph_expansions)
            .ok()
            .filter(|&limit| limit > 0)
    }
}

/// Text analysis settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Stemming language; no stemming when absent.
    pub stemmer: Option<String>,
    /// Words removed by the analyzer, leaving position holes behind.
    pub stop_words: Vec<String>,
    /// Tokens longer than this many bytes are dropped.
    pub max_token_length: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            stemmer: None,
            stop_words: Vec::new(),
            max_token_length: 40,
        }
    }
}

/// Offline build settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Directory for temporary sort files; the OS temp dir when absent.
    pub temp_dir: Option<PathBuf>,
    /// Bytes of records held in memory before a sorted run is spilled.
    pub sort_buffer_bytes: usize,
    /// Maximum number of runs merged at once.
    pub merge_factor: usize,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            temp_dir: None,
            sort_buffer_bytes: 32 * 1024 * 1024,
            merge_factor: 10,
        }
    }
}

impl BuildSettings {
    /// Resolves the directory used for temporary files.
    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(env::temp_dir)
    }
}
