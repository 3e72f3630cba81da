//! Configuration merging.
//!
//! Merges multiple `RawConfig` files into a single resolved `Config`,
//! applying precedence rules.

use std::path::PathBuf;

use crate::{
    AnalysisSettings, BuildSettings, Config, SuggestSettings,
    parse::{RawAnalysisSettings, RawBuildSettings, RawConfig, RawSuggestSettings},
};

/// A parsed config file with its source path.
pub struct ParsedConfig {
    /// Path to the config file.
    pub path: PathBuf,
    /// Parsed raw configuration.
    pub config: RawConfig,
}

/// Merges multiple configuration files into a single resolved `Config`.
///
/// Configs should be provided in precedence order: highest precedence first.
/// For every scalar the first defined value wins; fields nobody defines keep
/// their defaults. The result is not validated here.
pub fn merge_configs(configs: &[ParsedConfig]) -> Config {
    let mut config = Config::default();

    // Iterate in reverse (lowest precedence first) so higher precedence overwrites
    for parsed in configs.iter().rev() {
        if let Some(ref raw) = parsed.config.suggest {
            apply_raw_suggest(&mut config.suggest, raw);
        }
        if let Some(ref raw) = parsed.config.analysis {
            apply_raw_analysis(&mut config.analysis, raw);
        }
        if let Some(ref raw) = parsed.config.build {
            apply_raw_build(&mut config.build, raw);
        }
    }

    config
}

/// Applies raw suggester settings to result, overwriting any present values.
fn apply_raw_suggest(result: &mut SuggestSettings, raw: &RawSuggestSettings) {
    if let Some(v) = raw.exact_first {
        result.exact_first = v;
    }
    if let Some(v) = raw.preserve_separators {
        result.preserve_separators = v;
    }
    if let Some(v) = raw.preserve_position_increments {
        result.preserve_position_increments = v;
    }
    if let Some(v) = raw.max_surface_forms_per_analyzed_form {
        result.max_surface_forms_per_analyzed_form = v;
    }
    if let Some(v) = raw.max_graph_expansions {
        result.max_graph_expansions = v;
    }
    if let Some(v) = raw.separator_byte {
        result.separator_byte = v;
    }
    if let Some(v) = raw.max_determinized_states {
        result.max_determinized_states = v;
    }
}

/// Applies raw analysis settings to result, overwriting any present values.
fn apply_raw_analysis(result: &mut AnalysisSettings, raw: &RawAnalysisSettings) {
    if let Some(ref v) = raw.stemmer {
        result.stemmer = Some(v.clone());
    }
    if let Some(ref v) = raw.stop_words {
        result.stop_words = v.clone();
    }
    if let Some(v) = raw.max_token_length {
        result.max_token_length = v;
    }
}

/// Applies raw build settings to result, overwriting any present values.
fn apply_raw_build(result: &mut BuildSettings, raw: &RawBuildSettings) {
    if let Some(ref v) = raw.temp_dir {
        result.temp_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = raw.sort_buffer_bytes {
        result.sort_buffer_bytes = v;
    }
    if let Some(v) = raw.merge_factor {
        result.merge_factor = v;
    }
}
