//! Error types for sift configuration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use toml::de;

/// Errors that can occur when loading or validating configuration.
///
/// Every variant is fatal to construction: a suggester is never built from a
/// configuration that failed validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Failed to parse TOML configuration.
    #[error("failed to parse config file {path}: {source}")]
    ParseToml {
        /// Path to the file that could not be parsed.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: de::Error,
    },

    /// The legacy option bitmask carried bits other than `EXACT_FIRST` and `PRESERVE_SEP`.
    #[error("options should only contain EXACT_FIRST and PRESERVE_SEP; got {flags}")]
    InvalidOptions {
        /// The rejected bitmask.
        flags: u32,
    },

    /// `max_surface_forms_per_analyzed_form` outside `1..=256`.
    #[error("max_surface_forms_per_analyzed_form must be > 0 and <= 256 (got {value})")]
    MaxSurfaceForms {
        /// The rejected value.
        value: usize,
    },

    /// `max_graph_expansions` was neither `-1` nor positive.
    #[error("max_graph_expansions must be -1 (no limit) or > 0 (got {value})")]
    MaxGraphExpansions {
        /// The rejected value.
        value: i64,
    },

    /// The separator byte collides with a reserved marker byte.
    #[error("separator_byte {byte:#04x} is reserved")]
    ReservedSeparator {
        /// The rejected byte.
        byte: u8,
    },

    /// The external sort cannot merge fewer than two runs at a time.
    #[error("merge_factor must be >= 2 (got {value})")]
    MergeFactor {
        /// The rejected value.
        value: usize,
    },

    /// The external sort needs a non-empty in-memory buffer.
    #[error("sort_buffer_bytes must be > 0")]
    SortBuffer,

    /// Determinization needs room for at least one state.
    #[error("max_determinized_states must be > 0")]
    DeterminizedStates,
}
