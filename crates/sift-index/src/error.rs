//! Error types for the sift-index crate.

use std::io;

use sift_config::ConfigError;
use thiserror::Error;

/// Errors that can occur when building, persisting or querying a suggester.
#[derive(Debug, Error)]
pub enum SuggestError {
    /// The suggester configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Invalid stemmer language.
    #[error("unsupported stemmer language: {0}")]
    InvalidLanguage(String),

    /// The entry source or the lookup carried contexts.
    #[error("this suggester doesn't support contexts")]
    ContextsUnsupported,

    /// A lookup asked for only-more-popular suggestions.
    #[error("this suggester only works with only_more_popular=false")]
    OnlyMorePopularUnsupported,

    /// A lookup key contained a reserved control character.
    #[error("lookup key cannot contain {name} character U+{byte:04X}; this character is reserved")]
    ReservedLookupByte {
        /// Human readable name of the reserved character.
        name: &'static str,
        /// The reserved byte.
        byte: u8,
    },

    /// A surface form contained the payload separator while payloads are enabled.
    #[error("surface form cannot contain unit separator character U+001F; this character is reserved")]
    ReservedSurfaceByte,

    /// An analyzed path contained the end-of-form marker.
    #[error("analyzed form cannot contain the end-of-form byte 0x00")]
    EndByteInAnalyzedForm,

    /// An analyzed path does not fit the record length field.
    #[error("cannot handle analyzed forms > {max} in length (got {len})")]
    AnalyzedFormTooLong {
        /// Length of the offending analyzed form.
        len: usize,
        /// Largest supported length.
        max: usize,
    },

    /// A surface form does not fit the record length field.
    #[error("cannot handle surface form > {max} in length (got {len})")]
    SurfaceFormTooLong {
        /// Length of the offending surface form.
        len: usize,
        /// Largest supported length.
        max: usize,
    },

    /// A weight was larger than `i32::MAX`.
    #[error("weight must be between 0 and {max} (got {weight})")]
    WeightOutOfRange {
        /// The rejected weight.
        weight: u64,
        /// Largest supported weight.
        max: u64,
    },

    /// More forms were admitted than the output ordinal can address.
    #[error("cannot index more than {max} suggestions")]
    TooManySuggestions {
        /// Largest supported number of admitted forms.
        max: u64,
    },

    /// Analysis produced a cyclic automaton.
    #[error("analyzed automaton is not finite")]
    InfiniteAutomaton,

    /// Determinizing the lookup automaton exceeded the work limit.
    #[error("determinizing automaton would result in more than {limit} states")]
    TooComplexToDeterminize {
        /// Configured state limit.
        limit: usize,
    },

    /// A line of a dictionary file could not be parsed.
    #[error("invalid dictionary line {line}: {message}")]
    InvalidDictionaryLine {
        /// One-based line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// Failed to build or open the transducer.
    #[error("transducer error: {0}")]
    Fst(#[from] fst::Error),

    /// Persisted or intermediate data did not have the expected layout.
    #[error("corrupt suggester data: {0}")]
    Corrupt(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SuggestError {
    /// Creates a `Corrupt` error from any message.
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }
}
