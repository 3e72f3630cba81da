//! Analyzing prefix suggester backed by a finite state transducer.
//!
//! Entries are run through an [`Analyzer`], turned into a token automaton,
//! and every analyzed path is indexed in an FST keyed by analyzed form. A
//! lookup analyzes the prefix the same way and returns the heaviest entries
//! below every matching FST node. This crate provides:
//! - Analysis through Tantivy tokenizers, or any custom [`Analyzer`]
//! - Offline builds through a disk-backed external sort
//! - Per-form deduplication with a cap on surface forms
//! - Exact-match-first lookup
//! - Persistence of the built index
//!
//! # Stored format
//!
//! FST outputs pack the entry cost with an ordinal into a side table of
//! surface forms and payloads, rather than holding the surface form itself.
//! [`Suggester::store`] writes the entry count, the FST, that value table,
//! the maximum analyzed paths for one entry and a payload flag.
//!
//! # Example
//!
//! ```no_run
//! use sift_config::Config;
//! use sift_index::{Entry, EntryList, Suggester};
//!
//! let mut suggester = Suggester::new(&Config::default()).unwrap();
//! suggester
//!     .build(&mut EntryList::new(vec![
//!         Entry::new("new york", 10),
//!         Entry::new("new york city", 5),
//!     ]))
//!     .unwrap();
//!
//! for result in suggester.suggest("new y", 5).unwrap() {
//!     println!("{} ({})", result.key, result.value);
//! }
//! ```

#![warn(missing_docs)]

mod analyzer;
mod automaton;
mod builder;
mod dictionary;
mod error;
mod hooks;
mod index;
mod record;
mod search;
mod separators;
mod sort;
mod suggester;
mod token_automaton;
mod varint;

pub use analyzer::{Analyzer, GraphToken, StandardAnalyzer, build_analyzer, parse_language};
pub use automaton::{Automaton, StateId, Transition};
pub use builder::{AdmitStats, Admission, IndexBuilder};
pub use dictionary::{Entry, EntryList, EntrySource, FileDictionary};
pub use error::SuggestError;
pub use hooks::{DefaultHooks, SuggestHooks};
pub use index::{SuggestIndex, ValueStore, pack_output, split_value, unpack_output};
pub use record::{MAX_FORM_LEN, MAX_WEIGHT, SortRecord, SuggestRecordOrder, decode_weight, encode_weight};
pub use search::{PrefixPath, SearchHit, TopNSearcher, TopResults, intersect_prefix_paths};
pub use separators::replace_sep;
pub use sort::{ExternalSorter, RecordOrder, RecordReader, SortStats, write_record};
pub use suggester::{LookupResult, Suggester};
pub use token_automaton::{ESCAPE, TokenLabel, tokens_to_automaton};
pub use varint::{read_varint, read_varint_opt, write_varint};
