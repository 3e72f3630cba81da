//! The analyzing suggester: build, persist and look up suggestions.

use std::{
    collections::{BTreeSet, HashSet},
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
    sync::Arc,
};

use fst::raw::Output;
use sift_config::{BuildSettings, Config, END_BYTE, HOLE_BYTE, SuggestSettings, UNIT_SEPARATOR};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{
    SuggestError,
    analyzer::{Analyzer, StandardAnalyzer},
    automaton::Automaton,
    builder::IndexBuilder,
    dictionary::EntrySource,
    hooks::{DefaultHooks, SuggestHooks},
    index::{SuggestIndex, split_value},
    record::{SortRecord, SuggestRecordOrder, decode_weight, encode_weight},
    search::{PrefixPath, TopNSearcher, intersect_prefix_paths},
    separators::replace_sep,
    sort::{ExternalSorter, RecordReader, write_record},
    token_automaton::tokens_to_automaton,
    varint::{read_varint, write_varint},
};

/// One suggestion returned by [`Suggester::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    /// The suggested surface form.
    pub key: String,
    /// The entry weight.
    pub value: u64,
    /// The entry payload, when the index carries payloads.
    pub payload: Option<Vec<u8>>,
}

/// Totals from writing the spill file.
#[derive(Debug, Clone, Copy, Default)]
struct SpillStats {
    /// Entries read from the source.
    entries: u64,
    /// Analyzed paths written.
    paths: u64,
    /// Most paths produced by one entry.
    max_paths: usize,
}

/// Suggests completions by matching the analyzed form of a prefix.
///
/// Entries are analyzed into one or more byte paths and indexed in an FST
/// keyed by analyzed form, so "ghost chr" can suggest "The Ghost of
/// Christmas Past" when the analyzer drops "the". Results are ordered by
/// weight, heaviest first.
///
/// `build` and `load` take `&mut self`; lookups take `&self` and share the
/// built index, which is immutable once built.
pub struct Suggester {
    /// Keying and lookup behaviour.
    settings: SuggestSettings,
    /// External sort limits.
    build: BuildSettings,
    /// Analyzer for entry surface forms.
    index_analyzer: Arc<dyn Analyzer>,
    /// Analyzer for lookup keys.
    query_analyzer: Arc<dyn Analyzer>,
    /// Automaton and prefix path hooks.
    hooks: Arc<dyn SuggestHooks>,
    /// Entries read by the last build.
    count: u64,
    /// The built index; `None` until something is built or loaded.
    index: Option<Arc<SuggestIndex>>,
}

impl Suggester {
    /// Creates an empty suggester using the configured standard analyzer for
    /// both indexing and lookup.
    pub fn new(config: &Config) -> Result<Self, SuggestError> {
        let analyzer: Arc<dyn Analyzer> = Arc::new(StandardAnalyzer::from_settings(&config.analysis)?);
        Self::with_analyzers(config, Arc::clone(&analyzer), analyzer)
    }

    /// Creates an empty suggester with separate index and query analyzers.
    pub fn with_analyzers(
        config: &Config,
        index_analyzer: Arc<dyn Analyzer>,
        query_analyzer: Arc<dyn Analyzer>,
    ) -> Result<Self, SuggestError> {
        config.validate()?;
        Ok(Self {
            settings: config.suggest.clone(),
            build: config.build.clone(),
            index_analyzer,
            query_analyzer,
            hooks: Arc::new(DefaultHooks),
            count: 0,
            index: None,
        })
    }

    /// Replaces the automaton and prefix path hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn SuggestHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// The suggester settings.
    pub fn settings(&self) -> &SuggestSettings {
        &self.settings
    }

    /// Number of entries in the last build, or as loaded.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Most analyzed paths indexed for one entry, 0 when empty.
    pub fn max_analyzed_paths(&self) -> usize {
        self.index
            .as_ref()
            .map_or(0, |index| index.max_analyzed_paths())
    }

    /// Bytes held by the index, 0 when empty.
    pub fn size_in_bytes(&self) -> u64 {
        self.index.as_ref().map_or(0, |index| index.size_in_bytes())
    }

    /// Builds the index from every entry in `source`, replacing any previous
    /// index.
    ///
    /// On failure the previous index stays in place. Temporary files are
    /// removed on every path out.
    pub fn build(&mut self, source: &mut dyn EntrySource) -> Result<(), SuggestError> {
        if source.has_contexts() {
            return Err(SuggestError::ContextsUnsupported);
        }
        let has_payloads = source.has_payloads();

        let spill = tempfile::Builder::new()
            .prefix("sift-spill-")
            .tempfile_in(self.build.resolved_temp_dir())?;
        let spilled = self.spill_entries(source, has_payloads, &spill)?;
        debug!(
            entries = spilled.entries,
            paths = spilled.paths,
            max_paths = spilled.max_paths,
            "wrote analyzed paths"
        );

        let sorter = ExternalSorter::new(SuggestRecordOrder { has_payloads }, &self.build);
        let (sorted, sort_stats) = sorter.sort(spill.reopen()?)?;
        drop(spill);
        debug!(
            runs = sort_stats.runs,
            merge_rounds = sort_stats.merge_rounds,
            "sorted analyzed paths"
        );

        let index = self.index_sorted(&sorted, has_payloads, spilled.max_paths)?;
        drop(sorted);

        self.count = spilled.entries;
        self.index = index.map(Arc::new);
        info!(
            entries = self.count,
            forms = self.index.as_ref().map_or(0, |index| index.num_forms()),
            bytes = self.size_in_bytes(),
            "built suggester"
        );
        Ok(())
    }

    /// Analyzes every entry and writes one sort record per analyzed path.
    fn spill_entries(
        &self,
        source: &mut dyn EntrySource,
        has_payloads: bool,
        spill: &NamedTempFile,
    ) -> Result<SpillStats, SuggestError> {
        let mut writer = BufWriter::new(spill.as_file());
        let mut stats = SpillStats::default();
        let mut buf = Vec::new();

        while let Some(entry) = source.next_entry()? {
            if !entry.contexts.is_empty() {
                return Err(SuggestError::ContextsUnsupported);
            }
            let cost = encode_weight(entry.weight)?;
            let surface = entry.surface.as_bytes();
            if has_payloads && surface.contains(&UNIT_SEPARATOR) {
                return Err(SuggestError::ReservedSurfaceByte);
            }
            let payload = has_payloads.then(|| entry.payload.as_deref().unwrap_or_default());

            let paths = self.analyzed_forms(&entry.surface)?;
            stats.max_paths = stats.max_paths.max(paths.len());
            for path in &paths {
                if path.contains(&END_BYTE) {
                    return Err(SuggestError::EndByteInAnalyzedForm);
                }
                buf.clear();
                SortRecord {
                    analyzed: path,
                    cost,
                    surface,
                    payload,
                }
                .encode(has_payloads, &mut buf)?;
                write_record(&mut writer, &buf)?;
                stats.paths += 1;
            }
            stats.entries += 1;
        }

        writer.flush()?;
        Ok(stats)
    }

    /// Feeds the sorted records into an [`IndexBuilder`].
    fn index_sorted(
        &self,
        sorted: &NamedTempFile,
        has_payloads: bool,
        max_paths: usize,
    ) -> Result<Option<SuggestIndex>, SuggestError> {
        let mut reader = RecordReader::new(BufReader::new(sorted.reopen()?));
        let mut builder = IndexBuilder::new(self.settings.max_surface_forms_per_analyzed_form, has_payloads);
        let mut buf = Vec::new();
        while reader.read_into(&mut buf)? {
            builder.push(&SortRecord::decode(&buf, has_payloads)?)?;
        }

        let stats = builder.stats();
        debug!(
            admitted = stats.admitted,
            over_cap = stats.over_cap,
            duplicates = stats.duplicates,
            "deduplicated surface forms"
        );
        builder.finish(max_paths)
    }

    /// Token automaton for `text` with separators and holes normalized.
    fn token_automaton(&self, analyzer: &dyn Analyzer, text: &str) -> Result<Automaton, SuggestError> {
        let tokens = analyzer.analyze(text);
        let escape_sep = self
            .settings
            .preserve_separators
            .then_some(self.settings.separator_byte);
        let automaton = tokens_to_automaton(
            &tokens,
            self.settings.preserve_position_increments,
            escape_sep,
        );
        replace_sep(
            &automaton,
            self.settings.preserve_separators,
            self.settings.separator_byte,
        )
    }

    /// Distinct analyzed paths of one surface form.
    fn analyzed_forms(&self, surface: &str) -> Result<BTreeSet<Vec<u8>>, SuggestError> {
        let automaton = self.token_automaton(self.index_analyzer.as_ref(), surface)?;
        self.hooks
            .convert_automaton(automaton)
            .finite_strings(self.settings.graph_expansion_limit())
    }

    /// Deterministic automaton accepting the analyzed forms of `key`.
    fn lookup_automaton(&self, key: &str) -> Result<Automaton, SuggestError> {
        let automaton = self
            .token_automaton(self.query_analyzer.as_ref(), key)?
            .determinize(self.settings.max_determinized_states)?;
        Ok(self.hooks.convert_automaton(automaton))
    }

    /// Returns up to `num` suggestions for `key`, heaviest first.
    ///
    /// In exact-first mode an entry whose surface form equals `key` comes
    /// first regardless of weight. Contexts and `only_more_popular` are not
    /// supported. An empty suggester returns no results.
    pub fn lookup(
        &self,
        key: &str,
        contexts: Option<&[Vec<u8>]>,
        only_more_popular: bool,
        num: usize,
    ) -> Result<Vec<LookupResult>, SuggestError> {
        if only_more_popular {
            return Err(SuggestError::OnlyMorePopularUnsupported);
        }
        if contexts.is_some() {
            return Err(SuggestError::ContextsUnsupported);
        }
        let Some(index) = self.index.as_deref() else {
            return Ok(Vec::new());
        };
        check_lookup_key(key)?;
        if key.is_empty() || num == 0 {
            return Ok(Vec::new());
        }

        let automaton = self.lookup_automaton(key)?;
        let fst = index.fst();
        let prefix_paths = intersect_prefix_paths(&automaton, fst);
        let mut results = Vec::with_capacity(num);

        if self.settings.exact_first {
            if let Some(exact) = self.exact_match(index, &prefix_paths, key)? {
                results.push(exact);
                if results.len() == num {
                    return Ok(results);
                }
            }
        }

        let prefix_paths = self.hooks.full_prefix_paths(prefix_paths, &automaton, fst);
        let max_queue_depth = num.saturating_mul(index.max_analyzed_paths().max(1));
        let mut searcher = TopNSearcher::new(fst, num - results.len(), max_queue_depth);
        for path in prefix_paths {
            searcher.add_start_path(path.node, path.output, path.input, true);
        }

        let exact_first = self.settings.exact_first;
        let mut seen: HashSet<&[u8]> = HashSet::new();
        let completions = searcher.search(|_, output| {
            let (_, value) = index.resolve(output)?;
            let (surface, _) = split_value(value, index.has_payloads())?;
            if !seen.insert(surface) {
                return Ok(false);
            }
            Ok(!(exact_first && surface == key.as_bytes()))
        })?;

        for hit in completions.hits {
            results.push(lookup_result(index, hit.output)?);
            if results.len() == num {
                break;
            }
        }
        Ok(results)
    }

    /// Returns up to `num` suggestions for `key` without contexts.
    pub fn suggest(&self, key: &str, num: usize) -> Result<Vec<LookupResult>, SuggestError> {
        self.lookup(key, None, false, num)
    }

    /// Finds the entry whose surface form is exactly `key`.
    ///
    /// Only prefix paths that end an analyzed form are searched, and every
    /// surface form below them is considered.
    fn exact_match(
        &self,
        index: &SuggestIndex,
        prefix_paths: &[PrefixPath],
        key: &str,
    ) -> Result<Option<LookupResult>, SuggestError> {
        let fst = index.fst();
        let mut starts = Vec::new();
        for path in prefix_paths {
            let node = fst.node(path.node);
            let Some(i) = node.find_input(END_BYTE) else {
                continue;
            };
            let arc = node.transition(i);
            let mut input = path.input.clone();
            input.push(END_BYTE);
            starts.push((arc.addr, Output::new(path.output).cat(arc.out).value(), input));
        }
        if starts.is_empty() {
            return Ok(None);
        }

        let top_n = starts
            .len()
            .saturating_mul(self.settings.max_surface_forms_per_analyzed_form);
        let mut searcher = TopNSearcher::new(fst, top_n, top_n);
        for (node, output, input) in starts {
            searcher.add_start_path(node, output, input, false);
        }

        for hit in searcher.search(|_, _| Ok(true))?.hits {
            let (_, value) = index.resolve(hit.output)?;
            let (surface, _) = split_value(value, index.has_payloads())?;
            if surface == key.as_bytes() {
                return lookup_result(index, hit.output).map(Some);
            }
        }
        Ok(None)
    }

    /// Writes the entry count and, when built, the index.
    ///
    /// Returns whether an index was written.
    pub fn store<W: Write + ?Sized>(&self, writer: &mut W) -> Result<bool, SuggestError> {
        write_varint(writer, self.count)?;
        let Some(index) = &self.index else {
            return Ok(false);
        };
        index.write_to(writer)?;
        Ok(true)
    }

    /// Replaces the in-memory state with what [`Suggester::store`] wrote.
    ///
    /// Returns whether an index was loaded.
    pub fn load<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<bool, SuggestError> {
        let count = read_varint(reader)?;
        let index = SuggestIndex::read_from(reader)?;
        let loaded = index.is_some();

        self.count = count;
        self.index = index.map(Arc::new);
        info!(entries = count, bytes = self.size_in_bytes(), "loaded suggester");
        Ok(loaded)
    }

    /// Stores into `path`, replacing it atomically.
    pub fn store_to_path(&self, path: &Path) -> Result<bool, SuggestError> {
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut file = NamedTempFile::new_in(dir)?;

        let mut writer = BufWriter::new(file.as_file_mut());
        let stored = self.store(&mut writer)?;
        writer.flush()?;
        drop(writer);

        file.persist(path).map_err(|e| e.error)?;
        info!(path = %path.display(), stored, "stored suggester");
        Ok(stored)
    }

    /// Loads from a file written by [`Suggester::store_to_path`].
    pub fn load_from_path(&mut self, path: &Path) -> Result<bool, SuggestError> {
        let mut reader = BufReader::new(File::open(path)?);
        self.load(&mut reader)
    }
}

/// Rejects keys containing bytes reserved by the analyzed form.
fn check_lookup_key(key: &str) -> Result<(), SuggestError> {
    for byte in key.bytes() {
        let name = match byte {
            HOLE_BYTE => "HOLE",
            UNIT_SEPARATOR => "unit separator",
            _ => continue,
        };
        return Err(SuggestError::ReservedLookupByte { name, byte });
    }
    Ok(())
}

/// Decodes a complete FST output into a result.
fn lookup_result(index: &SuggestIndex, output: u64) -> Result<LookupResult, SuggestError> {
    let (cost, value) = index.resolve(output)?;
    let (surface, payload) = split_value(value, index.has_payloads())?;
    let key = String::from_utf8(surface.to_vec())
        .map_err(|_| SuggestError::corrupt("stored surface form is not valid UTF-8"))?;
    Ok(LookupResult {
        key,
        value: decode_weight(cost),
        payload: payload.map(<[u8]>::to_vec),
    })
}
