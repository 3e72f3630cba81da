//! Deduplication and FST construction over sorted records.

use std::collections::HashSet;

use fst::raw::{Builder, Fst};
use sift_config::{END_BYTE, UNIT_SEPARATOR};

use crate::{
    SuggestError,
    index::{SuggestIndex, ValueStore, pack_output},
    record::SortRecord,
};

/// What happened to one record offered to the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The record was added to the index.
    Admitted,
    /// Its analyzed form already had the maximum number of surface forms.
    OverCap,
    /// The same surface form was already admitted for this analyzed form.
    Duplicate,
}

/// Running totals of admission decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmitStats {
    /// Records added to the index.
    pub admitted: u64,
    /// Records dropped by the per-form cap.
    pub over_cap: u64,
    /// Records dropped as duplicate surface forms.
    pub duplicates: u64,
}

/// Builds a [`SuggestIndex`] from records in sorted order.
///
/// Records sharing an analyzed form arrive by ascending cost, so the first
/// surface forms seen for a form are the heaviest ones and the cap drops the
/// lightest. Memory for duplicate detection is bounded by the cap.
pub struct IndexBuilder {
    /// Transducer under construction.
    fst: Builder<Vec<u8>>,
    /// Stored values by admission ordinal.
    values: ValueStore,
    /// Surface forms kept per analyzed form.
    max_surface_forms: usize,
    /// Whether records carry payloads.
    has_payloads: bool,
    /// Analyzed form of the previous record.
    previous: Option<Vec<u8>>,
    /// Surface forms admitted for `previous`.
    seen: HashSet<Vec<u8>>,
    /// Records seen for `previous` after the first.
    dedup: usize,
    /// Scratch key buffer.
    key: Vec<u8>,
    /// Admission totals.
    stats: AdmitStats,
}

impl IndexBuilder {
    /// Creates a builder keeping at most `max_surface_forms` per analyzed form.
    pub fn new(max_surface_forms: usize, has_payloads: bool) -> Self {
        Self {
            fst: Builder::memory(),
            values: ValueStore::default(),
            max_surface_forms,
            has_payloads,
            previous: None,
            seen: HashSet::new(),
            dedup: 0,
            key: Vec::new(),
            stats: AdmitStats::default(),
        }
    }

    /// Offers the next record in sorted order.
    pub fn push(&mut self, record: &SortRecord<'_>) -> Result<Admission, SuggestError> {
        if self.previous.as_deref() == Some(record.analyzed) {
            self.dedup += 1;
            if self.dedup >= self.max_surface_forms {
                self.stats.over_cap += 1;
                return Ok(Admission::OverCap);
            }
            if self.seen.contains(record.surface) {
                self.stats.duplicates += 1;
                return Ok(Admission::Duplicate);
            }
            self.seen.insert(record.surface.to_vec());
        } else {
            self.dedup = 0;
            self.previous = Some(record.analyzed.to_vec());
            self.seen.clear();
            self.seen.insert(record.surface.to_vec());
        }

        let ordinal = u32::try_from(self.values.len()).map_err(|_| {
            SuggestError::TooManySuggestions {
                max: u64::from(u32::MAX) + 1,
            }
        })?;
        // dedup < max_surface_forms <= 256
        let dedup = self.dedup as u8;

        self.key.clear();
        self.key.extend_from_slice(record.analyzed);
        self.key.push(END_BYTE);
        self.key.push(dedup);
        self.fst.insert(&self.key, pack_output(record.cost, ordinal))?;

        if self.has_payloads {
            let payload = record.payload.unwrap_or_default();
            self.values.push(&[record.surface, &[UNIT_SEPARATOR], payload]);
        } else {
            self.values.push(&[record.surface]);
        }
        self.stats.admitted += 1;
        Ok(Admission::Admitted)
    }

    /// Admission totals so far.
    pub fn stats(&self) -> AdmitStats {
        self.stats
    }

    /// Finalizes the index, or returns `None` if nothing was admitted.
    pub fn finish(self, max_analyzed_paths: usize) -> Result<Option<SuggestIndex>, SuggestError> {
        if self.values.is_empty() {
            return Ok(None);
        }
        let fst = Fst::new(self.fst.into_inner()?)?;
        Ok(Some(SuggestIndex::new(
            fst,
            self.values,
            max_analyzed_paths,
            self.has_payloads,
        )))
    }
}

#[cfg(test)]
mod test {
    use fst::Streamer;

    use super::*;
    use crate::index::unpack_output;

    fn rec<'a>(analyzed: &'a [u8], cost: u32, surface: &'a [u8]) -> SortRecord<'a> {
        SortRecord {
            analyzed,
            cost,
            surface,
            payload: None,
        }
    }

    fn keys(index: &SuggestIndex) -> Vec<(Vec<u8>, u64)> {
        let mut stream = index.fst().stream();
        let mut out = Vec::new();
        while let Some((key, output)) = stream.next() {
            out.push((key.to_vec(), output.value()));
        }
        out
    }

    #[test]
    fn keys_carry_end_and_dedup_bytes() {
        let mut builder = IndexBuilder::new(256, false);
        builder.push(&rec(b"ab", 1, b"AB")).unwrap();
        builder.push(&rec(b"ab", 2, b"Ab")).unwrap();
        builder.push(&rec(b"abc", 0, b"ABC")).unwrap();
        let index = builder.finish(1).unwrap().unwrap();

        assert_eq!(
            keys(&index),
            vec![
                (b"ab\x00\x00".to_vec(), pack_output(1, 0)),
                (b"ab\x00\x01".to_vec(), pack_output(2, 1)),
                (b"abc\x00\x00".to_vec(), pack_output(0, 2)),
            ]
        );
        assert_eq!(index.resolve(pack_output(2, 1)).unwrap().1, b"Ab");
    }

    #[test]
    fn cap_drops_lightest() {
        let mut builder = IndexBuilder::new(2, false);
        assert_eq!(builder.push(&rec(b"a", 1, b"x")).unwrap(), Admission::Admitted);
        assert_eq!(builder.push(&rec(b"a", 2, b"y")).unwrap(), Admission::Admitted);
        assert_eq!(builder.push(&rec(b"a", 3, b"z")).unwrap(), Admission::OverCap);
        assert_eq!(builder.push(&rec(b"b", 3, b"z")).unwrap(), Admission::Admitted);

        let stats = builder.stats();
        assert_eq!(stats.admitted, 3);
        assert_eq!(stats.over_cap, 1);
        assert_eq!(builder.finish(1).unwrap().unwrap().num_forms(), 3);
    }

    #[test]
    fn duplicate_surface_is_skipped() {
        let mut builder = IndexBuilder::new(256, false);
        builder.push(&rec(b"a", 1, b"x")).unwrap();
        assert_eq!(builder.push(&rec(b"a", 5, b"x")).unwrap(), Admission::Duplicate);
        assert_eq!(builder.push(&rec(b"a", 6, b"w")).unwrap(), Admission::Admitted);

        let index = builder.finish(1).unwrap().unwrap();
        let (_, ordinal) = unpack_output(keys(&index)[1].1);
        assert_eq!(ordinal, 1);
        assert_eq!(keys(&index)[1].0, b"a\x00\x02".to_vec());
    }

    #[test]
    fn payload_values_join_with_separator() {
        let mut builder = IndexBuilder::new(256, true);
        let record = SortRecord {
            payload: Some(&b"NY"[..]),
            ..rec(b"new york", 0, b"New York")
        };
        builder.push(&record).unwrap();
        let index = builder.finish(1).unwrap().unwrap();
        assert_eq!(index.resolve(pack_output(0, 0)).unwrap().1, b"New York\x1fNY");
        assert!(index.has_payloads());
    }

    #[test]
    fn nothing_admitted_builds_nothing() {
        let builder = IndexBuilder::new(1, false);
        assert!(builder.finish(0).unwrap().is_none());
    }

    #[test]
    fn out_of_order_records_fail() {
        let mut builder = IndexBuilder::new(256, false);
        builder.push(&rec(b"b", 0, b"b")).unwrap();
        assert!(matches!(
            builder.push(&rec(b"a", 0, b"a")),
            Err(SuggestError::Fst(_))
        ));
    }
}
