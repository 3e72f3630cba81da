//! Disk-backed merge sort over opaque byte records.
//!
//! Records are stored in *sequence files*: each record is a little-endian
//! `u32` length followed by its bytes. Input is cut into sorted runs of about
//! `sort_buffer_bytes`, and runs are merged `merge_factor` at a time until a
//! single sorted file remains. The sorter knows nothing about record
//! contents; all ordering comes from a [`RecordOrder`].
//!
//! Every intermediate file is a [`NamedTempFile`] and is removed when
//! dropped, including when a sort fails part way.

use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    io::{self, BufReader, BufWriter, Read, Write},
    mem,
    path::PathBuf,
};

use sift_config::BuildSettings;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::SuggestError;

/// Per-record bookkeeping charged against the sort buffer.
const RECORD_OVERHEAD: usize = mem::size_of::<Vec<u8>>();

/// Total order over encoded records.
pub trait RecordOrder {
    /// Compares two encoded records.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

impl<F> RecordOrder for F
where
    F: Fn(&[u8], &[u8]) -> Ordering,
{
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self(a, b)
    }
}

/// Appends one length-prefixed record.
pub fn write_record<W: Write + ?Sized>(writer: &mut W, record: &[u8]) -> Result<(), SuggestError> {
    let len = u32::try_from(record.len())
        .map_err(|_| SuggestError::corrupt("sort record larger than 4 GiB"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(record)?;
    Ok(())
}

/// Streams length-prefixed records back out of a sequence file.
pub struct RecordReader<R> {
    /// Underlying stream.
    inner: R,
}

impl<R: Read> RecordReader<R> {
    /// Wraps a reader positioned at the first record.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads the next record into `buf`, replacing its contents.
    ///
    /// Returns false at a clean end of stream.
    pub fn read_into(&mut self, buf: &mut Vec<u8>) -> Result<bool, SuggestError> {
        let mut len = [0u8; 4];
        let mut filled = 0;
        while filled < len.len() {
            match self.inner.read(&mut len[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => return Err(SuggestError::corrupt("truncated record length")),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        let len = u32::from_le_bytes(len) as usize;
        buf.clear();
        buf.resize(len, 0);
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => SuggestError::corrupt("truncated record"),
            _ => e.into(),
        })?;
        Ok(true)
    }
}

/// Summary of one sort, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Records read from the input.
    pub records: u64,
    /// Sorted runs spilled before merging.
    pub runs: usize,
    /// Merge passes over the runs.
    pub merge_rounds: usize,
}

/// External merge sorter.
pub struct ExternalSorter<O> {
    /// Record comparator.
    order: O,
    /// Where runs are spilled.
    temp_dir: PathBuf,
    /// In-memory run size.
    buffer_bytes: usize,
    /// Runs merged at once.
    merge_factor: usize,
}

impl<O: RecordOrder> ExternalSorter<O> {
    /// Creates a sorter using the build settings' limits and temp directory.
    pub fn new(order: O, settings: &BuildSettings) -> Self {
        Self {
            order,
            temp_dir: settings.resolved_temp_dir(),
            buffer_bytes: settings.sort_buffer_bytes.max(1),
            merge_factor: settings.merge_factor.max(2),
        }
    }

    /// Sorts the sequence file read from `input` into a new temporary file.
    pub fn sort<R: Read>(&self, input: R) -> Result<(NamedTempFile, SortStats), SuggestError> {
        let mut reader = RecordReader::new(BufReader::new(input));
        let mut stats = SortStats::default();
        let mut runs: Vec<NamedTempFile> = Vec::new();
        let mut buffer: Vec<Vec<u8>> = Vec::new();
        let mut buffered = 0usize;
        let mut record = Vec::new();

        while reader.read_into(&mut record)? {
            stats.records += 1;
            buffered += record.len() + RECORD_OVERHEAD;
            buffer.push(mem::take(&mut record));
            if buffered >= self.buffer_bytes {
                runs.push(self.write_run(&mut buffer)?);
                buffered = 0;
            }
        }
        if !buffer.is_empty() || runs.is_empty() {
            runs.push(self.write_run(&mut buffer)?);
        }
        stats.runs = runs.len();
        debug!(records = stats.records, runs = stats.runs, "spilled sorted runs");

        while runs.len() > 1 {
            let mut merged = Vec::with_capacity(runs.len().div_ceil(self.merge_factor));
            let mut pending = runs.into_iter();
            loop {
                let group: Vec<NamedTempFile> = pending.by_ref().take(self.merge_factor).collect();
                match group.len() {
                    0 => break,
                    1 => merged.extend(group),
                    _ => merged.push(self.merge(&group)?),
                }
            }
            stats.merge_rounds += 1;
            debug!(round = stats.merge_rounds, remaining = merged.len(), "merged runs");
            runs = merged;
        }

        let sorted = runs
            .pop()
            .ok_or_else(|| SuggestError::corrupt("external sort produced no output"))?;
        Ok((sorted, stats))
    }

    /// Creates an empty temporary file in the sort directory.
    fn temp_file(&self) -> Result<NamedTempFile, SuggestError> {
        Ok(tempfile::Builder::new()
            .prefix("sift-sort-")
            .tempfile_in(&self.temp_dir)?)
    }

    /// Sorts `buffer` in memory and writes it out as one run.
    fn write_run(&self, buffer: &mut Vec<Vec<u8>>) -> Result<NamedTempFile, SuggestError> {
        buffer.sort_by(|a, b| self.order.compare(a, b));
        let run = self.temp_file()?;
        let mut writer = BufWriter::new(run.as_file());
        for record in buffer.drain(..) {
            write_record(&mut writer, &record)?;
        }
        writer.flush()?;
        drop(writer);
        Ok(run)
    }

    /// Merges sorted runs into one.
    fn merge(&self, group: &[NamedTempFile]) -> Result<NamedTempFile, SuggestError> {
        let mut readers = group
            .iter()
            .map(|run| Ok(RecordReader::new(BufReader::new(run.reopen()?))))
            .collect::<Result<Vec<_>, SuggestError>>()?;

        let mut heap = BinaryHeap::with_capacity(readers.len());
        for (source, reader) in readers.iter_mut().enumerate() {
            let mut record = Vec::new();
            if reader.read_into(&mut record)? {
                heap.push(Head {
                    record,
                    source,
                    order: &self.order,
                });
            }
        }

        let out = self.temp_file()?;
        let mut writer = BufWriter::new(out.as_file());
        while let Some(Head { mut record, source, .. }) = heap.pop() {
            write_record(&mut writer, &record)?;
            if readers[source].read_into(&mut record)? {
                heap.push(Head {
                    record,
                    source,
                    order: &self.order,
                });
            }
        }
        writer.flush()?;
        drop(writer);
        Ok(out)
    }
}

/// Current record of one run during a merge.
struct Head<'o, O> {
    /// The record bytes.
    record: Vec<u8>,
    /// Index of the run it came from; breaks ties so merging is stable.
    source: usize,
    /// Shared comparator.
    order: &'o O,
}

impl<O: RecordOrder> Ord for Head<'_, O> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the largest, so the smallest record must compare greatest.
        self.order
            .compare(&other.record, &self.record)
            .then_with(|| other.source.cmp(&self.source))
    }
}

impl<O: RecordOrder> PartialOrd for Head<'_, O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<O: RecordOrder> PartialEq for Head<'_, O> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<O: RecordOrder> Eq for Head<'_, O> {}

#[cfg(test)]
mod test {
    use std::{
        fs,
        io::{Seek, SeekFrom},
    };

    use proptest::prelude::*;
    use tempfile::TempDir;

    use super::*;

    fn settings(dir: &TempDir, buffer_bytes: usize, merge_factor: usize) -> BuildSettings {
        BuildSettings {
            temp_dir: Some(dir.path().to_path_buf()),
            sort_buffer_bytes: buffer_bytes,
            merge_factor,
        }
    }

    fn sequence(records: &[Vec<u8>]) -> Vec<u8> {
        let mut buf = Vec::new();
        for record in records {
            write_record(&mut buf, record).unwrap();
        }
        buf
    }

    fn read_all(file: &NamedTempFile) -> Vec<Vec<u8>> {
        let mut reader = RecordReader::new(BufReader::new(file.reopen().unwrap()));
        let mut out = Vec::new();
        let mut record = Vec::new();
        while reader.read_into(&mut record).unwrap() {
            out.push(record.clone());
        }
        out
    }

    fn bytewise(a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    #[test]
    fn sorts_in_memory() {
        let dir = TempDir::new().unwrap();
        let sorter = ExternalSorter::new(bytewise, &settings(&dir, 1 << 20, 10));
        let input = sequence(&[b"c".to_vec(), b"a".to_vec(), b"b".to_vec()]);

        let (sorted, stats) = sorter.sort(input.as_slice()).unwrap();
        assert_eq!(read_all(&sorted), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(stats.records, 3);
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.merge_rounds, 0);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let dir = TempDir::new().unwrap();
        let sorter = ExternalSorter::new(bytewise, &settings(&dir, 1 << 20, 10));
        let (sorted, stats) = sorter.sort(io::empty()).unwrap();
        assert!(read_all(&sorted).is_empty());
        assert_eq!(stats.records, 0);
    }

    #[test]
    fn spills_and_merges_in_rounds() {
        let dir = TempDir::new().unwrap();
        let sorter = ExternalSorter::new(bytewise, &settings(&dir, 1, 2));
        let records: Vec<Vec<u8>> = (0..9u8).rev().map(|b| vec![b]).collect();

        let (sorted, stats) = sorter.sort(sequence(&records).as_slice()).unwrap();
        let expected: Vec<Vec<u8>> = (0..9u8).map(|b| vec![b]).collect();
        assert_eq!(read_all(&sorted), expected);
        assert_eq!(stats.runs, 9);
        assert_eq!(stats.merge_rounds, 4);
    }

    #[test]
    fn merge_is_stable_for_equal_keys() {
        let dir = TempDir::new().unwrap();
        let by_first = |a: &[u8], b: &[u8]| a[0].cmp(&b[0]);
        let sorter = ExternalSorter::new(by_first, &settings(&dir, 1, 3));
        let records = vec![vec![1, 0], vec![0, 0], vec![1, 1], vec![0, 1], vec![1, 2]];

        let (sorted, _) = sorter.sort(sequence(&records).as_slice()).unwrap();
        assert_eq!(
            read_all(&sorted),
            vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1], vec![1, 2]]
        );
    }

    #[test]
    fn temporary_runs_are_removed() {
        let dir = TempDir::new().unwrap();
        let sorter = ExternalSorter::new(bytewise, &settings(&dir, 1, 2));
        let records: Vec<Vec<u8>> = (0..5u8).map(|b| vec![b]).collect();

        let (sorted, _) = sorter.sort(sequence(&records).as_slice()).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        drop(sorted);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn truncated_input_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let sorter = ExternalSorter::new(bytewise, &settings(&dir, 1 << 20, 10));
        let mut input = sequence(&[b"abc".to_vec()]);
        input.pop();

        assert!(matches!(
            sorter.sort(input.as_slice()),
            Err(SuggestError::Corrupt(_))
        ));
    }

    #[test]
    fn sorts_from_file() {
        let dir = TempDir::new().unwrap();
        let sorter = ExternalSorter::new(bytewise, &settings(&dir, 8, 2));
        let mut spill = tempfile::tempfile_in(dir.path()).unwrap();
        spill
            .write_all(&sequence(&[b"zz".to_vec(), b"aa".to_vec(), b"mm".to_vec()]))
            .unwrap();
        spill.seek(SeekFrom::Start(0)).unwrap();

        let (sorted, _) = sorter.sort(spill).unwrap();
        assert_eq!(
            read_all(&sorted),
            vec![b"aa".to_vec(), b"mm".to_vec(), b"zz".to_vec()]
        );
    }

    proptest! {
        #[test]
        fn output_is_sorted_permutation(
            records in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..8), 0..64),
            buffer_bytes in 1usize..256,
            merge_factor in 2usize..5,
        ) {
            let dir = TempDir::new().unwrap();
            let sorter = ExternalSorter::new(bytewise, &settings(&dir, buffer_bytes, merge_factor));
            let (sorted, stats) = sorter.sort(sequence(&records).as_slice()).unwrap();

            let mut expected = records.clone();
            expected.sort();
            prop_assert_eq!(read_all(&sorted), expected);
            prop_assert_eq!(stats.records, records.len() as u64);
        }
    }
}
