//! The built suggestion index and its persisted form.
//!
//! An FST maps every admitted key (`analyzed + 0x00 + dedup`) to a packed
//! output: the entry cost in the high 32 bits and the admission ordinal in
//! the low 32 bits. The ordinal addresses a value table holding the surface
//! form, followed by `0x1F` and the payload when the build carried payloads.
//!
//! Admission happens in sorted key order, so comparing packed outputs orders
//! first by cost and then by key, and the FST's min-prefix output sharing
//! keeps every partial path's output a lower bound of its completions.
//!
//! The FST output is therefore not a `(cost, surface)` pair; surfaces and
//! payloads live only in the value table. The persisted form follows the
//! entry count with:
//! - the FST bytes, length-prefixed
//! - the value table: a count, then each value length-prefixed
//! - the maximum analyzed paths for one entry
//! - one payload flag byte
//!
//! Lengths and counts are LEB128 varints.

use std::io::{Read, Write};

use fst::raw::Fst;
use sift_config::UNIT_SEPARATOR;

use crate::{
    SuggestError,
    varint::{read_varint, read_varint_opt, write_varint},
};

/// Packs a cost and an admission ordinal into one FST output.
pub fn pack_output(cost: u32, ordinal: u32) -> u64 {
    (u64::from(cost) << 32) | u64::from(ordinal)
}

/// Splits an FST output into cost and ordinal.
pub fn unpack_output(output: u64) -> (u32, u32) {
    ((output >> 32) as u32, output as u32)
}

/// Splits a stored value into surface and payload.
///
/// In payload mode the value must contain the separator byte.
pub fn split_value(value: &[u8], has_payloads: bool) -> Result<(&[u8], Option<&[u8]>), SuggestError> {
    if !has_payloads {
        return Ok((value, None));
    }
    let sep = value
        .iter()
        .position(|&b| b == UNIT_SEPARATOR)
        .ok_or_else(|| SuggestError::corrupt("stored value is missing the payload separator"))?;
    Ok((&value[..sep], Some(&value[sep + 1..])))
}

/// Append-only table of byte strings addressed by ordinal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueStore {
    /// All values back to back.
    bytes: Vec<u8>,
    /// End offset of each value in `bytes`.
    ends: Vec<usize>,
}

impl ValueStore {
    /// Appends one value made of `parts` concatenated.
    pub fn push(&mut self, parts: &[&[u8]]) {
        for part in parts {
            self.bytes.extend_from_slice(part);
        }
        self.ends.push(self.bytes.len());
    }

    /// Returns the value at `ordinal`.
    pub fn get(&self, ordinal: usize) -> Option<&[u8]> {
        let end = *self.ends.get(ordinal)?;
        let start = match ordinal {
            0 => 0,
            _ => self.ends[ordinal - 1],
        };
        self.bytes.get(start..end)
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Approximate heap size.
    pub fn size_in_bytes(&self) -> usize {
        self.bytes.len() + self.ends.len() * size_of::<usize>()
    }

    /// Iterates over all values in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }
}

/// An immutable, built suggestion index.
pub struct SuggestIndex {
    /// Analyzed keys to packed outputs.
    fst: Fst<Vec<u8>>,
    /// Surface forms and payloads by admission ordinal.
    values: ValueStore,
    /// Most analyzed paths produced by a single entry.
    max_analyzed_paths: usize,
    /// Whether values carry payloads.
    has_payloads: bool,
}

impl SuggestIndex {
    /// Assembles an index from its parts.
    pub fn new(
        fst: Fst<Vec<u8>>,
        values: ValueStore,
        max_analyzed_paths: usize,
        has_payloads: bool,
    ) -> Self {
        Self {
            fst,
            values,
            max_analyzed_paths,
            has_payloads,
        }
    }

    /// The underlying transducer.
    pub fn fst(&self) -> &Fst<Vec<u8>> {
        &self.fst
    }

    /// Most analyzed paths produced by a single entry at build time.
    pub fn max_analyzed_paths(&self) -> usize {
        self.max_analyzed_paths
    }

    /// Whether stored values carry payloads.
    pub fn has_payloads(&self) -> bool {
        self.has_payloads
    }

    /// Number of admitted surface forms.
    pub fn num_forms(&self) -> usize {
        self.values.len()
    }

    /// Bytes held by the transducer and the value table.
    pub fn size_in_bytes(&self) -> u64 {
        (self.fst.as_bytes().len() + self.values.size_in_bytes()) as u64
    }

    /// Resolves a complete FST output into its cost and stored value.
    pub fn resolve(&self, output: u64) -> Result<(u32, &[u8]), SuggestError> {
        let (cost, ordinal) = unpack_output(output);
        let value = self
            .values
            .get(ordinal as usize)
            .ok_or_else(|| SuggestError::corrupt(format!("no stored value for ordinal {ordinal}")))?;
        Ok((cost, value))
    }

    /// Writes everything after the entry count.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), SuggestError> {
        let fst_bytes = self.fst.as_bytes();
        write_varint(writer, fst_bytes.len() as u64)?;
        writer.write_all(fst_bytes)?;

        write_varint(writer, self.values.len() as u64)?;
        for value in self.values.iter() {
            write_varint(writer, value.len() as u64)?;
            writer.write_all(value)?;
        }

        write_varint(writer, self.max_analyzed_paths as u64)?;
        writer.write_all(&[u8::from(self.has_payloads)])?;
        Ok(())
    }

    /// Reads what [`SuggestIndex::write_to`] wrote.
    ///
    /// Returns `None` when the stream ends cleanly before any index data.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Self>, SuggestError> {
        let Some(fst_len) = read_varint_opt(reader)? else {
            return Ok(None);
        };
        let fst = Fst::new(read_exact_vec(reader, fst_len)?)?;

        let value_count = read_varint(reader)?;
        let mut values = ValueStore::default();
        for _ in 0..value_count {
            let len = read_varint(reader)?;
            let value = read_exact_vec(reader, len)?;
            values.push(&[value.as_slice()]);
        }

        let max_analyzed_paths = usize::try_from(read_varint(reader)?)
            .map_err(|_| SuggestError::corrupt("max analyzed paths out of range"))?;

        let mut flag = [0u8; 1];
        reader.read_exact(&mut flag)?;
        let has_payloads = match flag[0] {
            0 => false,
            1 => true,
            other => {
                return Err(SuggestError::corrupt(format!("invalid payload flag {other}")));
            }
        };

        Ok(Some(Self::new(fst, values, max_analyzed_paths, has_payloads)))
    }
}

/// Reads exactly `len` bytes without trusting `len` for the allocation.
fn read_exact_vec<R: Read + ?Sized>(reader: &mut R, len: u64) -> Result<Vec<u8>, SuggestError> {
    let mut buf = Vec::new();
    (&mut *reader).take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
        return Err(SuggestError::corrupt(format!(
            "expected {len} bytes, stream ended after {}",
            buf.len()
        )));
    }
    Ok(buf)
}
