//! Sort records: the fixed layout spilled to disk during a build.
//!
//! All integers are big-endian:
//!
//! ```text
//! u16 analyzed_len | analyzed | u32 cost | [u16 surface_len] | surface | [payload]
//! ```
//!
//! The bracketed fields are present only when the build carries payloads.
//! Without payloads the surface runs to the end of the record.

use std::cmp::Ordering;

use crate::{SuggestError, sort::RecordOrder};

/// Longest analyzed or surface form a record can hold.
pub const MAX_FORM_LEN: usize = i16::MAX as usize - 2;

/// Largest accepted entry weight.
pub const MAX_WEIGHT: u64 = i32::MAX as u64;

/// Converts a weight into a cost, so ascending cost is descending weight.
pub fn encode_weight(weight: u64) -> Result<u32, SuggestError> {
    if weight > MAX_WEIGHT {
        return Err(SuggestError::WeightOutOfRange {
            weight,
            max: MAX_WEIGHT,
        });
    }
    Ok((MAX_WEIGHT - weight) as u32)
}

/// Converts a cost back into the original weight.
pub fn decode_weight(cost: u32) -> u64 {
    MAX_WEIGHT.saturating_sub(u64::from(cost))
}

/// One analyzed path of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortRecord<'a> {
    /// Analyzed form, without the end marker.
    pub analyzed: &'a [u8],
    /// `i32::MAX - weight`.
    pub cost: u32,
    /// Surface form bytes.
    pub surface: &'a [u8],
    /// Payload bytes; always `Some` in payload mode.
    pub payload: Option<&'a [u8]>,
}

impl<'a> SortRecord<'a> {
    /// Appends the encoded record to `buf`.
    ///
    /// Fails if a length does not fit its field.
    pub fn encode(&self, has_payloads: bool, buf: &mut Vec<u8>) -> Result<(), SuggestError> {
        if self.analyzed.len() > MAX_FORM_LEN {
            return Err(SuggestError::AnalyzedFormTooLong {
                len: self.analyzed.len(),
                max: MAX_FORM_LEN,
            });
        }
        buf.extend_from_slice(&(self.analyzed.len() as u16).to_be_bytes());
        buf.extend_from_slice(self.analyzed);
        buf.extend_from_slice(&self.cost.to_be_bytes());

        if has_payloads {
            if self.surface.len() > MAX_FORM_LEN {
                return Err(SuggestError::SurfaceFormTooLong {
                    len: self.surface.len(),
                    max: MAX_FORM_LEN,
                });
            }
            buf.extend_from_slice(&(self.surface.len() as u16).to_be_bytes());
            buf.extend_from_slice(self.surface);
            buf.extend_from_slice(self.payload.unwrap_or_default());
        } else {
            buf.extend_from_slice(self.surface);
        }
        Ok(())
    }

    /// Decodes a record produced by [`SortRecord::encode`].
    pub fn decode(bytes: &'a [u8], has_payloads: bool) -> Result<Self, SuggestError> {
        let (analyzed_len, rest) = split_u16(bytes)?;
        let (analyzed, rest) = split_at(rest, analyzed_len)?;
        let (cost_bytes, rest) = split_at(rest, 4)?;
        let cost = u32::from_be_bytes([cost_bytes[0], cost_bytes[1], cost_bytes[2], cost_bytes[3]]);

        if has_payloads {
            let (surface_len, rest) = split_u16(rest)?;
            let (surface, payload) = split_at(rest, surface_len)?;
            Ok(Self {
                analyzed,
                cost,
                surface,
                payload: Some(payload),
            })
        } else {
            Ok(Self {
                analyzed,
                cost,
                surface: rest,
                payload: None,
            })
        }
    }
}

/// Splits `len` bytes off the front of `bytes`.
fn split_at(bytes: &[u8], len: usize) -> Result<(&[u8], &[u8]), SuggestError> {
    if bytes.len() < len {
        return Err(SuggestError::corrupt("truncated sort record"));
    }
    Ok(bytes.split_at(len))
}

/// Reads a big-endian u16 length prefix.
fn split_u16(bytes: &[u8]) -> Result<(usize, &[u8]), SuggestError> {
    let (len, rest) = split_at(bytes, 2)?;
    Ok((usize::from(u16::from_be_bytes([len[0], len[1]])), rest))
}

/// Orders encoded records by analyzed form, then cost, then surface.
///
/// Payload bytes never take part in the comparison.
#[derive(Debug, Clone, Copy)]
pub struct SuggestRecordOrder {
    /// Whether records carry the surface length field.
    pub has_payloads: bool,
}

impl RecordOrder for SuggestRecordOrder {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match (
            SortRecord::decode(a, self.has_payloads),
            SortRecord::decode(b, self.has_payloads),
        ) {
            (Ok(a), Ok(b)) => a
                .analyzed
                .cmp(b.analyzed)
                .then(a.cost.cmp(&b.cost))
                .then_with(|| a.surface.cmp(b.surface)),
            _ => a.cmp(b),
        }
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn encoded(record: &SortRecord<'_>, has_payloads: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        record.encode(has_payloads, &mut buf).unwrap();
        buf
    }

    fn record<'a>(analyzed: &'a [u8], weight: u64, surface: &'a [u8]) -> SortRecord<'a> {
        SortRecord {
            analyzed,
            cost: encode_weight(weight).unwrap(),
            surface,
            payload: None,
        }
    }

    #[test]
    fn weight_cost_conversion() {
        assert_eq!(encode_weight(0).unwrap(), i32::MAX as u32);
        assert_eq!(encode_weight(MAX_WEIGHT).unwrap(), 0);
        assert_eq!(decode_weight(encode_weight(10).unwrap()), 10);
        assert!(matches!(
            encode_weight(MAX_WEIGHT + 1),
            Err(SuggestError::WeightOutOfRange { .. })
        ));
    }

    #[test]
    fn layout_without_payloads() {
        let bytes = encoded(&record(b"ab", MAX_WEIGHT - 1, b"AB"), false);
        assert_eq!(bytes, vec![0, 2, b'a', b'b', 0, 0, 0, 1, b'A', b'B']);
    }

    #[test]
    fn layout_with_payloads() {
        let rec = SortRecord {
            payload: Some(&b"p"[..]),
            ..record(b"a", MAX_WEIGHT, b"A")
        };
        let bytes = encoded(&rec, true);
        assert_eq!(bytes, vec![0, 1, b'a', 0, 0, 0, 0, 0, 1, b'A', b'p']);
        assert_eq!(SortRecord::decode(&bytes, true).unwrap(), rec);
    }

    #[test]
    fn missing_payload_encodes_empty() {
        let bytes = encoded(&record(b"a", 1, b"A"), true);
        let decoded = SortRecord::decode(&bytes, true).unwrap();
        assert_eq!(decoded.payload, Some(&b""[..]));
    }

    #[test]
    fn rejects_long_analyzed_form() {
        let long = vec![b'a'; MAX_FORM_LEN + 1];
        let mut buf = Vec::new();
        let err = record(&long, 1, b"x").encode(false, &mut buf).unwrap_err();
        assert!(matches!(err, SuggestError::AnalyzedFormTooLong { .. }));
    }

    #[test]
    fn rejects_long_surface_only_with_payloads() {
        let long = vec![b's'; MAX_FORM_LEN + 1];
        let mut buf = Vec::new();
        assert!(record(b"a", 1, &long).encode(false, &mut buf).is_ok());
        buf.clear();
        let err = record(b"a", 1, &long).encode(true, &mut buf).unwrap_err();
        assert!(matches!(err, SuggestError::SurfaceFormTooLong { .. }));
    }

    #[test]
    fn truncated_record_is_corrupt() {
        assert!(matches!(
            SortRecord::decode(&[0, 5, b'a'], false),
            Err(SuggestError::Corrupt(_))
        ));
    }

    #[test]
    fn order_prefers_analyzed_then_cost_then_surface() {
        let order = SuggestRecordOrder { has_payloads: false };
        let a = encoded(&record(b"a", 1, b"z"), false);
        let b = encoded(&record(b"b", 100, b"a"), false);
        assert_eq!(order.compare(&a, &b), Ordering::Less);

        let heavy = encoded(&record(b"a", 100, b"z"), false);
        let light = encoded(&record(b"a", 1, b"a"), false);
        assert_eq!(order.compare(&heavy, &light), Ordering::Less);

        let first = encoded(&record(b"a", 5, b"x"), false);
        let second = encoded(&record(b"a", 5, b"y"), false);
        assert_eq!(order.compare(&first, &second), Ordering::Less);
    }

    #[test]
    fn order_ignores_payload() {
        let order = SuggestRecordOrder { has_payloads: true };
        let a = encoded(
            &SortRecord {
                payload: Some(&b"zzz"[..]),
                ..record(b"a", 5, b"s")
            },
            true,
        );
        let b = encoded(
            &SortRecord {
                payload: Some(&b"aaa"[..]),
                ..record(b"a", 5, b"s")
            },
            true,
        );
        assert_eq!(order.compare(&a, &b), Ordering::Equal);
    }

    proptest! {
        #[test]
        fn order_matches_field_order(
            a in (prop::collection::vec(1u8..=255, 0..6), 0u64..1000, prop::collection::vec(any::<u8>(), 0..6)),
            b in (prop::collection::vec(1u8..=255, 0..6), 0u64..1000, prop::collection::vec(any::<u8>(), 0..6)),
        ) {
            let order = SuggestRecordOrder { has_payloads: false };
            let ea = encoded(&record(&a.0, a.1, &a.2), false);
            let eb = encoded(&record(&b.0, b.1, &b.2), false);
            let expected = a.0.cmp(&b.0)
                .then(b.1.cmp(&a.1))
                .then(a.2.cmp(&b.2));
            prop_assert_eq!(order.compare(&ea, &eb), expected);
        }
    }
}
