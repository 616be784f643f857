//! Typed scan filters.
//!
//! A [`Predicate`] compares a fixed byte range of each record against a
//! constant under one of the six relational operators. The comparison is
//! typed: the range can be interpreted as a 32-bit integer, a 32-bit
//! float, or raw bytes compared lexicographically.

use std::cmp::Ordering;

use super::error::HeapFileError;

/// Interpretation of the filtered byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    /// Native-endian `i32`; the range must be exactly 4 bytes.
    Integer,
    /// Native-endian `f32`; the range must be exactly 4 bytes.
    Float,
    /// Raw bytes, compared lexicographically over the range's length.
    Bytes,
}

/// Relational comparison operator.
///
/// Applied to the three-valued ordering of attribute versus filter value,
/// attribute on the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// attribute < value
    Lt,
    /// attribute <= value
    Le,
    /// attribute == value
    Eq,
    /// attribute >= value
    Ge,
    /// attribute > value
    Gt,
    /// attribute != value
    Ne,
}

impl CompareOp {
    /// Whether an attribute-versus-value ordering satisfies the operator.
    fn admits(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ge => ord != Ordering::Less,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ne => ord != Ordering::Equal,
        }
    }
}

/// A validated scan filter.
#[derive(Debug, Clone)]
pub struct Predicate {
    offset: usize,
    length: usize,
    attr_type: AttrType,
    op: CompareOp,
    value: Vec<u8>,
}

impl Predicate {
    /// Builds a filter comparing `length` bytes at `offset` of each record
    /// against `value`.
    ///
    /// # Errors
    ///
    /// Returns `HeapFileError::InvalidScanParam` when:
    /// - `length` is zero,
    /// - the type is `Integer` or `Float` and `length` is not 4,
    /// - `value.len()` differs from `length`.
    pub fn new(
        offset: usize,
        length: usize,
        attr_type: AttrType,
        op: CompareOp,
        value: &[u8],
    ) -> Result<Self, HeapFileError> {
        if length < 1 {
            return Err(HeapFileError::InvalidScanParam("length must be at least 1"));
        }
        match attr_type {
            AttrType::Integer if length != std::mem::size_of::<i32>() => {
                return Err(HeapFileError::InvalidScanParam(
                    "integer filters require a 4-byte attribute",
                ));
            }
            AttrType::Float if length != std::mem::size_of::<f32>() => {
                return Err(HeapFileError::InvalidScanParam(
                    "float filters require a 4-byte attribute",
                ));
            }
            _ => {}
        }
        if value.len() != length {
            return Err(HeapFileError::InvalidScanParam(
                "filter value length must match the attribute length",
            ));
        }

        Ok(Self {
            offset,
            length,
            attr_type,
            op,
            value: value.to_vec(),
        })
    }

    /// Whether `record` satisfies the filter.
    ///
    /// Records too short to contain the attribute never match; the last
    /// byte of the range may coincide with the last byte of the record.
    /// Float comparisons involving NaN never match.
    pub fn matches(&self, record: &[u8]) -> bool {
        let end = match self.offset.checked_add(self.length) {
            Some(end) if end <= record.len() => end,
            _ => return false,
        };
        let attr = &record[self.offset..end];

        let ord = match self.attr_type {
            AttrType::Integer => {
                let attr = i32::from_ne_bytes(attr.try_into().expect("length validated as 4"));
                let value =
                    i32::from_ne_bytes(self.value.as_slice().try_into().expect("length validated as 4"));
                attr.cmp(&value)
            }
            AttrType::Float => {
                let attr = f32::from_ne_bytes(attr.try_into().expect("length validated as 4"));
                let value =
                    f32::from_ne_bytes(self.value.as_slice().try_into().expect("length validated as 4"));
                match attr.partial_cmp(&value) {
                    Some(ord) => ord,
                    None => return false,
                }
            }
            AttrType::Bytes => attr.cmp(self.value.as_slice()),
        };

        self.op.admits(ord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_pred(op: CompareOp, value: i32) -> Predicate {
        Predicate::new(0, 4, AttrType::Integer, op, &value.to_ne_bytes()).unwrap()
    }

    #[test]
    fn test_rejects_zero_length() {
        assert!(matches!(
            Predicate::new(0, 0, AttrType::Bytes, CompareOp::Eq, b""),
            Err(HeapFileError::InvalidScanParam(_))
        ));
    }

    #[test]
    fn test_rejects_mis_sized_numeric_filters() {
        assert!(matches!(
            Predicate::new(0, 2, AttrType::Integer, CompareOp::Eq, &[0, 0]),
            Err(HeapFileError::InvalidScanParam(_))
        ));
        assert!(matches!(
            Predicate::new(0, 8, AttrType::Float, CompareOp::Eq, &[0; 8]),
            Err(HeapFileError::InvalidScanParam(_))
        ));
    }

    #[test]
    fn test_rejects_value_length_mismatch() {
        assert!(matches!(
            Predicate::new(0, 3, AttrType::Bytes, CompareOp::Eq, b"ab"),
            Err(HeapFileError::InvalidScanParam(_))
        ));
    }

    #[test]
    fn test_integer_operators() {
        let record = 5i32.to_ne_bytes();

        assert!(int_pred(CompareOp::Eq, 5).matches(&record));
        assert!(!int_pred(CompareOp::Eq, 6).matches(&record));
        assert!(int_pred(CompareOp::Ne, 6).matches(&record));
        assert!(int_pred(CompareOp::Lt, 6).matches(&record));
        assert!(!int_pred(CompareOp::Lt, 5).matches(&record));
        assert!(int_pred(CompareOp::Le, 5).matches(&record));
        assert!(int_pred(CompareOp::Ge, 5).matches(&record));
        assert!(int_pred(CompareOp::Gt, 4).matches(&record));
        assert!(!int_pred(CompareOp::Gt, 5).matches(&record));
    }

    #[test]
    fn test_integer_negative_values() {
        let record = (-3i32).to_ne_bytes();
        assert!(int_pred(CompareOp::Lt, 0).matches(&record));
        assert!(int_pred(CompareOp::Eq, -3).matches(&record));
    }

    #[test]
    fn test_float_comparison() {
        let record = 2.5f32.to_ne_bytes();
        let pred = Predicate::new(
            0,
            4,
            AttrType::Float,
            CompareOp::Gt,
            &1.0f32.to_ne_bytes(),
        )
        .unwrap();
        assert!(pred.matches(&record));
    }

    #[test]
    fn test_float_nan_never_matches() {
        let record = f32::NAN.to_ne_bytes();
        for op in [
            CompareOp::Lt,
            CompareOp::Le,
            CompareOp::Eq,
            CompareOp::Ge,
            CompareOp::Gt,
            CompareOp::Ne,
        ] {
            let pred =
                Predicate::new(0, 4, AttrType::Float, op, &1.0f32.to_ne_bytes()).unwrap();
            assert!(!pred.matches(&record), "NaN matched {op:?}");
        }
    }

    #[test]
    fn test_bytes_lexicographic() {
        let pred = Predicate::new(0, 1, AttrType::Bytes, CompareOp::Lt, b"c").unwrap();
        assert!(pred.matches(b"apple"));
        assert!(pred.matches(b"banana"));
        assert!(!pred.matches(b"cherry"));
    }

    #[test]
    fn test_bytes_at_offset() {
        let pred = Predicate::new(4, 3, AttrType::Bytes, CompareOp::Eq, b"xyz").unwrap();
        assert!(pred.matches(b"0123xyz"));
        assert!(!pred.matches(b"0123abc"));
    }

    #[test]
    fn test_attribute_must_fit_in_record() {
        let pred = Predicate::new(2, 4, AttrType::Bytes, CompareOp::Eq, b"abcd").unwrap();

        // offset + length == record length: last byte inclusive, matches.
        assert!(pred.matches(b"..abcd"));
        // One byte short: the attribute does not fit.
        assert!(!pred.matches(b".abcd"));
    }

    #[test]
    fn test_offset_overflow_never_matches() {
        let pred = Predicate::new(usize::MAX, 4, AttrType::Bytes, CompareOp::Eq, b"abcd").unwrap();
        assert!(!pred.matches(b"abcd"));
    }
}
