//! Single-attribute scan predicates.
//!
//! A [`ScanFilter`] compares a fixed byte range of every record against a
//! literal. Integers and floats are 4-byte little-endian values; strings
//! compare like C `strncmp`, stopping at the first NUL byte.

use std::cmp::Ordering;

use super::error::HeapError;

/// Type of the attribute a scan filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    /// 4-byte little-endian `i32`.
    Integer,
    /// 4-byte little-endian `f32`.
    Float,
    /// Byte string compared with `strncmp` semantics.
    String,
}

/// Comparison applied as `attribute <op> literal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Lte,
    Eq,
    Gte,
    Gt,
    Ne,
}

impl Operator {
    /// Applies the operator to the outcome of comparing attribute and literal.
    ///
    /// `None` means the values are unordered (a NaN float), which only
    /// satisfies `Ne`.
    pub fn accepts(self, ordering: Option<Ordering>) -> bool {
        let Some(ordering) = ordering else {
            return self == Operator::Ne;
        };
        match self {
            Operator::Lt => ordering == Ordering::Less,
            Operator::Lte => ordering != Ordering::Greater,
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Gte => ordering != Ordering::Less,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ne => ordering != Ordering::Equal,
        }
    }
}

/// Decoded filter literal.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Integer(i32),
    Float(f32),
    String(Vec<u8>),
}

impl FilterValue {
    /// Compares an attribute of the same type and width against this literal.
    fn compare(&self, attr: &[u8]) -> Option<Ordering> {
        match self {
            FilterValue::Integer(literal) => Some(i32::from_le_bytes(word(attr)).cmp(literal)),
            FilterValue::Float(literal) => f32::from_le_bytes(word(attr)).partial_cmp(literal),
            FilterValue::String(literal) => Some(strncmp(attr, literal)),
        }
    }
}

fn word(bytes: &[u8]) -> [u8; 4] {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    buf
}

/// `strncmp` over two equally long byte strings: unsigned bytes, and the
/// comparison ends at the first NUL present in both.
fn strncmp(a: &[u8], b: &[u8]) -> Ordering {
    for (&x, &y) in a.iter().zip(b) {
        match x.cmp(&y) {
            Ordering::Equal if x == 0 => return Ordering::Equal,
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// Predicate on the bytes `offset..offset + length` of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanFilter {
    offset: usize,
    length: usize,
    value: FilterValue,
    op: Operator,
}

impl ScanFilter {
    /// Builds a filter, checking that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::BadScanParam` if `length` is 0, if an integer or
    /// float attribute is not 4 bytes wide, or if `literal` is shorter than
    /// `length`.
    pub fn new(
        offset: usize,
        length: usize,
        datatype: Datatype,
        literal: &[u8],
        op: Operator,
    ) -> Result<Self, HeapError> {
        if length < 1 {
            return Err(HeapError::BadScanParam("length must be at least 1".into()));
        }
        if matches!(datatype, Datatype::Integer | Datatype::Float) && length != 4 {
            return Err(HeapError::BadScanParam(format!(
                "{:?} attributes are 4 bytes, got length {}",
                datatype, length
            )));
        }
        if literal.len() < length {
            return Err(HeapError::BadScanParam(format!(
                "filter literal has {} bytes, length is {}",
                literal.len(),
                length
            )));
        }

        let literal = &literal[..length];
        let value = match datatype {
            Datatype::Integer => FilterValue::Integer(i32::from_le_bytes(word(literal))),
            Datatype::Float => FilterValue::Float(f32::from_le_bytes(word(literal))),
            Datatype::String => FilterValue::String(literal.to_vec()),
        };
        Ok(Self {
            offset,
            length,
            value,
            op,
        })
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }

    pub fn op(&self) -> Operator {
        self.op
    }

    /// Returns true if the record satisfies the predicate.
    ///
    /// Records too short to contain the attribute never match.
    pub fn matches(&self, record: &[u8]) -> bool {
        let Some(end) = self.offset.checked_add(self.length) else {
            return false;
        };
        let Some(attr) = record.get(self.offset..end) else {
            return false;
        };
        self.op.accepts(self.value.compare(attr))
    }
}
