use crate::error::{DbError, Result};
use crate::STRING_LEN;

/// The closed set of column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    Text,
}

impl FieldType {
    /// Number of bytes a value of this type occupies in a serialized slot.
    pub fn byte_len(&self) -> usize {
        match self {
            FieldType::Int => 4,
            // length prefix + padded payload
            FieldType::Text => 4 + STRING_LEN,
        }
    }

    /// Parses a value of this type from the front of `buf`.
    pub fn parse(&self, buf: &[u8]) -> Result<Field> {
        if buf.len() < self.byte_len() {
            return Err(DbError::Generic(format!(
                "truncated field: need {} bytes, have {}",
                self.byte_len(),
                buf.len()
            )));
        }
        match self {
            FieldType::Int => {
                let v = i32::from_be_bytes(buf[0..4].try_into().unwrap());
                Ok(Field::Int(v))
            }
            FieldType::Text => {
                let len = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize;
                let len = len.min(STRING_LEN);
                let s = String::from_utf8_lossy(&buf[4..4 + len]).into_owned();
                Ok(Field::Text(s))
            }
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Int => write!(f, "int"),
            FieldType::Text => write!(f, "string"),
        }
    }
}

/// The comparison operators a predicate may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
}

/// A typed column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Int(i32),
    Text(String),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::Text(_) => FieldType::Text,
        }
    }

    /// Evaluates `self op other`.
    ///
    /// LIKE is substring containment on strings and plain equality on ints.
    /// Comparing values of different types is defined as inequality: `Eq` is
    /// false, `NotEq` is true, and every ordering operator is false.
    pub fn compare(&self, op: CmpOp, other: &Field) -> bool {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => match op {
                CmpOp::Eq | CmpOp::Like => a == b,
                CmpOp::NotEq => a != b,
                CmpOp::Lt => a < b,
                CmpOp::LtEq => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::GtEq => a >= b,
            },
            (Field::Text(a), Field::Text(b)) => match op {
                CmpOp::Eq => a == b,
                CmpOp::NotEq => a != b,
                CmpOp::Lt => a < b,
                CmpOp::LtEq => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::GtEq => a >= b,
                CmpOp::Like => a.contains(b.as_str()),
            },
            _ => op == CmpOp::NotEq,
        }
    }

    /// Appends the fixed-width big-endian encoding of this value to `out`.
    ///
    /// Strings longer than [`STRING_LEN`] are truncated; shorter ones are
    /// zero-padded to the full width.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Field::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            Field::Text(s) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(STRING_LEN);
                out.extend_from_slice(&(len as u32).to_be_bytes());
                out.extend_from_slice(&bytes[..len]);
                out.extend(std::iter::repeat(0u8).take(STRING_LEN - len));
            }
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Text(s) => write!(f, "{}", s),
        }
    }
}
