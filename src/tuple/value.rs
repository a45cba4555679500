use std::cmp::Ordering;
use std::fmt;

use super::data_type::CHAR_LEN_PREFIX;
use super::DataType;

/// A typed value stored in one column of a tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    BigInt(i64),
    Double(f64),
    /// Used for `Char(n)` columns
    String(String),
}

impl Value {
    /// Returns true if this value can be stored in a column of `data_type`.
    pub fn fits(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Boolean(_), DataType::Boolean)
            | (Value::Integer(_), DataType::Integer)
            | (Value::BigInt(_), DataType::BigInt)
            | (Value::Double(_), DataType::Double) => true,
            (Value::String(s), DataType::Char(n)) => s.len() <= *n as usize,
            _ => false,
        }
    }

    /// Appends exactly `data_type.size()` bytes encoding this value.
    /// Returns false, writing nothing, if the value does not fit the type.
    pub fn serialize_into(&self, data_type: &DataType, out: &mut Vec<u8>) -> bool {
        if !self.fits(data_type) {
            return false;
        }
        match self {
            Value::Boolean(b) => out.push(u8::from(*b)),
            Value::Integer(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::BigInt(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::String(s) => {
                let start = out.len();
                out.extend_from_slice(&(s.len() as u16).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
                out.resize(start + data_type.size(), 0);
            }
        }
        true
    }

    /// Decodes a value of `data_type` from the front of `data`.
    pub fn deserialize(data: &[u8], data_type: &DataType) -> Option<Self> {
        let bytes = data.get(..data_type.size())?;
        let value = match data_type {
            DataType::Boolean => Value::Boolean(bytes[0] != 0),
            DataType::Integer => Value::Integer(i32::from_le_bytes(bytes.try_into().ok()?)),
            DataType::BigInt => Value::BigInt(i64::from_le_bytes(bytes.try_into().ok()?)),
            DataType::Double => Value::Double(f64::from_le_bytes(bytes.try_into().ok()?)),
            DataType::Char(n) => {
                let len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
                if len > *n as usize {
                    return None;
                }
                let text = &bytes[CHAR_LEN_PREFIX..CHAR_LEN_PREFIX + len];
                Value::String(String::from_utf8_lossy(text).into_owned())
            }
        };
        Some(value)
    }

    /// Compares two values of the same type. Numeric types compare across widths.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::BigInt(a), Value::BigInt(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::BigInt(b)) => Some((*a as i64).cmp(b)),
            (Value::BigInt(a), Value::Integer(b)) => Some(a.cmp(&(*b as i64))),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
