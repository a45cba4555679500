use std::fmt;

/// Column types supported by heap tables.
///
/// Every type has a fixed on-page width so that a schema determines one
/// tuple size, and with it the slot count of every page in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 1 byte (0 = false, 1 = true)
    Boolean,

    /// 32-bit signed integer: 4 bytes, little-endian
    Integer,

    /// 64-bit signed integer: 8 bytes, little-endian
    BigInt,

    /// 64-bit floating point: 8 bytes, IEEE 754
    Double,

    /// String of at most n bytes.
    /// Stored as: length (2 bytes) + data, zero padded to n bytes
    Char(u16),
}

/// Width of the length prefix in front of `Char` data.
pub(crate) const CHAR_LEN_PREFIX: usize = 2;

impl DataType {
    /// Returns the number of bytes a value of this type occupies in a tuple.
    pub fn size(&self) -> usize {
        match self {
            DataType::Boolean => 1,
            DataType::Integer => 4,
            DataType::BigInt => 8,
            DataType::Double => 8,
            DataType::Char(n) => CHAR_LEN_PREFIX + *n as usize,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Char(n) => write!(f, "CHAR({})", n),
        }
    }
}
