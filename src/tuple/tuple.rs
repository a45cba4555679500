use std::sync::Arc;

use crate::common::{RecordId, Result, SableError};

use super::{Schema, Value};

/// Represents a single row/tuple in a table.
///
/// ## Tuple Binary Format
///
/// Columns are encoded back to back in schema order, each taking exactly
/// `DataType::size()` bytes, so a serialized tuple is always
/// `schema.tuple_size()` bytes long:
///
/// ```text
/// +-----------+-----------+-----+-----------+
/// | column 0  | column 1  | ... | column n  |
/// +-----------+-----------+-----+-----------+
/// ```
///
/// A tuple read from or inserted into a heap file remembers where it lives
/// through its `RecordId`; deletion uses it to find the page directly.
#[derive(Debug, Clone)]
pub struct Tuple {
    schema: Arc<Schema>,
    values: Vec<Value>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a new tuple, checking arity and column types against the schema.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.column_count() {
            return Err(SableError::SchemaMismatch);
        }
        for (i, (value, col)) in values.iter().zip(schema.columns()).enumerate() {
            if !value.fits(col.data_type()) {
                return Err(SableError::TypeMismatch { column: i });
            }
        }
        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Decodes a tuple from exactly `schema.tuple_size()` bytes.
    pub fn from_bytes(schema: Arc<Schema>, data: &[u8]) -> Result<Self> {
        if data.len() != schema.tuple_size() {
            return Err(SableError::TupleSizeMismatch {
                expected: schema.tuple_size(),
                actual: data.len(),
            });
        }

        let mut values = Vec::with_capacity(schema.column_count());
        let mut offset = 0;
        for (i, col) in schema.columns().enumerate() {
            let value = Value::deserialize(&data[offset..], col.data_type())
                .ok_or(SableError::TypeMismatch { column: i })?;
            offset += col.data_type().size();
            values.push(value);
        }

        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Serializes the tuple into its fixed-width on-page form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.schema.tuple_size());
        for (i, (value, col)) in self.values.iter().zip(self.schema.columns()).enumerate() {
            if !value.serialize_into(col.data_type(), &mut bytes) {
                return Err(SableError::TypeMismatch { column: i });
            }
        }
        Ok(bytes)
    }

    /// Returns the schema of this tuple.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the value at the given column index.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the value of the named column.
    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.schema
            .column_index(name)
            .and_then(|i| self.values.get(i))
    }

    /// Returns all values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Replaces the value at `index`. The new value must fit the column type.
    pub fn set_value(&mut self, index: usize, value: Value) -> Result<()> {
        let col = self.schema.column(index).ok_or(SableError::SchemaMismatch)?;
        if !value.fits(col.data_type()) {
            return Err(SableError::TypeMismatch { column: index });
        }
        self.values[index] = value;
        Ok(())
    }

    /// Where this tuple is stored, if it has been read from or written to a page.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    pub fn with_record_id(mut self, record_id: RecordId) -> Self {
        self.record_id = Some(record_id);
        self
    }

    /// Returns the number of values in the tuple.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Equality is over schema and values; the storage location is not compared.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.values == other.values
    }
}
