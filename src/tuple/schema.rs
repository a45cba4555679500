use std::collections::HashMap;
use std::sync::Arc;

use super::DataType;

/// Represents a single column in a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    name: String,
    /// Column data type
    data_type: DataType,
}

impl Column {
    /// Creates a new column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column data type.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }
}

/// The ordered column list of a table.
///
/// All column types are fixed width, so the schema fixes the byte size of
/// every tuple stored under it.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Ordered list of columns
    columns: Vec<Column>,
    /// Map from column name to column index for fast lookup
    name_to_index: HashMap<String, usize>,
    /// Byte offset of each column inside a serialized tuple
    offsets: Vec<usize>,
    /// Sum of all column sizes
    tuple_size: usize,
}

impl Schema {
    /// Creates a new schema from a list of columns.
    pub fn new(columns: Vec<Column>) -> Self {
        let mut name_to_index = HashMap::new();
        let mut offsets = Vec::with_capacity(columns.len());
        let mut tuple_size = 0;

        for (i, col) in columns.iter().enumerate() {
            // First occurrence wins for duplicate names
            name_to_index.entry(col.name.clone()).or_insert(i);
            offsets.push(tuple_size);
            tuple_size += col.data_type.size();
        }

        Self {
            columns,
            name_to_index,
            offsets,
            tuple_size,
        }
    }

    /// Creates a schema builder for fluent construction.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Concatenates two schemas: all columns of `first` followed by all of `second`.
    pub fn merge(first: &Schema, second: &Schema) -> Schema {
        let columns = first
            .columns
            .iter()
            .chain(second.columns.iter())
            .cloned()
            .collect();
        Schema::new(columns)
    }

    /// Returns the number of columns in the schema.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column at the given index.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns the index of the column with the given name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Returns an iterator over all columns.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Byte offset of column `index` within a serialized tuple.
    pub fn column_offset(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).copied()
    }

    /// Size in bytes of every tuple with this schema.
    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

/// Builder for constructing schemas fluently.
#[derive(Default)]
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    /// Creates a new schema builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column.
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type));
        self
    }

    /// Builds the schema.
    pub fn build(self) -> Schema {
        Schema::new(self.columns)
    }

    /// Builds the schema wrapped in an Arc for shared ownership.
    pub fn build_arc(self) -> Arc<Schema> {
        Arc::new(self.build())
    }
}
