//! In-memory column store.
//!
//! Tables hold one row per entry for every column. The store can be built
//! from [`EventRecord`]s (useful for synthetic datasets) and round-trips
//! through JSON.

use crate::store::{ColumnReader, ColumnStore, TableSource};
use crate::{Error, Result};
use ktopi_core::{Collection, ColumnSpec, ColumnVisitor, EventRecord, Shape, Slot, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// Rows of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rows", rename_all = "lowercase")]
pub enum MemoryColumn {
    F64(Vec<Vec<f64>>),
    I64(Vec<Vec<i64>>),
}

impl MemoryColumn {
    fn empty(kind: ValueKind) -> Self {
        match kind {
            ValueKind::F64 => MemoryColumn::F64(Vec::new()),
            ValueKind::I64 => MemoryColumn::I64(Vec::new()),
        }
    }

    /// Element type.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            MemoryColumn::F64(_) => ValueKind::F64,
            MemoryColumn::I64(_) => ValueKind::I64,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            MemoryColumn::F64(rows) => rows.len(),
            MemoryColumn::I64(rows) => rows.len(),
        }
    }

    /// Returns true if the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the longest row.
    #[must_use]
    pub fn max_width(&self) -> usize {
        match self {
            MemoryColumn::F64(rows) => rows.iter().map(Vec::len).max().unwrap_or(0),
            MemoryColumn::I64(rows) => rows.iter().map(Vec::len).max().unwrap_or(0),
        }
    }
}

/// A table of named columns held in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryTable {
    columns: BTreeMap<String, Arc<MemoryColumn>>,
}

impl MemoryTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table with one entry per record.
    pub fn from_records<I: IntoIterator<Item = EventRecord>>(records: I) -> Self {
        let mut table = Self::new();
        for record in records {
            table.push_record(record);
        }
        table
    }

    /// Appends `record` as a new entry.
    ///
    /// Array columns store only the valid prefix of their collection.
    pub fn push_record(&mut self, mut record: EventRecord) {
        let prefix = Collection::ALL.map(|c| (c, c.clip(record.count(c))));
        let mut appender = RowAppender {
            columns: &mut self.columns,
            prefix: &prefix,
        };
        record.visit_columns(&mut appender);
    }

    /// Inserts or replaces a column.
    pub fn insert_column(&mut self, name: impl Into<String>, column: MemoryColumn) {
        self.columns.insert(name.into(), Arc::new(column));
    }

    /// Removes a column, returning it if present.
    pub fn remove_column(&mut self, name: &str) -> Option<MemoryColumn> {
        self.columns
            .remove(name)
            .map(Arc::unwrap_or_clone)
    }

    /// Looks up a column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&MemoryColumn> {
        self.columns.get(name).map(AsRef::as_ref)
    }

    /// Mutable access to a column.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut MemoryColumn> {
        self.columns.get_mut(name).map(Arc::make_mut)
    }

    /// Iterates over `(name, column)` pairs in name order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &MemoryColumn)> {
        self.columns
            .iter()
            .map(|(name, column)| (name.as_str(), column.as_ref()))
    }

    /// Number of entries (shortest column length).
    #[must_use]
    pub fn entries(&self) -> usize {
        self.columns.values().map(|c| c.len()).min().unwrap_or(0)
    }
}

struct RowAppender<'a> {
    columns: &'a mut BTreeMap<String, Arc<MemoryColumn>>,
    prefix: &'a [(Collection, usize)],
}

impl ColumnVisitor for RowAppender<'_> {
    fn visit(&mut self, spec: ColumnSpec, slot: Slot<'_>) {
        let len = match spec.shape {
            Shape::Scalar => 1,
            Shape::Array(collection) => self
                .prefix
                .iter()
                .find(|(c, _)| *c == collection)
                .map_or(0, |(_, len)| *len),
        };
        let column = Arc::make_mut(
            self.columns
                .entry(spec.name.to_string())
                .or_insert_with(|| Arc::new(MemoryColumn::empty(spec.kind))),
        );
        match (column, slot) {
            (MemoryColumn::F64(rows), Slot::F64(values)) => rows.push(values[..len].to_vec()),
            (MemoryColumn::I64(rows), Slot::I64(values)) => rows.push(values[..len].to_vec()),
            (column, slot) => log::warn!(
                "column '{}' holds {}, record field is {}; row skipped",
                spec.name,
                column.kind(),
                slot.kind()
            ),
        }
    }
}

/// A store of in-memory tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    tables: BTreeMap<String, Arc<MemoryTable>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `table` under `name`.
    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>, table: MemoryTable) -> Self {
        self.insert_table(name, table);
        self
    }

    /// Inserts or replaces a table.
    pub fn insert_table(&mut self, name: impl Into<String>, table: MemoryTable) {
        self.tables.insert(name.into(), Arc::new(table));
    }

    /// Looks up a table.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.get(name).map(AsRef::as_ref)
    }

    /// Loads a store from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Writes the store to a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

impl ColumnStore for MemoryStore {
    fn open_table(&self, name: &str) -> Result<Box<dyn TableSource>> {
        let table = self
            .tables
            .get(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))?;
        Ok(Box::new(MemoryTableSource {
            name: name.to_string(),
            table: Arc::clone(table),
        }))
    }

    fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }
}

struct MemoryTableSource {
    name: String,
    table: Arc<MemoryTable>,
}

impl TableSource for MemoryTableSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_names(&self) -> Result<Vec<String>> {
        Ok(self.table.columns.keys().cloned().collect())
    }

    fn open_column(&self, spec: &ColumnSpec) -> Result<Box<dyn ColumnReader>> {
        let column = self
            .table
            .columns
            .get(spec.name)
            .ok_or_else(|| Error::ColumnNotFound {
                table: self.name.clone(),
                column: spec.name.to_string(),
            })?;
        if column.kind() != spec.kind {
            return Err(Error::ColumnKind {
                column: spec.name.to_string(),
                expected: spec.kind,
                found: column.kind().to_string(),
            });
        }
        Ok(Box::new(MemoryColumnReader {
            column: Arc::clone(column),
        }))
    }
}

struct MemoryColumnReader {
    column: Arc<MemoryColumn>,
}

fn copy_row<T: Copy>(rows: &[Vec<T>], entry: u64, dst: &mut [T]) -> Result<usize> {
    let row = usize::try_from(entry)
        .ok()
        .and_then(|index| rows.get(index))
        .ok_or(Error::EntryOutOfRange {
            entry,
            entries: rows.len() as u64,
        })?;
    let n = row.len().min(dst.len());
    dst[..n].copy_from_slice(&row[..n]);
    Ok(n)
}

impl ColumnReader for MemoryColumnReader {
    fn entries(&self) -> u64 {
        self.column.len() as u64
    }

    fn read_into(&mut self, entry: u64, slot: Slot<'_>) -> Result<usize> {
        match (self.column.as_ref(), slot) {
            (MemoryColumn::F64(rows), Slot::F64(dst)) => copy_row(rows, entry, dst),
            (MemoryColumn::I64(rows), Slot::I64(dst)) => copy_row(rows, entry, dst),
            (column, slot) => Err(Error::ColumnKind {
                column: "<memory>".to_string(),
                expected: slot.kind(),
                found: column.kind().to_string(),
            }),
        }
    }
}
