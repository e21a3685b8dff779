//! Binding of an [`EventRecord`] to a table.
//!
//! Every declared column is resolved once at bind time. Reading an entry
//! decodes into a staging record which is swapped into place only after all
//! columns decoded completely, so a failed read never leaves a partly
//! updated record behind.

use crate::store::{missing_columns, ColumnReader, TableSource};
use crate::{Error, Result};
use ktopi_core::{Collection, ColumnSpec, ColumnVisitor, EventRecord, Shape, Slot};

struct BoundColumn {
    spec: ColumnSpec,
    reader: Box<dyn ColumnReader>,
}

struct Binding {
    table: String,
    columns: Vec<BoundColumn>,
    staging: EventRecord,
    entries: u64,
}

/// Reads table entries into a reusable [`EventRecord`].
pub struct EventReader {
    binding: Option<Binding>,
    record: EventRecord,
}

impl Default for EventReader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReader")
            .field("table", &self.table_name())
            .field("entries", &self.entry_count())
            .finish_non_exhaustive()
    }
}

impl EventReader {
    /// Creates an unbound reader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binding: None,
            record: EventRecord::new(),
        }
    }

    /// Creates a reader bound to `table`.
    ///
    /// # Errors
    /// See [`EventReader::attach`].
    pub fn bind(table: &dyn TableSource) -> Result<Self> {
        let mut reader = Self::new();
        reader.attach(table)?;
        Ok(reader)
    }

    /// Binds every declared column of the record to `table`.
    ///
    /// On failure the reader is left unbound.
    ///
    /// # Errors
    /// Returns [`Error::MissingColumns`] naming every absent column, or the
    /// store error raised while resolving a present one.
    pub fn attach(&mut self, table: &dyn TableSource) -> Result<()> {
        self.binding = None;
        let schema = EventRecord::schema();

        let missing = missing_columns(table, schema)?;
        if !missing.is_empty() {
            return Err(Error::MissingColumns {
                table: table.name().to_string(),
                missing,
            });
        }

        let columns = schema
            .iter()
            .map(|spec| {
                Ok(BoundColumn {
                    spec: *spec,
                    reader: table.open_column(spec)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let entries = columns
            .iter()
            .map(|column| column.reader.entries())
            .min()
            .unwrap_or(0);

        log::debug!(
            "bound {} columns of table '{}' ({} entries)",
            columns.len(),
            table.name(),
            entries
        );
        self.binding = Some(Binding {
            table: table.name().to_string(),
            columns,
            staging: EventRecord::new(),
            entries,
        });
        Ok(())
    }

    /// Releases the table binding. The record keeps its last contents.
    pub fn detach(&mut self) {
        self.binding = None;
    }

    /// Returns true if a table is attached.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Name of the attached table.
    #[must_use]
    pub fn table_name(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.table.as_str())
    }

    /// Number of entries readable from the attached table, 0 when unbound.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.binding.as_ref().map_or(0, |b| b.entries)
    }

    /// The record holding the last successfully read entry.
    #[must_use]
    pub fn record(&self) -> &EventRecord {
        &self.record
    }

    /// Reads `entry` into the record, returning false on any failure.
    ///
    /// A failed read leaves the record unchanged.
    pub fn read_entry(&mut self, entry: u64) -> bool {
        match self.try_read_entry(entry) {
            Ok(()) => true,
            Err(err) => {
                log::debug!("entry {entry} not read: {err}");
                false
            }
        }
    }

    /// Reads `entry` into the record.
    ///
    /// # Errors
    /// Returns [`Error::NotBound`], [`Error::EntryOutOfRange`],
    /// [`Error::ShortRead`] or the store error of the failing column. The
    /// record is unchanged on error.
    pub fn try_read_entry(&mut self, entry: u64) -> Result<()> {
        let binding = self.binding.as_mut().ok_or(Error::NotBound)?;
        if entry >= binding.entries {
            return Err(Error::EntryOutOfRange {
                entry,
                entries: binding.entries,
            });
        }

        let mut filler = EntryFiller {
            columns: &mut binding.columns,
            next: 0,
            entry,
            counts: [0; Collection::ALL.len()],
            error: None,
        };
        binding.staging.visit_columns(&mut filler);
        if let Some(err) = filler.error {
            return Err(err);
        }

        std::mem::swap(&mut self.record, &mut binding.staging);
        Ok(())
    }
}

fn collection_index(collection: Collection) -> usize {
    Collection::ALL
        .iter()
        .position(|c| *c == collection)
        .unwrap_or_default()
}

/// Decodes one entry into the staging record, column by column.
///
/// Columns are visited in schema order, which is the order they were bound
/// in, so the n-th visit pairs with the n-th bound reader.
struct EntryFiller<'a> {
    columns: &'a mut [BoundColumn],
    next: usize,
    entry: u64,
    counts: [i64; Collection::ALL.len()],
    error: Option<Error>,
}

impl EntryFiller<'_> {
    fn fill(&mut self, spec: ColumnSpec, mut slot: Slot<'_>) -> Result<()> {
        let column = self
            .columns
            .get_mut(self.next)
            .filter(|column| column.spec == spec)
            .ok_or(Error::NotBound)?;
        self.next += 1;

        let view = match &mut slot {
            Slot::F64(values) => Slot::F64(&mut values[..]),
            Slot::I64(values) => Slot::I64(&mut values[..]),
        };
        let decoded = column.reader.read_into(self.entry, view)?;

        let expected = match spec.shape {
            Shape::Scalar => 1,
            Shape::Array(collection) => collection.clip(self.counts[collection_index(collection)]),
        };
        if decoded < expected {
            return Err(Error::ShortRead {
                column: spec.name,
                entry: self.entry,
                expected,
                decoded,
            });
        }

        if let Some(collection) = Collection::ALL
            .into_iter()
            .find(|c| c.count_column() == spec.name)
        {
            if let Slot::I64(values) = &slot {
                self.counts[collection_index(collection)] = values[0];
            }
        }
        Ok(())
    }
}

impl ColumnVisitor for EntryFiller<'_> {
    fn visit(&mut self, spec: ColumnSpec, slot: Slot<'_>) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.fill(spec, slot) {
            self.error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ColumnStore;
    use crate::{MemoryColumn, MemoryStore, MemoryTable};
    use ktopi_core::schema::MAX_RECO;

    fn record_with(nch: i64, energies: &[f64]) -> EventRecord {
        let mut record = EventRecord::new();
        record.scalars.nch = nch;
        record.reco.count = energies.len() as i64;
        record.reco.e[..energies.len()].copy_from_slice(energies);
        record
    }

    fn store_of(table: MemoryTable) -> MemoryStore {
        MemoryStore::new().with_table("t", table)
    }

    #[test]
    fn test_bind_and_read_entries() {
        let store = store_of(MemoryTable::from_records([
            record_with(7, &[1.0, 2.0]),
            record_with(9, &[3.0]),
        ]));
        let table = store.open_table("t").unwrap();
        let mut reader = EventReader::bind(table.as_ref()).unwrap();
        assert!(reader.is_bound());
        assert_eq!(reader.table_name(), Some("t"));
        assert_eq!(reader.entry_count(), 2);

        assert!(reader.read_entry(1));
        assert_eq!(reader.record().scalars.nch, 9);
        assert_eq!(reader.record().reco.energies(), &[3.0]);

        assert!(reader.read_entry(0));
        assert_eq!(reader.record().scalars.nch, 7);
        assert_eq!(reader.record().reco.energies(), &[1.0, 2.0]);
    }

    #[test]
    fn test_out_of_range_leaves_record_unchanged() {
        let store = store_of(MemoryTable::from_records([record_with(7, &[1.0])]));
        let table = store.open_table("t").unwrap();
        let mut reader = EventReader::bind(table.as_ref()).unwrap();

        assert!(reader.read_entry(0));
        let before = reader.record().clone();
        assert!(!reader.read_entry(1));
        assert!(matches!(
            reader.try_read_entry(5),
            Err(Error::EntryOutOfRange { entry: 5, entries: 1 })
        ));
        assert_eq!(reader.record(), &before);
    }

    #[test]
    fn test_unbound_reader() {
        let mut reader = EventReader::new();
        assert_eq!(reader.entry_count(), 0);
        assert!(!reader.read_entry(0));
        assert!(matches!(reader.try_read_entry(0), Err(Error::NotBound)));
    }

    #[test]
    fn test_detach_keeps_last_record() {
        let store = store_of(MemoryTable::from_records([record_with(7, &[1.0])]));
        let table = store.open_table("t").unwrap();
        let mut reader = EventReader::bind(table.as_ref()).unwrap();
        assert!(reader.read_entry(0));

        reader.detach();
        assert!(!reader.is_bound());
        assert_eq!(reader.table_name(), None);
        assert_eq!(reader.entry_count(), 0);
        assert!(matches!(reader.try_read_entry(0), Err(Error::NotBound)));
        assert_eq!(reader.record().scalars.nch, 7);

        reader.attach(table.as_ref()).unwrap();
        assert_eq!(reader.entry_count(), 1);
    }

    #[test]
    fn test_missing_columns_fail_bind() {
        let mut table = MemoryTable::from_records([record_with(7, &[1.0])]);
        table.remove_column("ThrustZ");
        table.remove_column("RecoPIDKaon");
        let store = store_of(table);
        let source = store.open_table("t").unwrap();

        let mut reader = EventReader::new();
        match reader.attach(source.as_ref()) {
            Err(Error::MissingColumns { table, missing }) => {
                assert_eq!(table, "t");
                assert_eq!(missing.len(), 2);
                assert!(missing.contains(&"ThrustZ"));
                assert!(missing.contains(&"RecoPIDKaon"));
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
        assert!(!reader.is_bound());
    }

    #[test]
    fn test_short_array_row_fails_read() {
        let mut table = MemoryTable::from_records([record_with(7, &[1.0, 2.0, 3.0])]);
        if let Some(MemoryColumn::F64(rows)) = table.column_mut("RecoE") {
            rows[0].truncate(1);
        }
        let store = store_of(table);
        let source = store.open_table("t").unwrap();
        let mut reader = EventReader::bind(source.as_ref()).unwrap();

        match reader.try_read_entry(0) {
            Err(Error::ShortRead {
                column,
                expected,
                decoded,
                ..
            }) => {
                assert_eq!(column, "RecoE");
                assert_eq!(expected, 3);
                assert_eq!(decoded, 1);
            }
            other => panic!("expected ShortRead, got {other:?}"),
        }
        assert_eq!(reader.record().scalars.nch, 0);
    }

    #[test]
    fn test_oversized_count_reads_clipped_prefix() {
        let mut record = record_with(7, &[]);
        record.reco.count = MAX_RECO as i64 + 10;
        record.reco.e.fill(0.5);
        let store = store_of(MemoryTable::from_records([record]));
        let source = store.open_table("t").unwrap();
        let mut reader = EventReader::bind(source.as_ref()).unwrap();

        assert!(reader.read_entry(0));
        assert_eq!(reader.record().reco.count, MAX_RECO as i64 + 10);
        assert_eq!(reader.record().reco.len(), MAX_RECO);
    }

    #[test]
    fn test_entry_count_is_shortest_column() {
        let mut table = MemoryTable::from_records([
            record_with(7, &[1.0]),
            record_with(8, &[1.0]),
            record_with(9, &[1.0]),
        ]);
        if let Some(MemoryColumn::I64(rows)) = table.column_mut("Nch") {
            rows.pop();
        }
        let store = store_of(table);
        let source = store.open_table("t").unwrap();
        let reader = EventReader::bind(source.as_ref()).unwrap();
        assert_eq!(reader.entry_count(), 2);
    }
}
