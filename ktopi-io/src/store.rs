//! Column-store abstraction.
//!
//! A store exposes named tables; a table exposes named, typed columns with
//! one row per entry. Scalar columns have one value per row, array columns
//! a fixed-width row of which only the collection's valid prefix matters.

use crate::{Error, Result};
use ktopi_core::{ColumnSpec, Slot};
use std::path::Path;

/// A read-only store of named tables.
pub trait ColumnStore {
    /// Opens the table `name`.
    ///
    /// # Errors
    /// Returns [`Error::TableNotFound`] if the store has no such table.
    fn open_table(&self, name: &str) -> Result<Box<dyn TableSource>>;

    /// Names of all tables in the store.
    ///
    /// # Errors
    /// Returns an error if the store cannot be listed.
    fn table_names(&self) -> Result<Vec<String>>;
}

/// A table of named columns.
pub trait TableSource {
    /// Table name.
    fn name(&self) -> &str;

    /// Names of all columns present in the table.
    ///
    /// # Errors
    /// Returns an error if the table cannot be listed.
    fn column_names(&self) -> Result<Vec<String>>;

    /// Resolves the column declared by `spec`.
    ///
    /// # Errors
    /// Returns [`Error::ColumnNotFound`] if the column is absent and
    /// [`Error::ColumnKind`] if its element type differs from the declaration.
    fn open_column(&self, spec: &ColumnSpec) -> Result<Box<dyn ColumnReader>>;
}

/// Sequential-or-random reader over one column.
pub trait ColumnReader {
    /// Number of entries (rows) in the column.
    fn entries(&self) -> u64;

    /// Decodes row `entry` into `slot` and returns the number of values decoded.
    ///
    /// At most `slot.len()` values are written.
    ///
    /// # Errors
    /// Returns an error if `entry` is out of range or the store fails.
    fn read_into(&mut self, entry: u64, slot: Slot<'_>) -> Result<usize>;
}

/// Opens an input store, picking the backend from the file extension.
///
/// `.json` files load a [`MemoryStore`](crate::MemoryStore); `.h5`, `.hdf5`
/// and `.nxs` open an HDF5 store when the `hdf5` feature is enabled.
///
/// # Errors
/// Returns an error if the file cannot be opened or its format is unsupported.
pub fn open_store<P: AsRef<Path>>(path: P) -> Result<Box<dyn ColumnStore>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "json" => Ok(Box::new(crate::MemoryStore::from_json_file(path)?)),
        #[cfg(feature = "hdf5")]
        "h5" | "hdf5" | "nxs" => Ok(Box::new(crate::hdf5::Hdf5Store::open(path)?)),
        _ => Err(Error::InvalidFormat(format!(
            "unsupported input extension '{extension}' (file: {})",
            path.display()
        ))),
    }
}

/// Declared columns that `table` does not provide.
///
/// # Errors
/// Returns an error if the table cannot be listed.
pub fn missing_columns(table: &dyn TableSource, schema: &[ColumnSpec]) -> Result<Vec<&'static str>> {
    let present = table.column_names()?;
    Ok(schema
        .iter()
        .filter(|spec| !present.iter().any(|name| name == spec.name))
        .map(|spec| spec.name)
        .collect())
}
