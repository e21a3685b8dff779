//! HDF5 column store and histogram output.
//!
//! Input layout: every top-level group is a table. Scalar columns are 1-D
//! datasets `[entries]`; array columns are 2-D datasets `[entries, width]`
//! whose rows are zero-padded past the valid prefix. Floating point
//! datasets bind as `f64` columns, integer datasets as `i64` columns.
//!
//! Output layout: `/entry` (`NXentry`) holds one `NXdata` group per
//! histogram with `counts`, `errors` and bin-edge `x` datasets.

use crate::memory::{MemoryColumn, MemoryTable};
use crate::sink::HistogramSink;
use crate::store::{ColumnReader, ColumnStore, TableSource};
use crate::{Error, Result};
use hdf5::types::{H5Type, TypeDescriptor, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use ktopi_core::{ColumnSpec, EventRecord, Histogram1D, Shape, Slot, ValueKind};
use ndarray::{s, ArrayView1, ArrayView2};
use std::path::Path;
use std::str::FromStr;

/// Rows decoded per dataset read.
const BLOCK_ROWS: u64 = 4096;
const FORMAT_VERSION: &str = "0.3";

/// An HDF5 file opened as a column store.
pub struct Hdf5Store {
    file: File,
}

impl Hdf5Store {
    /// Opens `path` read-only.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self { file })
    }
}

impl ColumnStore for Hdf5Store {
    fn open_table(&self, name: &str) -> Result<Box<dyn TableSource>> {
        if !self.file.link_exists(name) {
            return Err(Error::TableNotFound(name.to_string()));
        }
        let group = self
            .file
            .group(name)
            .map_err(|_| Error::TableNotFound(name.to_string()))?;
        Ok(Box::new(Hdf5Table {
            name: name.to_string(),
            group,
        }))
    }

    fn table_names(&self) -> Result<Vec<String>> {
        Ok(self
            .file
            .member_names()?
            .into_iter()
            .filter(|name| self.file.group(name).is_ok())
            .collect())
    }
}

/// One table (HDF5 group) of an [`Hdf5Store`].
pub struct Hdf5Table {
    name: String,
    group: Group,
}

impl TableSource for Hdf5Table {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_names(&self) -> Result<Vec<String>> {
        Ok(self.group.member_names()?)
    }

    fn open_column(&self, spec: &ColumnSpec) -> Result<Box<dyn ColumnReader>> {
        if !self.group.link_exists(spec.name) {
            return Err(Error::ColumnNotFound {
                table: self.name.clone(),
                column: spec.name.to_string(),
            });
        }
        let dataset = self.group.dataset(spec.name)?;
        Ok(Box::new(Hdf5Column::new(dataset, spec)?))
    }
}

enum Block {
    Empty,
    F64(Vec<f64>),
    I64(Vec<i64>),
}

/// Buffered reader over one dataset.
pub struct Hdf5Column {
    dataset: Dataset,
    name: &'static str,
    kind: ValueKind,
    entries: u64,
    width: usize,
    two_d: bool,
    block_start: u64,
    block_rows: u64,
    block: Block,
}

impl Hdf5Column {
    fn new(dataset: Dataset, spec: &ColumnSpec) -> Result<Self> {
        let found = dataset.dtype()?.to_descriptor()?;
        let stored = match found {
            TypeDescriptor::Float(_) => Some(ValueKind::F64),
            TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => Some(ValueKind::I64),
            _ => None,
        };
        if stored != Some(spec.kind) {
            return Err(Error::ColumnKind {
                column: spec.name.to_string(),
                expected: spec.kind,
                found: format!("{found:?}"),
            });
        }

        let shape = dataset.shape();
        let (entries, width, two_d) = match shape.as_slice() {
            [rows] => (*rows, 1, false),
            [rows, width] => (*rows, *width, true),
            _ => {
                return Err(Error::InvalidFormat(format!(
                    "column '{}' must be 1-D or 2-D, found shape {shape:?}",
                    spec.name
                )))
            }
        };

        Ok(Self {
            dataset,
            name: spec.name,
            kind: spec.kind,
            entries: entries as u64,
            width,
            two_d,
            block_start: 0,
            block_rows: 0,
            block: Block::Empty,
        })
    }

    fn load_block(&mut self, entry: u64) -> Result<()> {
        let start = entry - entry % BLOCK_ROWS;
        let end = (start + BLOCK_ROWS).min(self.entries);
        let (lo, hi) = (to_index(start)?, to_index(end)?);
        self.block = match (self.kind, self.two_d) {
            (ValueKind::F64, false) => Block::F64(read_rows_1d(&self.dataset, lo, hi)?),
            (ValueKind::F64, true) => Block::F64(read_rows_2d(&self.dataset, lo, hi)?),
            (ValueKind::I64, false) => Block::I64(read_rows_1d(&self.dataset, lo, hi)?),
            (ValueKind::I64, true) => Block::I64(read_rows_2d(&self.dataset, lo, hi)?),
        };
        self.block_start = start;
        self.block_rows = end - start;
        log::trace!("loaded rows {start}..{end} of '{}'", self.name);
        Ok(())
    }
}

fn to_index(value: u64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Error::InvalidFormat(format!("row index {value} exceeds address space")))
}

fn read_rows_1d<T: H5Type + Copy>(dataset: &Dataset, start: usize, end: usize) -> Result<Vec<T>> {
    let rows = dataset.read_slice_1d::<T, _>(s![start..end])?;
    Ok(rows.iter().copied().collect())
}

fn read_rows_2d<T: H5Type + Copy>(dataset: &Dataset, start: usize, end: usize) -> Result<Vec<T>> {
    let rows = dataset.read_slice_2d::<T, _>(s![start..end, ..])?;
    Ok(rows.iter().copied().collect())
}

fn copy_block_row<T: Copy>(block: &[T], row: usize, width: usize, dst: &mut [T]) -> usize {
    let n = width.min(dst.len());
    let offset = row * width;
    dst[..n].copy_from_slice(&block[offset..offset + n]);
    n
}

impl ColumnReader for Hdf5Column {
    fn entries(&self) -> u64 {
        self.entries
    }

    fn read_into(&mut self, entry: u64, slot: Slot<'_>) -> Result<usize> {
        if entry >= self.entries {
            return Err(Error::EntryOutOfRange {
                entry,
                entries: self.entries,
            });
        }
        if matches!(self.block, Block::Empty)
            || entry < self.block_start
            || entry >= self.block_start + self.block_rows
        {
            self.load_block(entry)?;
        }

        let row = to_index(entry - self.block_start)?;
        match (&self.block, slot) {
            (Block::F64(block), Slot::F64(dst)) => Ok(copy_block_row(block, row, self.width, dst)),
            (Block::I64(block), Slot::I64(dst)) => Ok(copy_block_row(block, row, self.width, dst)),
            (_, slot) => Err(Error::ColumnKind {
                column: self.name.to_string(),
                expected: slot.kind(),
                found: self.kind.to_string(),
            }),
        }
    }
}

/// Writes `table` as group `name` of a new HDF5 file.
///
/// Columns declared scalar by the event schema become 1-D datasets, all
/// others 2-D datasets padded with zeros to the longest row.
///
/// # Errors
/// Returns an error if HDF5 I/O fails.
pub fn write_table_hdf5<P: AsRef<Path>>(path: P, name: &str, table: &MemoryTable) -> Result<()> {
    let file = File::create(path)?;
    write_text_attrs(&file, &[("ktopi_format_version", FORMAT_VERSION)])?;
    let group = file.create_group(name)?;

    let entries = table.entries();
    for (column_name, column) in table.columns() {
        let scalar = EventRecord::schema()
            .iter()
            .find(|spec| spec.name == column_name)
            .map_or(column.max_width() <= 1, |spec| {
                matches!(spec.shape, Shape::Scalar)
            });
        match column {
            MemoryColumn::F64(rows) => {
                write_rows(&group, column_name, &rows[..entries], scalar)?;
            }
            MemoryColumn::I64(rows) => {
                write_rows(&group, column_name, &rows[..entries], scalar)?;
            }
        }
    }
    Ok(())
}

fn write_rows<T: H5Type + Copy + Default>(
    group: &Group,
    name: &str,
    rows: &[Vec<T>],
    scalar: bool,
) -> Result<()> {
    if scalar {
        let values: Vec<T> = rows
            .iter()
            .map(|row| row.first().copied().unwrap_or_default())
            .collect();
        let dataset = group
            .new_dataset::<T>()
            .shape((values.len(),))
            .create(name)?;
        dataset.write(ArrayView1::from(values.as_slice()))?;
        return Ok(());
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let mut values = vec![T::default(); rows.len() * width];
    for (i, row) in rows.iter().enumerate() {
        values[i * width..i * width + row.len()].copy_from_slice(row);
    }
    let view = ArrayView2::from_shape((rows.len(), width), values.as_slice())
        .map_err(|e| Error::InvalidFormat(format!("column '{name}' shape mismatch: {e}")))?;
    let dataset = group
        .new_dataset::<T>()
        .shape((rows.len(), width))
        .create(name)?;
    dataset.write(view)?;
    Ok(())
}

/// Writes histograms as `NXdata` groups under `/entry`.
pub struct Hdf5HistogramSink {
    file: File,
    entry: Group,
}

impl Hdf5HistogramSink {
    /// Creates the output file, truncating any existing one.
    ///
    /// # Errors
    /// Returns an error if the HDF5 file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        write_text_attrs(&file, &[("ktopi_format_version", FORMAT_VERSION)])?;
        let entry = file.create_group("entry")?;
        write_text_attrs(&entry, &[("NX_class", "NXentry")])?;
        Ok(Self { file, entry })
    }
}

impl HistogramSink for Hdf5HistogramSink {
    fn write(&mut self, histogram: &Histogram1D) -> Result<()> {
        if self.entry.link_exists(histogram.name()) {
            self.entry.unlink(histogram.name())?;
        }
        let group = self.entry.create_group(histogram.name())?;
        write_text_attrs(
            &group,
            &[
                ("NX_class", "NXdata"),
                ("signal", "counts"),
                ("axes", "x"),
                ("title", histogram.title()),
                ("x_label", histogram.x_label()),
                ("y_label", histogram.y_label()),
            ],
        )?;
        write_number_attr(&group, "x_min", histogram.x_min())?;
        write_number_attr(&group, "x_max", histogram.x_max())?;
        write_number_attr(&group, "entries", histogram.entries())?;

        write_vec(&group, "counts", histogram.contents())?;
        write_vec(&group, "errors", &histogram.errors())?;
        write_vec(&group, "x", &histogram.bin_edges())?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

fn write_vec(group: &Group, name: &str, values: &[f64]) -> Result<()> {
    let dataset = group
        .new_dataset::<f64>()
        .shape((values.len(),))
        .create(name)?;
    dataset.write(ArrayView1::from(values))?;
    Ok(())
}

/// Reads histograms written by [`Hdf5HistogramSink`].
///
/// # Errors
/// Returns an error if HDF5 I/O fails or a histogram group is malformed.
pub fn read_histograms_hdf5<P: AsRef<Path>>(path: P) -> Result<Vec<Histogram1D>> {
    let file = File::open(path)?;
    let entry = file.group("entry")?;
    let mut histograms = Vec::new();
    for name in entry.member_names()? {
        let group = entry.group(&name)?;
        let counts = read_bin_values(&group, &name, "counts")?;
        let errors = read_bin_values(&group, &name, "errors")?;
        if errors.len() != counts.len() {
            return Err(Error::InvalidFormat(format!(
                "histogram '{name}' has {} counts but {} errors",
                counts.len(),
                errors.len()
            )));
        }

        let mut histogram = Histogram1D::new(
            name.as_str(),
            read_attr_string(&group, "title")?,
            counts.len(),
            group.attr("x_min")?.read_scalar::<f64>()?,
            group.attr("x_max")?.read_scalar::<f64>()?,
        )?
        .with_labels(
            read_attr_string(&group, "x_label")?,
            read_attr_string(&group, "y_label")?,
        );
        for (bin, (content, error)) in counts.iter().zip(&errors).enumerate() {
            histogram.set_bin_content(bin, *content)?;
            histogram.set_bin_error(bin, *error)?;
        }
        histogram.set_entries(group.attr("entries")?.read_scalar::<u64>()?);
        histograms.push(histogram);
    }
    Ok(histograms)
}

/// Reads a per-bin 1-D `f64` dataset of histogram `histogram`.
fn read_bin_values(group: &Group, histogram: &str, name: &str) -> Result<Vec<f64>> {
    let dataset = group.dataset(name)?;
    if dataset.ndim() != 1 {
        return Err(Error::InvalidFormat(format!(
            "histogram '{histogram}': dataset '{name}' has {} dimensions, expected 1",
            dataset.ndim()
        )));
    }
    Ok(dataset.read_raw::<f64>()?)
}

fn read_attr_string(group: &Group, name: &str) -> Result<String> {
    let value: VarLenUnicode = group.attr(name)?.read_scalar()?;
    Ok(value.to_string())
}

/// Writes string attributes on `group`. A [`File`] derefs to its root group.
fn write_text_attrs(group: &Group, attrs: &[(&str, &str)]) -> Result<()> {
    for &(name, text) in attrs {
        let value = VarLenUnicode::from_str(text).map_err(|e| {
            Error::InvalidFormat(format!("attribute '{name}' is not valid text: {e}"))
        })?;
        group
            .new_attr::<VarLenUnicode>()
            .create(name)?
            .write_scalar(&value)?;
    }
    Ok(())
}

fn write_number_attr<T: H5Type>(group: &Group, name: &str, value: T) -> Result<()> {
    group.new_attr::<T>().create(name)?.write_scalar(&value)?;
    Ok(())
}
