//! Histogram output sinks.
//!
//! A sink is opened once per run, receives each finished histogram and is
//! closed explicitly. Closing flushes the output; a sink dropped without
//! being closed may leave an incomplete file.

use crate::{Error, Result};
use ktopi_core::Histogram1D;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Destination for output histograms.
pub trait HistogramSink {
    /// Stores `histogram` under its name.
    ///
    /// # Errors
    /// Returns an error if the histogram cannot be written.
    fn write(&mut self, histogram: &Histogram1D) -> Result<()>;

    /// Flushes and closes the output.
    ///
    /// # Errors
    /// Returns an error if the output cannot be finalized.
    fn close(self: Box<Self>) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct HistogramDocument {
    histograms: Vec<Histogram1D>,
}

/// Writes all histograms as one JSON document on close.
pub struct JsonHistogramSink {
    path: PathBuf,
    histograms: Vec<Histogram1D>,
}

impl JsonHistogramSink {
    /// Creates the output file, truncating any existing one.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        File::create(&path)?;
        Ok(Self {
            path,
            histograms: Vec::new(),
        })
    }
}

impl HistogramSink for JsonHistogramSink {
    fn write(&mut self, histogram: &Histogram1D) -> Result<()> {
        self.histograms
            .retain(|existing| existing.name() != histogram.name());
        self.histograms.push(histogram.clone());
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        let document = HistogramDocument {
            histograms: self.histograms,
        };
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writer.flush()?;
        Ok(())
    }
}

/// Writes histograms as CSV rows: `name,bin,low,high,content,error`.
pub struct CsvHistogramSink {
    writer: BufWriter<File>,
}

impl CsvHistogramSink {
    /// Creates the output file and writes the header row.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "name,bin,low,high,content,error")?;
        Ok(Self { writer })
    }
}

impl HistogramSink for CsvHistogramSink {
    fn write(&mut self, histogram: &Histogram1D) -> Result<()> {
        let edges = histogram.bin_edges();
        for bin in 0..histogram.n_bins() {
            writeln!(
                self.writer,
                "{},{},{},{},{},{}",
                histogram.name(),
                bin,
                edges[bin],
                edges[bin + 1],
                histogram.bin_content(bin),
                histogram.bin_error(bin)
            )?;
        }
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Opens an output sink, picking the format from the file extension.
///
/// `.csv` writes CSV, `.h5`/`.hdf5`/`.nxs` write HDF5 when the `hdf5`
/// feature is enabled and everything else writes JSON. Missing parent
/// directories are created.
///
/// # Errors
/// Returns an error if the output cannot be created.
pub fn create_sink<P: AsRef<Path>>(path: P) -> Result<Box<dyn HistogramSink>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "json" => Ok(Box::new(JsonHistogramSink::create(path)?)),
        "csv" => Ok(Box::new(CsvHistogramSink::create(path)?)),
        #[cfg(feature = "hdf5")]
        "h5" | "hdf5" | "nxs" => Ok(Box::new(crate::hdf5::Hdf5HistogramSink::create(path)?)),
        other => {
            log::warn!(
                "no histogram writer for extension '{other}', writing JSON to {}",
                path.display()
            );
            Ok(Box::new(JsonHistogramSink::create(path)?))
        }
    }
}

/// Reads histograms written by [`JsonHistogramSink`].
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn read_histograms_json<P: AsRef<Path>>(path: P) -> Result<Vec<Histogram1D>> {
    let reader = BufReader::new(File::open(path)?);
    let document: HistogramDocument = serde_json::from_reader(reader)?;
    Ok(document.histograms)
}

/// Reads histograms from a JSON or (with the `hdf5` feature) HDF5 output file.
///
/// # Errors
/// Returns an error if the file cannot be read or its format is unsupported.
pub fn read_histograms<P: AsRef<Path>>(path: P) -> Result<Vec<Histogram1D>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        #[cfg(feature = "hdf5")]
        "h5" | "hdf5" | "nxs" => crate::hdf5::read_histograms_hdf5(path),
        "csv" => Err(Error::InvalidFormat(format!(
            "CSV output cannot be read back: {}",
            path.display()
        ))),
        _ => read_histograms_json(path),
    }
}
