//! Run driver: input binding, event loop, finalization and output.
//!
//! A run moves through
//! `Unopened → Bound → Iterating → Finalizing → Written → Closed`.
//! Any fatal error moves it to `Failed` and skips the remaining stages.
//! The output is created only once the input is bound, so a failed bind
//! writes nothing.

use crate::engine::{AnalysisResult, Analyzer, CutFlow, Diagnostic, Level};
use crate::{AnalysisConfig, Error, Result};
use ktopi_core::{Histogram1D, ResponseMatrix};
use ktopi_io::{create_sink, open_store, ColumnStore, EventReader};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Unopened,
    Bound,
    Iterating,
    Finalizing,
    Written,
    Closed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Unopened => "unopened",
            Stage::Bound => "bound",
            Stage::Iterating => "iterating",
            Stage::Finalizing => "finalizing",
            Stage::Written => "written",
            Stage::Closed => "closed",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub output: PathBuf,
    pub level: Level,
    /// Entries available in the bound table.
    pub entries: u64,
    pub cut_flow: CutFlow,
    pub diagnostics: Vec<Diagnostic>,
    pub response: Option<ResponseMatrix>,
    /// Histograms as written, in output order.
    pub histograms: Vec<Histogram1D>,
}

impl RunReport {
    /// Looks up a written histogram by name.
    #[must_use]
    pub fn histogram(&self, name: &str) -> Option<&Histogram1D> {
        self.histograms.iter().find(|h| h.name() == name)
    }
}

/// Drives one analysis run.
#[derive(Debug)]
pub struct Pipeline {
    config: AnalysisConfig,
    stage: Stage,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            stage: Stage::Unopened,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn advance(&mut self, stage: Stage) {
        log::debug!("run stage {} -> {stage}", self.stage);
        self.stage = stage;
    }

    /// Opens the configured input store and runs.
    ///
    /// # Errors
    /// Returns an error if the input cannot be opened or the run fails.
    pub fn run(&mut self) -> Result<RunReport> {
        self.ensure_unopened()?;
        let input = self.config.input.clone();
        let store = match open_store(&input) {
            Ok(store) => store,
            Err(source) => {
                self.advance(Stage::Failed);
                return Err(Error::OpenInput {
                    path: input,
                    source,
                });
            }
        };
        self.run_with_store(store.as_ref())
    }

    /// Runs over an already opened store.
    ///
    /// # Errors
    /// Returns an error if binding, output creation or writing fails.
    pub fn run_with_store(&mut self, store: &dyn ColumnStore) -> Result<RunReport> {
        self.ensure_unopened()?;
        let result = self.execute(store);
        if result.is_err() {
            self.advance(Stage::Failed);
        }
        result
    }

    /// A finished or failed pipeline keeps its terminal stage.
    fn ensure_unopened(&self) -> Result<()> {
        if self.stage == Stage::Unopened {
            Ok(())
        } else {
            Err(Error::ConfigError(format!(
                "pipeline already ran (stage: {})",
                self.stage
            )))
        }
    }

    fn execute(&mut self, store: &dyn ColumnStore) -> Result<RunReport> {
        let mut analyzer = Analyzer::new(&self.config)?;

        let tree = self.config.tree.clone();
        let mut reader = store
            .open_table(&tree)
            .and_then(|table| EventReader::bind(table.as_ref()))
            .map_err(|source| Error::Bind {
                table: tree.clone(),
                source,
            })?;
        self.advance(Stage::Bound);

        let output = self.config.output.clone();
        let mut sink = create_sink(&output).map_err(|source| Error::OpenOutput {
            path: output.clone(),
            source,
        })?;

        let entries = reader.entry_count();
        let limit = self.config.event_limit(entries);
        log::info!(
            "processing {limit} of {entries} entries from '{tree}' ({} level)",
            match analyzer.level() {
                Level::Reco => "reco",
                Level::Generator => "generator",
            }
        );

        self.advance(Stage::Iterating);
        let progress_step = limit / 100 + 1;
        for entry in 0..limit {
            if entry % progress_step == 0 {
                log::debug!("entry {entry}/{limit}");
            }
            if reader.read_entry(entry) {
                analyzer.process_event(entry, reader.record());
            } else {
                analyzer.skip_unreadable(entry);
            }
        }

        self.advance(Stage::Finalizing);
        let result: AnalysisResult = analyzer.finalize()?;

        for histogram in result.histograms() {
            sink.write(histogram)?;
        }
        self.advance(Stage::Written);
        sink.close()?;
        self.advance(Stage::Closed);
        log::info!("output written to {}", output.display());

        let histograms = result.histograms().into_iter().cloned().collect();
        Ok(RunReport {
            output,
            level: result.level,
            entries,
            cut_flow: result.cut_flow,
            diagnostics: result.diagnostics,
            response: result.response,
            histograms,
        })
    }
}

/// Runs the analysis described by `config`.
///
/// # Errors
/// Returns an error on any fatal condition; see [`Pipeline::run`].
pub fn run(config: &AnalysisConfig) -> Result<RunReport> {
    Pipeline::new(config.clone()).run()
}
