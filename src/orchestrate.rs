use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::{self, DEFAULT_OUTPUT_NAME};
use crate::discover::{SourceFile, discover};
use crate::error::{MergeError, ReadFailure, Result};
use crate::io::excel_read::read_table;
use crate::io::excel_write::write_table;
use crate::io::format::SheetFormat;
use crate::merge::{MergeStats, merge};

/// Share of the progress range covered by reading; writing takes the rest.
const READ_SHARE: f64 = 0.9;

/// Steps of a merge run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeState {
    Idle,
    Validating,
    Discovering,
    Reading,
    Merging,
    Writing,
    Done,
    Failed,
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MergeState::Idle => "idle",
            MergeState::Validating => "validating",
            MergeState::Discovering => "discovering",
            MergeState::Reading => "reading",
            MergeState::Merging => "merging",
            MergeState::Writing => "writing",
            MergeState::Done => "done",
            MergeState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Snapshot delivered to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub state: MergeState,
    /// Completed fraction in `[0, 1]`; never decreases within a run.
    pub ratio: f64,
}

/// Unvalidated parameters of a merge run, as collected by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub directory: PathBuf,
    pub extension: String,
    pub header_rows: String,
    pub output_name: String,
    pub add_provenance: bool,
    pub output_extension: Option<String>,
}

impl MergeRequest {
    /// Request with the tool's defaults: `.xlsx` inputs, a single header row
    /// and the default output name.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            extension: SheetFormat::Xlsx.extension().to_string(),
            header_rows: "1".to_string(),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            add_provenance: false,
            output_extension: None,
        }
    }
}

/// Outcome of a successful run, including files that were skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeReport {
    pub directory: PathBuf,
    pub output_path: PathBuf,
    pub input_format: SheetFormat,
    pub output_format: SheetFormat,
    pub files_discovered: usize,
    pub files_read: usize,
    pub failures: Vec<ReadFailure>,
    pub row_count: usize,
    pub column_count: usize,
    pub stats: MergeStats,
}

impl MergeReport {
    pub fn files_failed(&self) -> usize {
        self.failures.len()
    }

    /// One-line summary suitable for console output.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "merged {} of {} file(s) into {} ({} rows, {} columns)",
            self.files_read,
            self.files_discovered,
            self.output_path.display(),
            self.row_count,
            self.column_count
        );
        if !self.failures.is_empty() {
            line.push_str(&format!(", {} failed", self.failures.len()));
        }
        line
    }
}

type ProgressCallback<'a> = Box<dyn FnMut(&Progress) + 'a>;

/// Drives one merge run at a time through validation, discovery, reading,
/// merging and writing.
///
/// `run` borrows the orchestrator mutably, so overlapping runs on one
/// instance are impossible; callers that share a directory across instances
/// must serialize runs themselves.
pub struct MergeOrchestrator<'a> {
    state: MergeState,
    ratio: f64,
    on_progress: Option<ProgressCallback<'a>>,
}

impl Default for MergeOrchestrator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> MergeOrchestrator<'a> {
    pub fn new() -> Self {
        Self {
            state: MergeState::Idle,
            ratio: 0.0,
            on_progress: None,
        }
    }

    /// Registers a callback invoked on every state change and after each file.
    pub fn with_progress(mut self, callback: impl FnMut(&Progress) + 'a) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    pub fn progress(&self) -> Progress {
        Progress {
            state: self.state,
            ratio: self.ratio,
        }
    }

    /// Runs a full merge. Per-file read failures end up in the report; any
    /// other error aborts the run and leaves no output file behind.
    #[instrument(level = "info", skip_all, fields(directory = %request.directory.display()))]
    pub fn run(&mut self, request: &MergeRequest) -> Result<MergeReport> {
        self.ratio = 0.0;
        let result = self.execute(request);
        match &result {
            Ok(report) => {
                info!(
                    files_read = report.files_read,
                    files_failed = report.files_failed(),
                    rows = report.row_count,
                    "merge finished"
                );
                self.enter(MergeState::Done);
            }
            Err(error) => {
                warn!(%error, state = %self.state, "merge aborted");
                self.enter(MergeState::Failed);
            }
        }
        result
    }

    fn execute(&mut self, request: &MergeRequest) -> Result<MergeReport> {
        self.enter(MergeState::Validating);
        let config = config::validate_with_output(
            &request.extension,
            &request.header_rows,
            &request.output_name,
            request.add_provenance,
            request.output_extension.as_deref(),
        )?;

        self.enter(MergeState::Discovering);
        let files = discover(&request.directory, config.extension())?;
        let files_discovered = files.len();
        info!(files = files_discovered, extension = %config.extension(), "discovered input files");

        self.enter(MergeState::Reading);
        let mut tables = Vec::with_capacity(files_discovered);
        let mut failures = Vec::new();
        for (index, file) in files.iter().enumerate() {
            match read_table(file, &config) {
                Ok(table) => {
                    info!(file = %file.name, rows = table.row_count(), "read file");
                    tables.push(table);
                }
                Err(failure) => {
                    warn!(file = %failure.file, reason = %failure.reason, "failed to read file");
                    failures.push(failure);
                }
            }
            self.advance((index + 1) as f64 / files_discovered as f64 * READ_SHARE);
        }

        if tables.is_empty() {
            return Err(MergeError::NoValidData { failures });
        }
        let files_read = tables.len();

        self.enter(MergeState::Merging);
        let merged = merge(tables)?;
        let stats = merged.stats();
        debug!(?stats, "tables merged");

        self.enter(MergeState::Writing);
        let output_path = write_table(merged, &request.directory, &config)?;
        self.advance(1.0);

        Ok(MergeReport {
            directory: request.directory.clone(),
            output_path,
            input_format: config.extension(),
            output_format: config.output_format(),
            files_discovered,
            files_read,
            failures,
            row_count: stats.row_count,
            column_count: stats.column_count,
            stats,
        })
    }

    fn enter(&mut self, state: MergeState) {
        debug!(from = %self.state, to = %state, "state transition");
        self.state = state;
        self.notify();
    }

    fn advance(&mut self, ratio: f64) {
        self.ratio = ratio.clamp(self.ratio, 1.0);
        debug!(ratio = self.ratio, "progress");
        self.notify();
    }

    fn notify(&mut self) {
        let progress = self.progress();
        if let Some(callback) = self.on_progress.as_mut() {
            callback(&progress);
        }
    }
}

/// Lists the files a merge would read, without opening them.
pub fn scan(directory: &Path, raw_extension: &str) -> Result<Vec<SourceFile>> {
    let format = config::parse_extension(raw_extension)?;
    discover(directory, format)
}
