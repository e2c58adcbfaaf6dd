//! Core library for the sheet-merge command line application.
//!
//! The library merges every spreadsheet of one format found in a directory
//! into a single workbook. Responsibilities are kept narrow: parameter
//! validation lives in [`config`], input listing in [`discover`], the
//! spreadsheet adapters under [`io`], in-memory tables in [`model`], schema
//! reconciliation in [`merge`], and the run state machine in [`orchestrate`].

pub mod config;
pub mod discover;
pub mod error;
pub mod io;
pub mod merge;
pub mod model;
pub mod orchestrate;

pub use config::MergeConfig;
pub use error::{MergeError, ReadFailure, Result};
pub use orchestrate::{MergeOrchestrator, MergeReport, MergeRequest, MergeState, Progress};
