//! Spreadsheet adapters: the format registry plus the calamine-backed readers
//! and the rust_xlsxwriter-backed writer.

pub mod excel_read;
pub mod excel_write;
pub mod format;

pub use format::{SheetDecoder, SheetEncoder, SheetFormat, SheetGrid};
