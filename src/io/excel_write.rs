use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tempfile::NamedTempFile;
use tracing::{info, instrument, warn};

use crate::config::MergeConfig;
use crate::error::{MergeError, Result};
use crate::io::format::SheetEncoder;
use crate::merge::MergedTable;
use crate::model::{CellValue, RowTable};

const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

/// Encoder producing plain `.xlsx` workbooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenXmlEncoder;

impl SheetEncoder for OpenXmlEncoder {
    fn name(&self) -> &'static str {
        "open-xml"
    }

    fn encode(&self, table: &RowTable) -> std::result::Result<Vec<u8>, String> {
        if table.row_count() + 1 > MAX_ROWS {
            return Err(format!(
                "{} data rows exceed the worksheet limit of {}",
                table.row_count(),
                MAX_ROWS - 1
            ));
        }
        if table.column_count() > MAX_COLUMNS {
            return Err(format!(
                "{} columns exceed the worksheet limit of {MAX_COLUMNS}",
                table.column_count()
            ));
        }
        encode_workbook(table).map_err(|err| err.to_string())
    }
}

fn encode_workbook(table: &RowTable) -> std::result::Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    let worksheet = workbook.add_worksheet();

    for (col_idx, column) in table.columns().iter().enumerate() {
        let col = col_idx as u16;
        worksheet.write_string(0, col, &column.name)?;

        for (row_idx, cell) in column.cells.iter().enumerate() {
            let row = (row_idx + 1) as u32;
            match cell {
                CellValue::Null => {}
                CellValue::Bool(value) => {
                    worksheet.write_boolean(row, col, *value)?;
                }
                CellValue::Int(value) => {
                    worksheet.write_number(row, col, *value as f64)?;
                }
                CellValue::Float(value) if value.is_finite() => {
                    worksheet.write_number(row, col, *value)?;
                }
                CellValue::Float(value) => {
                    worksheet.write_string(row, col, &value.to_string())?;
                }
                CellValue::Text(value) => {
                    worksheet.write_string(row, col, value)?;
                }
                CellValue::DateTime(serial) => {
                    let format = if serial.fract() == 0.0 {
                        &date_format
                    } else {
                        &datetime_format
                    };
                    worksheet.write_number_with_format(row, col, *serial, format)?;
                }
            }
        }
    }

    if table.column_count() > 0 {
        let last_col = (table.column_count() - 1) as u16;
        worksheet.autofilter(0, 0, table.row_count() as u32, last_col)?;
    }

    workbook.save_to_buffer()
}

/// Writes the merged table to `<directory>/<output_base_name><extension>`.
///
/// The workbook is encoded in memory, written to a temporary file in the same
/// directory and then renamed over the target, so a failed run leaves neither
/// a partial file nor a damaged earlier output. An existing file at the
/// target path is replaced.
#[instrument(level = "info", skip_all, fields(directory = %directory.display()))]
pub fn write_table(table: MergedTable, directory: &Path, config: &MergeConfig) -> Result<PathBuf> {
    let path = directory.join(config.output_file_name());
    let failure = |reason: String| MergeError::WriteFailure {
        path: path.clone(),
        reason,
    };

    let format = config.output_format();
    let encoder = format
        .encoder()
        .ok_or_else(|| failure(format!("no encoder registered for {format}")))?;
    let bytes = encoder.encode(table.table()).map_err(failure)?;

    if path.exists() {
        warn!(path = %path.display(), "overwriting existing output file");
    }
    let mut staged = NamedTempFile::new_in(directory).map_err(|err| failure(err.to_string()))?;
    staged
        .write_all(&bytes)
        .map_err(|err| failure(err.to_string()))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|err| failure(err.to_string()))?;
    staged
        .persist(&path)
        .map_err(|err| failure(err.error.to_string()))?;

    info!(
        path = %path.display(),
        encoder = encoder.name(),
        bytes = bytes.len(),
        "merged workbook written"
    );
    Ok(path)
}
