use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{DataType, Range, Reader, Xls, Xlsx, open_workbook};
use tracing::{debug, instrument};

use crate::config::MergeConfig;
use crate::discover::SourceFile;
use crate::error::ReadFailure;
use crate::io::format::{SheetDecoder, SheetGrid};
use crate::model::{CellValue, Column, RowTable, unique_name};

/// Name of the column holding each row's source file name.
pub const PROVENANCE_COLUMN: &str = "source_file";

/// Decoder for `.xlsx` and `.xlsm` workbooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenXmlDecoder;

impl SheetDecoder for OpenXmlDecoder {
    fn name(&self) -> &'static str {
        "open-xml"
    }

    fn decode(&self, path: &Path) -> Result<SheetGrid, String> {
        decode_first_sheet::<Xlsx<BufReader<File>>>(path)
    }
}

/// Decoder for legacy `.xls` workbooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyXlsDecoder;

impl SheetDecoder for LegacyXlsDecoder {
    fn name(&self) -> &'static str {
        "biff"
    }

    fn decode(&self, path: &Path) -> Result<SheetGrid, String> {
        decode_first_sheet::<Xls<BufReader<File>>>(path)
    }
}

fn decode_first_sheet<W>(path: &Path) -> Result<SheetGrid, String>
where
    W: Reader<BufReader<File>>,
    W::Error: Display,
{
    let mut workbook = open_workbook::<W, _>(path).map_err(|err| err.to_string())?;
    match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => Ok(grid_from_range(&range)),
        Some(Err(err)) => Err(err.to_string()),
        None => Err("workbook contains no worksheets".to_string()),
    }
}

fn grid_from_range(range: &Range<DataType>) -> SheetGrid {
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let rows = range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect();
    SheetGrid { first_row, rows }
}

fn cell_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::Empty => CellValue::Null,
        DataType::String(value) if value.is_empty() => CellValue::Null,
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) => CellValue::Float(*value),
        DataType::Int(value) => CellValue::Int(*value),
        DataType::Bool(value) => CellValue::Bool(*value),
        DataType::DateTime(value) => CellValue::DateTime(*value),
        other => CellValue::Text(other.to_string()),
    }
}

/// Loads one source file into a [`RowTable`].
///
/// The first `header_row_count - 1` sheet rows are skipped, the next one
/// names the columns and every later row is data. Any problem is returned
/// as a [`ReadFailure`] so the caller can carry on with the other files.
#[instrument(level = "debug", skip_all, fields(file = %source.name))]
pub fn read_table(source: &SourceFile, config: &MergeConfig) -> Result<RowTable, ReadFailure> {
    let failure = |reason: String| ReadFailure {
        file: source.name.clone(),
        path: source.path.clone(),
        reason,
    };

    let decoder = config.extension().decoder();
    debug!(decoder = decoder.name(), "decoding workbook");
    let grid = decoder.decode(&source.path).map_err(failure)?;

    let mut table = table_from_grid(&grid, config.header_row_count()).map_err(failure)?;

    if config.add_provenance_column() {
        let cells = vec![CellValue::Text(source.name.clone()); table.row_count()];
        table
            .prepend_column(Column::new(PROVENANCE_COLUMN, cells))
            .map_err(|err| failure(err.to_string()))?;
    }

    debug!(
        rows = table.row_count(),
        columns = table.column_count(),
        "table loaded"
    );
    Ok(table)
}

fn table_from_grid(grid: &SheetGrid, header_row_count: usize) -> Result<RowTable, String> {
    let total_rows = grid.total_rows();
    if total_rows == 0 {
        return Ok(RowTable::default());
    }

    let header_index = header_row_count - 1;
    let header_cells = grid.row(header_index).ok_or_else(|| {
        format!("header row {header_row_count} is past the last row of the sheet ({total_rows})")
    })?;

    let width = grid.rows.iter().map(Vec::len).max().unwrap_or(0);
    let header = column_names(header_cells, width);

    let rows = (header_index + 1..total_rows)
        .map(|index| grid.row(index).map(<[CellValue]>::to_vec).unwrap_or_default())
        .collect();

    RowTable::from_rows(header, rows).map_err(|err| err.to_string())
}

/// Turns header cells into unique column names. Blank cells become
/// `Unnamed: <index>` and repeated names get a `.N` suffix.
fn column_names(cells: &[CellValue], width: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(width);
    for index in 0..width {
        let label = cells.get(index).map(CellValue::to_label).unwrap_or_default();
        let label = if label.trim().is_empty() {
            format!("Unnamed: {index}")
        } else {
            label
        };

        let name = if names.contains(&label) {
            unique_name(&label, &names)
        } else {
            label
        };
        names.push(name);
    }
    names
}
