use indexmap::IndexSet;
use serde::Serialize;

use crate::error::{MergeError, Result};
use crate::model::{CellValue, Column, RowTable};

/// Figures recorded while reconciling the source tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MergeStats {
    /// Number of source tables merged.
    pub table_count: usize,
    /// Rows in the merged table.
    pub row_count: usize,
    /// Columns in the merged table.
    pub column_count: usize,
    /// Cells filled with null because their source lacked the column.
    pub filled_cells: usize,
}

/// Result of a merge: the reconciled table and how it was built.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    table: RowTable,
    stats: MergeStats,
}

impl MergedTable {
    pub fn table(&self) -> &RowTable {
        &self.table
    }

    pub fn stats(&self) -> MergeStats {
        self.stats
    }
}

/// Concatenates `tables` into one table whose columns are the union of all
/// source columns in first-seen order.
///
/// Rows keep their order: by source table first, then by position within
/// the table. Cells for columns a source lacks are null. Values are moved
/// as-is, so a column may mix types across sources.
pub fn merge(tables: Vec<RowTable>) -> Result<MergedTable> {
    if tables.is_empty() {
        return Err(MergeError::NoValidData {
            failures: Vec::new(),
        });
    }

    let union: IndexSet<String> = tables
        .iter()
        .flat_map(|table| table.columns().iter().map(|column| column.name.clone()))
        .collect();

    let table_count = tables.len();
    let row_count: usize = tables.iter().map(RowTable::row_count).sum();

    let mut merged: Vec<Column> = union
        .iter()
        .map(|name| Column::new(name.clone(), Vec::with_capacity(row_count)))
        .collect();
    let mut filled_cells = 0;

    for table in tables {
        let rows = table.row_count();
        let mut source: Vec<Option<Vec<CellValue>>> = vec![None; merged.len()];
        for column in table.into_columns() {
            if let Some(index) = union.get_index_of(&column.name) {
                source[index] = Some(column.cells);
            }
        }

        for (target, cells) in merged.iter_mut().zip(source) {
            match cells {
                Some(cells) => target.cells.extend(cells),
                None => {
                    target.cells.resize(target.cells.len() + rows, CellValue::Null);
                    filled_cells += rows;
                }
            }
        }
    }

    let table = RowTable::from_columns(merged)?;
    let stats = MergeStats {
        table_count,
        row_count: table.row_count(),
        column_count: table.column_count(),
        filled_cells,
    };

    Ok(MergedTable { table, stats })
}
