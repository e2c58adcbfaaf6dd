use crate::error::{MergeError, Result};

/// A single cell value as decoded from a worksheet.
///
/// Values keep the type they were read with. Merging never coerces a column
/// to a common type, so one column may hold numbers from one file and text
/// from another.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// Empty cell, or a cell filled in by schema reconciliation.
    #[default]
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Floating point number literal.
    Float(f64),
    /// Plain string literal.
    Text(String),
    /// Date or time stored as a spreadsheet serial number.
    DateTime(f64),
}

impl CellValue {
    /// Renders the value as a column label. Integral floats drop their
    /// fractional part so that a numeric header `2024` reads as `2024`.
    pub fn to_label(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(value) => value.to_string(),
            CellValue::Int(value) => value.to_string(),
            CellValue::Float(value) | CellValue::DateTime(value) => format_number(*value),
            CellValue::Text(value) => value.clone(),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }
}

/// An in-memory table of uniquely named, equally long columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowTable {
    columns: Vec<Column>,
    row_count: usize,
}

impl RowTable {
    /// Builds a table from columns, checking that names are unique and all
    /// columns have the same length.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map(|column| column.cells.len()).unwrap_or(0);

        for (index, column) in columns.iter().enumerate() {
            if column.cells.len() != row_count {
                return Err(MergeError::InvalidTable(format!(
                    "column '{}' has {} cells, expected {row_count}",
                    column.name,
                    column.cells.len()
                )));
            }
            if columns[..index].iter().any(|other| other.name == column.name) {
                return Err(MergeError::InvalidTable(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }

        Ok(Self { columns, row_count })
    }

    /// Builds a table from a header and row-major data. Short rows are padded
    /// with nulls; cells beyond the header width are dropped.
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let mut columns: Vec<Column> = header
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.cells.push(cells.next().unwrap_or_default());
            }
        }

        Self::from_columns(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the cells of one row in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&CellValue>> {
        if index >= self.row_count {
            return None;
        }
        Some(self.columns.iter().map(|column| &column.cells[index]).collect())
    }

    /// Returns the cell at `row` in the column called `name`.
    pub fn cell(&self, row: usize, name: &str) -> Option<&CellValue> {
        self.column(name).and_then(|column| column.cells.get(row))
    }

    /// Inserts `column` as the first column. A column already carrying the
    /// same name is renamed with a numeric suffix.
    pub fn prepend_column(&mut self, column: Column) -> Result<()> {
        if self.columns.is_empty() {
            self.row_count = column.cells.len();
        } else if column.cells.len() != self.row_count {
            return Err(MergeError::InvalidTable(format!(
                "column '{}' has {} cells, expected {}",
                column.name,
                column.cells.len(),
                self.row_count
            )));
        }

        if let Some(position) = self.columns.iter().position(|c| c.name == column.name) {
            let mut taken: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
            taken.push(column.name.clone());
            let renamed = unique_name(&column.name, &taken);
            self.columns[position].name = renamed;
        }

        self.columns.insert(0, column);
        Ok(())
    }
}

/// Returns `base` with the smallest `.N` suffix not present in `taken`.
pub fn unique_name(base: &str, taken: &[String]) -> String {
    let mut counter = 1;
    loop {
        let candidate = format!("{base}.{counter}");
        if !taken.iter().any(|name| *name == candidate) {
            return candidate;
        }
        counter += 1;
    }
}
