use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::io::excel_read::{LegacyXlsDecoder, OpenXmlDecoder};
use crate::io::excel_write::OpenXmlEncoder;
use crate::model::{CellValue, RowTable};

/// Spreadsheet container formats known to the merger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetFormat {
    /// Legacy BIFF workbook.
    Xls,
    /// Open XML workbook.
    Xlsx,
    /// Open XML workbook with macros enabled.
    Xlsm,
}

impl SheetFormat {
    pub const ALL: [SheetFormat; 3] = [SheetFormat::Xls, SheetFormat::Xlsx, SheetFormat::Xlsm];

    /// Canonical, lower-case extension including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            SheetFormat::Xls => ".xls",
            SheetFormat::Xlsx => ".xlsx",
            SheetFormat::Xlsm => ".xlsm",
        }
    }

    /// Resolves a dotted extension, ignoring ASCII case.
    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(extension))
    }

    /// Decoder used to load files of this format.
    pub fn decoder(self) -> &'static dyn SheetDecoder {
        match self {
            SheetFormat::Xls => &LegacyXlsDecoder,
            SheetFormat::Xlsx | SheetFormat::Xlsm => &OpenXmlDecoder,
        }
    }

    /// Encoder used to write this format, if it can be written at all.
    /// `.xls` and `.xlsm` are read-only: the writer produces neither BIFF nor
    /// a macro-enabled container.
    pub fn encoder(self) -> Option<&'static dyn SheetEncoder> {
        match self {
            SheetFormat::Xlsx => Some(&OpenXmlEncoder),
            SheetFormat::Xls | SheetFormat::Xlsm => None,
        }
    }
}

impl fmt::Display for SheetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Raw contents of a worksheet's used range.
///
/// `first_row` is the absolute index of the first row in `rows`, so rows above
/// the used range still count towards header offsets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetGrid {
    pub first_row: usize,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetGrid {
    /// Number of sheet rows up to and including the last used one.
    pub fn total_rows(&self) -> usize {
        if self.rows.is_empty() {
            0
        } else {
            self.first_row + self.rows.len()
        }
    }

    /// Returns the row at an absolute index. Rows above the used range are
    /// reported as empty.
    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        if index >= self.total_rows() {
            return None;
        }
        match index.checked_sub(self.first_row) {
            Some(offset) => self.rows.get(offset).map(Vec::as_slice),
            None => Some(&[][..]),
        }
    }
}

/// Reads the first worksheet of a file into a [`SheetGrid`].
pub trait SheetDecoder: Sync {
    fn name(&self) -> &'static str;

    /// Errors are returned as human readable reasons; the caller turns them
    /// into per-file failures.
    fn decode(&self, path: &Path) -> Result<SheetGrid, String>;
}

/// Encodes a table into the bytes of a single-sheet workbook.
pub trait SheetEncoder: Sync {
    fn name(&self) -> &'static str;

    fn encode(&self, table: &RowTable) -> Result<Vec<u8>, String>;
}
