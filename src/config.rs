use crate::error::{MergeError, Result};
use crate::io::format::SheetFormat;

/// Base name used when the user leaves the output name blank.
pub const DEFAULT_OUTPUT_NAME: &str = "merged";

/// Validated, immutable parameters of one merge run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    extension: SheetFormat,
    header_row_count: usize,
    output_base_name: String,
    add_provenance_column: bool,
    output_format: SheetFormat,
}

impl MergeConfig {
    /// Format of the input files, also used to filter the directory.
    pub fn extension(&self) -> SheetFormat {
        self.extension
    }

    /// Number of leading rows forming the header; the last one holds the
    /// column names.
    pub fn header_row_count(&self) -> usize {
        self.header_row_count
    }

    pub fn output_base_name(&self) -> &str {
        &self.output_base_name
    }

    pub fn add_provenance_column(&self) -> bool {
        self.add_provenance_column
    }

    /// Format written for the merged table.
    pub fn output_format(&self) -> SheetFormat {
        self.output_format
    }

    /// File name of the merged output, `<base><extension>`.
    pub fn output_file_name(&self) -> String {
        format!("{}{}", self.output_base_name, self.output_format.extension())
    }
}

/// Validates raw user input into a [`MergeConfig`] whose output format is the
/// input format.
pub fn validate(
    raw_extension: &str,
    raw_header_rows: &str,
    raw_output_name: &str,
    add_provenance: bool,
) -> Result<MergeConfig> {
    validate_with_output(
        raw_extension,
        raw_header_rows,
        raw_output_name,
        add_provenance,
        None,
    )
}

/// Like [`validate`], with an optional explicit output extension.
pub fn validate_with_output(
    raw_extension: &str,
    raw_header_rows: &str,
    raw_output_name: &str,
    add_provenance: bool,
    raw_output_extension: Option<&str>,
) -> Result<MergeConfig> {
    let extension = parse_extension(raw_extension)?;
    let header_row_count = parse_header_rows(raw_header_rows)?;
    let output_base_name = parse_output_name(raw_output_name)?;

    let output_format = match raw_output_extension {
        Some(raw) => parse_extension(raw)?,
        None => extension,
    };
    if output_format.encoder().is_none() {
        return Err(MergeError::InvalidConfig(format!(
            "{output_format} files can be read but not written; choose another output extension"
        )));
    }

    Ok(MergeConfig {
        extension,
        header_row_count,
        output_base_name,
        add_provenance_column: add_provenance,
        output_format,
    })
}

/// Normalizes a user-supplied extension (leading dot optional, any case)
/// into a supported format.
pub fn parse_extension(raw: &str) -> Result<SheetFormat> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MergeError::InvalidConfig(
            "file extension must not be empty".into(),
        ));
    }

    let dotted = if trimmed.starts_with('.') {
        trimmed.to_string()
    } else {
        format!(".{trimmed}")
    };

    SheetFormat::from_extension(&dotted).ok_or_else(|| {
        let supported: Vec<&str> = SheetFormat::ALL.iter().map(|f| f.extension()).collect();
        MergeError::InvalidConfig(format!(
            "unsupported file extension '{dotted}', expected one of {}",
            supported.join(", ")
        ))
    })
}

fn parse_header_rows(raw: &str) -> Result<usize> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MergeError::InvalidConfig(
            "header row count must not be empty".into(),
        ));
    }

    let count: usize = trimmed.parse().map_err(|_| {
        MergeError::InvalidConfig(format!(
            "header row count must be a whole number, got '{trimmed}'"
        ))
    })?;
    if count < 1 {
        return Err(MergeError::InvalidConfig(
            "header row count must be at least 1".into(),
        ));
    }
    Ok(count)
}

fn parse_output_name(raw: &str) -> Result<String> {
    let mut name = raw.trim();
    if name.contains(['/', '\\']) {
        return Err(MergeError::InvalidConfig(format!(
            "output name '{name}' must not contain a path separator"
        )));
    }

    // Strip repeatedly so that re-validating a normalized name is a no-op.
    while let Some(stem) = strip_sheet_extension(name) {
        name = stem.trim_end();
    }

    if name.is_empty() {
        Ok(DEFAULT_OUTPUT_NAME.to_string())
    } else {
        Ok(name.to_string())
    }
}

fn strip_sheet_extension(name: &str) -> Option<&str> {
    let dot = name.rfind('.')?;
    SheetFormat::from_extension(&name[dot..]).map(|_| &name[..dot])
}
