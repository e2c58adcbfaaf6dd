use std::fs;
use std::path::Path;

use rust_xlsxwriter::Workbook;
use serde_json::{Value, json};
use sheet_merge::config;
use sheet_merge::discover::{SourceFile, discover};
use sheet_merge::io::SheetFormat;
use sheet_merge::io::excel_read::{PROVENANCE_COLUMN, read_table};
use sheet_merge::model::{CellValue, RowTable};
use sheet_merge::{MergeError, MergeOrchestrator, MergeRequest, MergeState};
use tempfile::tempdir;

/// Writes a single-sheet workbook whose rows are JSON arrays of scalars.
fn write_fixture(path: &Path, rows: Value) {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (row_idx, row) in rows.as_array().expect("rows array").iter().enumerate() {
        for (col_idx, cell) in row.as_array().expect("row array").iter().enumerate() {
            let (row, col) = (row_idx as u32, col_idx as u16);
            match cell {
                Value::String(text) => {
                    worksheet.write_string(row, col, text).expect("string cell");
                }
                Value::Number(number) => {
                    worksheet
                        .write_number(row, col, number.as_f64().expect("finite number"))
                        .expect("number cell");
                }
                Value::Bool(flag) => {
                    worksheet.write_boolean(row, col, *flag).expect("bool cell");
                }
                _ => {}
            }
        }
    }
    workbook.save(path).expect("fixture written");
}

fn read_output(path: &Path) -> RowTable {
    let config = config::validate(".xlsx", "1", "unused", false).expect("config");
    read_table(&SourceFile::new(path.to_path_buf()), &config).expect("output readable")
}

fn request(directory: &Path, output_name: &str) -> MergeRequest {
    MergeRequest {
        output_name: output_name.to_string(),
        ..MergeRequest::new(directory)
    }
}

#[test]
fn merges_heterogeneous_files_with_column_union() {
    let dir = tempdir().expect("temporary directory");
    write_fixture(
        &dir.path().join("a.xlsx"),
        json!([["id", "name"], [1, "Alice"], [2, "Bob"]]),
    );
    write_fixture(&dir.path().join("b.xlsx"), json!([["id", "age"], [3, 41]]));

    let mut orchestrator = MergeOrchestrator::new();
    let report = orchestrator
        .run(&request(dir.path(), "out"))
        .expect("merge succeeds");

    assert_eq!(report.output_path, dir.path().join("out.xlsx"));
    assert_eq!(report.files_discovered, 2);
    assert_eq!(report.files_read, 2);
    assert!(report.failures.is_empty());
    assert_eq!((report.row_count, report.column_count), (3, 3));
    assert_eq!(orchestrator.state(), MergeState::Done);

    let output = read_output(&report.output_path);
    assert_eq!(output.column_names(), vec!["id", "name", "age"]);
    assert_eq!(output.row_count(), 3);
    assert_eq!(output.cell(0, "name"), Some(&CellValue::Text("Alice".into())));
    assert_eq!(output.cell(1, "age"), Some(&CellValue::Null));
    assert_eq!(output.cell(2, "id"), Some(&CellValue::Float(3.0)));
    assert_eq!(output.cell(2, "name"), Some(&CellValue::Null));
    assert_eq!(output.cell(2, "age"), Some(&CellValue::Float(41.0)));
}

#[test]
fn corrupt_file_is_reported_and_skipped() {
    let dir = tempdir().expect("temporary directory");
    write_fixture(&dir.path().join("a.xlsx"), json!([["id"], [1], [2]]));
    fs::write(dir.path().join("bad.xlsx"), b"definitely not a zip archive").expect("corrupt file");
    write_fixture(&dir.path().join("c.xlsx"), json!([["id"], [3]]));

    let report = MergeOrchestrator::new()
        .run(&request(dir.path(), "merged"))
        .expect("partial failures are not fatal");

    assert_eq!(report.files_discovered, 3);
    assert_eq!(report.files_read, 2);
    assert_eq!(report.files_failed(), 1);
    assert_eq!(report.failures[0].file, "bad.xlsx");
    assert!(!report.failures[0].reason.is_empty());
    assert!(report.summary().contains("1 failed"));

    let output = read_output(&report.output_path);
    let ids: Vec<CellValue> = output.column("id").expect("id column").cells.clone();
    assert_eq!(
        ids,
        vec![CellValue::Float(1.0), CellValue::Float(2.0), CellValue::Float(3.0)]
    );
}

#[test]
fn all_files_failing_is_fatal_and_writes_nothing() {
    let dir = tempdir().expect("temporary directory");
    fs::write(dir.path().join("one.xlsx"), b"junk").expect("corrupt file");
    fs::write(dir.path().join("two.xlsx"), b"more junk").expect("corrupt file");

    let mut orchestrator = MergeOrchestrator::new();
    let error = orchestrator
        .run(&request(dir.path(), "out"))
        .expect_err("nothing to merge");

    match error {
        MergeError::NoValidData { failures } => assert_eq!(failures.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(orchestrator.state(), MergeState::Failed);
    assert!(!dir.path().join("out.xlsx").exists());
}

#[test]
fn provenance_column_is_first_and_names_the_source() {
    let dir = tempdir().expect("temporary directory");
    write_fixture(&dir.path().join("north.xlsx"), json!([["city"], ["Oslo"], ["Bergen"]]));
    write_fixture(&dir.path().join("south.xlsx"), json!([["city", "pop"], ["Rome", 2.8]]));

    let report = MergeOrchestrator::new()
        .run(&MergeRequest {
            add_provenance: true,
            ..request(dir.path(), "out")
        })
        .expect("merge succeeds");

    let output = read_output(&report.output_path);
    assert_eq!(output.column_names(), vec![PROVENANCE_COLUMN, "city", "pop"]);

    let origins: Vec<String> = output
        .column(PROVENANCE_COLUMN)
        .expect("provenance column")
        .cells
        .iter()
        .map(CellValue::to_label)
        .collect();
    assert_eq!(origins, vec!["north.xlsx", "north.xlsx", "south.xlsx"]);
}

#[test]
fn header_offset_leaves_source_rows_minus_header_rows() {
    let dir = tempdir().expect("temporary directory");
    let path = dir.path().join("report.xlsx");
    write_fixture(
        &path,
        json!([
            ["Quarterly report"],
            ["generated", "today"],
            ["id", "value"],
            [1, 10],
            [2, 20],
            [3, 30]
        ]),
    );
    let source = SourceFile::new(path);

    for header_rows in 1..=6usize {
        let config = config::validate(".xlsx", &header_rows.to_string(), "out", false)
            .expect("config");
        let table = read_table(&source, &config).expect("table read");
        assert_eq!(table.row_count(), 6 - header_rows, "header_rows = {header_rows}");
    }

    let config = config::validate(".xlsx", "3", "out", false).expect("config");
    let table = read_table(&source, &config).expect("table read");
    assert_eq!(table.column_names(), vec!["id", "value"]);

    let config = config::validate(".xlsx", "7", "out", false).expect("config");
    let failure = read_table(&source, &config).expect_err("header past last row");
    assert_eq!(failure.file, "report.xlsx");
}

#[test]
fn discovery_matches_extension_case_insensitively() {
    let dir = tempdir().expect("temporary directory");
    fs::write(dir.path().join("A.XLSX"), b"").expect("file");
    fs::write(dir.path().join("b.xlsx"), b"").expect("file");
    fs::write(dir.path().join("c.xlsm"), b"").expect("file");
    fs::write(dir.path().join("notes.txt"), b"").expect("file");
    fs::create_dir(dir.path().join("folder.xlsx")).expect("directory");

    let files = discover(dir.path(), SheetFormat::Xlsx).expect("files found");
    let names: Vec<&str> = files.iter().map(|file| file.name.as_str()).collect();
    assert_eq!(names, vec!["A.XLSX", "b.xlsx"]);
}

#[test]
fn discovery_errors_are_fatal() {
    let dir = tempdir().expect("temporary directory");
    fs::write(dir.path().join("notes.txt"), b"").expect("file");

    let missing = dir.path().join("missing");
    assert!(matches!(
        discover(&missing, SheetFormat::Xlsx),
        Err(MergeError::DirectoryNotFound(path)) if path == missing
    ));
    assert!(matches!(
        discover(dir.path(), SheetFormat::Xlsx),
        Err(MergeError::NoMatchingFiles { .. })
    ));

    let mut orchestrator = MergeOrchestrator::new();
    assert!(orchestrator.run(&request(&missing, "out")).is_err());
    assert_eq!(orchestrator.state(), MergeState::Failed);
}

#[test]
fn progress_is_monotonic_and_completes_after_write() {
    let dir = tempdir().expect("temporary directory");
    write_fixture(&dir.path().join("a.xlsx"), json!([["x"], [1]]));
    fs::write(dir.path().join("b.xlsx"), b"junk").expect("corrupt file");
    write_fixture(&dir.path().join("c.xlsx"), json!([["x"], [2]]));

    let mut events = Vec::new();
    {
        let mut orchestrator = MergeOrchestrator::new().with_progress(|p| events.push(*p));
        orchestrator
            .run(&request(dir.path(), "out"))
            .expect("merge succeeds");
    }

    assert!(events.windows(2).all(|pair| pair[0].ratio <= pair[1].ratio));

    let first_complete = events
        .iter()
        .position(|event| event.ratio >= 1.0)
        .expect("progress completes");
    assert_eq!(events[first_complete].state, MergeState::Writing);
    assert!(
        events[..first_complete]
            .iter()
            .all(|event| event.ratio <= 0.9 + f64::EPSILON)
    );

    let mut states: Vec<MergeState> = events.iter().map(|event| event.state).collect();
    states.dedup();
    assert_eq!(
        states,
        vec![
            MergeState::Validating,
            MergeState::Discovering,
            MergeState::Reading,
            MergeState::Merging,
            MergeState::Writing,
            MergeState::Done,
        ]
    );
}

#[test]
fn existing_output_is_overwritten() {
    let dir = tempdir().expect("temporary directory");
    write_fixture(&dir.path().join("input.xlsm"), json!([["k"], ["v"]]));
    fs::write(dir.path().join("result.xlsx"), b"stale contents").expect("stale output");

    let report = MergeOrchestrator::new()
        .run(&MergeRequest {
            extension: "xlsm".into(),
            output_extension: Some(".xlsx".into()),
            ..request(dir.path(), "result")
        })
        .expect("merge succeeds");

    assert_eq!(report.output_path, dir.path().join("result.xlsx"));
    let output = read_output(&report.output_path);
    assert_eq!(output.cell(0, "k"), Some(&CellValue::Text("v".into())));
}

#[test]
fn unwritable_target_is_a_write_failure() {
    let dir = tempdir().expect("temporary directory");
    write_fixture(&dir.path().join("a.xlsx"), json!([["x"], [1]]));
    fs::create_dir(dir.path().join("out.xlsx")).expect("directory in the way");

    let mut orchestrator = MergeOrchestrator::new();
    let error = orchestrator
        .run(&request(dir.path(), "out"))
        .expect_err("target is a directory");

    assert!(matches!(error, MergeError::WriteFailure { .. }));
    assert_eq!(orchestrator.state(), MergeState::Failed);

    let mut left: Vec<String> = fs::read_dir(dir.path())
        .expect("listing")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    left.sort();
    assert_eq!(left, vec!["a.xlsx", "out.xlsx"], "no staging file left behind");
    assert!(dir.path().join("out.xlsx").is_dir());
}

#[test]
fn macro_enabled_inputs_need_a_plain_output_extension() {
    let dir = tempdir().expect("temporary directory");
    write_fixture(&dir.path().join("input.xlsm"), json!([["k"], ["v"]]));

    let mut orchestrator = MergeOrchestrator::new();
    let error = orchestrator
        .run(&MergeRequest {
            extension: ".xlsm".into(),
            ..request(dir.path(), "out")
        })
        .expect_err("xlsm cannot be written");

    assert!(matches!(error, MergeError::InvalidConfig(_)));
    assert!(!dir.path().join("out.xlsm").exists());
}

#[cfg(unix)]
#[test]
fn dangling_symlinks_do_not_abort_discovery() {
    use std::os::unix::fs::symlink;

    let dir = tempdir().expect("temporary directory");
    write_fixture(&dir.path().join("a.xlsx"), json!([["x"], [1]]));
    symlink(dir.path().join("gone.txt"), dir.path().join("stale-link.txt")).expect("symlink");
    symlink(dir.path().join("gone.xlsx"), dir.path().join("ghost.xlsx")).expect("symlink");

    let files = discover(dir.path(), SheetFormat::Xlsx).expect("files found");
    let names: Vec<&str> = files.iter().map(|file| file.name.as_str()).collect();
    assert_eq!(names, vec!["a.xlsx", "ghost.xlsx"]);

    let report = MergeOrchestrator::new()
        .run(&request(dir.path(), "out"))
        .expect("merge succeeds");
    assert_eq!(report.files_read, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].file, "ghost.xlsx");
}

#[test]
fn legacy_inputs_are_read_with_their_own_decoder() {
    let dir = tempdir().expect("temporary directory");
    fs::write(dir.path().join("old.xls"), b"not a compound document").expect("corrupt xls");

    let error = MergeOrchestrator::new()
        .run(&MergeRequest {
            extension: ".xls".into(),
            output_extension: Some(".xlsx".into()),
            ..request(dir.path(), "out")
        })
        .expect_err("only input is corrupt");

    match error {
        MergeError::NoValidData { failures } => assert_eq!(failures[0].file, "old.xls"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn report_serialises_to_json() {
    let dir = tempdir().expect("temporary directory");
    write_fixture(&dir.path().join("a.xlsx"), json!([["x"], [1]]));

    let report = MergeOrchestrator::new()
        .run(&request(dir.path(), "out"))
        .expect("merge succeeds");
    let value = serde_json::to_value(&report).expect("report serialises");

    assert_eq!(value["files_read"], json!(1));
    assert_eq!(value["input_format"], json!("xlsx"));
    assert_eq!(value["stats"]["row_count"], json!(1));
}
