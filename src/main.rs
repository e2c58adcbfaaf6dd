use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sheet_merge::orchestrate::{self, MergeOrchestrator, MergeRequest};
use sheet_merge::{MergeError, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        if let MergeError::NoValidData { failures } = &error {
            for failure in failures {
                eprintln!("  {failure}");
            }
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose)?;
    match cli.command {
        Command::Merge(args) => execute_merge(args),
        Command::Scan(args) => execute_scan(args),
    }
}

/// `RUST_LOG` takes precedence; otherwise `--verbose` selects DEBUG and the
/// default is WARN.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| MergeError::Logging(err.to_string()))
}

fn execute_merge(args: MergeArgs) -> Result<()> {
    let request = MergeRequest {
        directory: args.directory,
        extension: args.ext,
        header_rows: args.header_rows,
        output_name: args.output,
        add_provenance: args.provenance,
        output_extension: args.output_ext,
    };

    let mut orchestrator = MergeOrchestrator::new();
    let report = orchestrator.run(&request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
        for failure in &report.failures {
            println!("  skipped {failure}");
        }
    }
    Ok(())
}

fn execute_scan(args: ScanArgs) -> Result<()> {
    let files = orchestrate::scan(&args.directory, &args.ext)?;
    for file in &files {
        println!("{}", file.name);
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Merge a directory of spreadsheets into a single workbook."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Merge every matching spreadsheet in a directory.
    Merge(MergeArgs),
    /// List the spreadsheets a merge would read.
    Scan(ScanArgs),
}

#[derive(clap::Args)]
struct MergeArgs {
    /// Directory holding the spreadsheets; the output is written here too.
    directory: PathBuf,

    /// Extension of the files to merge.
    #[arg(long, default_value = ".xlsx")]
    ext: String,

    /// Number of header rows, counted from the top; the last one names the columns.
    #[arg(long, default_value = "1")]
    header_rows: String,

    /// Output file name, without extension.
    #[arg(long, default_value = "")]
    output: String,

    /// Add a leading column holding each row's source file name.
    #[arg(long)]
    provenance: bool,

    /// Write the output in another format than the inputs.
    #[arg(long)]
    output_ext: Option<String>,

    /// Print the merge report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct ScanArgs {
    /// Directory holding the spreadsheets.
    directory: PathBuf,

    /// Extension of the files to list.
    #[arg(long, default_value = ".xlsx")]
    ext: String,
}
