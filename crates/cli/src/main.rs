// rowmend - headless correction workflow for ETL result sets

mod commands;
mod exit_codes;
mod snapshot;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "rowmend")]
#[command(about = "Correct invalid ETL rows and reconcile revalidation verdicts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pass/fail/fixed counts for a results snapshot
    #[command(after_help = "\
Examples:
  rowmend status results.json
  rowmend status results.json --errors
  rowmend status results.json --json | jq .summary.failed")]
    Status {
        /// Results snapshot file (the backend's upload/reprocess response)
        snapshot: PathBuf,

        /// Machine-readable output
        #[arg(long)]
        json: bool,

        /// List every invalid row with its error entries
        #[arg(long)]
        errors: bool,
    },

    /// Correct one invalid row and resubmit it for revalidation
    #[command(after_help = "\
Examples:
  rowmend fix results.json --row 7 --set email=a@b.com
  rowmend fix results.json --row BK7 --entity books --set 'title=Dune'
  rowmend fix results.json --index 0 --set full_name='Nguyen Thi Ha' --set price=45000.50")]
    Fix {
        /// Results snapshot file; rewritten in place after the verdict lands
        snapshot: PathBuf,

        /// Row identity (id / book_id / customer_id value)
        #[arg(long)]
        row: Option<String>,

        /// Positional index in the errors bucket, for rows without a key
        #[arg(long, conflicts_with = "row")]
        index: Option<usize>,

        /// Restrict the row lookup to one entity (books, customers, ...)
        #[arg(long)]
        entity: Option<String>,

        /// Field correction, field=value. Repeatable.
        #[arg(long, value_name = "FIELD=VALUE")]
        set: Vec<String>,

        /// Backend API base URL
        #[arg(long, env = "ROWMEND_API_BASE", default_value = "http://localhost:8080/api/etl")]
        api_base: String,

        /// Write the updated snapshot here instead of in place
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Export the cleaned result set as CSV (refused while errors remain)
    #[command(after_help = "\
Examples:
  rowmend export results.json -o cleaned.csv
  rowmend export results.json -o cleaned.csv --local")]
    Export {
        /// Results snapshot file
        snapshot: PathBuf,

        /// Output CSV file
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Backend API base URL
        #[arg(long, env = "ROWMEND_API_BASE", default_value = "http://localhost:8080/api/etl")]
        api_base: String,

        /// Build the CSV locally instead of asking the backend
        #[arg(long)]
        local: bool,
    },

    /// Load the cleaned result set into the source database (refused while
    /// errors remain)
    #[command(after_help = "\
Examples:
  rowmend load results.json
  ROWMEND_API_BASE=http://etl.internal/api/etl rowmend load results.json")]
    Load {
        /// Results snapshot file
        snapshot: PathBuf,

        /// Backend API base URL
        #[arg(long, env = "ROWMEND_API_BASE", default_value = "http://localhost:8080/api/etl")]
        api_base: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Status { snapshot, json, errors } => commands::cmd_status(snapshot, json, errors),
        Commands::Fix {
            snapshot,
            row,
            index,
            entity,
            set,
            api_base,
            output,
        } => commands::cmd_fix(snapshot, row, index, entity, set, api_base, output),
        Commands::Export { snapshot, output, api_base, local } => {
            commands::cmd_export(snapshot, output, api_base, local)
        }
        Commands::Load { snapshot, api_base } => commands::cmd_load(snapshot, api_base),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}
