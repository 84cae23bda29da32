//! Standalone connectivity check for the knowledge spreadsheet.
//!
//! Signs in with the configured service account, lists the sheets and
//! reads every tab the bot depends on, reporting missing sheets, missing
//! columns and rows the bot would skip.

use std::process::ExitCode;

use clap::Parser;

use uml_student_bot::config::SheetsConfig;
use uml_student_bot::knowledge::Tab;
use uml_student_bot::lookup::invalid_rows;
use uml_student_bot::sheets::{GoogleSheetsClient, SheetSource};

/// Knowledge spreadsheet checker.
#[derive(Parser, Debug)]
#[command(name = "check_sheets")]
#[command(about = "Checks access to the knowledge spreadsheet and validates its tabs")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Print the columns of each tab and every invalid row.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let _ = dotenvy::from_filename(&args.env_file);

    let config = match SheetsConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("✗ Failed to load spreadsheet configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Spreadsheet: {}", config.spreadsheet_id);
    println!("Service account: {}\n", config.credentials.client_email);

    let client = match GoogleSheetsClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("✗ Failed to create Sheets client: {e}");
            return ExitCode::FAILURE;
        }
    };
    check_spreadsheet(&client, args.verbose).await
}

async fn check_spreadsheet(client: &GoogleSheetsClient, verbose: bool) -> ExitCode {
    let info = match client.spreadsheet_info().await {
        Ok(info) => info,
        Err(e) => {
            eprintln!("✗ Cannot open the spreadsheet: {e}");
            eprintln!("  Share it with the service account email shown above.");
            return ExitCode::FAILURE;
        }
    };

    println!("✓ Connected to \"{}\"", info.title);
    println!("  Sheets: {}\n", info.sheet_titles.join(", "));

    let mut errors = 0;
    let mut warnings = 0;

    for tab in Tab::ALL {
        if !info.sheet_titles.iter().any(|t| t == tab.sheet_name()) {
            errors += 1;
            println!("✗ {tab}: sheet not found");
            continue;
        }

        let records = match client.fetch_tab(tab).await {
            Ok(records) => records,
            Err(e) => {
                errors += 1;
                println!("✗ {tab}: {e}");
                continue;
            }
        };

        let missing: Vec<&str> = tab
            .required_columns()
            .iter()
            .copied()
            .filter(|column| records.first().is_some_and(|r| !r.contains_key(*column)))
            .collect();
        if !missing.is_empty() {
            errors += 1;
            println!("✗ {tab}: missing columns {}", missing.join(", "));
            continue;
        }

        if verbose && let Some(first) = records.first() {
            let mut columns: Vec<&str> = first.keys().map(String::as_str).collect();
            columns.sort_unstable();
            println!("  {tab} columns: {}", columns.join(", "));
        }

        let invalid = invalid_rows(tab, &records);
        if records.is_empty() {
            warnings += 1;
            println!("⚠ {tab}: no rows");
        } else if invalid.is_empty() {
            println!("✓ {tab}: {} rows", records.len());
        } else {
            warnings += 1;
            println!(
                "⚠ {tab}: {} rows, {} will be skipped",
                records.len(),
                invalid.len()
            );
            if verbose {
                for (row, e) in &invalid {
                    println!("    row {row}: {e}");
                }
            }
        }
    }

    println!();
    if errors == 0 {
        println!("✓ All {} tabs are readable", Tab::ALL.len());
        if warnings > 0 {
            println!("  ({warnings} warning(s))");
        }
        ExitCode::SUCCESS
    } else {
        println!("✗ Check failed: {errors} error(s)");
        ExitCode::FAILURE
    }
}
