pub mod cards;
pub mod categorize;
pub mod import;
pub mod init;
pub mod mappings;
pub mod report;
pub mod status;
pub mod transactions;

use std::sync::OnceLock;

use clap::{Parser, Subcommand};
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::get_connection;
use crate::error::{GagyebuError, Result};
use crate::models::AccountType;
use crate::settings::db_path;

/// clap value parser for `YYYY-MM` period keys.
pub(crate) fn parse_month(value: &str) -> std::result::Result<String, String> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$"))
        .as_ref()
        .map_err(|e| e.to_string())?;
    if pattern.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(format!("expected YYYY-MM, got {value:?}"))
    }
}

fn parse_account_type(value: &str) -> std::result::Result<AccountType, String> {
    value.parse().map_err(|e: GagyebuError| e.to_string())
}

/// Opens the configured database, refusing to create one implicitly.
pub(crate) fn open_db() -> Result<Connection> {
    let path = db_path();
    if !path.exists() {
        return Err(GagyebuError::Settings(format!(
            "No database found at {}\nRun `gagyebu init` to create one.",
            path.display()
        )));
    }
    get_connection(&path)
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

#[derive(Parser)]
#[command(name = "gagyebu", about = "Household account book for Korean bank and card statements.")]
pub struct Cli {
    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for gagyebu data (default: ~/Documents/gagyebu)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Import a bank or card statement spreadsheet.
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
    /// Show the import log.
    Imports,
    /// Browse and edit bank transactions.
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommands,
    },
    /// Browse and edit card transactions.
    Cards {
        #[command(subcommand)]
        command: CardsCommands,
    },
    /// Manage keyword to category mappings.
    Mappings {
        #[command(subcommand)]
        command: MappingsCommands,
    },
    /// List the category labels.
    Categories,
    /// Re-run categorization on records without a category.
    Categorize,
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Show current database and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum ImportCommands {
    /// Import a bank statement (.xlsx/.xls).
    Bank {
        file: String,
        /// living or reservoir (default from settings)
        #[arg(long = "account-type", value_parser = parse_account_type)]
        account_type: Option<AccountType>,
    },
    /// Import a card statement (.xlsx/.xls).
    Card {
        file: String,
        /// Whose card this statement belongs to
        #[arg(long)]
        holder: String,
    },
}

#[derive(Subcommand)]
pub enum TransactionsCommands {
    /// List bank transactions, newest first.
    List {
        /// Month: YYYY-MM
        #[arg(long, value_parser = parse_month)]
        month: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "account-type", value_parser = parse_account_type)]
        account_type: Option<AccountType>,
        #[arg(long, default_value_t = 0)]
        skip: i64,
        #[arg(long, default_value_t = crate::transactions::DEFAULT_LIMIT)]
        limit: i64,
    },
    /// Show one bank transaction.
    Show { id: i64 },
    /// Set the category of a bank transaction.
    SetCategory { id: i64, category: String },
    /// Delete a bank transaction.
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum CardsCommands {
    /// List card transactions, newest first.
    List {
        #[arg(long)]
        holder: Option<String>,
        /// Month: YYYY-MM
        #[arg(long, value_parser = parse_month)]
        month: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long, default_value_t = crate::transactions::DEFAULT_LIMIT)]
        limit: i64,
    },
    /// List card holders.
    Holders,
    /// List months with card activity.
    Months,
    /// Change the category and/or memo of a card transaction.
    Update {
        id: i64,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        memo: Option<String>,
    },
    /// Delete a card transaction.
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum MappingsCommands {
    /// List mappings in match order.
    List,
    /// Add a mapping and apply it to uncategorized records.
    Add { keyword: String, category: String },
    /// Change a mapping's keyword and/or category.
    Update {
        id: i64,
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Delete a mapping.
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Income, expense and balances for a month.
    Monthly {
        #[arg(value_parser = parse_month)]
        month: String,
        #[arg(long = "account-type", value_parser = parse_account_type)]
        account_type: Option<AccountType>,
    },
    /// Expense breakdown by category for a month.
    Categories {
        #[arg(value_parser = parse_month)]
        month: String,
        #[arg(long = "account-type", value_parser = parse_account_type)]
        account_type: Option<AccountType>,
    },
    /// Months that have bank transactions.
    Months {
        #[arg(long = "account-type", value_parser = parse_account_type)]
        account_type: Option<AccountType>,
    },
    /// Sum of the latest balance of each account.
    Assets {
        #[arg(long, value_parser = parse_month)]
        month: Option<String>,
        #[arg(long = "account-type", value_parser = parse_account_type)]
        account_type: Option<AccountType>,
    },
    /// Card spend per holder.
    CardUsers {
        #[arg(long, value_parser = parse_month)]
        month: Option<String>,
    },
    /// Card spend per month and holder.
    CardMonthly {
        #[arg(long)]
        holder: Option<String>,
    },
    /// Card spend per category and holder.
    CardCategories {
        #[arg(long, value_parser = parse_month)]
        month: Option<String>,
        #[arg(long)]
        holder: Option<String>,
    },
}
