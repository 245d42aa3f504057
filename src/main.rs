mod categorizer;
mod cli;
mod db;
mod error;
mod fmt;
mod importer;
mod mappings;
mod models;
mod reports;
mod settings;
mod transactions;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{
    CardsCommands, Cli, Commands, ImportCommands, MappingsCommands, ReportCommands, TransactionsCommands,
};

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json = cli.json;

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Import { command } => match command {
            ImportCommands::Bank { file, account_type } => cli::import::bank(&file, account_type, json),
            ImportCommands::Card { file, holder } => cli::import::card(&file, &holder, json),
        },
        Commands::Imports => cli::import::history(json),
        Commands::Transactions { command } => match command {
            TransactionsCommands::List {
                month,
                category,
                account_type,
                skip,
                limit,
            } => cli::transactions::list(month, category, account_type, skip, limit, json),
            TransactionsCommands::Show { id } => cli::transactions::show(id, json),
            TransactionsCommands::SetCategory { id, category } => {
                cli::transactions::set_category(id, &category, json)
            }
            TransactionsCommands::Delete { id } => cli::transactions::delete(id, json),
        },
        Commands::Cards { command } => match command {
            CardsCommands::List {
                holder,
                month,
                category,
                offset,
                limit,
            } => cli::cards::list(holder, month, category, offset, limit, json),
            CardsCommands::Holders => cli::cards::holders(json),
            CardsCommands::Months => cli::cards::months(json),
            CardsCommands::Update { id, category, memo } => {
                cli::cards::update(id, category.as_deref(), memo.as_deref(), json)
            }
            CardsCommands::Delete { id } => cli::cards::delete(id, json),
        },
        Commands::Mappings { command } => match command {
            MappingsCommands::List => cli::mappings::list(json),
            MappingsCommands::Add { keyword, category } => cli::mappings::add(&keyword, &category, json),
            MappingsCommands::Update { id, keyword, category } => {
                cli::mappings::update(id, keyword.as_deref(), category.as_deref(), json)
            }
            MappingsCommands::Delete { id } => cli::mappings::delete(id, json),
        },
        Commands::Categories => cli::categorize::list(json),
        Commands::Categorize => cli::categorize::run(json),
        Commands::Report { command } => match command {
            ReportCommands::Monthly { month, account_type } => cli::report::monthly(&month, account_type, json),
            ReportCommands::Categories { month, account_type } => {
                cli::report::categories(&month, account_type, json)
            }
            ReportCommands::Months { account_type } => cli::report::months(account_type, json),
            ReportCommands::Assets { month, account_type } => {
                cli::report::assets(month.as_deref(), account_type, json)
            }
            ReportCommands::CardUsers { month } => cli::report::card_users(month.as_deref(), json),
            ReportCommands::CardMonthly { holder } => cli::report::card_monthly(holder.as_deref(), json),
            ReportCommands::CardCategories { month, holder } => {
                cli::report::card_categories(month.as_deref(), holder.as_deref(), json)
            }
        },
        Commands::Status => cli::status::run(json),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
