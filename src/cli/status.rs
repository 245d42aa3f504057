use serde::Serialize;

use super::print_json;
use crate::db::{get_connection, DB_FILE};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::load_settings;

#[derive(Debug, Default, Serialize)]
struct Counts {
    transactions: i64,
    card_transactions: i64,
    uncategorized: i64,
    mappings: i64,
    imports: i64,
}

#[derive(Debug, Serialize)]
struct Status {
    data_dir: String,
    database: String,
    default_account_type: String,
    db_size: Option<u64>,
    counts: Option<Counts>,
}

pub fn run(json: bool) -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join(DB_FILE);

    let mut status = Status {
        data_dir: data_dir.display().to_string(),
        database: db_path.display().to_string(),
        default_account_type: settings.account_type().label().to_string(),
        db_size: None,
        counts: None,
    };

    if db_path.exists() {
        status.db_size = Some(std::fs::metadata(&db_path)?.len());
        let conn = get_connection(&db_path)?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };
        status.counts = Some(Counts {
            transactions: count("SELECT count(*) FROM transactions")?,
            card_transactions: count("SELECT count(*) FROM card_transactions")?,
            uncategorized: count(
                "SELECT (SELECT count(*) FROM transactions WHERE category IS NULL OR category = '미분류') + \
                 (SELECT count(*) FROM card_transactions WHERE category IS NULL OR category = '미분류')",
            )?,
            mappings: count("SELECT count(*) FROM category_mappings")?,
            imports: count("SELECT count(*) FROM imports")?,
        });
    }

    if json {
        return print_json(&status);
    }

    println!("Data dir:      {}", status.data_dir);
    println!("Database:      {}", status.database);
    println!("Account type:  {}", status.default_account_type);

    match (status.db_size, &status.counts) {
        (Some(size), Some(c)) => {
            println!("DB size:       {}", format_bytes(size));
            println!();
            println!("Transactions:       {}", c.transactions);
            println!("Card transactions:  {}", c.card_transactions);
            println!("Uncategorized:      {}", c.uncategorized);
            println!("Mappings:           {}", c.mappings);
            println!("Imports:            {}", c.imports);
        }
        _ => {
            println!();
            println!("Database not found. Run `gagyebu init` to set up.");
        }
    }
    Ok(())
}
