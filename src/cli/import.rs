use std::path::PathBuf;

use comfy_table::{Cell, Table};

use super::{open_db, or_dash, print_json};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::importer::{import_bank_file, import_card_file, list_imports};
use crate::models::{AccountType, ImportManifest};
use crate::settings::load_settings;

fn report(manifest: &ImportManifest, json: bool) -> Result<()> {
    if json {
        return print_json(manifest);
    }
    println!(
        "{} parsed: {} imported, {} skipped (duplicates)",
        manifest.total_parsed, manifest.new_count, manifest.duplicate_count
    );
    if manifest.skipped_rows > 0 {
        println!("{} unreadable rows dropped (run with -v for details)", manifest.skipped_rows);
    }
    Ok(())
}

pub fn bank(file: &str, account_type: Option<AccountType>, json: bool) -> Result<()> {
    let conn = open_db()?;
    let account_type = account_type.unwrap_or_else(|| load_settings().account_type());
    let path = PathBuf::from(file);
    if !json {
        if let Ok(meta) = std::fs::metadata(&path) {
            println!("Importing {} ({}) into {account_type}", path.display(), format_bytes(meta.len()));
        }
    }
    let manifest = import_bank_file(&conn, &path, account_type)?;
    report(&manifest, json)
}

pub fn card(file: &str, holder: &str, json: bool) -> Result<()> {
    let conn = open_db()?;
    let manifest = import_card_file(&conn, &PathBuf::from(file), holder)?;
    report(&manifest, json)
}

pub fn history(json: bool) -> Result<()> {
    let conn = open_db()?;
    let records = list_imports(&conn)?;
    if json {
        return print_json(&records);
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Kind", "File", "Account / Holder", "Parsed", "New", "Dup", "Skipped", "Imported"]);
    for r in &records {
        let owner = r.account_type.as_deref().or(r.card_holder.as_deref());
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(&r.kind),
            Cell::new(&r.filename),
            Cell::new(or_dash(owner)),
            Cell::new(r.total_parsed),
            Cell::new(r.new_count),
            Cell::new(r.duplicate_count),
            Cell::new(r.skipped_rows),
            Cell::new(&r.imported_at),
        ]);
    }
    println!("Imports\n{table}");
    Ok(())
}
