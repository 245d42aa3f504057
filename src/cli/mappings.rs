use comfy_table::{Cell, Table};

use super::{open_db, print_json};
use crate::error::Result;
use crate::mappings::{create_mapping, delete_mapping, list_mappings, update_mapping};

pub fn list(json: bool) -> Result<()> {
    let conn = open_db()?;
    let mappings = list_mappings(&conn)?;
    if json {
        return print_json(&mappings);
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Keyword", "Category"]);
    for m in &mappings {
        table.add_row(vec![Cell::new(m.id), Cell::new(&m.keyword), Cell::new(&m.category)]);
    }
    println!("Mappings\n{table}");
    Ok(())
}

pub fn add(keyword: &str, category: &str, json: bool) -> Result<()> {
    let conn = open_db()?;
    let created = create_mapping(&conn, keyword, category)?;
    if json {
        return print_json(&created);
    }
    println!(
        "Added mapping {}: '{}' \u{2192} {} ({} records updated)",
        created.mapping.id, created.mapping.keyword, created.mapping.category, created.updated_transactions_count
    );
    Ok(())
}

pub fn update(id: i64, keyword: Option<&str>, category: Option<&str>, json: bool) -> Result<()> {
    let conn = open_db()?;
    let m = update_mapping(&conn, id, keyword, category)?;
    if json {
        return print_json(&m);
    }
    println!("Updated mapping {id}: '{}' \u{2192} {}", m.keyword, m.category);
    Ok(())
}

pub fn delete(id: i64, json: bool) -> Result<()> {
    let conn = open_db()?;
    let m = delete_mapping(&conn, id)?;
    if json {
        return print_json(&m);
    }
    println!("Deleted mapping {id}: '{}' \u{2192} {}", m.keyword, m.category);
    Ok(())
}
