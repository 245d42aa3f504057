use comfy_table::{Cell, Table};

use super::transactions::amount_cell;
use super::{open_db, or_dash, print_json};
use crate::error::Result;
use crate::transactions::{
    delete_card_transaction, list_card_holders, list_card_months, list_card_transactions,
    update_card_transaction, CardTransactionFilter,
};

pub fn list(
    holder: Option<String>,
    month: Option<String>,
    category: Option<String>,
    offset: i64,
    limit: i64,
    json: bool,
) -> Result<()> {
    let conn = open_db()?;
    let filter = CardTransactionFilter {
        card_holder: holder,
        year_month: month,
        category,
        offset,
        limit: Some(limit),
    };
    let rows = list_card_transactions(&conn, &filter)?;
    if json {
        return print_json(&rows);
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Holder", "Payment", "Date", "Merchant", "Amount", "Category", "Memo"]);
    for t in &rows {
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(&t.card_holder),
            Cell::new(&t.payment_type),
            Cell::new(&t.transaction_date),
            Cell::new(&t.description),
            amount_cell(t.amount),
            Cell::new(or_dash(t.category.as_deref())),
            Cell::new(or_dash(t.memo.as_deref())),
        ]);
    }
    println!("Card transactions\n{table}");
    Ok(())
}

pub fn holders(json: bool) -> Result<()> {
    let conn = open_db()?;
    let holders = list_card_holders(&conn)?;
    if json {
        return print_json(&holders);
    }
    for h in holders {
        println!("{h}");
    }
    Ok(())
}

pub fn months(json: bool) -> Result<()> {
    let conn = open_db()?;
    let months = list_card_months(&conn)?;
    if json {
        return print_json(&months);
    }
    for m in months {
        println!("{m}");
    }
    Ok(())
}

pub fn update(id: i64, category: Option<&str>, memo: Option<&str>, json: bool) -> Result<()> {
    let conn = open_db()?;
    let t = update_card_transaction(&conn, id, category, memo)?;
    if json {
        return print_json(&t);
    }
    println!(
        "Card transaction {id}: {} [{}] {}",
        t.description,
        or_dash(t.category.as_deref()),
        or_dash(t.memo.as_deref())
    );
    Ok(())
}

pub fn delete(id: i64, json: bool) -> Result<()> {
    let conn = open_db()?;
    delete_card_transaction(&conn, id)?;
    if json {
        return print_json(&serde_json::json!({ "deleted": id }));
    }
    println!("Deleted card transaction {id}");
    Ok(())
}
