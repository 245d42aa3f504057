use colored::Colorize;
use comfy_table::{Cell, Table};

use super::{open_db, or_dash, print_json};
use crate::error::Result;
use crate::fmt::won;
use crate::models::{AccountType, BankTransaction};
use crate::transactions::{
    delete_transaction, get_transaction, list_transactions, update_transaction_category, TransactionFilter,
};

pub(crate) fn amount_cell(amount: f64) -> Cell {
    if amount < 0.0 {
        Cell::new(won(amount).red())
    } else {
        Cell::new(won(amount).green())
    }
}

fn table_for(rows: &[BankTransaction]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Description", "Type", "Amount", "Balance", "Category", "Account"]);
    for t in rows {
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(&t.transaction_date),
            Cell::new(&t.description),
            Cell::new(&t.transaction_type),
            amount_cell(t.amount),
            Cell::new(won(t.balance)),
            Cell::new(or_dash(t.category.as_deref())),
            Cell::new(&t.account_type),
        ]);
    }
    table
}

pub fn list(
    month: Option<String>,
    category: Option<String>,
    account_type: Option<AccountType>,
    skip: i64,
    limit: i64,
    json: bool,
) -> Result<()> {
    let conn = open_db()?;
    let filter = TransactionFilter {
        year_month: month,
        category,
        account_type,
        skip,
        limit: Some(limit),
    };
    let rows = list_transactions(&conn, &filter)?;
    if json {
        return print_json(&rows);
    }
    println!("Transactions\n{}", table_for(&rows));
    Ok(())
}

pub fn show(id: i64, json: bool) -> Result<()> {
    let conn = open_db()?;
    let t = get_transaction(&conn, id)?;
    if json {
        return print_json(&t);
    }
    println!("ID:          {}", t.id);
    println!("Date:        {}", t.transaction_date);
    println!("Description: {}", t.description);
    println!("Type:        {}", t.transaction_type);
    println!("Institution: {}", or_dash(t.institution.as_deref()));
    println!("Account:     {} ({})", or_dash(t.account_number.as_deref()), t.account_type);
    println!("Amount:      {}", won(t.amount));
    println!("Balance:     {}", won(t.balance));
    println!("Memo:        {}", or_dash(t.memo.as_deref()));
    println!("Category:    {}", or_dash(t.category.as_deref()));
    println!("Month:       {}", t.year_month);
    Ok(())
}

pub fn set_category(id: i64, category: &str, json: bool) -> Result<()> {
    let conn = open_db()?;
    let t = update_transaction_category(&conn, id, category)?;
    if json {
        return print_json(&t);
    }
    println!("Transaction {id}: {} \u{2192} {category}", t.description);
    Ok(())
}

pub fn delete(id: i64, json: bool) -> Result<()> {
    let conn = open_db()?;
    delete_transaction(&conn, id)?;
    if json {
        return print_json(&serde_json::json!({ "deleted": id }));
    }
    println!("Deleted transaction {id}");
    Ok(())
}
