use colored::Colorize;
use comfy_table::{Cell, Table};

use super::{open_db, or_dash, print_json};
use crate::error::Result;
use crate::fmt::{percent, won};
use crate::models::AccountType;
use crate::reports;

fn scope_label(account_type: Option<AccountType>) -> &'static str {
    account_type.map(|a| a.label()).unwrap_or("전체 계좌")
}

pub fn monthly(month: &str, account_type: Option<AccountType>, json: bool) -> Result<()> {
    let conn = open_db()?;
    let s = reports::monthly_summary(&conn, month, account_type)?;
    if json {
        return print_json(&s);
    }

    let mut table = Table::new();
    table.set_header(vec!["", "Amount"]);
    table.add_row(vec![Cell::new("Start balance"), Cell::new(won(s.start_balance))]);
    table.add_row(vec![Cell::new("INCOME".green().bold()), Cell::new(won(s.total_income))]);
    table.add_row(vec![Cell::new("EXPENSE".red().bold()), Cell::new(won(s.total_expense))]);
    table.add_row(vec![Cell::new("End balance"), Cell::new(won(s.end_balance))]);
    let net_label = if s.net_change >= 0.0 {
        "NET".green().bold()
    } else {
        "NET".red().bold()
    };
    table.add_row(vec![Cell::new(net_label), Cell::new(won(s.net_change))]);

    println!(
        "Monthly summary {} ({}, {} transactions)\n{table}",
        s.year_month,
        scope_label(account_type),
        s.transaction_count
    );
    Ok(())
}

pub fn categories(month: &str, account_type: Option<AccountType>, json: bool) -> Result<()> {
    let conn = open_db()?;
    let shares = reports::category_summary(&conn, month, account_type)?;
    if json {
        return print_json(&shares);
    }

    let mut table = Table::new();
    table.set_header(vec!["Category", "Amount", "Count", "%"]);
    for s in &shares {
        table.add_row(vec![
            Cell::new(&s.category),
            Cell::new(won(s.total_amount)),
            Cell::new(s.transaction_count),
            Cell::new(percent(s.percentage)),
        ]);
    }
    let total: f64 = shares.iter().map(|s| s.total_amount).sum();
    table.add_row(vec![Cell::new("TOTAL".bold()), Cell::new(won(total)), Cell::new(""), Cell::new("")]);

    println!("Expenses by category {month} ({})\n{table}", scope_label(account_type));
    Ok(())
}

pub fn months(account_type: Option<AccountType>, json: bool) -> Result<()> {
    let conn = open_db()?;
    let months = reports::available_months(&conn, account_type)?;
    if json {
        return print_json(&serde_json::json!({ "months": months }));
    }
    for m in months {
        println!("{m}");
    }
    Ok(())
}

pub fn assets(month: Option<&str>, account_type: Option<AccountType>, json: bool) -> Result<()> {
    let conn = open_db()?;
    let assets = reports::total_assets(&conn, month, account_type)?;
    if json {
        return print_json(&assets);
    }

    let mut table = Table::new();
    table.set_header(vec!["Account", "Type", "Institution", "Last activity", "Balance"]);
    for a in &assets.accounts {
        table.add_row(vec![
            Cell::new(&a.account_number),
            Cell::new(&a.account_type),
            Cell::new(or_dash(a.institution.as_deref())),
            Cell::new(&a.last_transaction_date),
            Cell::new(won(a.latest_balance)),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL".bold()),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format!("{} accounts", assets.account_count)),
        Cell::new(won(assets.total_assets).bold()),
    ]);

    let title = match month {
        Some(m) => format!("Total assets {m}"),
        None => "Total assets".to_string(),
    };
    println!("{title}\n{table}");
    Ok(())
}

pub fn card_users(month: Option<&str>, json: bool) -> Result<()> {
    let conn = open_db()?;
    let totals = reports::card_totals_by_holder(&conn, month)?;
    if json {
        return print_json(&totals);
    }

    let mut table = Table::new();
    table.set_header(vec!["Holder", "Amount", "Count", "%"]);
    for t in &totals {
        table.add_row(vec![
            Cell::new(&t.card_holder),
            Cell::new(won(t.total_amount)),
            Cell::new(t.transaction_count),
            Cell::new(percent(t.percentage)),
        ]);
    }
    println!("Card spend by holder\n{table}");
    Ok(())
}

pub fn card_monthly(holder: Option<&str>, json: bool) -> Result<()> {
    let conn = open_db()?;
    let totals = reports::card_totals_by_month(&conn, holder)?;
    if json {
        return print_json(&totals);
    }

    let mut table = Table::new();
    table.set_header(vec!["Month", "Holder", "Amount", "Count"]);
    for t in &totals {
        table.add_row(vec![
            Cell::new(&t.year_month),
            Cell::new(&t.card_holder),
            Cell::new(won(t.total_amount)),
            Cell::new(t.transaction_count),
        ]);
    }
    println!("Card spend by month\n{table}");
    Ok(())
}

pub fn card_categories(month: Option<&str>, holder: Option<&str>, json: bool) -> Result<()> {
    let conn = open_db()?;
    let totals = reports::card_totals_by_category(&conn, month, holder)?;
    if json {
        return print_json(&totals);
    }

    let mut table = Table::new();
    table.set_header(vec!["Category", "Holder", "Amount", "Count", "%"]);
    for t in &totals {
        table.add_row(vec![
            Cell::new(&t.category),
            Cell::new(&t.card_holder),
            Cell::new(won(t.total_amount)),
            Cell::new(t.transaction_count),
            Cell::new(percent(t.percentage)),
        ]);
    }
    println!("Card spend by category\n{table}");
    Ok(())
}
