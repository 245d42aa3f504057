use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{GagyebuError, Result};
use crate::models::{AccountType, BankTransaction, CardTransaction, BANK_COLUMNS, CARD_COLUMNS};

pub const DEFAULT_LIMIT: i64 = 100;

// ---------------------------------------------------------------------------
// Filter helper
// ---------------------------------------------------------------------------

/// Accumulates `column = ?n` predicates with their bound values.
#[derive(Default)]
pub(crate) struct Predicates {
    clauses: Vec<String>,
    params: Vec<String>,
}

impl Predicates {
    pub(crate) fn eq(&mut self, column: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.params.push(v.to_string());
            self.clauses.push(format!("{column} = ?{}", self.params.len()));
        }
        self
    }

    /// Adds a predicate that binds no value.
    pub(crate) fn fixed(&mut self, clause: &str) -> &mut Self {
        self.clauses.push(clause.to_string());
        self
    }

    pub(crate) fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn values(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p as &dyn ToSql).collect()
    }
}

// ---------------------------------------------------------------------------
// Bank transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub year_month: Option<String>,
    pub category: Option<String>,
    pub account_type: Option<AccountType>,
    pub skip: i64,
    pub limit: Option<i64>,
}

pub fn list_transactions(conn: &Connection, filter: &TransactionFilter) -> Result<Vec<BankTransaction>> {
    let mut preds = Predicates::default();
    preds
        .eq("year_month", filter.year_month.as_deref())
        .eq("category", filter.category.as_deref())
        .eq("account_type", filter.account_type.map(|a| a.label()));

    let sql = format!(
        "SELECT {BANK_COLUMNS} FROM transactions {} \
         ORDER BY transaction_date DESC, id DESC LIMIT {} OFFSET {}",
        preds.where_sql(),
        filter.limit.unwrap_or(DEFAULT_LIMIT).max(0),
        filter.skip.max(0),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(preds.values().as_slice(), BankTransaction::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_transaction(conn: &Connection, id: i64) -> Result<BankTransaction> {
    conn.query_row(
        &format!("SELECT {BANK_COLUMNS} FROM transactions WHERE id = ?1"),
        [id],
        BankTransaction::from_row,
    )
    .optional()?
    .ok_or_else(|| GagyebuError::NotFound(format!("no transaction with ID {id}")))
}

pub fn update_transaction_category(conn: &Connection, id: i64, category: &str) -> Result<BankTransaction> {
    let changed = conn.execute(
        "UPDATE transactions SET category = ?1 WHERE id = ?2",
        rusqlite::params![category, id],
    )?;
    if changed == 0 {
        return Err(GagyebuError::NotFound(format!("no transaction with ID {id}")));
    }
    info!(id, category, "transaction category set");
    get_transaction(conn, id)
}

pub fn delete_transaction(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM transactions WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(GagyebuError::NotFound(format!("no transaction with ID {id}")));
    }
    info!(id, "transaction deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Card transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CardTransactionFilter {
    pub card_holder: Option<String>,
    pub year_month: Option<String>,
    pub category: Option<String>,
    pub offset: i64,
    pub limit: Option<i64>,
}

pub fn list_card_transactions(
    conn: &Connection,
    filter: &CardTransactionFilter,
) -> Result<Vec<CardTransaction>> {
    let mut preds = Predicates::default();
    preds
        .eq("card_holder", filter.card_holder.as_deref())
        .eq("year_month", filter.year_month.as_deref())
        .eq("category", filter.category.as_deref());

    let sql = format!(
        "SELECT {CARD_COLUMNS} FROM card_transactions {} \
         ORDER BY transaction_date DESC, id DESC LIMIT {} OFFSET {}",
        preds.where_sql(),
        filter.limit.unwrap_or(DEFAULT_LIMIT).max(0),
        filter.offset.max(0),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(preds.values().as_slice(), CardTransaction::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_card_transaction(conn: &Connection, id: i64) -> Result<CardTransaction> {
    conn.query_row(
        &format!("SELECT {CARD_COLUMNS} FROM card_transactions WHERE id = ?1"),
        [id],
        CardTransaction::from_row,
    )
    .optional()?
    .ok_or_else(|| GagyebuError::NotFound(format!("no card transaction with ID {id}")))
}

/// Sets category and/or memo; a `None` leaves that field as it is.
pub fn update_card_transaction(
    conn: &Connection,
    id: i64,
    category: Option<&str>,
    memo: Option<&str>,
) -> Result<CardTransaction> {
    let mut txn = get_card_transaction(conn, id)?;
    if let Some(category) = category {
        txn.category = Some(category.to_string());
    }
    if let Some(memo) = memo {
        txn.memo = Some(memo.to_string());
    }
    conn.execute(
        "UPDATE card_transactions SET category = ?1, memo = ?2 WHERE id = ?3",
        rusqlite::params![txn.category, txn.memo, id],
    )?;
    info!(id, "card transaction updated");
    Ok(txn)
}

pub fn delete_card_transaction(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM card_transactions WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(GagyebuError::NotFound(format!("no card transaction with ID {id}")));
    }
    info!(id, "card transaction deleted");
    Ok(())
}

pub fn list_card_holders(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT card_holder FROM card_transactions ORDER BY card_holder")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_card_months(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT year_month FROM card_transactions ORDER BY year_month DESC")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
