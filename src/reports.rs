use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::error::Result;
use crate::models::{AccountType, BankTransaction, BANK_COLUMNS, UNCATEGORIZED};
use crate::transactions::Predicates;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn share(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Monthly summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MonthlySummary {
    pub year_month: String,
    pub total_income: f64,
    pub total_expense: f64,
    pub net_change: f64,
    pub start_balance: f64,
    pub end_balance: f64,
    pub transaction_count: usize,
}

/// Income, expense and opening/closing balance for one period.
///
/// The opening balance is reconstructed from the first record of the month
/// (its post-transaction balance minus its own amount).
pub fn monthly_summary(
    conn: &Connection,
    year_month: &str,
    account_type: Option<AccountType>,
) -> Result<MonthlySummary> {
    let mut preds = Predicates::default();
    preds
        .eq("year_month", Some(year_month))
        .eq("account_type", account_type.map(|a| a.label()));

    let sql = format!(
        "SELECT {BANK_COLUMNS} FROM transactions {} ORDER BY transaction_date ASC, id ASC",
        preds.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let txns = stmt
        .query_map(preds.values().as_slice(), BankTransaction::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let (Some(first), Some(last)) = (txns.first(), txns.last()) else {
        return Ok(MonthlySummary {
            year_month: year_month.to_string(),
            ..Default::default()
        });
    };

    let total_income: f64 = txns.iter().filter(|t| t.amount > 0.0).map(|t| t.amount).sum();
    let total_expense: f64 = txns.iter().filter(|t| t.amount < 0.0).map(|t| t.amount.abs()).sum();
    let start_balance = first.balance - first.amount;
    let end_balance = last.balance;

    Ok(MonthlySummary {
        year_month: year_month.to_string(),
        total_income,
        total_expense,
        net_change: end_balance - start_balance,
        start_balance,
        end_balance,
        transaction_count: txns.len(),
    })
}

// ---------------------------------------------------------------------------
// Category summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryShare {
    pub category: String,
    pub total_amount: f64,
    pub transaction_count: i64,
    pub percentage: f64,
}

/// Expense totals per category for a period, largest first.
pub fn category_summary(
    conn: &Connection,
    year_month: &str,
    account_type: Option<AccountType>,
) -> Result<Vec<CategoryShare>> {
    let mut preds = Predicates::default();
    preds
        .eq("year_month", Some(year_month))
        .eq("account_type", account_type.map(|a| a.label()))
        .fixed("amount < 0");

    let sql = format!(
        "SELECT COALESCE(category, '{UNCATEGORIZED}') AS cat, SUM(amount), COUNT(*) \
         FROM transactions {} GROUP BY cat",
        preds.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let raw: Vec<(String, f64, i64)> = stmt
        .query_map(preds.values().as_slice(), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let total: f64 = raw.iter().map(|(_, amount, _)| amount.abs()).sum();
    let mut shares: Vec<CategoryShare> = raw
        .into_iter()
        .map(|(category, amount, count)| CategoryShare {
            category,
            total_amount: amount.abs(),
            transaction_count: count,
            percentage: round2(share(amount.abs(), total)),
        })
        .collect();
    shares.sort_by(|a, b| b.total_amount.total_cmp(&a.total_amount));
    Ok(shares)
}

pub fn available_months(conn: &Connection, account_type: Option<AccountType>) -> Result<Vec<String>> {
    let mut preds = Predicates::default();
    preds.eq("account_type", account_type.map(|a| a.label()));
    let sql = format!(
        "SELECT DISTINCT year_month FROM transactions {} ORDER BY year_month DESC",
        preds.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let months = stmt
        .query_map(preds.values().as_slice(), |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(months)
}

// ---------------------------------------------------------------------------
// Total assets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AccountBalance {
    pub account_number: String,
    pub account_type: String,
    pub latest_balance: f64,
    pub last_transaction_date: String,
    pub institution: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TotalAssets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_month: Option<String>,
    pub total_assets: f64,
    pub account_count: usize,
    pub accounts: Vec<AccountBalance>,
}

/// Sum of each account's latest balance, optionally within one period.
///
/// Only correct when every account's latest record carries the true
/// post-transaction balance. Records without an account number are ignored.
pub fn total_assets(
    conn: &Connection,
    year_month: Option<&str>,
    account_type: Option<AccountType>,
) -> Result<TotalAssets> {
    let mut preds = Predicates::default();
    preds
        .eq("year_month", year_month)
        .eq("account_type", account_type.map(|a| a.label()))
        .fixed("account_number IS NOT NULL")
        .fixed("account_number <> ''");
    let base = preds.where_sql();

    let account_numbers: Vec<String> = {
        let sql = format!(
            "SELECT DISTINCT account_number FROM transactions {base} ORDER BY account_number"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(preds.values().as_slice(), |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    let mut accounts = Vec::with_capacity(account_numbers.len());
    for number in account_numbers {
        let mut latest = Predicates::default();
        latest
            .eq("account_number", Some(number.as_str()))
            .eq("year_month", year_month)
            .eq("account_type", account_type.map(|a| a.label()));
        let sql = format!(
            "SELECT {BANK_COLUMNS} FROM transactions {} \
             ORDER BY transaction_date DESC, id DESC LIMIT 1",
            latest.where_sql()
        );
        let txn = conn
            .query_row(&sql, latest.values().as_slice(), BankTransaction::from_row)
            .optional()?;
        if let Some(txn) = txn {
            accounts.push(AccountBalance {
                account_number: number,
                account_type: txn.account_type,
                latest_balance: txn.balance,
                last_transaction_date: txn.transaction_date,
                institution: txn.institution,
            });
        }
    }

    Ok(TotalAssets {
        year_month: year_month.map(str::to_string),
        total_assets: accounts.iter().map(|a| a.latest_balance).sum(),
        account_count: accounts.len(),
        accounts,
    })
}

// ---------------------------------------------------------------------------
// Card statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HolderTotal {
    pub card_holder: String,
    pub total_amount: f64,
    pub transaction_count: i64,
    pub percentage: f64,
}

pub fn card_totals_by_holder(conn: &Connection, year_month: Option<&str>) -> Result<Vec<HolderTotal>> {
    let mut preds = Predicates::default();
    preds.eq("year_month", year_month);
    let sql = format!(
        "SELECT card_holder, SUM(amount), COUNT(*) FROM card_transactions {} \
         GROUP BY card_holder ORDER BY card_holder",
        preds.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let raw: Vec<(String, f64, i64)> = stmt
        .query_map(preds.values().as_slice(), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let total: f64 = raw.iter().map(|(_, amount, _)| amount.abs()).sum();
    Ok(raw
        .into_iter()
        .map(|(card_holder, total_amount, transaction_count)| HolderTotal {
            percentage: share(total_amount.abs(), total),
            card_holder,
            total_amount,
            transaction_count,
        })
        .collect())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HolderMonthTotal {
    pub year_month: String,
    pub card_holder: String,
    pub total_amount: f64,
    pub transaction_count: i64,
}

pub fn card_totals_by_month(conn: &Connection, card_holder: Option<&str>) -> Result<Vec<HolderMonthTotal>> {
    let mut preds = Predicates::default();
    preds.eq("card_holder", card_holder);
    let sql = format!(
        "SELECT year_month, card_holder, SUM(amount), COUNT(*) FROM card_transactions {} \
         GROUP BY year_month, card_holder ORDER BY year_month DESC, card_holder",
        preds.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(preds.values().as_slice(), |row| {
            Ok(HolderMonthTotal {
                year_month: row.get(0)?,
                card_holder: row.get(1)?,
                total_amount: row.get(2)?,
                transaction_count: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HolderCategoryTotal {
    pub category: String,
    pub card_holder: String,
    pub total_amount: f64,
    pub transaction_count: i64,
    pub percentage: f64,
}

pub fn card_totals_by_category(
    conn: &Connection,
    year_month: Option<&str>,
    card_holder: Option<&str>,
) -> Result<Vec<HolderCategoryTotal>> {
    let mut preds = Predicates::default();
    preds.eq("year_month", year_month).eq("card_holder", card_holder);
    let sql = format!(
        "SELECT COALESCE(category, '{UNCATEGORIZED}') AS cat, card_holder, SUM(amount), COUNT(*) \
         FROM card_transactions {} GROUP BY cat, card_holder \
         ORDER BY ABS(SUM(amount)) DESC, card_holder",
        preds.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let raw: Vec<(String, String, f64, i64)> = stmt
        .query_map(preds.values().as_slice(), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let total: f64 = raw.iter().map(|(_, _, amount, _)| amount.abs()).sum();
    Ok(raw
        .into_iter()
        .map(|(category, card_holder, total_amount, transaction_count)| HolderCategoryTotal {
            percentage: share(total_amount.abs(), total),
            category,
            card_holder,
            total_amount,
            transaction_count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[allow(clippy::too_many_arguments)]
    fn add_txn(
        conn: &Connection,
        date: &str,
        description: &str,
        amount: f64,
        balance: f64,
        category: Option<&str>,
        account_number: Option<&str>,
        account_type: &str,
    ) {
        let ym = date[..7].replace('.', "-");
        conn.execute(
            "INSERT INTO transactions (transaction_date, description, transaction_type, account_number, amount, balance, year_month, category, account_type) \
             VALUES (?1, ?2, '거래', ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![date, description, account_number, amount, balance, ym, category, account_type],
        )
        .unwrap();
    }

    fn add_card(conn: &Connection, holder: &str, date: &str, description: &str, amount: f64, category: Option<&str>) {
        let ym = date[..7].replace('.', "-");
        conn.execute(
            "INSERT INTO card_transactions (card_holder, payment_type, transaction_date, raw_date, description, amount, year_month, category) \
             VALUES (?1, '일시불', ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![holder, date, date.replace('.', ""), description, amount, ym, category],
        )
        .unwrap();
    }

    const LIVING: &str = "생활비 계좌";
    const RESERVOIR: &str = "저수지 계좌";

    #[test]
    fn test_monthly_summary_empty_month() {
        let (_dir, conn) = test_db();
        let summary = monthly_summary(&conn, "2025-12", None).unwrap();
        assert_eq!(summary.year_month, "2025-12");
        assert_eq!(summary.transaction_count, 0);
        assert_eq!(summary.start_balance, 0.0);
        assert_eq!(summary.net_change, 0.0);
    }

    #[test]
    fn test_monthly_summary_balances() {
        let (_dir, conn) = test_db();
        add_txn(&conn, "2025.12.01 09:00:00", "Salary", 300000.0, 400000.0, None, None, LIVING);
        add_txn(&conn, "2025.12.02 10:00:00", "Coffee", -4500.0, 395500.0, None, None, LIVING);
        add_txn(&conn, "2025.12.03 10:00:00", "Rent", -200000.0, 195500.0, None, None, LIVING);
        add_txn(&conn, "2025.11.30 10:00:00", "Other month", -1.0, 100000.0, None, None, LIVING);

        let s = monthly_summary(&conn, "2025-12", None).unwrap();
        assert_eq!(s.transaction_count, 3);
        assert_eq!(s.total_income, 300000.0);
        assert_eq!(s.total_expense, 204500.0);
        assert_eq!(s.start_balance, 100000.0);
        assert_eq!(s.end_balance, 195500.0);
        assert_eq!(s.net_change, 95500.0);
    }

    #[test]
    fn test_monthly_summary_filters_account_type() {
        let (_dir, conn) = test_db();
        add_txn(&conn, "2025.12.01", "Living", -1000.0, 9000.0, None, None, LIVING);
        add_txn(&conn, "2025.12.02", "Reservoir", 5000.0, 55000.0, None, None, RESERVOIR);
        let s = monthly_summary(&conn, "2025-12", Some(AccountType::Reservoir)).unwrap();
        assert_eq!(s.transaction_count, 1);
        assert_eq!(s.total_income, 5000.0);
        assert_eq!(s.start_balance, 50000.0);
    }

    #[test]
    fn test_category_summary_expenses_only() {
        let (_dir, conn) = test_db();
        add_txn(&conn, "2025.12.01", "Salary", 100000.0, 0.0, Some("식비"), None, LIVING);
        add_txn(&conn, "2025.12.02", "Lunch", -6000.0, 0.0, Some("식비"), None, LIVING);
        add_txn(&conn, "2025.12.03", "Dinner", -3000.0, 0.0, Some("식비"), None, LIVING);
        add_txn(&conn, "2025.12.04", "Bus", -1000.0, 0.0, Some("교통비"), None, LIVING);
        add_txn(&conn, "2025.12.05", "Unknown", -1500.0, 0.0, None, None, LIVING);
        add_txn(&conn, "2025.12.06", "Marked", -1500.0, 0.0, Some("미분류"), None, LIVING);

        let shares = category_summary(&conn, "2025-12", None).unwrap();
        let cats: Vec<&str> = shares.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(cats, ["식비", "미분류", "교통비"]);
        assert_eq!(shares[0].total_amount, 9000.0);
        assert_eq!(shares[0].transaction_count, 2);
        assert_eq!(shares[0].percentage, 69.23);
        assert_eq!(shares[1].transaction_count, 2);
        assert_eq!(shares[2].percentage, 7.69);
    }

    #[test]
    fn test_available_months_descending() {
        let (_dir, conn) = test_db();
        add_txn(&conn, "2025.10.01", "a", -1.0, 0.0, None, None, LIVING);
        add_txn(&conn, "2025.12.01", "b", -1.0, 0.0, None, None, LIVING);
        add_txn(&conn, "2025.11.01", "c", -1.0, 0.0, None, None, RESERVOIR);
        assert_eq!(available_months(&conn, None).unwrap(), ["2025-12", "2025-11", "2025-10"]);
        assert_eq!(
            available_months(&conn, Some(AccountType::Living)).unwrap(),
            ["2025-12", "2025-10"]
        );
    }

    #[test]
    fn test_total_assets_latest_per_account() {
        let (_dir, conn) = test_db();
        add_txn(&conn, "2025.11.01", "a", -1.0, 1000.0, None, Some("111"), LIVING);
        add_txn(&conn, "2025.12.01", "b", -1.0, 2000.0, None, Some("111"), LIVING);
        add_txn(&conn, "2025.11.15", "c", -1.0, 50000.0, None, Some("222"), RESERVOIR);
        add_txn(&conn, "2025.12.20", "d", -1.0, 999999.0, None, None, LIVING);

        let all = total_assets(&conn, None, None).unwrap();
        assert_eq!(all.account_count, 2);
        assert_eq!(all.total_assets, 52000.0);
        assert_eq!(all.accounts[0].account_number, "111");
        assert_eq!(all.accounts[0].last_transaction_date, "2025.12.01");

        let nov = total_assets(&conn, Some("2025-11"), None).unwrap();
        assert_eq!(nov.year_month.as_deref(), Some("2025-11"));
        assert_eq!(nov.total_assets, 51000.0);

        let living = total_assets(&conn, None, Some(AccountType::Living)).unwrap();
        assert_eq!(living.account_count, 1);
        assert_eq!(living.total_assets, 2000.0);
    }

    #[test]
    fn test_total_assets_empty() {
        let (_dir, conn) = test_db();
        let t = total_assets(&conn, None, None).unwrap();
        assert_eq!(t.total_assets, 0.0);
        assert!(t.accounts.is_empty());
    }

    #[test]
    fn test_card_statistics() {
        let (_dir, conn) = test_db();
        add_card(&conn, "kim", "2025.12.01", "Mart", -30000.0, Some("식비"));
        add_card(&conn, "kim", "2025.11.01", "Taxi", -10000.0, None);
        add_card(&conn, "lee", "2025.12.05", "Mart", -10000.0, Some("식비"));

        let by_holder = card_totals_by_holder(&conn, None).unwrap();
        assert_eq!(by_holder.len(), 2);
        assert_eq!(by_holder[0].card_holder, "kim");
        assert_eq!(by_holder[0].total_amount, -40000.0);
        assert!((by_holder[0].percentage - 80.0).abs() < 1e-9);

        let dec = card_totals_by_holder(&conn, Some("2025-12")).unwrap();
        assert_eq!(dec[0].total_amount, -30000.0);

        let by_month = card_totals_by_month(&conn, Some("kim")).unwrap();
        let months: Vec<&str> = by_month.iter().map(|m| m.year_month.as_str()).collect();
        assert_eq!(months, ["2025-12", "2025-11"]);

        let by_cat = card_totals_by_category(&conn, None, None).unwrap();
        assert_eq!(by_cat.len(), 3);
        assert_eq!(by_cat[0].category, "식비");
        assert_eq!(by_cat[0].card_holder, "kim");
        assert!(by_cat.iter().any(|c| c.category == "미분류" && c.card_holder == "kim"));
        let pct: f64 = by_cat.iter().map(|c| c.percentage).sum();
        assert!((pct - 100.0).abs() < 1e-9);
    }
}
