use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::GagyebuError;

/// Stored label for "no category yet". Treated the same as an unset category.
pub const UNCATEGORIZED: &str = "미분류";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Food,
    Transportation,
    Housing,
    Beauty,
    Health,
    Social,
    Culture,
    Ddui,
    Uncategorized,
}

impl Category {
    /// Enumeration order; memo matching walks it front to back.
    pub const ALL: &'static [Category] = &[
        Self::Food,
        Self::Transportation,
        Self::Housing,
        Self::Beauty,
        Self::Health,
        Self::Social,
        Self::Culture,
        Self::Ddui,
        Self::Uncategorized,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Food => "식비",
            Self::Transportation => "교통비",
            Self::Housing => "주거생활비",
            Self::Beauty => "미용비",
            Self::Health => "건강관리비",
            Self::Social => "사회생활비",
            Self::Culture => "문화생활비",
            Self::Ddui => "뚜이",
            Self::Uncategorized => UNCATEGORIZED,
        }
    }

    /// Labels a user can pick from (everything except the unset sentinel).
    pub fn assignable() -> impl Iterator<Item = Category> {
        Self::ALL
            .iter()
            .copied()
            .filter(|c| *c != Self::Uncategorized)
    }

    pub fn is_unset(category: Option<&str>) -> bool {
        matches!(category, None | Some(UNCATEGORIZED))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountType {
    Reservoir,
    #[default]
    Living,
}

impl AccountType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reservoir => "저수지 계좌",
            Self::Living => "생활비 계좌",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AccountType {
    type Err = GagyebuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "reservoir" | "RESERVOIR" | "저수지" | "저수지 계좌" => Ok(Self::Reservoir),
            "living" | "LIVING" | "생활비" | "생활비 계좌" => Ok(Self::Living),
            other => Err(GagyebuError::Validation(format!(
                "unknown account type {other:?} (expected living or reservoir)"
            ))),
        }
    }
}

pub const BANK_COLUMNS: &str = "id, transaction_date, description, transaction_type, institution, \
     account_number, amount, balance, memo, category, year_month, account_type";

#[derive(Debug, Clone, Serialize)]
pub struct BankTransaction {
    pub id: i64,
    pub transaction_date: String,
    pub description: String,
    pub transaction_type: String,
    pub institution: Option<String>,
    pub account_number: Option<String>,
    pub amount: f64,
    pub balance: f64,
    pub memo: Option<String>,
    pub category: Option<String>,
    pub year_month: String,
    pub account_type: String,
}

impl BankTransaction {
    /// Maps a row selected with [`BANK_COLUMNS`].
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            transaction_date: row.get(1)?,
            description: row.get(2)?,
            transaction_type: row.get(3)?,
            institution: row.get(4)?,
            account_number: row.get(5)?,
            amount: row.get(6)?,
            balance: row.get(7)?,
            memo: row.get(8)?,
            category: row.get(9)?,
            year_month: row.get(10)?,
            account_type: row.get(11)?,
        })
    }
}

pub const CARD_COLUMNS: &str = "id, card_holder, payment_type, transaction_date, raw_date, \
     description, amount, category, memo, year_month";

#[derive(Debug, Clone, Serialize)]
pub struct CardTransaction {
    pub id: i64,
    pub card_holder: String,
    pub payment_type: String,
    pub transaction_date: String,
    pub raw_date: String,
    pub description: String,
    pub amount: f64,
    pub category: Option<String>,
    pub memo: Option<String>,
    pub year_month: String,
}

impl CardTransaction {
    /// Maps a row selected with [`CARD_COLUMNS`].
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            card_holder: row.get(1)?,
            payment_type: row.get(2)?,
            transaction_date: row.get(3)?,
            raw_date: row.get(4)?,
            description: row.get(5)?,
            amount: row.get(6)?,
            category: row.get(7)?,
            memo: row.get(8)?,
            year_month: row.get(9)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryMapping {
    pub id: i64,
    pub keyword: String,
    pub category: String,
}

/// Intermediate representation of a bank statement row before DB insert.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBankRow {
    pub transaction_date: String,
    pub description: String,
    pub transaction_type: String,
    pub institution: Option<String>,
    pub account_number: Option<String>,
    pub amount: f64,
    pub balance: f64,
    pub memo: Option<String>,
    pub year_month: String,
}

/// Intermediate representation of a card statement row before DB insert.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCardRow {
    pub card_holder: String,
    pub payment_type: String,
    pub transaction_date: String,
    pub raw_date: String,
    pub description: String,
    pub amount: f64,
    pub year_month: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportRecord {
    pub id: i64,
    pub kind: String,
    pub filename: String,
    pub checksum: Option<String>,
    pub account_type: Option<String>,
    pub card_holder: Option<String>,
    pub total_parsed: i64,
    pub new_count: i64,
    pub duplicate_count: i64,
    pub skipped_rows: i64,
    pub imported_at: String,
}

/// What an import call reports back, even when some rows were skipped.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ImportManifest {
    pub total_parsed: usize,
    pub new_count: usize,
    pub duplicate_count: usize,
    pub skipped_rows: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels_in_order() {
        let labels: Vec<&str> = Category::ALL.iter().map(|c| c.label()).collect();
        assert_eq!(
            labels,
            ["식비", "교통비", "주거생활비", "미용비", "건강관리비", "사회생활비", "문화생활비", "뚜이", "미분류"]
        );
    }

    #[test]
    fn test_assignable_skips_sentinel() {
        assert_eq!(Category::assignable().count(), 8);
        assert!(Category::assignable().all(|c| c != Category::Uncategorized));
    }

    #[test]
    fn test_is_unset() {
        assert!(Category::is_unset(None));
        assert!(Category::is_unset(Some("미분류")));
        assert!(!Category::is_unset(Some("식비")));
        assert!(!Category::is_unset(Some("anything else")));
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!("living".parse::<AccountType>().unwrap(), AccountType::Living);
        assert_eq!("RESERVOIR".parse::<AccountType>().unwrap(), AccountType::Reservoir);
        assert_eq!("저수지 계좌".parse::<AccountType>().unwrap(), AccountType::Reservoir);
        assert_eq!("생활비".parse::<AccountType>().unwrap(), AccountType::Living);
        assert!(matches!(
            "savings".parse::<AccountType>(),
            Err(GagyebuError::Validation(_))
        ));
    }
}
