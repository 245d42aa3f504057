use rusqlite::Connection;

use crate::error::Result;
use crate::models::{Category, CategoryMapping, UNCATEGORIZED};

/// First-match categorization.
///
/// A category label written into the memo wins, checked in enumeration order.
/// Otherwise the first mapping (in table order) whose keyword occurs in the
/// description decides. Keyword matching here is case-sensitive.
pub fn categorize(
    description: &str,
    memo: Option<&str>,
    mappings: &[CategoryMapping],
) -> Option<String> {
    if let Some(memo) = memo.filter(|m| !m.is_empty()) {
        if let Some(cat) = Category::assignable().find(|c| memo.contains(c.label())) {
            return Some(cat.label().to_string());
        }
    }
    mappings
        .iter()
        .find(|m| description.contains(m.keyword.as_str()))
        .map(|m| m.category.clone())
}

pub fn load_mappings(conn: &Connection) -> Result<Vec<CategoryMapping>> {
    let mut stmt = conn.prepare("SELECT id, keyword, category FROM category_mappings ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CategoryMapping {
                id: row.get(0)?,
                keyword: row.get(1)?,
                category: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Default, serde::Serialize)]
pub struct CategorizeResult {
    pub categorized: usize,
    pub still_unset: usize,
}

/// Re-runs [`categorize`] over every bank and card record that has no category yet.
pub fn categorize_unset(conn: &Connection) -> Result<CategorizeResult> {
    let mappings = load_mappings(conn)?;
    let tx = conn.unchecked_transaction()?;
    let mut result = CategorizeResult::default();

    for table in ["transactions", "card_transactions"] {
        let pending: Vec<(i64, String, Option<String>)> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT id, description, memo FROM {table} \
                 WHERE category IS NULL OR category = ?1 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map([UNCATEGORIZED], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        for (id, description, memo) in &pending {
            match categorize(description, memo.as_deref(), &mappings) {
                Some(category) => {
                    tx.execute(
                        &format!("UPDATE {table} SET category = ?1 WHERE id = ?2"),
                        rusqlite::params![category, id],
                    )?;
                    result.categorized += 1;
                }
                None => result.still_unset += 1,
            }
        }
    }

    tx.commit()?;
    tracing::info!(
        categorized = result.categorized,
        still_unset = result.still_unset,
        "categorization pass finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn mapping(id: i64, keyword: &str, category: &str) -> CategoryMapping {
        CategoryMapping {
            id,
            keyword: keyword.to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn test_no_match_is_unset() {
        assert_eq!(categorize("Coffee Shop", None, &[]), None);
        assert_eq!(categorize("Coffee Shop", Some(""), &[]), None);
    }

    #[test]
    fn test_memo_label_wins_over_mapping() {
        let mappings = vec![mapping(1, "Mart", "교통비")];
        assert_eq!(
            categorize("Mart Downtown", Some("장보기 식비"), &mappings).as_deref(),
            Some("식비")
        );
    }

    #[test]
    fn test_memo_follows_enumeration_order() {
        // both labels present: 식비 precedes 뚜이 in the enumeration
        assert_eq!(categorize("x", Some("뚜이 식비"), &[]).as_deref(), Some("식비"));
    }

    #[test]
    fn test_memo_sentinel_label_is_ignored() {
        let mappings = vec![mapping(1, "Mart", "식비")];
        assert_eq!(categorize("Mart", Some("미분류"), &mappings).as_deref(), Some("식비"));
    }

    #[test]
    fn test_memo_without_label_falls_through_to_mappings() {
        let mappings = vec![mapping(1, "Taxi", "교통비")];
        assert_eq!(categorize("Kakao Taxi", Some("late night"), &mappings).as_deref(), Some("교통비"));
    }

    #[test]
    fn test_first_mapping_wins() {
        let mappings = vec![mapping(1, "Mart", "식비"), mapping(2, "Mart Down", "주거생활비")];
        assert_eq!(categorize("Mart Downtown", None, &mappings).as_deref(), Some("식비"));
    }

    #[test]
    fn test_mapping_match_is_case_sensitive() {
        let mappings = vec![mapping(1, "mart", "식비")];
        assert_eq!(categorize("MART", None, &mappings), None);
    }

    #[test]
    fn test_free_text_mapping_category_is_kept() {
        let mappings = vec![mapping(1, "Gym", "운동")];
        assert_eq!(categorize("Gym membership", None, &mappings).as_deref(), Some("운동"));
    }

    #[test]
    fn test_load_mappings_in_insert_order() {
        let (_dir, conn) = test_db();
        for (kw, cat) in [("B", "교통비"), ("A", "식비")] {
            conn.execute(
                "INSERT INTO category_mappings (keyword, category) VALUES (?1, ?2)",
                [kw, cat],
            )
            .unwrap();
        }
        let loaded = load_mappings(&conn).unwrap();
        let keywords: Vec<&str> = loaded.iter().map(|m| m.keyword.as_str()).collect();
        assert_eq!(keywords, ["B", "A"]);
    }

    #[test]
    fn test_categorize_unset_only_touches_unset() {
        let (_dir, conn) = test_db();
        for (date, desc, cat) in [
            ("2025.01.01", "Mart A", None),
            ("2025.01.02", "Mart B", Some("미분류")),
            ("2025.01.03", "Mart C", Some("주거생활비")),
            ("2025.01.04", "Bookstore", None),
        ] {
            conn.execute(
                "INSERT INTO transactions (transaction_date, description, transaction_type, amount, balance, year_month, category) \
                 VALUES (?1, ?2, '출금', -1000, 0, '2025-01', ?3)",
                rusqlite::params![date, desc, cat],
            )
            .unwrap();
        }
        conn.execute(
            "INSERT INTO card_transactions (card_holder, payment_type, transaction_date, raw_date, description, amount, year_month) \
             VALUES ('kim', '일시불', '2025.01.05', '20250105', 'Mart D', -2000, '2025-01')",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO category_mappings (keyword, category) VALUES ('Mart', '식비')", []).unwrap();

        let result = categorize_unset(&conn).unwrap();
        assert_eq!(result.categorized, 3);
        assert_eq!(result.still_unset, 1);

        let kept: String = conn
            .query_row("SELECT category FROM transactions WHERE description = 'Mart C'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(kept, "주거생활비");
        let card: String = conn
            .query_row("SELECT category FROM card_transactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(card, "식비");
    }
}
