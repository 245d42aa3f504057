use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::{GagyebuError, Result};
use crate::models::{Category, CategoryMapping, UNCATEGORIZED};

#[derive(Debug, Clone, Serialize)]
pub struct CreatedMapping {
    #[serde(flatten)]
    pub mapping: CategoryMapping,
    pub updated_transactions_count: usize,
}

pub fn list_mappings(conn: &Connection) -> Result<Vec<CategoryMapping>> {
    crate::categorizer::load_mappings(conn)
}

pub fn get_mapping(conn: &Connection, id: i64) -> Result<CategoryMapping> {
    conn.query_row(
        "SELECT id, keyword, category FROM category_mappings WHERE id = ?1",
        [id],
        |row| {
            Ok(CategoryMapping {
                id: row.get(0)?,
                keyword: row.get(1)?,
                category: row.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| GagyebuError::NotFound(format!("no mapping with ID {id}")))
}

fn keyword_owner(conn: &Connection, keyword: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM category_mappings WHERE keyword = ?1",
            [keyword],
            |row| row.get(0),
        )
        .optional()?)
}

fn clean_keyword(keyword: &str) -> Result<String> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(GagyebuError::Validation("keyword must not be empty".to_string()));
    }
    Ok(keyword.to_string())
}

/// Adds a keyword rule and applies it retroactively to uncategorized records.
///
/// The category is free text; it is not checked against [`Category`].
#[instrument(skip(conn))]
pub fn create_mapping(conn: &Connection, keyword: &str, category: &str) -> Result<CreatedMapping> {
    let keyword = clean_keyword(keyword)?;
    if keyword_owner(conn, &keyword)?.is_some() {
        return Err(GagyebuError::Conflict(format!("keyword {keyword:?} is already mapped")));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO category_mappings (keyword, category) VALUES (?1, ?2)",
        rusqlite::params![keyword, category],
    )?;
    let id = tx.last_insert_rowid();
    let updated = backfill(&tx, &keyword, category)?;
    tx.commit()?;

    info!(id, updated, "mapping created");
    Ok(CreatedMapping {
        mapping: CategoryMapping {
            id,
            keyword,
            category: category.to_string(),
        },
        updated_transactions_count: updated,
    })
}

/// Assigns `category` to every bank and card record whose description contains
/// `keyword` (case-insensitive) and which is still unset or `미분류`.
/// Records that already carry another category are left alone.
pub fn backfill(conn: &Connection, keyword: &str, category: &str) -> Result<usize> {
    let needle = keyword.to_lowercase();
    let mut updated = 0usize;

    for table in ["transactions", "card_transactions"] {
        let candidates: Vec<(i64, String, Option<String>)> = {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, description, category FROM {table} \
                 WHERE category IS NULL OR category = ?1"
            ))?;
            let rows = stmt
                .query_map([UNCATEGORIZED], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut update = conn.prepare(&format!("UPDATE {table} SET category = ?1 WHERE id = ?2"))?;
        for (id, description, current) in &candidates {
            if !Category::is_unset(current.as_deref()) {
                continue;
            }
            if description.to_lowercase().contains(&needle) {
                update.execute(rusqlite::params![category, id])?;
                updated += 1;
            }
        }
    }
    Ok(updated)
}

/// Changes a mapping's keyword and/or category. Existing records are not revisited.
#[instrument(skip(conn))]
pub fn update_mapping(
    conn: &Connection,
    id: i64,
    keyword: Option<&str>,
    category: Option<&str>,
) -> Result<CategoryMapping> {
    let mut mapping = get_mapping(conn, id)?;

    if let Some(keyword) = keyword {
        let keyword = clean_keyword(keyword)?;
        if let Some(owner) = keyword_owner(conn, &keyword)? {
            if owner != id {
                return Err(GagyebuError::Conflict(format!("keyword {keyword:?} is already mapped")));
            }
        }
        mapping.keyword = keyword;
    }
    if let Some(category) = category {
        mapping.category = category.to_string();
    }

    conn.execute(
        "UPDATE category_mappings SET keyword = ?1, category = ?2 WHERE id = ?3",
        rusqlite::params![mapping.keyword, mapping.category, id],
    )?;
    info!("mapping updated");
    Ok(mapping)
}

#[instrument(skip(conn))]
pub fn delete_mapping(conn: &Connection, id: i64) -> Result<CategoryMapping> {
    let mapping = get_mapping(conn, id)?;
    conn.execute("DELETE FROM category_mappings WHERE id = ?1", [id])?;
    info!(keyword = %mapping.keyword, "mapping deleted");
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn add_txn(conn: &Connection, date: &str, description: &str, category: Option<&str>) -> i64 {
        conn.execute(
            "INSERT INTO transactions (transaction_date, description, transaction_type, amount, balance, year_month, category) \
             VALUES (?1, ?2, '출금', -1000, 0, '2025-12', ?3)",
            rusqlite::params![date, description, category],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn category_of(conn: &Connection, id: i64) -> Option<String> {
        conn.query_row("SELECT category FROM transactions WHERE id = ?1", [id], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_create_backfills_unset_record() {
        let (_dir, conn) = test_db();
        let id = add_txn(&conn, "2025.12.01", "Mart Downtown", None);
        let created = create_mapping(&conn, "Mart", "식비").unwrap();
        assert_eq!(created.updated_transactions_count, 1);
        assert_eq!(created.mapping.keyword, "Mart");
        assert_eq!(category_of(&conn, id).as_deref(), Some("식비"));
    }

    #[test]
    fn test_backfill_never_overrides_explicit_category() {
        let (_dir, conn) = test_db();
        let manual = add_txn(&conn, "2025.12.01", "Mart Downtown", Some("주거생활비"));
        let unset = add_txn(&conn, "2025.12.02", "Mart Uptown", None);
        let sentinel = add_txn(&conn, "2025.12.03", "Mart Midtown", Some("미분류"));
        let created = create_mapping(&conn, "Mart", "식비").unwrap();
        assert_eq!(created.updated_transactions_count, 2);
        assert_eq!(category_of(&conn, manual).as_deref(), Some("주거생활비"));
        assert_eq!(category_of(&conn, unset).as_deref(), Some("식비"));
        assert_eq!(category_of(&conn, sentinel).as_deref(), Some("식비"));
    }

    #[test]
    fn test_backfill_is_case_insensitive() {
        let (_dir, conn) = test_db();
        let id = add_txn(&conn, "2025.12.01", "STARBUCKS GANGNAM", None);
        let created = create_mapping(&conn, "starbucks", "식비").unwrap();
        assert_eq!(created.updated_transactions_count, 1);
        assert_eq!(category_of(&conn, id).as_deref(), Some("식비"));
    }

    #[test]
    fn test_backfill_covers_card_records() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO card_transactions (card_holder, payment_type, transaction_date, raw_date, description, amount, year_month) \
             VALUES ('kim', '일시불', '2025.12.01', '20251201', 'GS25 역삼', -3000, '2025-12')",
            [],
        )
        .unwrap();
        add_txn(&conn, "2025.12.01", "GS25 선릉", None);
        let created = create_mapping(&conn, "GS25", "식비").unwrap();
        assert_eq!(created.updated_transactions_count, 2);
    }

    #[test]
    fn test_duplicate_keyword_conflicts() {
        let (_dir, conn) = test_db();
        create_mapping(&conn, "Mart", "식비").unwrap();
        let err = create_mapping(&conn, "Mart", "교통비").unwrap_err();
        assert!(matches!(err, GagyebuError::Conflict(_)));
        assert_eq!(list_mappings(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_keyword_rejected() {
        let (_dir, conn) = test_db();
        assert!(matches!(create_mapping(&conn, "  ", "식비"), Err(GagyebuError::Validation(_))));
    }

    #[test]
    fn test_free_text_category_allowed() {
        let (_dir, conn) = test_db();
        let created = create_mapping(&conn, "Netflix", "구독").unwrap();
        assert_eq!(created.mapping.category, "구독");
    }

    #[test]
    fn test_update_mapping() {
        let (_dir, conn) = test_db();
        let a = create_mapping(&conn, "Mart", "식비").unwrap().mapping;
        let b = create_mapping(&conn, "Taxi", "교통비").unwrap().mapping;

        let updated = update_mapping(&conn, a.id, None, Some("주거생활비")).unwrap();
        assert_eq!(updated.keyword, "Mart");
        assert_eq!(updated.category, "주거생활비");

        let err = update_mapping(&conn, a.id, Some("Taxi"), None).unwrap_err();
        assert!(matches!(err, GagyebuError::Conflict(_)));

        // renaming to its own keyword is fine
        update_mapping(&conn, b.id, Some("Taxi"), None).unwrap();

        let err = update_mapping(&conn, 999, None, Some("식비")).unwrap_err();
        assert!(matches!(err, GagyebuError::NotFound(_)));
    }

    #[test]
    fn test_update_does_not_backfill() {
        let (_dir, conn) = test_db();
        let m = create_mapping(&conn, "Mart", "식비").unwrap().mapping;
        let id = add_txn(&conn, "2025.12.01", "Bakery", None);
        update_mapping(&conn, m.id, Some("Bakery"), None).unwrap();
        assert_eq!(category_of(&conn, id), None);
    }

    #[test]
    fn test_delete_mapping() {
        let (_dir, conn) = test_db();
        let id = add_txn(&conn, "2025.12.01", "Mart", None);
        let m = create_mapping(&conn, "Mart", "식비").unwrap().mapping;
        delete_mapping(&conn, m.id).unwrap();
        assert!(list_mappings(&conn).unwrap().is_empty());
        // records keep the category they got
        assert_eq!(category_of(&conn, id).as_deref(), Some("식비"));
        assert!(matches!(delete_mapping(&conn, m.id), Err(GagyebuError::NotFound(_))));
    }
}
