use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const DB_FILE: &str = "gagyebu.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    kind TEXT NOT NULL,
    filename TEXT NOT NULL,
    checksum TEXT,
    account_type TEXT,
    card_holder TEXT,
    total_parsed INTEGER,
    new_count INTEGER,
    duplicate_count INTEGER,
    skipped_rows INTEGER,
    imported_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    transaction_date TEXT NOT NULL,
    description TEXT NOT NULL,
    transaction_type TEXT NOT NULL,
    institution TEXT,
    account_number TEXT,
    amount REAL NOT NULL,
    balance REAL NOT NULL,
    memo TEXT,
    category TEXT,
    year_month TEXT NOT NULL,
    account_type TEXT NOT NULL DEFAULT '생활비 계좌',
    import_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (import_id) REFERENCES imports(id) ON DELETE SET NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS ux_transactions_identity
    ON transactions (transaction_date, amount, description);
CREATE INDEX IF NOT EXISTS ix_transactions_year_month ON transactions (year_month);
CREATE INDEX IF NOT EXISTS ix_transactions_account_number ON transactions (account_number);

CREATE TABLE IF NOT EXISTS card_transactions (
    id INTEGER PRIMARY KEY,
    card_holder TEXT NOT NULL,
    payment_type TEXT NOT NULL,
    transaction_date TEXT NOT NULL,
    raw_date TEXT NOT NULL,
    description TEXT NOT NULL,
    amount REAL NOT NULL,
    category TEXT,
    memo TEXT,
    year_month TEXT NOT NULL,
    import_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (import_id) REFERENCES imports(id) ON DELETE SET NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS ux_card_transactions_identity
    ON card_transactions (card_holder, payment_type, transaction_date, amount, description);
CREATE INDEX IF NOT EXISTS ix_card_transactions_year_month ON card_transactions (year_month);

CREATE TABLE IF NOT EXISTS category_mappings (
    id INTEGER PRIMARY KEY,
    keyword TEXT NOT NULL UNIQUE,
    category TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);
";

// (legacy value, closed-set label)
const LEGACY_ACCOUNT_TYPES: &[(&str, &str)] = &[
    ("LIVING", "생활비 계좌"),
    ("RESERVOIR", "저수지 계좌"),
    ("생활비", "생활비 계좌"),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    migrate_account_types(conn)?;
    Ok(())
}

/// Rewrites account-type values written by older versions to the current labels.
fn migrate_account_types(conn: &Connection) -> Result<usize> {
    let mut updated = 0usize;
    for (old, new) in LEGACY_ACCOUNT_TYPES {
        updated += conn.execute(
            "UPDATE transactions SET account_type = ?1 WHERE account_type = ?2",
            [new, old],
        )?;
    }
    if updated > 0 {
        tracing::info!(updated, "migrated legacy account types");
    }
    Ok(updated)
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = get_connection(&dir.path().join("test.db")).unwrap();
    init_db(&conn).unwrap();
    (dir, conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["transactions", "card_transactions", "category_mappings", "imports"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_identity_key_is_unique() {
        let (_dir, conn) = test_db();
        let insert = "INSERT INTO transactions (transaction_date, description, transaction_type, amount, balance, year_month) \
                      VALUES ('2025.12.01 10:00', 'Coffee', '출금', -4500, 95500, '2025-12')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }

    #[test]
    fn test_mapping_keyword_is_unique() {
        let (_dir, conn) = test_db();
        conn.execute("INSERT INTO category_mappings (keyword, category) VALUES ('Mart', '식비')", []).unwrap();
        assert!(conn
            .execute("INSERT INTO category_mappings (keyword, category) VALUES ('Mart', '교통비')", [])
            .is_err());
    }

    #[test]
    fn test_migrates_legacy_account_types() {
        let (_dir, conn) = test_db();
        for (i, legacy) in ["LIVING", "RESERVOIR", "생활비"].iter().enumerate() {
            conn.execute(
                "INSERT INTO transactions (transaction_date, description, transaction_type, amount, balance, year_month, account_type) \
                 VALUES (?1, 'x', '입금', 1, 1, '2025-01', ?2)",
                rusqlite::params![format!("2025.01.0{}", i + 1), legacy],
            )
            .unwrap();
        }
        init_db(&conn).unwrap();
        let types: Vec<String> = conn
            .prepare("SELECT account_type FROM transactions ORDER BY transaction_date")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(types, ["생활비 계좌", "저수지 계좌", "생활비 계좌"]);
    }
}
