use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::categorizer::{categorize, load_mappings};
use crate::error::{GagyebuError, Result, RowSkipError};
use crate::models::{AccountType, ImportManifest, ImportRecord, ParsedBankRow, ParsedCardRow};

pub const ACCEPTED_EXTENSIONS: &[&str] = &["xlsx", "xls"];

/// Bank exports carry a preamble; the real header row contains this label.
pub const BANK_HEADER_MARKER: &str = "거래 일시";

const BANK_COL_DATE: &str = "거래 일시";
const BANK_COL_DESCRIPTION: &str = "적요";
const BANK_COL_TYPE: &str = "거래 유형";
const BANK_COL_INSTITUTION: &str = "거래 기관";
const BANK_COL_ACCOUNT: &str = "계좌번호";
const BANK_COL_AMOUNT: &str = "거래 금액";
const BANK_COL_BALANCE: &str = "거래 후 잔액";
const BANK_COL_MEMO: &str = "메모";

/// Only the lump-sum and installment sheets are read; anything after them is ignored.
pub const CARD_SHEET_LIMIT: usize = 2;
// Rows 0-1 are title and blank, row 2 is the header.
const CARD_FIRST_DATA_ROW: u32 = 3;
const CARD_COL_DATE: u32 = 0;
const CARD_COL_MERCHANT: u32 = 2;
const CARD_COL_AMOUNT: u32 = 9;

static EMPTY_CELL: Data = Data::Empty;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Rejects anything that is not an Excel workbook by extension.
pub fn check_extension(file_name: &str) -> Result<()> {
    let ok = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ACCEPTED_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)));
    if ok {
        Ok(())
    } else {
        Err(GagyebuError::Validation(format!(
            "only Excel files (.xlsx, .xls) can be imported: {file_name}"
        )))
    }
}

pub fn validate_card_holder(card_holder: &str) -> Result<String> {
    let trimmed = card_holder.trim();
    if trimmed.is_empty() {
        return Err(GagyebuError::Validation("card holder name must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

/// `YYYY-MM` from the leading `YYYY.MM` (or `YYYY-MM`) of a date string.
pub fn period_key(date: &str) -> String {
    date.chars().take(7).collect::<String>().replace('.', "-")
}

pub fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn cell_is_empty(cell: &Data) -> bool {
    match cell {
        Data::Empty | Data::Error(_) => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_str(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        // Account numbers and codes come through as whole floats.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y.%m.%d %H:%M:%S").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim().replace(',', "");
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn cell_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => parse_number(s),
        _ => None,
    }
}

fn optional_str(cell: Option<&Data>) -> Option<String> {
    cell.filter(|c| !cell_is_empty(c)).map(cell_str)
}

type Workbook<'a> = Sheets<Cursor<&'a [u8]>>;

fn open_workbook(bytes: &[u8]) -> Result<Workbook<'_>> {
    open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| GagyebuError::Format(format!("cannot read workbook: {e}")))
}

fn read_sheet(workbook: &mut Workbook<'_>, name: &str) -> Result<Range<Data>> {
    workbook
        .worksheet_range(name)
        .map_err(|e| GagyebuError::Format(format!("cannot read sheet {name:?}: {e}")))
}

/// Rows that survived parsing, plus the reasons the others were dropped.
#[derive(Debug)]
pub struct ParsedBatch<T> {
    pub rows: Vec<T>,
    pub skipped: Vec<RowSkipError>,
}

impl<T> Default for ParsedBatch<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> ParsedBatch<T> {
    fn skip(&mut self, err: RowSkipError) {
        warn!(%err, "skipping row");
        self.skipped.push(err);
    }
}

// ---------------------------------------------------------------------------
// Importer kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImporterKind {
    BankStatement,
    CardStatement,
}

impl ImporterKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::BankStatement => "bank",
            Self::CardStatement => "card",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BankStatement => "Toss Bank statement",
            Self::CardStatement => "Samsung Card statement",
        }
    }
}

// ---------------------------------------------------------------------------
// Bank statement parser
// ---------------------------------------------------------------------------

struct BankColumns {
    date: usize,
    description: usize,
    amount: usize,
    transaction_type: Option<usize>,
    institution: Option<usize>,
    account_number: Option<usize>,
    balance: Option<usize>,
    memo: Option<usize>,
}

impl BankColumns {
    fn from_header(header: &[Data]) -> Result<Self> {
        let find = |label: &str| header.iter().position(|c| cell_str(c) == label);
        let require = |label: &str| {
            find(label).ok_or_else(|| {
                GagyebuError::Format(format!("header row has no {label:?} column"))
            })
        };
        Ok(Self {
            date: require(BANK_COL_DATE)?,
            description: require(BANK_COL_DESCRIPTION)?,
            amount: require(BANK_COL_AMOUNT)?,
            transaction_type: find(BANK_COL_TYPE),
            institution: find(BANK_COL_INSTITUTION),
            account_number: find(BANK_COL_ACCOUNT),
            balance: find(BANK_COL_BALANCE),
            memo: find(BANK_COL_MEMO),
        })
    }
}

pub fn parse_bank_statement(bytes: &[u8]) -> Result<ParsedBatch<ParsedBankRow>> {
    let mut workbook = open_workbook(bytes)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| GagyebuError::Format("workbook has no sheets".to_string()))?;
    let range = read_sheet(&mut workbook, &sheet)?;
    parse_bank_range(&range)
}

pub fn parse_bank_range(range: &Range<Data>) -> Result<ParsedBatch<ParsedBankRow>> {
    let rows: Vec<&[Data]> = range.rows().collect();
    let header_idx = rows
        .iter()
        .position(|row| row.iter().any(|c| cell_str(c).contains(BANK_HEADER_MARKER)))
        .ok_or_else(|| {
            GagyebuError::Format(format!("no header row containing {BANK_HEADER_MARKER:?}"))
        })?;
    let cols = BankColumns::from_header(rows[header_idx])?;
    let first_row = range.start().map_or(0, |(r, _)| r as usize);

    let mut batch = ParsedBatch::default();
    for (idx, row) in rows.iter().enumerate().skip(header_idx + 1) {
        let row_no = first_row + idx + 1;
        let cell = |i: usize| row.get(i).unwrap_or(&EMPTY_CELL);

        if cell_is_empty(cell(cols.date))
            || cell_is_empty(cell(cols.description))
            || cell_is_empty(cell(cols.amount))
        {
            debug!(row = row_no, "dropping row without date, description or amount");
            continue;
        }

        let Some(amount) = cell_f64(cell(cols.amount)) else {
            batch.skip(RowSkipError::NotNumeric {
                row: row_no,
                field: "amount",
                value: cell_str(cell(cols.amount)),
            });
            continue;
        };
        let Some(balance_col) = cols.balance else {
            batch.skip(RowSkipError::Missing { row: row_no, field: "balance" });
            continue;
        };
        let Some(balance) = cell_f64(cell(balance_col)) else {
            batch.skip(RowSkipError::NotNumeric {
                row: row_no,
                field: "balance",
                value: cell_str(cell(balance_col)),
            });
            continue;
        };
        let Some(type_col) = cols.transaction_type else {
            batch.skip(RowSkipError::Missing { row: row_no, field: "transaction type" });
            continue;
        };

        let transaction_date = cell_str(cell(cols.date));
        batch.rows.push(ParsedBankRow {
            year_month: period_key(&transaction_date),
            transaction_date,
            description: cell_str(cell(cols.description)),
            transaction_type: cell_str(cell(type_col)),
            institution: optional_str(cols.institution.map(cell)),
            account_number: optional_str(cols.account_number.map(cell)),
            amount,
            balance,
            memo: optional_str(cols.memo.map(cell)),
        });
    }
    Ok(batch)
}

// ---------------------------------------------------------------------------
// Card statement parser
// ---------------------------------------------------------------------------

pub fn parse_card_statement(bytes: &[u8], card_holder: &str) -> Result<ParsedBatch<ParsedCardRow>> {
    let mut workbook = open_workbook(bytes)?;
    let names: Vec<String> = workbook
        .sheet_names()
        .into_iter()
        .take(CARD_SHEET_LIMIT)
        .collect();
    if names.is_empty() {
        return Err(GagyebuError::Format("workbook has no sheets".to_string()));
    }
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = read_sheet(&mut workbook, &name)?;
        sheets.push((name, range));
    }
    Ok(parse_card_sheets(&sheets, card_holder))
}

/// Parses `(sheet name, grid)` pairs; the sheet name becomes the payment type.
pub fn parse_card_sheets(sheets: &[(String, Range<Data>)], card_holder: &str) -> ParsedBatch<ParsedCardRow> {
    let mut batch = ParsedBatch::default();
    for (name, range) in sheets.iter().take(CARD_SHEET_LIMIT) {
        info!(sheet = %name, "parsing card sheet");
        parse_card_sheet(name, range, card_holder, &mut batch);
    }
    info!(parsed = batch.rows.len(), skipped = batch.skipped.len(), "card sheets parsed");
    batch
}

fn card_raw_date(cell: &Data) -> Option<i64> {
    match cell {
        Data::Float(f) => Some(f.trunc() as i64),
        Data::Int(i) => Some(*i),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_card_sheet(
    sheet: &str,
    range: &Range<Data>,
    card_holder: &str,
    batch: &mut ParsedBatch<ParsedCardRow>,
) {
    let (Some(start), Some(end)) = (range.start(), range.end()) else {
        return;
    };
    for abs_row in start.0.max(CARD_FIRST_DATA_ROW)..=end.0 {
        let row_no = abs_row as usize + 1;
        let cell = |col: u32| range.get_value((abs_row, col)).unwrap_or(&EMPTY_CELL);

        let date_cell = cell(CARD_COL_DATE);
        if cell_is_empty(date_cell) {
            // trailing total rows have no date
            continue;
        }
        let raw_date = match card_raw_date(date_cell) {
            Some(n) => n.to_string(),
            None => {
                batch.skip(RowSkipError::BadDate { row: row_no, value: cell_str(date_cell) });
                continue;
            }
        };
        if raw_date.len() != 8 {
            batch.skip(RowSkipError::BadDate { row: row_no, value: raw_date });
            continue;
        }

        let amount_cell = cell(CARD_COL_AMOUNT);
        let Some(amount) = cell_f64(amount_cell) else {
            let err = if cell_is_empty(amount_cell) {
                RowSkipError::Missing { row: row_no, field: "amount" }
            } else {
                RowSkipError::NotNumeric {
                    row: row_no,
                    field: "amount",
                    value: cell_str(amount_cell),
                }
            };
            batch.skip(err);
            continue;
        };

        let (y, m, d) = (&raw_date[..4], &raw_date[4..6], &raw_date[6..8]);
        batch.rows.push(ParsedCardRow {
            card_holder: card_holder.to_string(),
            payment_type: sheet.to_string(),
            transaction_date: format!("{y}.{m}.{d}"),
            year_month: format!("{y}-{m}"),
            description: cell_str(cell(CARD_COL_MERCHANT)),
            amount: -amount,
            raw_date,
        });
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

fn start_import_record(
    conn: &Connection,
    kind: ImporterKind,
    file_name: &str,
    checksum: &str,
    account_type: Option<AccountType>,
    card_holder: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO imports (kind, filename, checksum, account_type, card_holder) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            kind.key(),
            file_name,
            checksum,
            account_type.map(|a| a.label()),
            card_holder,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn finish_import_record(conn: &Connection, import_id: i64, manifest: &ImportManifest) -> Result<()> {
    conn.execute(
        "UPDATE imports SET total_parsed = ?1, new_count = ?2, duplicate_count = ?3, skipped_rows = ?4 WHERE id = ?5",
        rusqlite::params![
            manifest.total_parsed as i64,
            manifest.new_count as i64,
            manifest.duplicate_count as i64,
            manifest.skipped_rows as i64,
            import_id,
        ],
    )?;
    Ok(())
}

/// Inserts parsed bank rows. A row whose identity key already exists counts as
/// a duplicate and is discarded untouched.
pub fn store_bank_batch(
    conn: &Connection,
    batch: &ParsedBatch<ParsedBankRow>,
    file_name: &str,
    checksum: &str,
    account_type: AccountType,
) -> Result<ImportManifest> {
    let mappings = load_mappings(conn)?;
    let tx = conn.unchecked_transaction()?;
    let import_id = start_import_record(
        &tx,
        ImporterKind::BankStatement,
        file_name,
        checksum,
        Some(account_type),
        None,
    )?;

    let mut manifest = ImportManifest {
        total_parsed: batch.rows.len(),
        skipped_rows: batch.skipped.len(),
        ..Default::default()
    };
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO transactions (transaction_date, description, transaction_type, institution, \
             account_number, amount, balance, memo, category, year_month, account_type, import_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
             ON CONFLICT (transaction_date, amount, description) DO NOTHING",
        )?;
        for row in &batch.rows {
            let category = categorize(&row.description, row.memo.as_deref(), &mappings);
            let inserted = stmt.execute(rusqlite::params![
                row.transaction_date,
                row.description,
                row.transaction_type,
                row.institution,
                row.account_number,
                row.amount,
                row.balance,
                row.memo,
                category,
                row.year_month,
                account_type.label(),
                import_id,
            ])?;
            if inserted == 0 {
                manifest.duplicate_count += 1;
            } else {
                manifest.new_count += 1;
            }
        }
    }

    finish_import_record(&tx, import_id, &manifest)?;
    tx.commit()?;
    Ok(manifest)
}

/// Inserts parsed card rows with the same duplicate policy as bank rows.
pub fn store_card_batch(
    conn: &Connection,
    batch: &ParsedBatch<ParsedCardRow>,
    file_name: &str,
    checksum: &str,
    card_holder: &str,
) -> Result<ImportManifest> {
    let mappings = load_mappings(conn)?;
    let tx = conn.unchecked_transaction()?;
    let import_id = start_import_record(
        &tx,
        ImporterKind::CardStatement,
        file_name,
        checksum,
        None,
        Some(card_holder),
    )?;

    let mut manifest = ImportManifest {
        total_parsed: batch.rows.len(),
        skipped_rows: batch.skipped.len(),
        ..Default::default()
    };
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO card_transactions (card_holder, payment_type, transaction_date, raw_date, \
             description, amount, category, memo, year_month, import_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9) \
             ON CONFLICT (card_holder, payment_type, transaction_date, amount, description) DO NOTHING",
        )?;
        for row in &batch.rows {
            let category = categorize(&row.description, None, &mappings);
            let inserted = stmt.execute(rusqlite::params![
                row.card_holder,
                row.payment_type,
                row.transaction_date,
                row.raw_date,
                row.description,
                row.amount,
                category,
                row.year_month,
                import_id,
            ])?;
            if inserted == 0 {
                manifest.duplicate_count += 1;
            } else {
                manifest.new_count += 1;
            }
        }
    }

    finish_import_record(&tx, import_id, &manifest)?;
    tx.commit()?;
    Ok(manifest)
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

#[instrument(skip(conn, bytes), fields(kind = "bank", size = bytes.len()))]
pub fn import_bank_statement(
    conn: &Connection,
    bytes: &[u8],
    file_name: &str,
    account_type: AccountType,
) -> Result<ImportManifest> {
    check_extension(file_name)?;
    let batch = parse_bank_statement(bytes)?;
    let manifest = store_bank_batch(conn, &batch, file_name, &compute_checksum(bytes), account_type)?;
    info!(importer = ImporterKind::BankStatement.name(), ?manifest, "import finished");
    Ok(manifest)
}

#[instrument(skip(conn, bytes), fields(kind = "card", size = bytes.len()))]
pub fn import_card_statement(
    conn: &Connection,
    bytes: &[u8],
    file_name: &str,
    card_holder: &str,
) -> Result<ImportManifest> {
    check_extension(file_name)?;
    let card_holder = validate_card_holder(card_holder)?;
    let batch = parse_card_statement(bytes, &card_holder)?;
    let manifest = store_card_batch(conn, &batch, file_name, &compute_checksum(bytes), &card_holder)?;
    info!(importer = ImporterKind::CardStatement.name(), ?manifest, "import finished");
    Ok(manifest)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Gates on extension before touching the file, then imports it.
pub fn import_bank_file(conn: &Connection, path: &Path, account_type: AccountType) -> Result<ImportManifest> {
    let file_name = file_name_of(path);
    check_extension(&file_name)?;
    let bytes = std::fs::read(path)?;
    import_bank_statement(conn, &bytes, &file_name, account_type)
}

pub fn import_card_file(conn: &Connection, path: &Path, card_holder: &str) -> Result<ImportManifest> {
    let file_name = file_name_of(path);
    check_extension(&file_name)?;
    validate_card_holder(card_holder)?;
    let bytes = std::fs::read(path)?;
    import_card_statement(conn, &bytes, &file_name, card_holder)
}

pub fn list_imports(conn: &Connection) -> Result<Vec<ImportRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, filename, checksum, account_type, card_holder, \
         COALESCE(total_parsed, 0), COALESCE(new_count, 0), COALESCE(duplicate_count, 0), \
         COALESCE(skipped_rows, 0), imported_at \
         FROM imports ORDER BY id DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ImportRecord {
                id: row.get(0)?,
                kind: row.get(1)?,
                filename: row.get(2)?,
                checksum: row.get(3)?,
                account_type: row.get(4)?,
                card_holder: row.get(5)?,
                total_parsed: row.get(6)?,
                new_count: row.get(7)?,
                duplicate_count: row.get(8)?,
                skipped_rows: row.get(9)?,
                imported_at: row.get(10)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
