//! Database module for munim
//!
//! Provides persistence for sessions, transactions and invoices.

mod schema;

pub use schema::*;

use crate::extract::DateRange;
use crate::session::Session;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Could not encode session: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(i64),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Session Operations ====================

    /// Get session by ID
    pub fn get_session(&self, id: &str) -> DbResult<Session> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, state, slots, last_activity, created_at FROM sessions WHERE id = ?1",
        )?;

        stmt.query_row(params![id], |row| {
            let state_json: String = row.get(1)?;
            let slots_json: String = row.get(2)?;
            Ok(Session {
                id: row.get(0)?,
                // A state written by an older build starts over rather than failing the turn
                state: serde_json::from_str(&state_json).unwrap_or_default(),
                slots: serde_json::from_str(&slots_json).unwrap_or_default(),
                last_activity: parse_datetime(&row.get::<_, String>(3)?),
                created_at: parse_datetime(&row.get::<_, String>(4)?),
            })
        })
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::SessionNotFound(id.to_string()),
            other => DbError::Sqlite(other),
        })
    }

    /// Insert or replace a session
    pub fn save_session(&self, session: &Session) -> DbResult<()> {
        let state = serde_json::to_string(&session.state)?;
        let slots = serde_json::to_string(&session.slots)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions (id, state, slots, last_activity, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                state = excluded.state,
                slots = excluded.slots,
                last_activity = excluded.last_activity",
            params![
                session.id,
                state,
                slots,
                session.last_activity.to_rfc3339(),
                session.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Delete a session. Returns whether one existed.
    pub fn delete_session(&self, id: &str) -> DbResult<bool> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // ==================== Transaction Operations ====================

    /// Append a transaction
    pub fn insert_transaction(
        &self,
        business_id: &str,
        new: &NewTransaction,
        now: DateTime<Utc>,
    ) -> DbResult<Transaction> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO transactions (id, business_id, kind, party, amount, date, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                business_id,
                new.kind.as_str(),
                new.party,
                new.amount.to_string(),
                format_date(new.date),
                new.category,
                now.to_rfc3339()
            ],
        )?;

        Ok(Transaction {
            id,
            business_id: business_id.to_string(),
            kind: new.kind,
            party: new.party.clone(),
            amount: new.amount,
            date: new.date,
            category: new.category.clone(),
            created_at: now,
        })
    }

    /// Transactions for a business, optionally narrowed to one party
    /// (case-insensitive) and an inclusive date range
    pub fn list_transactions(
        &self,
        business_id: &str,
        party: Option<&str>,
        range: Option<DateRange>,
    ) -> DbResult<Vec<Transaction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, business_id, kind, party, amount, date, category, created_at
             FROM transactions
             WHERE business_id = ?1
               AND (?2 IS NULL OR party = ?2 COLLATE NOCASE)
               AND (?3 IS NULL OR date >= ?3)
               AND (?4 IS NULL OR date <= ?4)
             ORDER BY date DESC, created_at DESC",
        )?;

        let (start, end) = range_bounds(range);
        let rows = stmt.query_map(params![business_id, party, start, end], |row| {
            let kind: String = row.get(2)?;
            Ok(Transaction {
                id: row.get(0)?,
                business_id: row.get(1)?,
                kind: kind
                    .parse()
                    .map_err(|e: String| conversion_error(2, e.into()))?,
                party: row.get(3)?,
                amount: decimal_column(row, 4)?,
                date: date_column(row, 5)?,
                category: row.get(6)?,
                created_at: parse_datetime(&row.get::<_, String>(7)?),
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ==================== Invoice Operations ====================

    /// Store an invoice under the business's next number. Number allocation and
    /// insert share one SQLite transaction, so numbers never repeat.
    pub fn insert_invoice(
        &self,
        business_id: &str,
        new: &NewInvoice,
        now: DateTime<Utc>,
    ) -> DbResult<Invoice> {
        let id = uuid::Uuid::new_v4().to_string();
        let due_date = new.issue_date + Duration::days(INVOICE_TERMS_DAYS);

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let number: i64 = tx.query_row(
            "SELECT COALESCE(MAX(number), 0) + 1 FROM invoices WHERE business_id = ?1",
            params![business_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO invoices (id, business_id, number, recipient, amount, description,
                                   issue_date, due_date, gstin, seller_gstin, hsn_sac,
                                   place_of_supply, interstate, gst_rate, cgst, sgst, igst,
                                   created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18)",
            params![
                id,
                business_id,
                number,
                new.recipient,
                new.amount.to_string(),
                new.description,
                format_date(new.issue_date),
                format_date(due_date),
                new.gstin,
                new.tax.seller_gstin,
                new.tax.hsn_sac,
                new.tax.place_of_supply,
                new.tax.interstate,
                new.tax.rate.to_string(),
                new.tax.cgst.to_string(),
                new.tax.sgst.to_string(),
                new.tax.igst.to_string(),
                now.to_rfc3339()
            ],
        )?;
        tx.commit()?;

        Ok(Invoice {
            id,
            business_id: business_id.to_string(),
            number,
            recipient: new.recipient.clone(),
            amount: new.amount,
            description: new.description.clone(),
            issue_date: new.issue_date,
            due_date,
            gstin: new.gstin.clone(),
            tax: new.tax.clone(),
            created_at: now,
        })
    }

    /// Get invoice by its sequential number
    pub fn get_invoice(&self, business_id: &str, number: i64) -> DbResult<Invoice> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, business_id, number, recipient, amount, description, issue_date,
                    due_date, gstin, seller_gstin, hsn_sac, place_of_supply, interstate,
                    gst_rate, cgst, sgst, igst, created_at
             FROM invoices WHERE business_id = ?1 AND number = ?2",
        )?;

        stmt.query_row(params![business_id, number], invoice_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => DbError::InvoiceNotFound(number),
                other => DbError::Sqlite(other),
            })
    }

    /// Invoices for a business, filtered like [`Database::list_transactions`]
    pub fn list_invoices(
        &self,
        business_id: &str,
        recipient: Option<&str>,
        range: Option<DateRange>,
    ) -> DbResult<Vec<Invoice>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, business_id, number, recipient, amount, description, issue_date,
                    due_date, gstin, seller_gstin, hsn_sac, place_of_supply, interstate,
                    gst_rate, cgst, sgst, igst, created_at
             FROM invoices
             WHERE business_id = ?1
               AND (?2 IS NULL OR recipient = ?2 COLLATE NOCASE)
               AND (?3 IS NULL OR issue_date >= ?3)
               AND (?4 IS NULL OR issue_date <= ?4)
             ORDER BY issue_date DESC, number DESC",
        )?;

        let (start, end) = range_bounds(range);
        let rows = stmt.query_map(params![business_id, recipient, start, end], invoice_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Transactions and invoices together, newest first
    pub fn list_records(
        &self,
        business_id: &str,
        party: Option<&str>,
        range: Option<DateRange>,
    ) -> DbResult<Vec<Record>> {
        let mut records: Vec<Record> = self
            .list_transactions(business_id, party, range)?
            .into_iter()
            .map(Record::Transaction)
            .chain(
                self.list_invoices(business_id, party, range)?
                    .into_iter()
                    .map(Record::Invoice),
            )
            .collect();
        sort_newest_first(&mut records);
        Ok(records)
    }
}

fn invoice_from_row(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    Ok(Invoice {
        id: row.get(0)?,
        business_id: row.get(1)?,
        number: row.get(2)?,
        recipient: row.get(3)?,
        amount: decimal_column(row, 4)?,
        description: row.get(5)?,
        issue_date: date_column(row, 6)?,
        due_date: date_column(row, 7)?,
        gstin: row.get(8)?,
        tax: InvoiceTax {
            seller_gstin: row.get(9)?,
            hsn_sac: row.get(10)?,
            place_of_supply: row.get(11)?,
            interstate: row.get(12)?,
            rate: decimal_column(row, 13)?,
            cgst: decimal_column(row, 14)?,
            sgst: decimal_column(row, 15)?,
            igst: decimal_column(row, 16)?,
        },
        created_at: parse_datetime(&row.get::<_, String>(17)?),
    })
}

fn range_bounds(range: Option<DateRange>) -> (Option<String>, Option<String>) {
    match range {
        Some(range) => (Some(format_date(range.start)), Some(format_date(range.end))),
        None => (None, None),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn conversion_error(
    index: usize,
    error: Box<dyn std::error::Error + Send + Sync>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, error)
}

fn decimal_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(index)?;
    Decimal::from_str_exact(&raw).map_err(|e| conversion_error(index, Box::new(e)))
}

fn date_column(row: &Row<'_>, index: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(index)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_error(index, Box::new(e)))
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
