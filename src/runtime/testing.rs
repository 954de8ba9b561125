//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::db::{
    sort_newest_first, DbError, Invoice, NewInvoice, NewTransaction, Record, Transaction,
    INVOICE_TERMS_DAYS,
};
use crate::extract::DateRange;
use crate::session::Session;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

fn unavailable() -> DbError {
    DbError::Sqlite(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
        Some("injected failure".to_string()),
    ))
}

// ============================================================================
// Mock Session Store
// ============================================================================

/// In-memory session store
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self, id: &str) -> Option<Session> {
        self.sessions.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn find(&self, id: &str) -> Result<Option<Session>, DbError> {
        Ok(self.stored(id))
    }

    async fn save(&self, session: &Session) -> Result<(), DbError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn expire(&self, id: &str) -> Result<bool, DbError> {
        Ok(self.sessions.lock().unwrap().remove(id).is_some())
    }
}

// ============================================================================
// Mock Record Store
// ============================================================================

/// In-memory record store with switchable write failures
#[derive(Default)]
pub struct InMemoryRecordStore {
    transactions: Mutex<Vec<Transaction>>,
    invoices: Mutex<Vec<Invoice>>,
    fail_writes: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every append fail until switched off again
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions.lock().unwrap().clone()
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.invoices.lock().unwrap().clone()
    }

    fn check_writable(&self) -> Result<(), DbError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

fn matches_party(party: Option<&str>, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => party.is_some_and(|p| p.eq_ignore_ascii_case(wanted)),
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn append_transaction(
        &self,
        business_id: &str,
        new: &NewTransaction,
        now: DateTime<Utc>,
    ) -> Result<Transaction, DbError> {
        self.check_writable()?;
        let mut transactions = self.transactions.lock().unwrap();
        let tx = Transaction {
            id: format!("tx-{}", transactions.len() + 1),
            business_id: business_id.to_string(),
            kind: new.kind,
            party: new.party.clone(),
            amount: new.amount,
            date: new.date,
            category: new.category.clone(),
            created_at: now,
        };
        transactions.push(tx.clone());
        Ok(tx)
    }

    async fn append_invoice(
        &self,
        business_id: &str,
        new: &NewInvoice,
        now: DateTime<Utc>,
    ) -> Result<Invoice, DbError> {
        self.check_writable()?;
        let mut invoices = self.invoices.lock().unwrap();
        let number = invoices
            .iter()
            .filter(|i| i.business_id == business_id)
            .map(|i| i.number)
            .max()
            .unwrap_or(0)
            + 1;
        let invoice = Invoice {
            id: format!("inv-{number}"),
            business_id: business_id.to_string(),
            number,
            recipient: new.recipient.clone(),
            amount: new.amount,
            description: new.description.clone(),
            issue_date: new.issue_date,
            due_date: new.issue_date + Duration::days(INVOICE_TERMS_DAYS),
            gstin: new.gstin.clone(),
            tax: new.tax.clone(),
            created_at: now,
        };
        invoices.push(invoice.clone());
        Ok(invoice)
    }

    async fn query_by_party_and_date_range(
        &self,
        business_id: &str,
        party: Option<&str>,
        range: Option<DateRange>,
    ) -> Result<Vec<Record>, DbError> {
        let mut records: Vec<Record> = self
            .transactions
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.business_id == business_id)
            .cloned()
            .map(Record::Transaction)
            .chain(
                self.invoices
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|i| i.business_id == business_id)
                    .cloned()
                    .map(Record::Invoice),
            )
            .filter(|r| matches_party(r.party(), party) && r.in_range(range))
            .collect();
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn invoice_by_number(&self, business_id: &str, number: i64) -> Result<Invoice, DbError> {
        self.invoices
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.business_id == business_id && i.number == number)
            .cloned()
            .ok_or(DbError::InvoiceNotFound(number))
    }
}

// ============================================================================
// Mock Messenger
// ============================================================================

/// Messenger that records what it was asked to send
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn notify(&self, target: &str, message: &str) -> DeliveryStatus {
        self.sent
            .lock()
            .unwrap()
            .push((target.to_string(), message.to_string()));
        DeliveryStatus::Delivered
    }
}
