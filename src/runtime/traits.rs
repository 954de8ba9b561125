//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::db::{DbError, Invoice, NewInvoice, NewTransaction, Record, Transaction};
use crate::extract::DateRange;
use crate::session::Session;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Storage for session state
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session if it exists
    async fn find(&self, id: &str) -> Result<Option<Session>, DbError>;

    /// Save the full session (state, slots, last activity)
    async fn save(&self, session: &Session) -> Result<(), DbError>;

    /// Forget a session. Returns whether one existed.
    async fn expire(&self, id: &str) -> Result<bool, DbError>;

    /// Load a session, starting a fresh idle one when none exists
    async fn get(&self, id: &str, now: DateTime<Utc>) -> Result<Session, DbError> {
        Ok(self
            .find(id)
            .await?
            .unwrap_or_else(|| Session::new(id, now)))
    }
}

/// Append-only storage for transactions and invoices, scoped per business
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn append_transaction(
        &self,
        business_id: &str,
        new: &NewTransaction,
        now: DateTime<Utc>,
    ) -> Result<Transaction, DbError>;

    /// Store an invoice under the business's next sequential number
    async fn append_invoice(
        &self,
        business_id: &str,
        new: &NewInvoice,
        now: DateTime<Utc>,
    ) -> Result<Invoice, DbError>;

    /// Records newest first, optionally narrowed to a party (case-insensitive)
    /// and an inclusive date range
    async fn query_by_party_and_date_range(
        &self,
        business_id: &str,
        party: Option<&str>,
        range: Option<DateRange>,
    ) -> Result<Vec<Record>, DbError>;

    async fn invoice_by_number(&self, business_id: &str, number: i64) -> Result<Invoice, DbError>;
}

/// Outcome of handing a message to a delivery channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed(String),
}

/// Outbound delivery of rendered replies (ledgers sent to a party)
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn notify(&self, target: &str, message: &str) -> DeliveryStatus;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn find(&self, id: &str) -> Result<Option<Session>, DbError> {
        (**self).find(id).await
    }

    async fn save(&self, session: &Session) -> Result<(), DbError> {
        (**self).save(session).await
    }

    async fn expire(&self, id: &str) -> Result<bool, DbError> {
        (**self).expire(id).await
    }
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn append_transaction(
        &self,
        business_id: &str,
        new: &NewTransaction,
        now: DateTime<Utc>,
    ) -> Result<Transaction, DbError> {
        (**self).append_transaction(business_id, new, now).await
    }

    async fn append_invoice(
        &self,
        business_id: &str,
        new: &NewInvoice,
        now: DateTime<Utc>,
    ) -> Result<Invoice, DbError> {
        (**self).append_invoice(business_id, new, now).await
    }

    async fn query_by_party_and_date_range(
        &self,
        business_id: &str,
        party: Option<&str>,
        range: Option<DateRange>,
    ) -> Result<Vec<Record>, DbError> {
        (**self)
            .query_by_party_and_date_range(business_id, party, range)
            .await
    }

    async fn invoice_by_number(&self, business_id: &str, number: i64) -> Result<Invoice, DbError> {
        (**self).invoice_by_number(business_id, number).await
    }
}

#[async_trait]
impl<T: Messenger + ?Sized> Messenger for Arc<T> {
    async fn notify(&self, target: &str, message: &str) -> DeliveryStatus {
        (**self).notify(target, message).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

use crate::db::Database;

/// Adapter to use Database as both stores
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for DatabaseStorage {
    async fn find(&self, id: &str) -> Result<Option<Session>, DbError> {
        match self.db.get_session(id) {
            Ok(session) => Ok(Some(session)),
            Err(DbError::SessionNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save(&self, session: &Session) -> Result<(), DbError> {
        self.db.save_session(session)
    }

    async fn expire(&self, id: &str) -> Result<bool, DbError> {
        self.db.delete_session(id)
    }
}

#[async_trait]
impl RecordStore for DatabaseStorage {
    async fn append_transaction(
        &self,
        business_id: &str,
        new: &NewTransaction,
        now: DateTime<Utc>,
    ) -> Result<Transaction, DbError> {
        self.db.insert_transaction(business_id, new, now)
    }

    async fn append_invoice(
        &self,
        business_id: &str,
        new: &NewInvoice,
        now: DateTime<Utc>,
    ) -> Result<Invoice, DbError> {
        self.db.insert_invoice(business_id, new, now)
    }

    async fn query_by_party_and_date_range(
        &self,
        business_id: &str,
        party: Option<&str>,
        range: Option<DateRange>,
    ) -> Result<Vec<Record>, DbError> {
        self.db.list_records(business_id, party, range)
    }

    async fn invoice_by_number(&self, business_id: &str, number: i64) -> Result<Invoice, DbError> {
        self.db.get_invoice(business_id, number)
    }
}

/// Messenger with no outbound channel configured. Deliveries are logged and
/// reported as delivered.
#[derive(Clone, Default)]
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn notify(&self, target: &str, message: &str) -> DeliveryStatus {
        tracing::info!(target_address = %target, bytes = message.len(), "Simulated ledger delivery");
        DeliveryStatus::Delivered
    }
}
