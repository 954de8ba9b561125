//! Effects produced by state transitions

use crate::db::{NewInvoice, NewTransaction};
use crate::extract::DateRange;
use chrono::NaiveDate;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send formatted text back to the user
    Reply { text: String },

    /// Append a transaction to the record store
    AppendTransaction(NewTransaction),

    /// Allocate the next invoice number and store the invoice
    AppendInvoice(NewInvoice),

    /// Read a party's ledger and reply with it
    ShowLedger {
        party: String,
        period: Option<DateRange>,
    },

    /// Render a party's ledger and hand it to the messenger
    SendLedger { party: String, target: String },

    /// Record whatever brings a party's balance to zero
    SettleLedger { party: String, date: NaiveDate },

    /// Look up an invoice by its sequential number
    ShowInvoice { number: i64 },

    /// Summarize income and expenses over a period
    ShowSummary { period: DateRange },

    /// Persist the session (state, slots, last activity)
    PersistSession,
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply { text: text.into() }
    }

    /// Whether executing this effect writes to the record store
    #[cfg(test)]
    pub fn writes_records(&self) -> bool {
        matches!(
            self,
            Effect::AppendTransaction(_) | Effect::AppendInvoice(_) | Effect::SettleLedger { .. }
        )
    }
}
