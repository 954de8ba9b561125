//! Database schema and record types

use crate::extract::DateRange;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL schema for initialization
///
/// Amounts are stored as decimal strings and dates as `YYYY-MM-DD`, so range
/// filters compare lexically and never round.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    state TEXT NOT NULL DEFAULT '{"type":"idle"}',
    slots TEXT NOT NULL DEFAULT '{}',
    last_activity TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    business_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    party TEXT,
    amount TEXT NOT NULL,
    date TEXT NOT NULL,
    category TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_business_date ON transactions(business_id, date);
CREATE INDEX IF NOT EXISTS idx_transactions_party ON transactions(business_id, party COLLATE NOCASE);

CREATE TABLE IF NOT EXISTS invoices (
    id TEXT PRIMARY KEY,
    business_id TEXT NOT NULL,
    number INTEGER NOT NULL,
    recipient TEXT NOT NULL,
    amount TEXT NOT NULL,
    description TEXT NOT NULL,
    issue_date TEXT NOT NULL,
    due_date TEXT NOT NULL,
    gstin TEXT,
    seller_gstin TEXT,
    hsn_sac TEXT NOT NULL DEFAULT '',
    place_of_supply TEXT,
    interstate INTEGER NOT NULL DEFAULT 0,
    gst_rate TEXT NOT NULL DEFAULT '0',
    cgst TEXT NOT NULL DEFAULT '0',
    sgst TEXT NOT NULL DEFAULT '0',
    igst TEXT NOT NULL DEFAULT '0',
    created_at TEXT NOT NULL,

    UNIQUE (business_id, number)
);

CREATE INDEX IF NOT EXISTS idx_invoices_recipient ON invoices(business_id, recipient COLLATE NOCASE);
"#;

/// Days between an invoice's issue date and its due date
pub const INVOICE_TERMS_DAYS: i64 = 30;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Transactions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Money paid out
    Expense,
    /// Money received without a counterparty on the books
    Income,
    /// Money received from a party
    Payment,
    /// Money paid to a party against what you owe them
    Payout,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Expense => "expense",
            TransactionKind::Income => "income",
            TransactionKind::Payment => "payment",
            TransactionKind::Payout => "payout",
        }
    }

    pub fn is_inflow(self) -> bool {
        matches!(self, TransactionKind::Income | TransactionKind::Payment)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expense" => Ok(TransactionKind::Expense),
            "income" => Ok(TransactionKind::Income),
            "payment" => Ok(TransactionKind::Payment),
            "payout" => Ok(TransactionKind::Payout),
            _ => Err(format!("Unknown transaction kind: {s}")),
        }
    }
}

/// A transaction about to be appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub party: Option<String>,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub category: Option<String>,
}

/// A stored transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub business_id: String,
    pub kind: TransactionKind,
    pub party: Option<String>,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Invoices
// ============================================================================

/// GST charged on an invoice. All zero when the business has no GSTIN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTax {
    pub seller_gstin: Option<String>,
    /// HSN code for goods, SAC for services
    pub hsn_sac: String,
    /// State the supply is made to
    pub place_of_supply: Option<String>,
    /// Supplied to another state: IGST instead of CGST + SGST
    pub interstate: bool,
    /// Percent
    pub rate: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
}

impl InvoiceTax {
    pub fn total(&self) -> Decimal {
        self.cgst.saturating_add(self.sgst).saturating_add(self.igst)
    }

    pub fn is_charged(&self) -> bool {
        self.seller_gstin.is_some()
    }
}

/// An invoice about to be issued; the store assigns its number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoice {
    pub recipient: String,
    /// Taxable value
    pub amount: Decimal,
    pub description: String,
    pub issue_date: NaiveDate,
    /// Recipient's GSTIN
    pub gstin: Option<String>,
    pub tax: InvoiceTax,
}

/// A stored invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub business_id: String,
    /// Sequential per business, starting at 1
    pub number: i64,
    pub recipient: String,
    /// Taxable value
    pub amount: Decimal,
    pub description: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Recipient's GSTIN
    pub gstin: Option<String>,
    pub tax: InvoiceTax,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Human-facing number, e.g. `INV-0007`
    pub fn display_number(&self) -> String {
        format_invoice_number(self.number)
    }

    /// Taxable value plus GST; what the recipient owes
    pub fn total(&self) -> Decimal {
        self.amount.saturating_add(self.tax.total())
    }
}

pub fn format_invoice_number(number: i64) -> String {
    format!("INV-{number:04}")
}

// ============================================================================
// Records
// ============================================================================

/// Anything that moves a ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum Record {
    Transaction(Transaction),
    Invoice(Invoice),
}

impl Record {
    pub fn date(&self) -> NaiveDate {
        match self {
            Record::Transaction(tx) => tx.date,
            Record::Invoice(inv) => inv.issue_date,
        }
    }

    pub fn party(&self) -> Option<&str> {
        match self {
            Record::Transaction(tx) => tx.party.as_deref(),
            Record::Invoice(inv) => Some(&inv.recipient),
        }
    }

    pub fn amount(&self) -> Decimal {
        match self {
            Record::Transaction(tx) => tx.amount,
            Record::Invoice(inv) => inv.total(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Record::Transaction(tx) => tx.created_at,
            Record::Invoice(inv) => inv.created_at,
        }
    }

    pub fn in_range(&self, range: Option<DateRange>) -> bool {
        range.map_or(true, |r| r.contains(self.date()))
    }
}

/// Newest first: by date, then by when the record was written
pub fn sort_newest_first(records: &mut [Record]) {
    records.sort_by(|a, b| {
        b.date()
            .cmp(&a.date())
            .then_with(|| b.created_at().cmp(&a.created_at()))
    });
}
