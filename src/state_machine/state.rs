//! Dialog state and collected slots

use crate::db::TransactionKind;
use crate::extract::DateRange;
use crate::intent::Intent;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Slots
// ============================================================================

/// A named piece of information a command needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Party,
    Amount,
    /// A single day (record date)
    Date,
    /// A date range (ledger and summary filters)
    Period,
    Category,
    Description,
    /// Delivery address for a sent ledger
    Target,
    InvoiceNumber,
    /// The recipient's GSTIN
    Gstin,
    /// GST rate in percent
    GstRate,
    HsnCode,
    /// Canonical state name
    PlaceOfSupply,
    /// Set by the rule, never asked for
    Kind,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Party => "party",
            Field::Amount => "amount",
            Field::Date => "date",
            Field::Period => "period",
            Field::Category => "category",
            Field::Description => "description",
            Field::Target => "target",
            Field::InvoiceNumber => "invoice_number",
            Field::Gstin => "gstin",
            Field::GstRate => "gst_rate",
            Field::HsnCode => "hsn_code",
            Field::PlaceOfSupply => "place_of_supply",
            Field::Kind => "kind",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SlotValue {
    Text(String),
    Amount(Decimal),
    Date(NaiveDate),
    Range(DateRange),
    Number(i64),
    Percent(Decimal),
    Kind(TransactionKind),
}

/// Values collected so far for the command in progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slots(BTreeMap<Field, SlotValue>);

impl Slots {
    pub fn insert(&mut self, field: Field, value: SlotValue) {
        self.0.insert(field, value);
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        match self.0.get(&field)? {
            SlotValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn amount(&self, field: Field) -> Option<Decimal> {
        match self.0.get(&field)? {
            SlotValue::Amount(amount) => Some(*amount),
            _ => None,
        }
    }

    pub fn date(&self, field: Field) -> Option<NaiveDate> {
        match self.0.get(&field)? {
            SlotValue::Date(date) => Some(*date),
            SlotValue::Range(range) => Some(range.start),
            _ => None,
        }
    }

    pub fn range(&self, field: Field) -> Option<DateRange> {
        match self.0.get(&field)? {
            SlotValue::Range(range) => Some(*range),
            SlotValue::Date(date) => Some(DateRange::day(*date)),
            _ => None,
        }
    }

    pub fn number(&self, field: Field) -> Option<i64> {
        match self.0.get(&field)? {
            SlotValue::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn percent(&self, field: Field) -> Option<Decimal> {
        match self.0.get(&field)? {
            SlotValue::Percent(percent) => Some(*percent),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<TransactionKind> {
        match self.0.get(&Field::Kind)? {
            SlotValue::Kind(kind) => Some(*kind),
            _ => None,
        }
    }
}

// ============================================================================
// Dialog State
// ============================================================================

/// Where a session is in its conversation. Every non-idle state waits on
/// exactly one field and carries the prompt that asked for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogState {
    /// No command in progress
    #[default]
    Idle,

    AwaitingInvoiceField { field: Field, prompt: String },

    AwaitingInvoiceLookupField { field: Field, prompt: String },

    AwaitingExpenseField { field: Field, prompt: String },

    AwaitingPaymentField { field: Field, prompt: String },

    AwaitingLedgerField { field: Field, prompt: String },

    AwaitingSendField { field: Field, prompt: String },

    AwaitingSettleField { field: Field, prompt: String },
}

impl DialogState {
    /// The state that waits on `field` for `intent`. Intents that never
    /// prompt have no waiting state and map to idle.
    pub fn awaiting(intent: Intent, field: Field, prompt: String) -> Self {
        match intent {
            Intent::CreateInvoice => DialogState::AwaitingInvoiceField { field, prompt },
            Intent::ShowInvoice => DialogState::AwaitingInvoiceLookupField { field, prompt },
            Intent::RecordExpense => DialogState::AwaitingExpenseField { field, prompt },
            Intent::RecordPayment => DialogState::AwaitingPaymentField { field, prompt },
            Intent::ShowLedger => DialogState::AwaitingLedgerField { field, prompt },
            Intent::SendLedger => DialogState::AwaitingSendField { field, prompt },
            Intent::SettleLedger => DialogState::AwaitingSettleField { field, prompt },
            Intent::ShowSummary | Intent::ShowMenu | Intent::TaxQuery | Intent::Unknown => {
                DialogState::Idle
            }
        }
    }

    /// The command in progress and the field it waits on
    pub fn pending(&self) -> Option<(Intent, Field, &str)> {
        let (intent, field, prompt) = match self {
            DialogState::Idle => return None,
            DialogState::AwaitingInvoiceField { field, prompt } => {
                (Intent::CreateInvoice, field, prompt)
            }
            DialogState::AwaitingInvoiceLookupField { field, prompt } => {
                (Intent::ShowInvoice, field, prompt)
            }
            DialogState::AwaitingExpenseField { field, prompt } => {
                (Intent::RecordExpense, field, prompt)
            }
            DialogState::AwaitingPaymentField { field, prompt } => {
                (Intent::RecordPayment, field, prompt)
            }
            DialogState::AwaitingLedgerField { field, prompt } => {
                (Intent::ShowLedger, field, prompt)
            }
            DialogState::AwaitingSendField { field, prompt } => (Intent::SendLedger, field, prompt),
            DialogState::AwaitingSettleField { field, prompt } => {
                (Intent::SettleLedger, field, prompt)
            }
        };
        Some((intent, *field, prompt.as_str()))
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, DialogState::Idle)
    }

    /// Short label for logs and API responses, e.g. `awaiting_expense_field:amount`
    pub fn label(&self) -> String {
        let name = match self {
            DialogState::Idle => return "idle".to_string(),
            DialogState::AwaitingInvoiceField { .. } => "awaiting_invoice_field",
            DialogState::AwaitingInvoiceLookupField { .. } => "awaiting_invoice_lookup_field",
            DialogState::AwaitingExpenseField { .. } => "awaiting_expense_field",
            DialogState::AwaitingPaymentField { .. } => "awaiting_payment_field",
            DialogState::AwaitingLedgerField { .. } => "awaiting_ledger_field",
            DialogState::AwaitingSendField { .. } => "awaiting_send_field",
            DialogState::AwaitingSettleField { .. } => "awaiting_settle_field",
        };
        match self.pending() {
            Some((_, field, _)) => format!("{name}:{field}"),
            None => name.to_string(),
        }
    }
}

/// Context for one turn (immutable inputs)
#[derive(Debug, Clone)]
pub struct DialogContext {
    pub session_id: String,
    /// The date relative expressions resolve against
    pub today: NaiveDate,
    /// The business's own GSTIN. Invoices carry GST only when it is set.
    pub seller_gstin: Option<String>,
}

impl DialogContext {
    pub fn new(session_id: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            session_id: session_id.into(),
            today,
            seller_gstin: None,
        }
    }

    pub fn with_seller_gstin(mut self, gstin: Option<String>) -> Self {
        self.seller_gstin = gstin;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_tagged() {
        let state = DialogState::AwaitingExpenseField {
            field: Field::Amount,
            prompt: "How much?".to_string(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["type"], "awaiting_expense_field");
        assert_eq!(json["field"], "amount");

        let back: DialogState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);

        let idle = serde_json::to_string(&DialogState::Idle).unwrap();
        assert_eq!(idle, r#"{"type":"idle"}"#);
    }

    #[test]
    fn test_slots_serialize_as_map() {
        let mut slots = Slots::default();
        slots.insert(Field::Amount, SlotValue::Amount(Decimal::new(45050, 2)));
        slots.insert(Field::Party, SlotValue::Text("Ramesh".to_string()));
        slots.insert(Field::Kind, SlotValue::Kind(TransactionKind::Income));

        let json = serde_json::to_string(&slots).unwrap();
        let back: Slots = serde_json::from_str(&json).unwrap();
        assert_eq!(back, slots);
        assert_eq!(back.amount(Field::Amount), Some(Decimal::new(45050, 2)));
        assert_eq!(back.kind(), Some(TransactionKind::Income));
    }

    #[test]
    fn test_label_names_pending_field() {
        assert_eq!(DialogState::Idle.label(), "idle");
        let state = DialogState::awaiting(Intent::SendLedger, Field::Target, String::new());
        assert_eq!(state.label(), "awaiting_send_field:target");
    }

    #[test]
    fn test_awaiting_round_trips_through_pending() {
        for intent in [
            Intent::CreateInvoice,
            Intent::ShowInvoice,
            Intent::RecordExpense,
            Intent::RecordPayment,
            Intent::ShowLedger,
            Intent::SendLedger,
            Intent::SettleLedger,
        ] {
            let state = DialogState::awaiting(intent, Field::Party, "who?".to_string());
            assert_eq!(state.pending(), Some((intent, Field::Party, "who?")));
        }
        assert!(DialogState::awaiting(Intent::ShowMenu, Field::Party, String::new()).is_idle());
        assert!(DialogState::awaiting(Intent::TaxQuery, Field::Party, String::new()).is_idle());
    }

    #[test]
    fn test_slot_accessors_check_shape() {
        let mut slots = Slots::default();
        slots.insert(Field::Party, SlotValue::Number(3));
        assert!(slots.text(Field::Party).is_none());
        assert!(slots.contains(Field::Party));

        slots.insert(Field::GstRate, SlotValue::Percent(Decimal::from(18)));
        assert_eq!(slots.percent(Field::GstRate), Some(Decimal::from(18)));
        assert!(slots.amount(Field::GstRate).is_none());

        let day = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        slots.insert(Field::Period, SlotValue::Date(day));
        assert_eq!(slots.range(Field::Period), Some(DateRange::day(day)));
    }
}
