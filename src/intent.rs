//! Intent classification
//!
//! Commands are matched against an ordered table of phrase rules. Each rule
//! names its intent and the slots to pull out of the rest of the message, in
//! the order they are extracted. Multi-word phrases are tried before single
//! keywords; rules of equal length keep table order. First match wins, except
//! that tax questions give way to any other rule when the message holds an
//! amount ("paid ₹500 gst" is an expense).

use crate::db::TransactionKind;
use crate::extract::{
    clean_free_text, collapse_whitespace, extract_amount, extract_category, extract_date,
    extract_email, extract_gst_rate, extract_gstin, extract_hsn_code, extract_invoice_number,
    extract_party, extract_place_of_supply, gst_rate_answer, leading_name, party_answer,
    place_answer, DateRange,
};
use crate::tax::gst::is_rate_slab;
use crate::state_machine::state::{Field, SlotValue, Slots};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// The closed set of things a message can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CreateInvoice,
    ShowInvoice,
    RecordExpense,
    RecordPayment,
    ShowLedger,
    SendLedger,
    ShowSummary,
    ShowMenu,
    SettleLedger,
    /// A GST or tax question, answered from the advisory knowledge base
    TaxQuery,
    Unknown,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::CreateInvoice => "create_invoice",
            Intent::ShowInvoice => "show_invoice",
            Intent::RecordExpense => "record_expense",
            Intent::RecordPayment => "record_payment",
            Intent::ShowLedger => "show_ledger",
            Intent::SendLedger => "send_ledger",
            Intent::ShowSummary => "show_summary",
            Intent::ShowMenu => "show_menu",
            Intent::SettleLedger => "settle_ledger",
            Intent::TaxQuery => "tax_query",
            Intent::Unknown => "unknown",
        }
    }

    /// Marker words that introduce the counterparty for this intent, most specific first
    pub fn party_markers(self) -> &'static [&'static str] {
        match self {
            Intent::CreateInvoice => &["to", "for"],
            Intent::RecordExpense => &["to", "at"],
            Intent::RecordPayment => &["from", "by"],
            _ => &["of", "for", "with"],
        }
    }

    /// The slot that absorbs whatever text is left once the structured slots are out
    pub fn free_text_field(self) -> Option<Field> {
        match self {
            Intent::RecordExpense | Intent::RecordPayment => Some(Field::Category),
            Intent::CreateInvoice => Some(Field::Description),
            Intent::ShowLedger | Intent::SendLedger | Intent::SettleLedger => Some(Field::Party),
            Intent::ShowInvoice
            | Intent::ShowSummary
            | Intent::ShowMenu
            | Intent::TaxQuery
            | Intent::Unknown => None,
        }
    }

    /// Slots a command of this intent extracts, in extraction order
    pub fn slots(self) -> &'static [Field] {
        match self {
            Intent::CreateInvoice => INVOICE_SLOTS,
            Intent::RecordExpense | Intent::RecordPayment => TRANSACTION_SLOTS,
            Intent::ShowLedger => LEDGER_SLOTS,
            Intent::SendLedger => SEND_SLOTS,
            Intent::SettleLedger => SETTLE_SLOTS,
            Intent::ShowInvoice => LOOKUP_SLOTS,
            Intent::ShowSummary => SUMMARY_SLOTS,
            Intent::ShowMenu | Intent::TaxQuery | Intent::Unknown => NO_SLOTS,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Rule table
// ============================================================================

const INVOICE_SLOTS: &[Field] = &[
    Field::Gstin,
    Field::GstRate,
    Field::HsnCode,
    Field::PlaceOfSupply,
    Field::Amount,
    Field::Date,
    Field::Party,
    Field::Description,
];
const TRANSACTION_SLOTS: &[Field] = &[Field::Amount, Field::Date, Field::Party, Field::Category];
const LEDGER_SLOTS: &[Field] = &[Field::Period, Field::Party];
const SEND_SLOTS: &[Field] = &[Field::Target, Field::Party];
const SETTLE_SLOTS: &[Field] = &[Field::Date, Field::Party];
const LOOKUP_SLOTS: &[Field] = &[Field::InvoiceNumber];
const SUMMARY_SLOTS: &[Field] = &[Field::Period];
const NO_SLOTS: &[Field] = &[];

/// One row of the rule table
pub struct RuleSpec {
    pub phrase: &'static str,
    pub intent: Intent,
    pub kind: Option<TransactionKind>,
    pub slots: &'static [Field],
    /// Skipped in favour of other rules when the message holds an amount
    pub defers_to_amounts: bool,
}

const fn spec(phrase: &'static str, intent: Intent, slots: &'static [Field]) -> RuleSpec {
    RuleSpec {
        phrase,
        intent,
        kind: None,
        slots,
        defers_to_amounts: false,
    }
}

const fn income(phrase: &'static str) -> RuleSpec {
    RuleSpec {
        phrase,
        intent: Intent::RecordPayment,
        kind: Some(TransactionKind::Income),
        slots: TRANSACTION_SLOTS,
        defers_to_amounts: false,
    }
}

const fn tax(phrase: &'static str) -> RuleSpec {
    RuleSpec {
        phrase,
        intent: Intent::TaxQuery,
        kind: None,
        slots: NO_SLOTS,
        defers_to_amounts: true,
    }
}

pub static RULE_TABLE: &[RuleSpec] = &[
    // Ledger delivery and settlement
    spec("send ledger", Intent::SendLedger, SEND_SLOTS),
    spec("email ledger", Intent::SendLedger, SEND_SLOTS),
    spec("share ledger", Intent::SendLedger, SEND_SLOTS),
    spec("send statement", Intent::SendLedger, SEND_SLOTS),
    spec("settle up with", Intent::SettleLedger, SETTLE_SLOTS),
    spec("settlement with", Intent::SettleLedger, SETTLE_SLOTS),
    spec("settle with", Intent::SettleLedger, SETTLE_SLOTS),
    spec("settle ledger", Intent::SettleLedger, SETTLE_SLOTS),
    spec("mark settled", Intent::SettleLedger, SETTLE_SLOTS),
    // Summaries
    spec("profit and loss", Intent::ShowSummary, SUMMARY_SLOTS),
    spec("expense summary", Intent::ShowSummary, SUMMARY_SLOTS),
    spec("spending summary", Intent::ShowSummary, SUMMARY_SLOTS),
    spec("financial report", Intent::ShowSummary, SUMMARY_SLOTS),
    spec("financial summary", Intent::ShowSummary, SUMMARY_SLOTS),
    spec("show summary", Intent::ShowSummary, SUMMARY_SLOTS),
    spec("show expenses", Intent::ShowSummary, SUMMARY_SLOTS),
    // Invoices
    spec("show invoice", Intent::ShowInvoice, LOOKUP_SLOTS),
    spec("view invoice", Intent::ShowInvoice, LOOKUP_SLOTS),
    spec("find invoice", Intent::ShowInvoice, LOOKUP_SLOTS),
    spec("open invoice", Intent::ShowInvoice, LOOKUP_SLOTS),
    spec("create invoice", Intent::CreateInvoice, INVOICE_SLOTS),
    spec("new invoice", Intent::CreateInvoice, INVOICE_SLOTS),
    spec("generate invoice", Intent::CreateInvoice, INVOICE_SLOTS),
    spec("raise invoice", Intent::CreateInvoice, INVOICE_SLOTS),
    // Ledger views
    spec("show ledger", Intent::ShowLedger, LEDGER_SLOTS),
    spec("view ledger", Intent::ShowLedger, LEDGER_SLOTS),
    spec("open ledger", Intent::ShowLedger, LEDGER_SLOTS),
    // Expenses
    spec("record an expense", Intent::RecordExpense, TRANSACTION_SLOTS),
    spec("record expense", Intent::RecordExpense, TRANSACTION_SLOTS),
    spec("add expense", Intent::RecordExpense, TRANSACTION_SLOTS),
    spec("new expense", Intent::RecordExpense, TRANSACTION_SLOTS),
    spec("log expense", Intent::RecordExpense, TRANSACTION_SLOTS),
    // Payments and income
    spec("record payment", Intent::RecordPayment, TRANSACTION_SLOTS),
    spec("add payment", Intent::RecordPayment, TRANSACTION_SLOTS),
    spec("payment received", Intent::RecordPayment, TRANSACTION_SLOTS),
    spec("received payment", Intent::RecordPayment, TRANSACTION_SLOTS),
    spec("got paid", Intent::RecordPayment, TRANSACTION_SLOTS),
    income("record income"),
    income("add income"),
    // Menu
    spec("what can you do", Intent::ShowMenu, NO_SLOTS),
    spec("show menu", Intent::ShowMenu, NO_SLOTS),
    spec("main menu", Intent::ShowMenu, NO_SLOTS),
    // Tax questions
    tax("gst rate"),
    tax("tax rate"),
    tax("hsn code"),
    tax("sac code"),
    tax("filing deadline"),
    tax("input tax credit"),
    tax("composition scheme"),
    tax("reverse charge"),
    tax("invoice requirements"),
    tax("gst registration"),
    tax("tax deducted"),
    tax("e-way bill"),
    tax("eway bill"),
    // Single keywords
    tax("gst"),
    tax("gstr"),
    tax("tds"),
    tax("hsn"),
    tax("sac"),
    tax("igst"),
    tax("cgst"),
    tax("sgst"),
    tax("itc"),
    tax("tax"),
    tax("taxes"),
    tax("deadline"),
    spec("spent", Intent::RecordExpense, TRANSACTION_SLOTS),
    spec("paid", Intent::RecordExpense, TRANSACTION_SLOTS),
    spec("bought", Intent::RecordExpense, TRANSACTION_SLOTS),
    spec("purchased", Intent::RecordExpense, TRANSACTION_SLOTS),
    spec("expense", Intent::RecordExpense, TRANSACTION_SLOTS),
    spec("received", Intent::RecordPayment, TRANSACTION_SLOTS),
    spec("collected", Intent::RecordPayment, TRANSACTION_SLOTS),
    spec("payment", Intent::RecordPayment, TRANSACTION_SLOTS),
    income("earned"),
    income("income"),
    spec("invoice", Intent::CreateInvoice, INVOICE_SLOTS),
    spec("ledger", Intent::ShowLedger, LEDGER_SLOTS),
    spec("balance", Intent::ShowLedger, LEDGER_SLOTS),
    spec("outstanding", Intent::ShowLedger, LEDGER_SLOTS),
    spec("settle", Intent::SettleLedger, SETTLE_SLOTS),
    spec("summary", Intent::ShowSummary, SUMMARY_SLOTS),
    spec("report", Intent::ShowSummary, SUMMARY_SLOTS),
    spec("menu", Intent::ShowMenu, NO_SLOTS),
    spec("help", Intent::ShowMenu, NO_SLOTS),
    spec("hello", Intent::ShowMenu, NO_SLOTS),
    spec("hi", Intent::ShowMenu, NO_SLOTS),
    spec("?", Intent::ShowMenu, NO_SLOTS),
];

/// A compiled rule
pub struct IntentRule {
    pub spec: &'static RuleSpec,
    pub specificity: usize,
    regex: Regex,
}

impl IntentRule {
    fn compile(spec: &'static RuleSpec) -> Self {
        let words: Vec<String> = spec.phrase.split(' ').map(regex::escape).collect();
        let starts_word = spec.phrase.starts_with(|c: char| c.is_alphanumeric());
        let ends_word = spec.phrase.ends_with(|c: char| c.is_alphanumeric());
        let pattern = format!(
            "(?i){}{}{}",
            if starts_word { r"\b" } else { "" },
            words.join(r"\s+"),
            if ends_word { r"\b" } else { "" },
        );
        Self {
            spec,
            specificity: words.len(),
            regex: Regex::new(&pattern).expect("invalid intent rule"),
        }
    }

    pub fn find(&self, text: &str) -> Option<(usize, usize)> {
        self.regex.find(text).map(|m| (m.start(), m.end()))
    }
}

/// Rules in evaluation order
pub static RULES: LazyLock<Vec<IntentRule>> = LazyLock::new(|| {
    let mut rules: Vec<IntentRule> = RULE_TABLE.iter().map(IntentRule::compile).collect();
    // Stable sort keeps table order within equal specificity
    rules.sort_by(|a, b| b.specificity.cmp(&a.specificity));
    rules
});

fn match_rule(text: &str) -> Option<(&'static IntentRule, usize, usize)> {
    let first = |rule: &'static IntentRule| rule.find(text).map(|(start, end)| (rule, start, end));
    if extract_amount(text).value.is_some() {
        if let Some(found) = RULES
            .iter()
            .filter(|rule| !rule.spec.defers_to_amounts)
            .find_map(first)
        {
            return Some(found);
        }
    }
    RULES.iter().find_map(first)
}

/// A word that is a whole single-keyword rule ("paid", "invoice")
fn is_keyword(word: &str) -> bool {
    RULE_TABLE
        .iter()
        .any(|rule| !rule.phrase.contains(' ') && rule.phrase.eq_ignore_ascii_case(word))
}

// ============================================================================
// Escapes
// ============================================================================

/// Words that leave any dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    Cancel,
    Menu,
}

static CANCEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:cancel|exit|quit|stop|abort|never\s*mind)(?:\s+(?:it|that|this|please))?\s*[.!?]*\s*$",
    )
    .unwrap()
});

static MENU_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:menu|main\s+menu|show\s+menu|help|\?)\s*[.!?]*\s*$").unwrap()
});

pub fn escape(text: &str) -> Option<Escape> {
    if CANCEL_RE.is_match(text) {
        Some(Escape::Cancel)
    } else if MENU_RE.is_match(text) {
        Some(Escape::Menu)
    } else {
        None
    }
}

static QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:what|how|when|which|who|why|is|are|do|does|can|should)\b|\?\s*$").unwrap()
});

/// Whether a message reads as a command rather than as an answer. Single
/// keywords only count when they are the whole message, so "paid parking" is
/// still a fine category. A single tax keyword counts only in a question, so
/// "gst" can still be a category.
pub fn is_command(text: &str) -> bool {
    let text = collapse_whitespace(text);
    RULES.iter().any(|rule| match rule.find(&text) {
        Some(_) if rule.specificity > 1 => true,
        Some(_) if rule.spec.intent == Intent::TaxQuery => QUESTION_RE.is_match(&text),
        Some((start, end)) => start == 0 && end == text.len(),
        None => false,
    })
}

// ============================================================================
// Classification
// ============================================================================

/// Result of classifying one message
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    /// Phrase of the rule that matched
    pub rule: Option<&'static str>,
    pub slots: Slots,
    /// A "from X to Y" range was written backwards and has been swapped
    pub swapped_range: Option<DateRange>,
}

impl Classification {
    fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            rule: None,
            slots: Slots::default(),
            swapped_range: None,
        }
    }
}

/// Classify a top-level message and pull out any slots given inline.
pub fn classify(text: &str, today: NaiveDate) -> Classification {
    let text = collapse_whitespace(text);
    let Some((rule, start, end)) = match_rule(&text) else {
        return Classification::unknown();
    };

    let mut residual = text;
    residual.replace_range(start..end, " ");
    let mut residual = collapse_whitespace(&residual);

    let intent = rule.spec.intent;
    let mut slots = Slots::default();
    let mut swapped_range = None;
    if let Some(kind) = rule.spec.kind {
        slots.insert(Field::Kind, SlotValue::Kind(kind));
    }

    for field in rule.spec.slots {
        residual = fill_inline(intent, *field, &residual, today, &mut slots, &mut swapped_range);
    }

    Classification {
        intent,
        rule: Some(rule.spec.phrase),
        slots,
        swapped_range,
    }
}

/// Run one slot extractor over the residual text, returning what is left.
fn fill_inline(
    intent: Intent,
    field: Field,
    text: &str,
    today: NaiveDate,
    slots: &mut Slots,
    swapped_range: &mut Option<DateRange>,
) -> String {
    match field {
        Field::Amount => {
            let found = extract_amount(text);
            if let Some(amount) = found.value {
                slots.insert(field, SlotValue::Amount(amount));
            }
            found.residual
        }
        Field::Date | Field::Period => {
            let found = extract_date(text, today);
            if let Some(date) = found.value {
                if field == Field::Date {
                    slots.insert(field, SlotValue::Date(date.day()));
                } else {
                    slots.insert(field, SlotValue::Range(date.range));
                }
                if date.reversed {
                    *swapped_range = Some(date.range);
                }
            }
            found.residual
        }
        Field::Party => {
            let found = extract_party(text, intent.party_markers());
            if let Some(party) = found.value {
                slots.insert(field, SlotValue::Text(party));
                return found.residual;
            }
            if intent.free_text_field() == Some(Field::Party) {
                if let Some(party) = party_answer(text) {
                    slots.insert(field, SlotValue::Text(party));
                    return String::new();
                }
            }
            found.residual
        }
        Field::Category | Field::Description => {
            let found = extract_category(text);
            if let Some(value) = found.value {
                slots.insert(field, SlotValue::Text(value));
            }
            found.residual
        }
        Field::Target => {
            let found = extract_email(text);
            if let Some(target) = found.value {
                slots.insert(field, SlotValue::Text(target));
            }
            found.residual
        }
        Field::InvoiceNumber => {
            let found = extract_invoice_number(text);
            if let Some(number) = found.value {
                slots.insert(field, SlotValue::Number(number));
            }
            found.residual
        }
        Field::Gstin => {
            let found = extract_gstin(text);
            if let Some(gstin) = found.value {
                slots.insert(field, SlotValue::Text(gstin));
            }
            found.residual
        }
        Field::GstRate => {
            // An off-slab rate is dropped but still taken out of the text
            let found = extract_gst_rate(text);
            if let Some(rate) = found.value.filter(|rate| is_rate_slab(*rate)) {
                slots.insert(field, SlotValue::Percent(rate));
            }
            found.residual
        }
        Field::HsnCode => {
            let found = extract_hsn_code(text);
            if let Some(code) = found.value {
                slots.insert(field, SlotValue::Text(code));
            }
            found.residual
        }
        Field::PlaceOfSupply => {
            let found = extract_place_of_supply(text);
            if let Some(state) = found.value {
                slots.insert(field, SlotValue::Text(state));
            }
            found.residual
        }
        Field::Kind => text.to_string(),
    }
}

/// Read a message as the answer to a pending slot. Returns the slots with the
/// answer stored, or `None` when the message does not fit the field.
pub fn answer(
    intent: Intent,
    field: Field,
    text: &str,
    today: NaiveDate,
    slots: &Slots,
) -> Option<Slots> {
    let mut slots = slots.clone();
    match field {
        Field::Amount => {
            let found = extract_amount(text);
            slots.insert(field, SlotValue::Amount(found.value?));
            // "Website design ₹10,000" also answers the description
            if let Some(free) = intent.free_text_field() {
                if !slots.contains(free) && !is_command(&found.residual) {
                    if let Some(rest) = extract_category(&found.residual).value {
                        slots.insert(free, SlotValue::Text(rest));
                    }
                }
            }
        }
        Field::Date => {
            let found = extract_date(text, today).value?;
            slots.insert(field, SlotValue::Date(found.day()));
        }
        Field::Period => {
            let found = extract_date(text, today).value?;
            slots.insert(field, SlotValue::Range(found.range));
        }
        Field::Party => {
            if is_command(text) {
                return None;
            }
            // "Ramesh paid ₹1000" names the party and carries the rest
            let lead = leading_name(text, is_keyword);
            if let Some(name) = lead.value {
                slots.insert(field, SlotValue::Text(name));
                let mut residual = lead.residual;
                let mut swapped_range = None;
                for extra in intent.slots() {
                    if *extra != Field::Party && !slots.contains(*extra) {
                        residual =
                            fill_inline(intent, *extra, &residual, today, &mut slots, &mut swapped_range);
                    }
                }
                return Some(slots);
            }
            slots.insert(field, SlotValue::Text(party_answer(text)?));
        }
        Field::Category | Field::Description => {
            if is_command(text) {
                return None;
            }
            let value = extract_category(text).value.or_else(|| clean_free_text(text))?;
            slots.insert(field, SlotValue::Text(value));
        }
        Field::Target => {
            slots.insert(field, SlotValue::Text(extract_email(text).value?));
        }
        Field::InvoiceNumber => {
            slots.insert(field, SlotValue::Number(extract_invoice_number(text).value?));
        }
        Field::Gstin => {
            slots.insert(field, SlotValue::Text(extract_gstin(text).value?));
        }
        Field::GstRate => {
            slots.insert(field, SlotValue::Percent(gst_rate_answer(text)?));
        }
        Field::HsnCode => {
            slots.insert(field, SlotValue::Text(extract_hsn_code(text).value?));
        }
        Field::PlaceOfSupply => {
            slots.insert(field, SlotValue::Text(place_answer(text)?));
        }
        Field::Kind => return None,
    }
    Some(slots)
}
