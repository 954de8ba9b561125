//! Reply formatting
//!
//! Every reply is Markdown. Text that came from the user (names, categories)
//! goes through [`user_text`] so it can never open a link or inject markup.

use crate::db::{Invoice, Record, Transaction, TransactionKind};
use crate::extract::DateRange;
use crate::intent::Intent;
use crate::ledger::{LedgerView, Standing, Summary};
use crate::runtime::DeliveryStatus;
use crate::state_machine::Field;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt::Write;

// ============================================================================
// Values
// ============================================================================

/// `₹1,234.50`. Negative amounts keep their sign in front of the symbol.
pub fn format_amount(amount: Decimal) -> String {
    let fixed = format!("{:.2}", amount.abs().round_dp(2));
    let (whole, paise) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if amount < Decimal::ZERO { "-" } else { "" };
    format!("{sign}₹{grouped}.{paise}")
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

pub fn format_range(range: DateRange) -> String {
    if range.is_single_day() {
        format_date(range.start)
    } else {
        format!("{} to {}", format_date(range.start), format_date(range.end))
    }
}

/// Escape Markdown control characters in user-supplied text
pub fn user_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '`' | '*' | '_' | '[' | ']' | '(' | ')' | '#' | '|' | '<' | '>' | '!' | '~'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ============================================================================
// Dialog
// ============================================================================

/// The question asked for a missing field
pub fn prompt(intent: Intent, field: Field) -> String {
    let text = match (intent, field) {
        (Intent::CreateInvoice, Field::Party) => "Who should this invoice be addressed to?",
        (Intent::CreateInvoice, Field::Amount) => {
            "What is the invoice amount? You can add a description too, e.g. `Website design ₹10,000`."
        }
        (Intent::RecordExpense, Field::Amount) => "How much did you spend?",
        (Intent::RecordExpense, Field::Category) => {
            "What was this expense for? (e.g. travel, office supplies)"
        }
        (Intent::RecordPayment, Field::Party) => "Who paid you?",
        (Intent::RecordPayment, Field::Amount) => "How much did you receive?",
        (Intent::ShowLedger, Field::Party) => "Whose ledger would you like to see?",
        (Intent::SendLedger, Field::Party) => "Whose ledger should I send?",
        (Intent::SendLedger, Field::Target) => "Which e-mail address should I send it to?",
        (Intent::SettleLedger, Field::Party) => "Who are you settling up with?",
        (Intent::ShowInvoice, Field::InvoiceNumber) => "Which invoice number? (e.g. INV-0003)",
        (_, Field::Party) => "Who is this for?",
        (_, Field::Amount) => "What is the amount?",
        (_, Field::Date) => "Which date? (e.g. yesterday, 05-04-2025)",
        (_, Field::Period) => "Which period? (e.g. last month, Q1 2025)",
        (_, Field::Category) => "What is this for?",
        (_, Field::Description) => "How should I describe it?",
        (_, Field::Target) => "Which e-mail address?",
        (_, Field::InvoiceNumber) => "Which invoice number?",
        (_, Field::Gstin) => "What is the GSTIN?",
        (_, Field::GstRate) => "Which GST rate applies? (e.g. 18%)",
        (_, Field::HsnCode) => "What is the HSN or SAC code?",
        (_, Field::PlaceOfSupply) => "Which state is the place of supply?",
        (_, Field::Kind) => "What kind of entry is this?",
    };
    text.to_string()
}

/// Asked again after an answer that did not fit
pub fn reprompt(intent: Intent, field: Field) -> String {
    let expected = match field {
        Field::Amount => "an amount",
        Field::Date | Field::Period => "a date",
        Field::Party => "a name",
        Field::Target => "an e-mail address",
        Field::InvoiceNumber => "an invoice number",
        Field::Gstin => "a GSTIN",
        Field::GstRate => "a GST rate",
        Field::HsnCode => "an HSN or SAC code",
        Field::PlaceOfSupply => "a state",
        Field::Category | Field::Description | Field::Kind => "a description",
    };
    format!(
        "Sorry, I couldn't read that as {expected}. {} (Type `cancel` to stop.)",
        prompt(intent, field)
    )
}

pub fn menu() -> String {
    "**Here's what I can do:**\n\n\
     - **Record an expense**: `spent ₹500 on office supplies yesterday`\n\
     - **Record a payment**: `received ₹1,000 from Ramesh`\n\
     - **Create an invoice**: `invoice ₹2,000 to Ramesh for website design`\n\
     - **Show an invoice**: `show invoice INV-0001`\n\
     - **Show a ledger**: `show ledger of Ramesh`\n\
     - **Send a ledger**: `send ledger of Ramesh to ramesh@example.com`\n\
     - **Settle up**: `settle with Ramesh`\n\
     - **Summary**: `expense summary for last month`\n\
     - **Tax questions**: `gst rate for laptops`, `gstr-3b due date`\n\n\
     Type `cancel` at any time to start over."
        .to_string()
}

pub fn not_understood() -> String {
    format!("Sorry, I didn't understand that.\n\n{}", menu())
}

pub fn cancelled() -> String {
    "Okay, cancelled. What would you like to do next?".to_string()
}

pub fn nothing_to_cancel() -> String {
    "There's nothing to cancel. Type `menu` to see what I can do.".to_string()
}

pub fn range_swapped(range: DateRange) -> String {
    format!(
        "Note: the dates were in reverse order, so I swapped them and used {}.",
        format_range(range)
    )
}

pub fn persistence_failure() -> String {
    "Sorry, I couldn't save or read your records just now. Nothing was changed; \
     please send that again in a moment."
        .to_string()
}

// ============================================================================
// Records
// ============================================================================

pub fn transaction_recorded(tx: &Transaction) -> String {
    let amount = format_amount(tx.amount);
    let date = format_date(tx.date);
    let category = tx.category.as_deref().map(user_text);
    let party = tx.party.as_deref().map(user_text);

    match tx.kind {
        TransactionKind::Expense => {
            let mut line = format!("✅ Expense of **{amount}** recorded");
            if let Some(category) = category {
                let _ = write!(line, " for **{category}**");
            }
            if let Some(party) = party {
                let _ = write!(line, ", paid to **{party}**");
            }
            let _ = write!(line, " on {date}.");
            line
        }
        TransactionKind::Payment => format!(
            "✅ Payment of **{amount}** received from **{}** on {date} ({}).",
            party.unwrap_or_else(|| "unknown".to_string()),
            category.unwrap_or_else(|| "Payment".to_string()),
        ),
        TransactionKind::Income => format!(
            "✅ Income of **{amount}** recorded on {date} ({}).",
            category.unwrap_or_else(|| "Income".to_string()),
        ),
        TransactionKind::Payout => format!(
            "✅ Paid **{amount}** to **{}** on {date} ({}).",
            party.unwrap_or_else(|| "unknown".to_string()),
            category.unwrap_or_else(|| "Payout".to_string()),
        ),
    }
}

pub fn invoice_created(invoice: &Invoice) -> String {
    format!(
        "🧾 Invoice **{}** created for **{}**.\n\n{}",
        invoice.display_number(),
        user_text(&invoice.recipient),
        invoice_table(invoice)
    )
}

pub fn invoice_details(invoice: &Invoice) -> String {
    format!(
        "🧾 **Invoice {}**\n\n{}",
        invoice.display_number(),
        invoice_table(invoice)
    )
}

fn invoice_table(invoice: &Invoice) -> String {
    let tax = &invoice.tax;
    let mut out = String::from("| | |\n|---|---|\n");
    let _ = writeln!(out, "| Billed to | {} |", user_text(&invoice.recipient));
    if let Some(gstin) = &invoice.gstin {
        let _ = writeln!(out, "| Recipient GSTIN | {} |", user_text(gstin));
    }
    let _ = writeln!(out, "| Description | {} |", user_text(&invoice.description));
    if !tax.hsn_sac.is_empty() {
        let _ = writeln!(out, "| HSN/SAC | {} |", user_text(&tax.hsn_sac));
    }
    let _ = writeln!(out, "| Taxable value | {} |", format_amount(invoice.amount));

    if tax.is_charged() {
        if tax.interstate {
            let _ = writeln!(out, "| IGST @ {}% | {} |", tax.rate.normalize(), format_amount(tax.igst));
        } else {
            let half = (tax.rate / Decimal::TWO).normalize();
            let _ = writeln!(out, "| CGST @ {half}% | {} |", format_amount(tax.cgst));
            let _ = writeln!(out, "| SGST @ {half}% | {} |", format_amount(tax.sgst));
        }
    } else {
        out.push_str("| GST | not charged |\n");
    }
    let _ = writeln!(out, "| **Total** | **{}** |", format_amount(invoice.total()));

    if let Some(place) = &tax.place_of_supply {
        let _ = writeln!(out, "| Place of supply | {} |", user_text(place));
    }
    if let Some(seller) = &tax.seller_gstin {
        let _ = writeln!(out, "| Seller GSTIN | {} |", user_text(seller));
    }
    let _ = writeln!(out, "| Issued | {} |", format_date(invoice.issue_date));
    let _ = writeln!(out, "| Due | {} |", format_date(invoice.due_date));
    out
}

pub fn invoice_not_found(number: i64) -> String {
    format!(
        "I couldn't find invoice {}.",
        crate::db::format_invoice_number(number)
    )
}

fn describe(record: &Record) -> String {
    match record {
        Record::Invoice(inv) => format!(
            "Invoice {}: {}",
            inv.display_number(),
            user_text(&inv.description)
        ),
        Record::Transaction(tx) => {
            let label = match tx.kind {
                TransactionKind::Expense => "Expense",
                TransactionKind::Payment => "Received",
                TransactionKind::Income => "Income",
                TransactionKind::Payout => "Paid out",
            };
            match &tx.category {
                Some(category) => format!("{label}: {}", user_text(category)),
                None => label.to_string(),
            }
        }
    }
}

fn standing_line(party: &str, standing: Standing) -> String {
    match standing {
        Standing::OwesYou(amount) => format!(
            "**Balance: {} receivable** ({party} owes you)",
            format_amount(amount)
        ),
        Standing::YouOwe(amount) => format!(
            "**Balance: {} payable** (you owe {party})",
            format_amount(amount)
        ),
        Standing::Settled => format!("**Settled**: nothing outstanding with {party}"),
    }
}

pub fn ledger(view: &LedgerView) -> String {
    let party = user_text(&view.party);
    let mut out = format!("📒 **Ledger for {party}**");
    if let Some(period) = view.period {
        let _ = write!(out, " ({})", format_range(period));
    }
    out.push_str("\n\n");

    if view.period.is_some() {
        let _ = writeln!(out, "Opening balance: {}\n", format_amount(view.opening));
    }

    if view.entries.is_empty() {
        if view.period.is_some() {
            let _ = write!(out, "No entries for {party} in this period.\n\n");
            out.push_str(&standing_line(&party, view.standing()));
        } else {
            let _ = write!(out, "No entries for {party} yet.");
        }
        return out;
    }

    out.push_str("| Date | Entry | Amount |\n|---|---|---:|\n");
    for entry in &view.entries {
        let _ = writeln!(
            out,
            "| {} | {} | {} |",
            format_date(entry.record.date()),
            describe(&entry.record),
            format_amount(entry.delta)
        );
    }
    out.push('\n');
    out.push_str(&standing_line(&party, view.standing()));
    out
}

pub fn ledger_sent(party: &str, target: &str, status: &DeliveryStatus) -> String {
    match status {
        DeliveryStatus::Delivered => format!(
            "📤 Sent the ledger for **{}** to {}.",
            user_text(party),
            user_text(target)
        ),
        DeliveryStatus::Failed(reason) => format!(
            "I couldn't send the ledger for **{}** to {}: {}",
            user_text(party),
            user_text(target),
            user_text(reason)
        ),
    }
}

/// `entry` is the balancing record, absent when there was nothing to settle
pub fn settled(party: &str, entry: Option<&Transaction>) -> String {
    let party = user_text(party);
    match entry {
        None => format!("Nothing to settle: the ledger for **{party}** is already at zero."),
        Some(tx) if tx.kind.is_inflow() => format!(
            "🤝 Settled with **{party}**: recorded {} received on {}. Balance is now zero.",
            format_amount(tx.amount),
            format_date(tx.date)
        ),
        Some(tx) => format!(
            "🤝 Settled with **{party}**: recorded {} paid on {}. Balance is now zero.",
            format_amount(tx.amount),
            format_date(tx.date)
        ),
    }
}

pub fn summary(summary: &Summary) -> String {
    let mut out = format!("📊 **Summary for {}**\n\n", format_range(summary.period));

    if summary.transaction_count == 0 && summary.invoiced == Decimal::ZERO {
        out.push_str("No transactions in this period.");
        return out;
    }

    let _ = writeln!(out, "- Income: **{}**", format_amount(summary.income));
    let _ = writeln!(out, "- Expenses: **{}**", format_amount(summary.expenses));
    let _ = write!(out, "- Net: **{}**", format_amount(summary.net));
    if let Some(margin) = summary.margin {
        let _ = write!(out, " ({margin:.1}% margin)");
    }
    out.push('\n');
    if summary.invoiced > Decimal::ZERO {
        let _ = writeln!(out, "- Invoiced: {}", format_amount(summary.invoiced));
    }
    if summary.gst_billed > Decimal::ZERO {
        let _ = writeln!(out, "- GST billed: {}", format_amount(summary.gst_billed));
    }

    if !summary.categories.is_empty() {
        out.push_str("\n**Expenses by category**\n\n| Category | Amount | Share |\n|---|---:|---:|\n");
        for share in &summary.categories {
            let _ = writeln!(
                out,
                "| {} | {} | {:.1}% |",
                user_text(&share.category),
                format_amount(share.amount),
                share.percent
            );
        }
    }

    if !summary.recent.is_empty() {
        out.push_str("\n**Recent activity**\n\n");
        for record in &summary.recent {
            let party = record
                .party()
                .map(|p| format!(" ({})", user_text(p)))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "- {}: {}{party}, {}",
                format_date(record.date()),
                describe(record),
                format_amount(record.amount())
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InvoiceTax;
    use crate::ledger::{ledger_for, summarize};
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn payment(party: &str, amount: i64) -> Transaction {
        Transaction {
            id: "t".into(),
            business_id: "biz".into(),
            kind: TransactionKind::Payment,
            party: Some(party.into()),
            amount: Decimal::from(amount),
            date: day(3),
            category: None,
            created_at: Utc.with_ymd_and_hms(2025, 4, 3, 9, 0, 0).unwrap(),
        }
    }

    fn invoice(tax: InvoiceTax) -> Invoice {
        Invoice {
            id: "i".into(),
            business_id: "biz".into(),
            number: 4,
            recipient: "Asha".into(),
            amount: Decimal::from(1000),
            description: "Design".into(),
            issue_date: day(1),
            due_date: day(1) + chrono::Duration::days(30),
            gstin: None,
            tax,
            created_at: Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::from(0)), "₹0.00");
        assert_eq!(format_amount(Decimal::from(450)), "₹450.00");
        assert_eq!(format_amount(Decimal::from_str_exact("1234.5").unwrap()), "₹1,234.50");
        assert_eq!(format_amount(Decimal::from(1_234_567)), "₹1,234,567.00");
        assert_eq!(format_amount(Decimal::from(-1000)), "-₹1,000.00");
    }

    #[test]
    fn test_user_text_is_inert() {
        assert_eq!(user_text("[x](javascript:y)"), r"\[x\]\(javascript:y\)");
        assert_eq!(user_text("Sharma & Sons"), "Sharma & Sons");
    }

    #[test]
    fn test_ledger_wording() {
        let records = vec![Record::Transaction(payment("Ramesh", 1000))];
        let view = ledger_for("Ramesh", None, &records);
        let text = ledger(&view);
        assert!(text.contains("payable"));
        assert!(text.contains("you owe Ramesh"));
        assert!(text.contains("-₹1,000.00"));

        let empty = ledger_for("Asha", None, &[]);
        assert!(ledger(&empty).contains("No entries for Asha"));
    }

    #[test]
    fn test_period_ledger_shows_opening_balance() {
        let mut old = payment("Ramesh", 400);
        old.date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let records = vec![Record::Transaction(old)];

        let text = ledger(&ledger_for("Ramesh", DateRange::month(2025, 4), &records));
        assert!(text.contains("Opening balance: -₹400.00"), "{text}");
        assert!(text.contains("No entries for Ramesh in this period."));
        assert!(text.contains("₹400.00 payable"));
    }

    #[test]
    fn test_invoice_table_splits_intrastate_gst() {
        let text = invoice_details(&invoice(InvoiceTax {
            seller_gstin: Some("07AAACB2230M1Z2".into()),
            hsn_sac: "9983".into(),
            place_of_supply: Some("Delhi".into()),
            interstate: false,
            rate: Decimal::from(5),
            cgst: Decimal::from(25),
            sgst: Decimal::from(25),
            igst: Decimal::ZERO,
        }));
        assert!(text.contains("| HSN/SAC | 9983 |"));
        assert!(text.contains("| CGST @ 2.5% | ₹25.00 |"));
        assert!(text.contains("| SGST @ 2.5% | ₹25.00 |"));
        assert!(text.contains("| **Total** | **₹1,050.00** |"));
        assert!(text.contains("| Place of supply | Delhi |"));
        assert!(!text.contains("IGST"));
    }

    #[test]
    fn test_invoice_table_without_gst() {
        let text = invoice_details(&invoice(InvoiceTax::default()));
        assert!(text.contains("| GST | not charged |"));
        assert!(text.contains("| **Total** | **₹1,000.00** |"));
        assert!(!text.contains("Seller GSTIN"));
    }

    #[test]
    fn test_payout_wording() {
        let mut tx = payment("Vendor", 500);
        tx.kind = TransactionKind::Payout;
        tx.category = Some("Settlement".into());
        let text = transaction_recorded(&tx);
        assert!(text.contains("Paid **₹500.00** to **Vendor**"));
        assert!(settled("Vendor", Some(&tx)).contains("₹500.00 paid"));
    }

    #[test]
    fn test_summary_lists_shares() {
        let mut travel = payment("x", 1200);
        travel.kind = TransactionKind::Expense;
        travel.party = None;
        travel.category = Some("Travel".into());
        let text = summary(&summarize(
            DateRange::month(2025, 4).unwrap(),
            &[Record::Transaction(travel)],
        ));
        assert!(text.contains("| Travel | ₹1,200.00 | 100.0% |"));
        assert!(text.contains("Summary for 01 Apr 2025 to 30 Apr 2025"));
    }

    #[test]
    fn test_every_prompt_is_non_empty() {
        for field in [
            Field::Party,
            Field::Amount,
            Field::Category,
            Field::Target,
            Field::GstRate,
            Field::HsnCode,
            Field::PlaceOfSupply,
        ] {
            assert!(!prompt(Intent::RecordExpense, field).is_empty());
            assert!(reprompt(Intent::RecordExpense, field).contains("cancel"));
        }
    }

    #[test]
    fn test_transaction_recorded() {
        let text = transaction_recorded(&payment("Ramesh", 1000));
        assert!(text.contains("₹1,000.00"));
        assert!(text.contains("Ramesh"));
    }
}
