//! Ledger balances and period summaries
//!
//! Balances are kept from the business's side. An invoice to a party adds
//! what they owe; money received from them takes it away. An expense to a
//! party is a bill from them and counts as payable, and a payout against it
//! clears it. Positive means the party owes you, negative means you owe them.
//!
//! Sums saturate at the `Decimal` bounds instead of panicking.

use crate::db::{Record, TransactionKind};
use crate::extract::DateRange;
use rust_decimal::Decimal;
use std::collections::HashMap;

const RECENT_ENTRIES: usize = 5;
const UNCATEGORIZED: &str = "Uncategorized";

/// One line of a party's ledger
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub record: Record,
    /// Signed effect on the balance
    pub delta: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerView {
    pub party: String,
    pub period: Option<DateRange>,
    /// Balance brought forward from before the period; zero without one
    pub opening: Decimal,
    /// Newest first
    pub entries: Vec<LedgerEntry>,
    /// Closing balance: opening plus the period's entries
    pub balance: Decimal,
}

/// Which way a balance points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    /// Receivable
    OwesYou(Decimal),
    /// Payable
    YouOwe(Decimal),
    Settled,
}

impl LedgerView {
    pub fn standing(&self) -> Standing {
        standing(self.balance)
    }
}

pub fn standing(balance: Decimal) -> Standing {
    if balance > Decimal::ZERO {
        Standing::OwesYou(balance)
    } else if balance < Decimal::ZERO {
        Standing::YouOwe(-balance)
    } else {
        Standing::Settled
    }
}

/// Signed effect of one record on its party's balance
pub fn balance_delta(record: &Record) -> Decimal {
    match record {
        Record::Invoice(inv) => inv.total(),
        Record::Transaction(tx) => match tx.kind {
            TransactionKind::Payout => tx.amount,
            TransactionKind::Expense | TransactionKind::Income | TransactionKind::Payment => {
                -tx.amount
            }
        },
    }
}

fn total(amounts: impl Iterator<Item = Decimal>) -> Decimal {
    amounts.fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Build a party's ledger from its records. Records for other parties are
/// ignored. With a period, records before it make up the opening balance and
/// records after it are left out.
pub fn ledger_for(party: &str, period: Option<DateRange>, records: &[Record]) -> LedgerView {
    let own: Vec<&Record> = records
        .iter()
        .filter(|r| r.party().is_some_and(|p| p.eq_ignore_ascii_case(party)))
        .collect();

    let opening = match period {
        Some(range) => total(
            own.iter()
                .filter(|r| r.date() < range.start)
                .map(|r| balance_delta(r)),
        ),
        None => Decimal::ZERO,
    };

    let mut entries: Vec<LedgerEntry> = own
        .into_iter()
        .filter(|r| r.in_range(period))
        .map(|record| LedgerEntry {
            record: record.clone(),
            delta: balance_delta(record),
        })
        .collect();
    entries.sort_by(|a, b| {
        b.record
            .date()
            .cmp(&a.record.date())
            .then_with(|| b.record.created_at().cmp(&a.record.created_at()))
    });

    let balance = opening.saturating_add(total(entries.iter().map(|e| e.delta)));
    LedgerView {
        party: party.to_string(),
        period,
        opening,
        entries,
        balance,
    }
}

// ============================================================================
// Summaries
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryShare {
    pub category: String,
    pub amount: Decimal,
    /// Percent of total expenses, one decimal place
    pub percent: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub period: DateRange,
    /// Payments and other income received
    pub income: Decimal,
    pub expenses: Decimal,
    /// Invoice totals including GST (not yet cash)
    pub invoiced: Decimal,
    /// GST on those invoices
    pub gst_billed: Decimal,
    pub net: Decimal,
    /// Net as a percent of income; absent when there was no income
    pub margin: Option<Decimal>,
    /// Largest first
    pub categories: Vec<CategoryShare>,
    /// Newest first
    pub recent: Vec<Record>,
    pub transaction_count: usize,
}

/// Totals, category split and recent activity over a period. Payouts settle
/// earlier bills, so they count as neither income nor expense.
pub fn summarize(period: DateRange, records: &[Record]) -> Summary {
    let in_period: Vec<&Record> = records.iter().filter(|r| period.contains(r.date())).collect();

    let mut income = Decimal::ZERO;
    let mut expenses = Decimal::ZERO;
    let mut invoiced = Decimal::ZERO;
    let mut gst_billed = Decimal::ZERO;
    let mut transaction_count = 0;
    // Categories group case-insensitively under the first spelling seen
    let mut by_category: Vec<(String, Decimal)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in &in_period {
        match record {
            Record::Invoice(inv) => {
                invoiced = invoiced.saturating_add(inv.total());
                gst_billed = gst_billed.saturating_add(inv.tax.total());
            }
            Record::Transaction(tx) => {
                transaction_count += 1;
                match tx.kind {
                    TransactionKind::Expense => {
                        expenses = expenses.saturating_add(tx.amount);
                        let name = tx.category.as_deref().unwrap_or(UNCATEGORIZED);
                        let key = name.to_lowercase();
                        if let Some(&i) = index.get(&key) {
                            by_category[i].1 = by_category[i].1.saturating_add(tx.amount);
                        } else {
                            index.insert(key, by_category.len());
                            by_category.push((name.to_string(), tx.amount));
                        }
                    }
                    TransactionKind::Income | TransactionKind::Payment => {
                        income = income.saturating_add(tx.amount);
                    }
                    TransactionKind::Payout => {}
                }
            }
        }
    }

    let net = income.saturating_sub(expenses);
    let margin = if income > Decimal::ZERO {
        net.checked_div(income)
            .map(|ratio| ratio.saturating_mul(Decimal::ONE_HUNDRED).round_dp(1))
    } else {
        None
    };

    let mut recent: Vec<Record> = in_period.into_iter().cloned().collect();
    crate::db::sort_newest_first(&mut recent);
    recent.truncate(RECENT_ENTRIES);

    Summary {
        period,
        income,
        expenses,
        invoiced,
        gst_billed,
        net,
        margin,
        categories: category_shares(by_category, expenses),
        recent,
        transaction_count,
    }
}

/// Percent shares at one decimal place that add up to exactly 100.0. Tenths
/// lost to rounding down go to the largest remainders.
fn category_shares(mut totals: Vec<(String, Decimal)>, total: Decimal) -> Vec<CategoryShare> {
    if total <= Decimal::ZERO {
        return Vec::new();
    }
    totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let thousand = Decimal::from(1000);
    // Each share is at most the total, so dividing first keeps this in range
    let mut tenths: Vec<(Decimal, Decimal)> = totals
        .iter()
        .map(|(_, amount)| {
            let exact = amount
                .checked_div(total)
                .map_or(Decimal::ZERO, |ratio| ratio.saturating_mul(thousand));
            (exact.floor(), exact - exact.floor())
        })
        .collect();

    let assigned: Decimal = tenths.iter().map(|(t, _)| *t).sum();
    let mut leftover = thousand - assigned;
    let mut order: Vec<usize> = (0..tenths.len()).collect();
    order.sort_by(|&a, &b| tenths[b].1.cmp(&tenths[a].1).then_with(|| a.cmp(&b)));
    for i in order {
        if leftover <= Decimal::ZERO {
            break;
        }
        tenths[i].0 += Decimal::ONE;
        leftover -= Decimal::ONE;
    }

    totals
        .into_iter()
        .zip(tenths)
        .map(|((category, amount), (t, _))| CategoryShare {
            category,
            amount,
            percent: (t / Decimal::TEN).round_dp(1),
        })
        .collect()
}
