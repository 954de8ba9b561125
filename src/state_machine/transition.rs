//! Pure state transition function
//!
//! Given the session's state, its collected slots and one event, decide the
//! next state and the effects to run. Nothing here touches storage or the
//! clock; the turn date comes in through the context.

use super::state::{DialogContext, DialogState, Field, Slots};
use super::{Effect, Event};
use crate::db::{NewInvoice, NewTransaction, TransactionKind};
use crate::error::ChatError;
use crate::extract::DateRange;
use crate::intent::{self, Classification, Escape, Intent};
use crate::reply;
use crate::tax::{self, gst};

const DEFAULT_INVOICE_DESCRIPTION: &str = "Services";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: DialogState,
    pub slots: Slots,
    pub effects: Vec<Effect>,
    /// A problem with the message that the dialog recovered from
    pub recovered: Option<ChatError>,
}

impl TransitionResult {
    pub fn new(state: DialogState, slots: Slots) -> Self {
        Self {
            new_state: state,
            slots,
            effects: vec![],
            recovered: None,
        }
    }

    pub fn idle() -> Self {
        Self::new(DialogState::Idle, Slots::default())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    fn recovering(mut self, error: ChatError) -> Self {
        self.recovered = Some(error);
        self
    }
}

/// Fields a command cannot run without, in the order they are asked for
pub fn required_fields(intent: Intent, slots: &Slots) -> &'static [Field] {
    match intent {
        Intent::CreateInvoice => &[Field::Party, Field::Amount],
        Intent::RecordExpense => &[Field::Amount, Field::Category],
        Intent::RecordPayment if slots.kind() == Some(TransactionKind::Income) => &[Field::Amount],
        Intent::RecordPayment => &[Field::Party, Field::Amount],
        Intent::ShowLedger | Intent::SettleLedger => &[Field::Party],
        Intent::SendLedger => &[Field::Party, Field::Target],
        Intent::ShowInvoice => &[Field::InvoiceNumber],
        Intent::ShowSummary | Intent::ShowMenu | Intent::TaxQuery | Intent::Unknown => &[],
    }
}

/// Pure transition function
pub fn transition(
    state: &DialogState,
    slots: &Slots,
    context: &DialogContext,
    event: Event,
) -> TransitionResult {
    match (state.pending(), event) {
        // ============================================================
        // Cancellation
        // ============================================================
        (None, Event::UserCancel) => TransitionResult::idle()
            .with_effect(Effect::reply(reply::nothing_to_cancel()))
            .with_effect(Effect::PersistSession),

        (Some(_), Event::UserCancel) => TransitionResult::idle()
            .with_effect(Effect::reply(reply::cancelled()))
            .with_effect(Effect::PersistSession),

        // ============================================================
        // Idle: classify as a new command
        // ============================================================
        (None, Event::UserMessage { text }) => match intent::escape(&text) {
            Some(Escape::Cancel) => TransitionResult::idle()
                .with_effect(Effect::reply(reply::nothing_to_cancel()))
                .with_effect(Effect::PersistSession),
            Some(Escape::Menu) => show_menu(),
            None => start(intent::classify(&text, context.today), &text, context),
        },

        // ============================================================
        // Mid-dialog: escape, then answer, then a new command
        // ============================================================
        (Some((intent, field, prompt)), Event::UserMessage { text }) => {
            match intent::escape(&text) {
                Some(Escape::Cancel) => {
                    return TransitionResult::idle()
                        .with_effect(Effect::reply(reply::cancelled()))
                        .with_effect(Effect::PersistSession);
                }
                Some(Escape::Menu) => return show_menu(),
                None => {}
            }

            if let Some(slots) = intent::answer(intent, field, &text, context.today, slots) {
                return advance(intent, slots, context);
            }

            let classification = intent::classify(&text, context.today);
            match classification.intent {
                Intent::Unknown => {}
                // Answer the question, then ask again for the pending field
                Intent::TaxQuery => {
                    let advice = tax::advise(&text, context.today);
                    return TransitionResult::new(state.clone(), slots.clone())
                        .with_effects([Effect::reply(advice), Effect::reply(prompt)])
                        .with_effect(Effect::PersistSession);
                }
                // The user moved on; the unfinished command is dropped
                _ => return start(classification, &text, context),
            }

            TransitionResult::new(state.clone(), slots.clone())
                .with_effect(Effect::reply(reply::reprompt(intent, field)))
                .with_effect(Effect::PersistSession)
                .recovering(ChatError::ParseFailure { field })
        }
    }
}

fn show_menu() -> TransitionResult {
    TransitionResult::idle()
        .with_effect(Effect::reply(reply::menu()))
        .with_effect(Effect::PersistSession)
}

/// Begin a freshly classified command.
fn start(
    classification: Classification,
    text: &str,
    context: &DialogContext,
) -> TransitionResult {
    let Classification {
        intent,
        slots,
        swapped_range,
        ..
    } = classification;

    match intent {
        Intent::Unknown => TransitionResult::idle()
            .with_effect(Effect::reply(reply::not_understood()))
            .with_effect(Effect::PersistSession)
            .recovering(ChatError::UnknownIntent),
        Intent::ShowMenu => show_menu(),
        Intent::TaxQuery => TransitionResult::idle()
            .with_effect(Effect::reply(tax::advise(text, context.today)))
            .with_effect(Effect::PersistSession),
        _ => {
            let result = advance(intent, slots, context);
            match swapped_range {
                Some(range) => {
                    let TransitionResult {
                        new_state,
                        slots,
                        effects,
                        recovered,
                    } = result;
                    TransitionResult {
                        recovered,
                        ..TransitionResult::new(new_state, slots)
                    }
                    .with_effect(Effect::reply(reply::range_swapped(range)))
                    .with_effects(effects)
                }
                None => result,
            }
        }
    }
}

/// Ask for the next missing field, or run the command when nothing is missing.
fn advance(intent: Intent, slots: Slots, context: &DialogContext) -> TransitionResult {
    let missing = required_fields(intent, &slots)
        .iter()
        .copied()
        .find(|field| !slots.contains(*field));

    if let Some(field) = missing {
        let prompt = reply::prompt(intent, field);
        return TransitionResult::new(DialogState::awaiting(intent, field, prompt.clone()), slots)
            .with_effect(Effect::reply(prompt))
            .with_effect(Effect::PersistSession);
    }

    match complete(intent, &slots, context) {
        Some(effect) => TransitionResult::idle()
            .with_effect(effect)
            .with_effect(Effect::PersistSession),
        None => TransitionResult::idle()
            .with_effect(Effect::reply(reply::not_understood()))
            .with_effect(Effect::PersistSession)
            .recovering(ChatError::UnknownIntent),
    }
}

/// The effect that carries out a command whose required fields are all present.
fn complete(intent: Intent, slots: &Slots, context: &DialogContext) -> Option<Effect> {
    let party = slots.text(Field::Party).map(ToString::to_string);
    let date = slots.date(Field::Date).unwrap_or(context.today);

    let effect = match intent {
        Intent::CreateInvoice => {
            let amount = slots.amount(Field::Amount)?;
            let description = slots
                .text(Field::Description)
                .unwrap_or(DEFAULT_INVOICE_DESCRIPTION);
            let tax = gst::invoice_tax(&gst::TaxInput {
                amount,
                description,
                seller_gstin: context.seller_gstin.as_deref(),
                recipient_gstin: slots.text(Field::Gstin),
                place_of_supply: slots.text(Field::PlaceOfSupply),
                rate: slots.percent(Field::GstRate),
                hsn_sac: slots.text(Field::HsnCode),
            });
            Effect::AppendInvoice(NewInvoice {
                recipient: party?,
                amount,
                description: description.to_string(),
                issue_date: date,
                gstin: slots.text(Field::Gstin).map(ToString::to_string),
                tax,
            })
        }
        Intent::RecordExpense => Effect::AppendTransaction(NewTransaction {
            kind: TransactionKind::Expense,
            party,
            amount: slots.amount(Field::Amount)?,
            date,
            category: Some(slots.text(Field::Category)?.to_string()),
        }),
        Intent::RecordPayment => Effect::AppendTransaction(NewTransaction {
            kind: slots.kind().unwrap_or(TransactionKind::Payment),
            party,
            amount: slots.amount(Field::Amount)?,
            date,
            category: slots.text(Field::Category).map(ToString::to_string),
        }),
        Intent::ShowLedger => Effect::ShowLedger {
            party: party?,
            period: slots.range(Field::Period),
        },
        Intent::SendLedger => Effect::SendLedger {
            party: party?,
            target: slots.text(Field::Target)?.to_string(),
        },
        Intent::SettleLedger => Effect::SettleLedger {
            party: party?,
            date,
        },
        Intent::ShowInvoice => Effect::ShowInvoice {
            number: slots.number(Field::InvoiceNumber)?,
        },
        Intent::ShowSummary => Effect::ShowSummary {
            period: slots
                .range(Field::Period)
                .unwrap_or_else(|| this_month(context)),
        },
        Intent::ShowMenu | Intent::TaxQuery | Intent::Unknown => return None,
    };
    Some(effect)
}

fn this_month(context: &DialogContext) -> DateRange {
    use chrono::Datelike;
    DateRange::month(context.today.year(), context.today.month())
        .unwrap_or_else(|| DateRange::day(context.today))
}
