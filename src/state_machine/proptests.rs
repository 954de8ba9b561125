//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::db::TransactionKind;
use crate::intent::Intent;
use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> DialogContext {
    DialogContext::new("test-session", NaiveDate::from_ymd_opt(2025, 4, 6).unwrap())
}

fn reply_count(result: &TransitionResult) -> usize {
    result
        .effects
        .iter()
        .filter(|e| matches!(e, Effect::Reply { .. }))
        .count()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_dialog_intent() -> impl Strategy<Value = Intent> {
    prop_oneof![
        Just(Intent::CreateInvoice),
        Just(Intent::ShowInvoice),
        Just(Intent::RecordExpense),
        Just(Intent::RecordPayment),
        Just(Intent::ShowLedger),
        Just(Intent::SendLedger),
        Just(Intent::SettleLedger),
    ]
}

fn arb_field() -> impl Strategy<Value = Field> {
    prop_oneof![
        Just(Field::Party),
        Just(Field::Amount),
        Just(Field::Date),
        Just(Field::Period),
        Just(Field::Category),
        Just(Field::Description),
        Just(Field::Target),
        Just(Field::InvoiceNumber),
        Just(Field::Gstin),
        Just(Field::GstRate),
        Just(Field::HsnCode),
        Just(Field::PlaceOfSupply),
    ]
}

fn arb_state() -> impl Strategy<Value = DialogState> {
    prop_oneof![
        Just(DialogState::Idle),
        (arb_dialog_intent(), arb_field(), "[a-zA-Z ?]{1,30}")
            .prop_map(|(intent, field, prompt)| DialogState::awaiting(intent, field, prompt)),
    ]
}

fn arb_slots() -> impl Strategy<Value = Slots> {
    (
        proptest::option::of("[A-Z][a-z]{2,10}"),
        proptest::option::of(1i64..1_000_000),
        proptest::option::of("[a-z]{3,12}"),
        any::<bool>(),
    )
        .prop_map(|(party, amount, category, income)| {
            let mut slots = Slots::default();
            if let Some(party) = party {
                slots.insert(Field::Party, SlotValue::Text(party));
            }
            if let Some(amount) = amount {
                slots.insert(Field::Amount, SlotValue::Amount(Decimal::from(amount)));
            }
            if let Some(category) = category {
                slots.insert(Field::Category, SlotValue::Text(category));
            }
            if income {
                slots.insert(Field::Kind, SlotValue::Kind(TransactionKind::Income));
            }
            slots
        })
}

fn arb_cancel_word() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("cancel".to_string()),
        Just("Cancel".to_string()),
        Just("exit".to_string()),
        Just("quit".to_string()),
        Just("stop".to_string()),
        Just("abort".to_string()),
        Just("never mind".to_string()),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::UserCancel),
        "[a-zA-Z0-9₹ .,#@-]{0,40}".prop_map(Event::message),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_cancel_always_returns_to_idle(
        state in arb_state(),
        slots in arb_slots(),
        word in arb_cancel_word(),
    ) {
        for event in [Event::UserCancel, Event::message(word.clone())] {
            let result = transition(&state, &slots, &test_context(), event);
            prop_assert!(result.new_state.is_idle());
            prop_assert!(result.slots.is_empty());
            prop_assert!(!result.effects.iter().any(Effect::writes_records));
            prop_assert_eq!(reply_count(&result), 1);
        }
    }

    #[test]
    fn prop_every_turn_replies_and_persists(
        state in arb_state(),
        slots in arb_slots(),
        event in arb_event(),
    ) {
        let result = transition(&state, &slots, &test_context(), event);
        prop_assert_eq!(result.effects.last(), Some(&Effect::PersistSession));
        let replies = reply_count(&result);
        let actions = result
            .effects
            .iter()
            .filter(|e| !matches!(e, Effect::Reply { .. } | Effect::PersistSession))
            .count();
        prop_assert!(replies + actions >= 1, "a turn must answer the user");
        prop_assert!(actions <= 1, "at most one command runs per turn");
    }

    #[test]
    fn prop_waiting_states_carry_their_prompt(
        state in arb_state(),
        slots in arb_slots(),
        event in arb_event(),
    ) {
        let result = transition(&state, &slots, &test_context(), event);
        if let Some((_, _, prompt)) = result.new_state.pending() {
            prop_assert!(!prompt.is_empty());
            prop_assert!(reply_count(&result) >= 1);
        } else {
            prop_assert!(result.slots.is_empty());
        }
    }

    #[test]
    fn prop_waiting_field_is_required_and_missing(
        state in arb_state(),
        slots in arb_slots(),
        event in arb_event(),
    ) {
        let result = transition(&state, &slots, &test_context(), event);
        if let Some((intent, field, _)) = result.new_state.pending() {
            // A reprompt keeps whatever state it was in
            if result.new_state != state {
                prop_assert!(required_fields(intent, &result.slots).contains(&field));
                prop_assert!(!result.slots.contains(field));
            }
        }
    }

    #[test]
    fn prop_gibberish_answer_keeps_dialog(
        intent in arb_dialog_intent(),
        slots in arb_slots(),
        text in "[qxz]{4,12}",
    ) {
        let state = DialogState::awaiting(intent, Field::Amount, "How much?".to_string());
        let result = transition(&state, &slots, &test_context(), Event::message(text));
        prop_assert_eq!(&result.new_state, &state);
        prop_assert_eq!(&result.slots, &slots);
    }
}
