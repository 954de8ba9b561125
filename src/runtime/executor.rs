//! Turn executor
//!
//! One turn: load the session, run the pure transition, then execute its
//! effects in order. A failed record write or read rolls the session back to
//! where it stood before the turn, so sending the same message again retries.

use super::traits::{DeliveryStatus, Messenger, RecordStore, SessionStore};
use crate::db::{DbError, NewTransaction, TransactionKind};
use crate::error::ChatError;
use crate::ledger::{self, Standing};
use crate::reply;
use crate::session::{Session, SessionLocks};
use crate::state_machine::{transition, DialogContext, Effect, Event};
use chrono::{DateTime, Duration, NaiveDate, Utc};

const SETTLEMENT_CATEGORY: &str = "Settlement";

/// Settings the runtime needs from configuration
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub business_id: String,
    pub session_timeout: Duration,
    /// The business's own GSTIN, when it charges GST
    pub seller_gstin: Option<String>,
}

/// What a turn produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub session_id: String,
    /// Markdown reply
    pub response: String,
    /// Dialog state label after the turn
    pub session_state: String,
}

/// Generic chat runtime that can work with any store and messenger implementations
pub struct ChatRuntime<S, R, M>
where
    S: SessionStore,
    R: RecordStore,
    M: Messenger,
{
    sessions: S,
    records: R,
    messenger: M,
    settings: RuntimeSettings,
    locks: SessionLocks,
}

impl<S, R, M> ChatRuntime<S, R, M>
where
    S: SessionStore,
    R: RecordStore,
    M: Messenger,
{
    pub fn new(sessions: S, records: R, messenger: M, settings: RuntimeSettings) -> Self {
        Self {
            sessions,
            records,
            messenger,
            settings,
            locks: SessionLocks::new(),
        }
    }

    /// Handle one chat message. A missing session id starts a new session.
    pub async fn handle_message(
        &self,
        session_id: Option<&str>,
        text: &str,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> TurnOutcome {
        let session_id = session_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), ToString::to_string);
        self.run_turn(&session_id, Event::message(text), now, today)
            .await
    }

    /// Cancel whatever command the session has in progress
    pub async fn cancel(&self, session_id: &str, now: DateTime<Utc>, today: NaiveDate) -> TurnOutcome {
        self.run_turn(session_id, Event::UserCancel, now, today)
            .await
    }

    /// Current session, without starting one
    pub async fn session(&self, session_id: &str) -> Result<Session, ChatError> {
        self.sessions
            .find(session_id)
            .await?
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))
    }

    /// Drop a session and its state
    pub async fn expire(&self, session_id: &str) -> Result<bool, ChatError> {
        let _guard = self.locks.acquire(session_id).await;
        let existed = self.sessions.expire(session_id).await?;
        tracing::info!(session_id = %session_id, existed, "Session expired on request");
        Ok(existed)
    }

    async fn run_turn(
        &self,
        session_id: &str,
        event: Event,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> TurnOutcome {
        let _guard = self.locks.acquire(session_id).await;

        let mut session = match self.sessions.get(session_id, now).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Failed to load session");
                return TurnOutcome {
                    session_id: session_id.to_string(),
                    response: reply::persistence_failure(),
                    session_state: "unknown".to_string(),
                };
            }
        };

        if !session.state.is_idle() && session.is_expired(now, self.settings.session_timeout) {
            tracing::info!(
                session_id = %session_id,
                state = %session.state.label(),
                "Session timed out, starting over"
            );
            session.reset();
        }

        let context = DialogContext::new(session_id, today)
            .with_seller_gstin(self.settings.seller_gstin.clone());
        let response = self.apply(&mut session, &context, event, now).await;

        TurnOutcome {
            session_id: session_id.to_string(),
            response,
            session_state: session.state.label(),
        }
    }

    /// Run the transition and its effects, returning the joined reply.
    async fn apply(
        &self,
        session: &mut Session,
        context: &DialogContext,
        event: Event,
        now: DateTime<Utc>,
    ) -> String {
        let previous = (session.state.clone(), session.slots.clone());
        let result = transition(&session.state, &session.slots, context, event);

        if let Some(recovered) = &result.recovered {
            tracing::debug!(session_id = %context.session_id, reason = %recovered, "Re-asking user");
        }
        session.state = result.new_state;
        session.slots = result.slots;

        let mut replies = Vec::new();
        let mut failed = false;
        for effect in result.effects {
            if failed && effect != Effect::PersistSession {
                continue;
            }
            match self.execute_effect(effect, session, context, now).await {
                Ok(Some(text)) => replies.push(text),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        session_id = %context.session_id,
                        error = %e,
                        "Effect failed, keeping previous session state"
                    );
                    failed = true;
                    session.state = previous.0.clone();
                    session.slots = previous.1.clone();
                    replies = vec![reply::persistence_failure()];
                }
            }
        }

        tracing::info!(
            session_id = %context.session_id,
            state = %session.state.label(),
            failed,
            "Turn handled"
        );
        replies.join("\n\n")
    }

    async fn execute_effect(
        &self,
        effect: Effect,
        session: &mut Session,
        context: &DialogContext,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, ChatError> {
        let business_id = self.settings.business_id.as_str();
        match effect {
            Effect::Reply { text } => Ok(Some(text)),

            Effect::AppendTransaction(new) => {
                let tx = self.records.append_transaction(business_id, &new, now).await?;
                tracing::info!(
                    session_id = %context.session_id,
                    id = %tx.id,
                    kind = %tx.kind,
                    amount = %tx.amount,
                    "Transaction recorded"
                );
                Ok(Some(reply::transaction_recorded(&tx)))
            }

            Effect::AppendInvoice(new) => {
                let invoice = self.records.append_invoice(business_id, &new, now).await?;
                tracing::info!(
                    session_id = %context.session_id,
                    number = invoice.number,
                    amount = %invoice.amount,
                    "Invoice created"
                );
                Ok(Some(reply::invoice_created(&invoice)))
            }

            Effect::ShowLedger { party, period } => {
                // Everything before the period feeds the opening balance
                let records = self
                    .records
                    .query_by_party_and_date_range(business_id, Some(&party), None)
                    .await?;
                let view = ledger::ledger_for(&party, period, &records);
                Ok(Some(reply::ledger(&view)))
            }

            Effect::SendLedger { party, target } => {
                let records = self
                    .records
                    .query_by_party_and_date_range(business_id, Some(&party), None)
                    .await?;
                let rendered = reply::ledger(&ledger::ledger_for(&party, None, &records));
                let status = self.messenger.notify(&target, &rendered).await;
                if let DeliveryStatus::Failed(reason) = &status {
                    tracing::warn!(session_id = %context.session_id, reason = %reason, "Ledger delivery failed");
                }
                Ok(Some(reply::ledger_sent(&party, &target, &status)))
            }

            Effect::SettleLedger { party, date } => {
                let records = self
                    .records
                    .query_by_party_and_date_range(business_id, Some(&party), None)
                    .await?;
                let view = ledger::ledger_for(&party, None, &records);
                let (kind, amount) = match view.standing() {
                    Standing::Settled => return Ok(Some(reply::settled(&party, None))),
                    Standing::OwesYou(amount) => (TransactionKind::Payment, amount),
                    Standing::YouOwe(amount) => (TransactionKind::Payout, amount),
                };
                let new = NewTransaction {
                    kind,
                    party: Some(party.clone()),
                    amount,
                    date,
                    category: Some(SETTLEMENT_CATEGORY.to_string()),
                };
                let tx = self.records.append_transaction(business_id, &new, now).await?;
                tracing::info!(
                    session_id = %context.session_id,
                    party = %party,
                    kind = %tx.kind,
                    amount = %tx.amount,
                    "Ledger settled"
                );
                Ok(Some(reply::settled(&party, Some(&tx))))
            }

            Effect::ShowInvoice { number } => {
                match self.records.invoice_by_number(business_id, number).await {
                    Ok(invoice) => Ok(Some(reply::invoice_details(&invoice))),
                    Err(DbError::InvoiceNotFound(_)) => Ok(Some(reply::invoice_not_found(number))),
                    Err(e) => Err(e.into()),
                }
            }

            Effect::ShowSummary { period } => {
                let records = self
                    .records
                    .query_by_party_and_date_range(business_id, None, Some(period))
                    .await?;
                Ok(Some(reply::summary(&ledger::summarize(period, &records))))
            }

            Effect::PersistSession => {
                session.touch(now);
                // The reply still goes out; the next turn sees the last saved state
                if let Err(e) = self.sessions.save(session).await {
                    tracing::warn!(session_id = %context.session_id, error = %e, "Failed to save session");
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::{InMemoryRecordStore, InMemorySessionStore, RecordingMessenger};
    use crate::state_machine::{DialogState, Field};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    type TestRuntime =
        ChatRuntime<Arc<InMemorySessionStore>, Arc<InMemoryRecordStore>, Arc<RecordingMessenger>>;

    struct Harness {
        runtime: TestRuntime,
        sessions: Arc<InMemorySessionStore>,
        records: Arc<InMemoryRecordStore>,
        messenger: Arc<RecordingMessenger>,
    }

    fn harness() -> Harness {
        harness_with_gstin(None)
    }

    fn harness_with_gstin(seller_gstin: Option<&str>) -> Harness {
        let sessions = Arc::new(InMemorySessionStore::new());
        let records = Arc::new(InMemoryRecordStore::new());
        let messenger = Arc::new(RecordingMessenger::new());
        let runtime = ChatRuntime::new(
            sessions.clone(),
            records.clone(),
            messenger.clone(),
            RuntimeSettings {
                business_id: "biz".to_string(),
                session_timeout: Duration::seconds(1800),
                seller_gstin: seller_gstin.map(ToString::to_string),
            },
        );
        Harness {
            runtime,
            sessions,
            records,
            messenger,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 6).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_743_930_000, 0).unwrap()
    }

    impl Harness {
        async fn say(&self, text: &str) -> TurnOutcome {
            self.runtime
                .handle_message(Some("s-1"), text, now(), today())
                .await
        }
    }

    #[tokio::test]
    async fn test_one_line_expense_is_recorded() {
        let h = harness();
        let outcome = h.say("record expense ₹450 chai stall").await;

        assert!(outcome.response.contains("450"));
        assert_eq!(outcome.session_state, "idle");

        let stored = h.records.transactions();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].amount, Decimal::from(450));
        assert_eq!(stored[0].category.as_deref(), Some("chai stall"));
        assert_eq!(stored[0].date, today());
    }

    #[tokio::test]
    async fn test_invoice_then_payment_shows_receivable() {
        let h = harness();
        h.say("Invoice ₹2000 to Ramesh").await;
        h.say("Received ₹1000 from Ramesh").await;
        let outcome = h.say("show ledger of Ramesh").await;

        assert!(outcome.response.contains("receivable"), "{}", outcome.response);
        assert!(outcome.response.contains("₹1,000.00"));
        assert!(outcome.response.contains("INV-0001"));
    }

    #[tokio::test]
    async fn test_multi_turn_dialog_is_persisted_between_turns() {
        let h = harness();
        let outcome = h.say("record payment").await;
        assert_eq!(outcome.session_state, "awaiting_payment_field:party");

        let saved = h.sessions.stored("s-1").unwrap();
        assert!(matches!(
            saved.state,
            DialogState::AwaitingPaymentField {
                field: Field::Party,
                ..
            }
        ));

        h.say("Ramesh").await;
        let outcome = h.say("₹1,500").await;
        assert_eq!(outcome.session_state, "idle");
        assert_eq!(h.records.transactions()[0].party.as_deref(), Some("Ramesh"));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_pending_state_for_retry() {
        let h = harness();
        h.say("record expense").await;
        h.say("₹800").await;

        h.records.fail_writes(true);
        let outcome = h.say("travel").await;
        assert_eq!(outcome.response, reply::persistence_failure());
        assert_eq!(outcome.session_state, "awaiting_expense_field:category");
        assert!(h.records.transactions().is_empty());

        h.records.fail_writes(false);
        let outcome = h.say("travel").await;
        assert_eq!(outcome.session_state, "idle");
        assert_eq!(h.records.transactions().len(), 1);
        assert_eq!(h.records.transactions()[0].amount, Decimal::from(800));
    }

    #[tokio::test]
    async fn test_expired_session_starts_over() {
        let h = harness();
        h.say("record expense").await;

        let later = now() + Duration::seconds(1801);
        let outcome = h
            .runtime
            .handle_message(Some("s-1"), "450", later, today())
            .await;
        // "450" alone is not a command, so it is not understood from idle
        assert_eq!(outcome.session_state, "idle");
        assert!(h.records.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_settle_records_balancing_payment() {
        let h = harness();
        h.say("Invoice ₹2000 to Ramesh").await;
        let outcome = h.say("settle with Ramesh").await;
        assert!(outcome.response.contains("Settled with"));

        let stored = h.records.transactions();
        assert_eq!(stored[0].kind, TransactionKind::Payment);
        assert_eq!(stored[0].amount, Decimal::from(2000));

        let outcome = h.say("settle with Ramesh").await;
        assert!(outcome.response.contains("Nothing to settle"));
    }

    #[tokio::test]
    async fn test_settle_pays_out_what_you_owe() {
        let h = harness();
        h.say("paid ₹500 to Vendor for cement").await;
        let outcome = h.say("show ledger of Vendor").await;
        assert!(outcome.response.contains("payable"), "{}", outcome.response);

        let outcome = h.say("settle with Vendor").await;
        assert!(outcome.response.contains("₹500.00 paid"), "{}", outcome.response);
        let stored = h.records.transactions();
        assert_eq!(stored[1].kind, TransactionKind::Payout);
        assert_eq!(stored[1].amount, Decimal::from(500));

        let outcome = h.say("settle with Vendor").await;
        assert!(outcome.response.contains("Nothing to settle"));
    }

    #[tokio::test]
    async fn test_period_ledger_opens_with_earlier_balance() {
        let h = harness();
        h.say("Invoice ₹2000 to Ramesh on 05-03-2025").await;
        h.say("Received ₹500 from Ramesh").await;
        let outcome = h.say("show ledger of Ramesh this month").await;

        assert!(outcome.response.contains("Opening balance: ₹2,000.00"), "{}", outcome.response);
        assert!(!outcome.response.contains("INV-0001"));
        assert!(outcome.response.contains("₹1,500.00 receivable"), "{}", outcome.response);
    }

    #[tokio::test]
    async fn test_gst_invoice_with_configured_gstin() {
        let h = harness_with_gstin(Some("07AAACB2230M1Z2"));
        let outcome = h
            .say("invoice ₹10,000 to Asha gstin 29ABCDE1234F1Z5 for website design")
            .await;
        assert!(outcome.response.contains("IGST @ 18%"), "{}", outcome.response);
        assert!(outcome.response.contains("₹11,800.00"));

        let invoices = h.records.invoices();
        assert_eq!(invoices[0].tax.igst, Decimal::from(1800));
        assert_eq!(invoices[0].tax.place_of_supply.as_deref(), Some("Karnataka"));

        let outcome = h.say("show ledger of Asha").await;
        assert!(outcome.response.contains("₹11,800.00 receivable"), "{}", outcome.response);
    }

    #[tokio::test]
    async fn test_tax_question_mid_dialog() {
        let h = harness();
        h.say("record expense").await;
        let outcome = h.say("gstr-3b due date?").await;
        assert!(outcome.response.contains("GSTR-3B"));
        assert!(outcome.response.contains(&reply::prompt(
            crate::intent::Intent::RecordExpense,
            Field::Amount
        )));
        assert_eq!(outcome.session_state, "awaiting_expense_field:amount");
    }

    #[tokio::test]
    async fn test_send_ledger_uses_messenger() {
        let h = harness();
        h.say("Invoice ₹2000 to Ramesh").await;
        let outcome = h.say("send ledger of Ramesh to ramesh@example.com").await;

        assert!(outcome.response.contains("Sent the ledger"));
        let sent = h.messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ramesh@example.com");
        assert!(sent[0].1.contains("₹2,000.00"));
    }

    #[tokio::test]
    async fn test_show_invoice_by_number() {
        let h = harness();
        h.say("Invoice ₹2000 to Ramesh for website design").await;
        let outcome = h.say("show invoice #1").await;
        assert!(outcome.response.contains("website design"));

        let outcome = h.say("show invoice #7").await;
        assert!(outcome.response.contains("couldn't find invoice INV-0007"));
    }

    #[tokio::test]
    async fn test_cancel_endpoint_and_session_lookup() {
        let h = harness();
        h.say("create invoice").await;
        let outcome = h.runtime.cancel("s-1", now(), today()).await;
        assert_eq!(outcome.session_state, "idle");

        let session = h.runtime.session("s-1").await.unwrap();
        assert!(session.state.is_idle());
        assert!(matches!(
            h.runtime.session("missing").await,
            Err(ChatError::SessionNotFound(_))
        ));

        assert!(h.runtime.expire("s-1").await.unwrap());
        assert!(h.sessions.stored("s-1").is_none());
    }

    #[tokio::test]
    async fn test_new_session_id_is_issued() {
        let h = harness();
        let outcome = h.runtime.handle_message(None, "menu", now(), today()).await;
        assert!(!outcome.session_id.is_empty());
        assert!(outcome.response.contains("Here's what I can do"));
    }
}
