use tracing::{info, warn};

use crate::models::NewPayment;
use crate::provider::{PaymentProvider, ProviderError};
use crate::store::{
    ClaimOutcome, DecrementOutcome, MarkPaidOutcome, SettlementStore, StoreError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Settled { transaction_ref: String },
    AlreadyProcessed { transaction_ref: String },
    NotPaid,
}

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub struct SettlementService<S, P> {
    store: S,
    provider: P,
}

impl<S, P> SettlementService<S, P>
where
    S: SettlementStore,
    P: PaymentProvider,
{
    pub fn new(store: S, provider: P) -> Self {
        Self { store, provider }
    }

    /// Settles one confirmed charge. The payment-record claim comes before
    /// any other write: it is the linearization point that keeps the whole
    /// operation idempotent even though the booking and inventory updates
    /// that follow are independent, non-transactional writes. A caller that
    /// times out after the claim can safely retry; the retry observes
    /// `AlreadyClaimed` and mutates nothing further.
    pub async fn settle(
        &self,
        external_ref: &str,
    ) -> Result<SettlementOutcome, SettlementError> {
        let confirmation = self.provider.retrieve_confirmation(external_ref).await?;
        if !confirmation.paid {
            info!(external_ref, "charge not completed, nothing to settle");
            return Ok(SettlementOutcome::NotPaid);
        }

        let facts = confirmation.facts()?;
        let transaction_ref = facts.transaction_ref.clone();

        let payment = NewPayment {
            transaction_ref: facts.transaction_ref,
            amount: facts.amount,
            currency: facts.currency,
            customer_email: facts.customer_email,
            booking_id: facts.booking_id,
            ticket_id: facts.ticket_id,
            ticket_title: facts.ticket_title,
            quantity: facts.quantity,
        };

        match self.store.claim_payment(payment).await? {
            ClaimOutcome::AlreadyClaimed => {
                info!(%transaction_ref, "payment already settled, skipping");
                return Ok(SettlementOutcome::AlreadyProcessed { transaction_ref });
            }
            ClaimOutcome::FirstClaim => {}
        }

        // The claim stands from here on. Bookkeeping shortfalls below are
        // surfaced as warnings, not rolled back: the charge already happened.
        match self.store.mark_booking_paid(facts.booking_id).await? {
            MarkPaidOutcome::Transitioned => {}
            MarkPaidOutcome::AlreadyPaid => {
                info!(booking_id = %facts.booking_id, "booking was already marked paid");
            }
            MarkPaidOutcome::NotFound => {
                warn!(
                    booking_id = %facts.booking_id,
                    %transaction_ref,
                    "booking not found while settling payment"
                );
            }
        }

        match self
            .store
            .decrement_ticket_quantity(facts.ticket_id, facts.quantity)
            .await?
        {
            DecrementOutcome::Applied => {}
            DecrementOutcome::InsufficientStock => {
                warn!(
                    ticket_id = %facts.ticket_id,
                    quantity = facts.quantity,
                    %transaction_ref,
                    "insufficient ticket stock at settlement time"
                );
            }
        }

        info!(%transaction_ref, "payment settled");
        Ok(SettlementOutcome::Settled { transaction_ref })
    }
}
