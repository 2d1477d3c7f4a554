use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::models::NewPayment;
use crate::schema::{bookings, payments, tickets};

pub type DbPool = Pool<AsyncPgConnection>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    FirstClaim,
    AlreadyClaimed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    Applied,
    InsufficientStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkPaidOutcome {
    Transitioned,
    AlreadyPaid,
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] bb8::RunError<diesel_async::pooled_connection::PoolError>),
    #[error("storage query failed: {0}")]
    Query(#[from] diesel::result::Error),
}

/// The three storage operations settlement depends on. Each must be a single
/// atomic write so the guarantees hold across server processes, not just
/// tasks in one process.
#[allow(async_fn_in_trait)]
pub trait SettlementStore {
    /// Inserts the payment record only if no record exists for its
    /// transaction reference. The uniqueness constraint on the reference is
    /// the source of truth for "has this charge been processed".
    async fn claim_payment(&self, payment: NewPayment) -> Result<ClaimOutcome, StoreError>;

    /// Subtracts `quantity` from the ticket's remaining stock only if enough
    /// stock remains. Never clamps; an insufficient balance is left untouched.
    async fn decrement_ticket_quantity(
        &self,
        ticket_id: Uuid,
        quantity: i32,
    ) -> Result<DecrementOutcome, StoreError>;

    /// Moves the booking to Paid and stamps `paid_at`, once. A second call
    /// reports `AlreadyPaid` without altering the timestamp.
    async fn mark_booking_paid(&self, booking_id: Uuid) -> Result<MarkPaidOutcome, StoreError>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl SettlementStore for PgStore {
    async fn claim_payment(&self, payment: NewPayment) -> Result<ClaimOutcome, StoreError> {
        let mut conn = self.pool.get().await?;

        let inserted = diesel::insert_into(payments::table)
            .values(&payment)
            .on_conflict(payments::transaction_ref)
            .do_nothing()
            .execute(&mut conn)
            .await?;

        if inserted == 0 {
            Ok(ClaimOutcome::AlreadyClaimed)
        } else {
            Ok(ClaimOutcome::FirstClaim)
        }
    }

    async fn decrement_ticket_quantity(
        &self,
        ticket_id: Uuid,
        quantity: i32,
    ) -> Result<DecrementOutcome, StoreError> {
        let mut conn = self.pool.get().await?;

        // Compare-and-decrement in one statement; two settlements racing on
        // the same ticket cannot both pass the remaining_quantity check.
        let updated = diesel::update(
            tickets::table
                .filter(tickets::id.eq(ticket_id))
                .filter(tickets::remaining_quantity.ge(quantity)),
        )
        .set(tickets::remaining_quantity.eq(tickets::remaining_quantity - quantity))
        .execute(&mut conn)
        .await?;

        if updated == 0 {
            Ok(DecrementOutcome::InsufficientStock)
        } else {
            Ok(DecrementOutcome::Applied)
        }
    }

    async fn mark_booking_paid(&self, booking_id: Uuid) -> Result<MarkPaidOutcome, StoreError> {
        let mut conn = self.pool.get().await?;

        let updated = diesel::update(
            bookings::table
                .filter(bookings::id.eq(booking_id))
                .filter(bookings::paid_at.is_null()),
        )
        .set((
            bookings::status.eq("Paid"),
            bookings::paid_at.eq(chrono::Utc::now()),
        ))
        .execute(&mut conn)
        .await?;

        if updated > 0 {
            return Ok(MarkPaidOutcome::Transitioned);
        }

        let exists = diesel::select(diesel::dsl::exists(
            bookings::table.filter(bookings::id.eq(booking_id)),
        ))
        .get_result::<bool>(&mut conn)
        .await?;

        if exists {
            Ok(MarkPaidOutcome::AlreadyPaid)
        } else {
            Ok(MarkPaidOutcome::NotFound)
        }
    }
}


#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use futures::future::join_all;
    use uuid::Uuid;

    use super::memory::MemoryStore;
    use super::*;
    use crate::models::{Booking, NewPayment, Ticket};

    fn sample_ticket(id: Uuid, remaining: i32) -> Ticket {
        Ticket {
            id,
            vendor_email: "vendor@example.com".to_string(),
            title: "Dhaka to Sylhet".to_string(),
            unit_price: BigDecimal::from(550),
            remaining_quantity: remaining,
            status: "Approved".to_string(),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        }
    }

    fn sample_booking(id: Uuid, ticket_id: Uuid) -> Booking {
        Booking {
            id,
            user_email: "user@example.com".to_string(),
            ticket_id,
            quantity: 2,
            status: "Pending".to_string(),
            created_at: Some(Utc::now()),
            paid_at: None,
        }
    }

    fn sample_payment(transaction_ref: &str) -> NewPayment {
        NewPayment {
            transaction_ref: transaction_ref.to_string(),
            amount: BigDecimal::from(1100),
            currency: "bdt".to_string(),
            customer_email: "user@example.com".to_string(),
            booking_id: Uuid::new_v4(),
            ticket_id: Uuid::new_v4(),
            ticket_title: "Dhaka to Sylhet".to_string(),
            quantity: 2,
        }
    }

    #[tokio::test]
    async fn claim_is_first_come_only_once() {
        let store = MemoryStore::new();

        let first = store.claim_payment(sample_payment("pi_1")).await.unwrap();
        let second = store.claim_payment(sample_payment("pi_1")).await.unwrap();

        assert_eq!(first, ClaimOutcome::FirstClaim);
        assert_eq!(second, ClaimOutcome::AlreadyClaimed);
        assert_eq!(store.payment_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_yield_exactly_one_first_claim() {
        let store = MemoryStore::new();

        let tasks = (0..16).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.claim_payment(sample_payment("pi_race")).await })
        });
        let outcomes: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let first_claims = outcomes
            .iter()
            .filter(|o| **o == ClaimOutcome::FirstClaim)
            .count();
        assert_eq!(first_claims, 1);
        assert_eq!(store.payment_count(), 1);
    }

    #[tokio::test]
    async fn decrement_skips_when_stock_is_short() {
        let store = MemoryStore::new();
        let ticket_id = Uuid::new_v4();
        store.insert_ticket(sample_ticket(ticket_id, 1));

        let outcome = store.decrement_ticket_quantity(ticket_id, 2).await.unwrap();

        assert_eq!(outcome, DecrementOutcome::InsufficientStock);
        assert_eq!(store.ticket(ticket_id).unwrap().remaining_quantity, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_decrements_never_go_negative() {
        let store = MemoryStore::new();
        let ticket_id = Uuid::new_v4();
        store.insert_ticket(sample_ticket(ticket_id, 5));

        let tasks = (0..4).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.decrement_ticket_quantity(ticket_id, 2).await })
        });
        let outcomes: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let applied = outcomes
            .iter()
            .filter(|o| **o == DecrementOutcome::Applied)
            .count();
        let remaining = store.ticket(ticket_id).unwrap().remaining_quantity;

        // 5 admits exactly two decrements of 2; the rest must be refused.
        assert_eq!(applied, 2);
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn mark_paid_is_idempotent_and_keeps_first_timestamp() {
        let store = MemoryStore::new();
        let booking_id = Uuid::new_v4();
        store.insert_booking(sample_booking(booking_id, Uuid::new_v4()));

        let first = store.mark_booking_paid(booking_id).await.unwrap();
        let paid_at = store.booking(booking_id).unwrap().paid_at;
        let second = store.mark_booking_paid(booking_id).await.unwrap();

        assert_eq!(first, MarkPaidOutcome::Transitioned);
        assert_eq!(second, MarkPaidOutcome::AlreadyPaid);
        assert_eq!(store.booking(booking_id).unwrap().status, "Paid");
        assert_eq!(store.booking(booking_id).unwrap().paid_at, paid_at);
    }

    #[tokio::test]
    async fn mark_paid_reports_missing_booking() {
        let store = MemoryStore::new();

        let outcome = store.mark_booking_paid(Uuid::new_v4()).await.unwrap();

        assert_eq!(outcome, MarkPaidOutcome::NotFound);
    }
}
