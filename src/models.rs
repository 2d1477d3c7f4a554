use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::tickets)]
pub struct Ticket {
    pub id: Uuid,
    pub vendor_email: String,
    pub title: String,
    pub unit_price: bigdecimal::BigDecimal,
    pub remaining_quantity: i32,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::bookings)]
pub struct Booking {
    pub id: Uuid,
    pub user_email: String,
    pub ticket_id: Uuid,
    pub quantity: i32,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Immutable audit record of one settled charge. One row per external
/// transaction reference, enforced by the primary key.
#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::payments)]
pub struct Payment {
    pub transaction_ref: String,
    pub amount: bigdecimal::BigDecimal,
    pub currency: String,
    pub customer_email: String,
    pub booking_id: Uuid,
    pub ticket_id: Uuid,
    pub ticket_title: String,
    pub quantity: i32,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable, Serialize)]
#[diesel(table_name = crate::schema::payments)]
pub struct NewPayment {
    pub transaction_ref: String,
    pub amount: bigdecimal::BigDecimal,
    pub currency: String,
    pub customer_email: String,
    pub booking_id: Uuid,
    pub ticket_id: Uuid,
    pub ticket_title: String,
    pub quantity: i32,
}
