diesel::table! {
    tickets (id) {
        id -> Uuid,
        vendor_email -> Varchar,
        title -> Varchar,
        unit_price -> Numeric,
        remaining_quantity -> Int4,
        status -> Varchar,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    bookings (id) {
        id -> Uuid,
        user_email -> Varchar,
        ticket_id -> Uuid,
        quantity -> Int4,
        status -> Varchar,
        created_at -> Nullable<Timestamptz>,
        paid_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    payments (transaction_ref) {
        transaction_ref -> Varchar,
        amount -> Numeric,
        currency -> Varchar,
        customer_email -> Varchar,
        booking_id -> Uuid,
        ticket_id -> Uuid,
        ticket_title -> Varchar,
        quantity -> Int4,
        recorded_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    tickets,
    bookings,
    payments,
);
