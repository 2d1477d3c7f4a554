use std::collections::HashMap;

use bigdecimal::BigDecimal;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payment provider returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("confirmation for {external_ref} is missing {field}")]
    MissingField {
        external_ref: String,
        field: &'static str,
    },
    #[error("confirmation for {external_ref} has invalid {field}: {value}")]
    InvalidField {
        external_ref: String,
        field: &'static str,
        value: String,
    },
}

/// What the provider reports about one checkout session. `paid` must be
/// checked before reading the facts; an unpaid session carries no usable
/// metadata.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub external_ref: String,
    pub paid: bool,
    pub transaction_ref: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub customer_email: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// The validated subset of a paid confirmation that settlement consumes.
#[derive(Debug, Clone)]
pub struct SettlementFacts {
    pub transaction_ref: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub customer_email: String,
    pub booking_id: Uuid,
    pub ticket_id: Uuid,
    pub ticket_title: String,
    pub quantity: i32,
}

impl Confirmation {
    pub fn facts(&self) -> Result<SettlementFacts, ProviderError> {
        let customer_email =
            self.customer_email
                .clone()
                .ok_or_else(|| ProviderError::MissingField {
                    external_ref: self.external_ref.clone(),
                    field: "customer email",
                })?;

        let booking_id = self.uuid_field("bookingId")?;
        let ticket_id = self.uuid_field("ticketId")?;
        let ticket_title = self.metadata_field("ticketTitle")?.to_string();

        let raw_quantity = self.metadata_field("quantity")?;
        let quantity: i32 =
            raw_quantity
                .parse()
                .map_err(|_| ProviderError::InvalidField {
                    external_ref: self.external_ref.clone(),
                    field: "quantity",
                    value: raw_quantity.to_string(),
                })?;
        if quantity < 1 {
            return Err(ProviderError::InvalidField {
                external_ref: self.external_ref.clone(),
                field: "quantity",
                value: raw_quantity.to_string(),
            });
        }

        Ok(SettlementFacts {
            transaction_ref: self.transaction_ref.clone(),
            amount: self.amount.clone(),
            currency: self.currency.clone(),
            customer_email,
            booking_id,
            ticket_id,
            ticket_title,
            quantity,
        })
    }

    fn metadata_field(&self, field: &'static str) -> Result<&str, ProviderError> {
        self.metadata
            .get(field)
            .map(String::as_str)
            .ok_or_else(|| ProviderError::MissingField {
                external_ref: self.external_ref.clone(),
                field,
            })
    }

    fn uuid_field(&self, field: &'static str) -> Result<Uuid, ProviderError> {
        let raw = self.metadata_field(field)?;
        Uuid::parse_str(raw).map_err(|_| ProviderError::InvalidField {
            external_ref: self.external_ref.clone(),
            field,
            value: raw.to_string(),
        })
    }
}

#[allow(async_fn_in_trait)]
pub trait PaymentProvider {
    async fn retrieve_confirmation(&self, external_ref: &str)
        -> Result<Confirmation, ProviderError>;
}

#[derive(Deserialize)]
struct CheckoutSession {
    id: String,
    payment_status: String,
    amount_total: Option<i64>,
    currency: Option<String>,
    customer_details: Option<CustomerDetails>,
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
struct CustomerDetails {
    email: Option<String>,
}

/// Stripe Checkout as the payment provider: a session is settleable once
/// `payment_status` is "paid", and its metadata carries the booking facts
/// written at session-creation time.
#[derive(Clone)]
pub struct StripeProvider {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeProvider {
    pub fn new(secret_key: String, api_base: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            secret_key,
        }
    }
}

impl PaymentProvider for StripeProvider {
    async fn retrieve_confirmation(
        &self,
        external_ref: &str,
    ) -> Result<Confirmation, ProviderError> {
        let url = format!("{}/v1/checkout/sessions/{}", self.api_base, external_ref);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let session: CheckoutSession = response.json().await?;

        // Stripe reports amounts in minor units.
        let amount = BigDecimal::from(session.amount_total.unwrap_or(0)) / BigDecimal::from(100);
        // The payment intent is the durable charge reference; the session id
        // only stands in for it on legacy sessions.
        let transaction_ref = session.payment_intent.unwrap_or_else(|| session.id.clone());

        Ok(Confirmation {
            external_ref: external_ref.to_string(),
            paid: session.payment_status == "paid",
            transaction_ref,
            amount,
            currency: session.currency.unwrap_or_default(),
            customer_email: session.customer_details.and_then(|details| details.email),
            metadata: session.metadata,
        })
    }
}
