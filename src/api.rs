use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use serde::{Deserialize, Serialize};

use crate::provider::StripeProvider;
use crate::settlement::{SettlementError, SettlementOutcome, SettlementService};
use crate::store::PgStore;

#[derive(Clone)]
pub struct AppState {
    pub settlement: Arc<SettlementService<PgStore, StripeProvider>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentResponse {
    pub success: bool,
    pub already_processed: bool,
    pub transaction_ref: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/payments/confirm", post(confirm_payment))
        .route("/health", axum::routing::get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<Json<ConfirmPaymentResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.settlement.settle(&request.session_id).await {
        Ok(SettlementOutcome::Settled { transaction_ref }) => Ok(Json(ConfirmPaymentResponse {
            success: true,
            already_processed: false,
            transaction_ref,
        })),
        Ok(SettlementOutcome::AlreadyProcessed { transaction_ref }) => {
            Ok(Json(ConfirmPaymentResponse {
                success: true,
                already_processed: true,
                transaction_ref,
            }))
        }
        Ok(SettlementOutcome::NotPaid) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                success: false,
                message: "Payment not completed".to_string(),
            }),
        )),
        Err(error @ SettlementError::Provider(_)) => {
            tracing::error!("Failed to retrieve payment confirmation: {}", error);
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    success: false,
                    message: "Failed to retrieve payment confirmation".to_string(),
                }),
            ))
        }
        Err(error @ SettlementError::Storage(_)) => {
            tracing::error!("Failed to settle payment: {}", error);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    success: false,
                    message: "Failed to settle payment".to_string(),
                }),
            ))
        }
    }
}

pub async fn health_check() -> &'static str {
    "OK"
}
