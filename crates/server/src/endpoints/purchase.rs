//! # POST /
//!
//! 購入リクエストを受け付け、部分署名済みトランザクションを返す。
//! ボディのパースから署名までの失敗はすべて500 + `ErrorResponse` に変換する。

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokensale_types::{PurchaseRequest, PurchaseResponse};

use super::cors_headers;
use crate::config::AppState;
use crate::error::SaleError;
use crate::sale::{create_and_sign_transaction, SignedPurchase};

/// POST / — 購入トランザクションの発行。
///
/// フレームワークの抽出器による4xxを避けるため、ボディは生バイト列で受け取り
/// ハンドラ内でパースする。ボディ上限超過などの読み込み失敗も同じ経路で500になる。
pub async fn handle_purchase(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    match purchase(&state, body).await {
        Ok(signed) => {
            tracing::info!(
                buyer = %signed.buyer,
                lamports = signed.quote.lamports,
                token_base_units = signed.quote.token_base_units,
                "購入トランザクションを発行しました"
            );
            (
                StatusCode::OK,
                cors_headers(),
                Json(PurchaseResponse {
                    transaction: signed.transaction,
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "購入トランザクションの構築に失敗しました");
            e.into_response()
        }
    }
}

/// OPTIONS / — CORSプリフライト。
pub async fn handle_preflight() -> impl IntoResponse {
    (StatusCode::OK, cors_headers())
}

async fn purchase(
    state: &AppState,
    body: Result<Bytes, BytesRejection>,
) -> Result<SignedPurchase, SaleError> {
    let body = body
        .map_err(|e| SaleError::BadRequest(format!("リクエストボディの読み込みに失敗: {e}")))?;
    let request: PurchaseRequest = serde_json::from_slice(&body).map_err(|e| {
        SaleError::BadRequest(format!(
            "リクエストボディのパースに失敗 ({} bytes): {e}",
            body.len()
        ))
    })?;

    tracing::info!(
        buyer_public_key = %request.buyer_public_key,
        amount_in_sol = request.amount_in_sol,
        "購入リクエストを受信しました"
    );

    create_and_sign_transaction(state, &request).await
}
