//! # 購入サーバー エラー型
//!
//! 全エラーはHTTP境界で一括捕捉され、500 + `ErrorResponse` に変換される。

use axum::http::StatusCode;
use axum::Json;
use tokensale_types::ErrorResponse;

use crate::endpoints::cors_headers;

/// 購入サーバーエラー型。
#[derive(Debug, thiserror::Error)]
pub enum SaleError {
    /// 不正なリクエスト（JSONパース失敗、公開鍵・金額の不正）
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    /// Solana RPC エラー
    #[error("Solana RPC エラー: {0}")]
    Solana(String),
    /// トークンアカウントの解決に失敗
    #[error("トークンアカウントの解決に失敗: {0}")]
    TokenAccount(String),
    /// 内部エラー（命令構築、署名、シリアライズ）
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for SaleError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            cors_headers(),
            Json(ErrorResponse::new(self.to_string())),
        )
            .into_response()
    }
}
