//! # Token Sale 共有型定義
//!
//! 購入エンドポイントのリクエスト/レスポンスをRust構造体として提供する。
//!
//! ## エンコーディング規則
//! - Base58: Solanaアドレス、公開鍵
//! - Base64: シリアライズ済みトランザクション
//! - JSONフィールド名はブラウザ側ウォレット連携に合わせてcamelCase

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// 購入リクエスト / レスポンス
// ---------------------------------------------------------------------------

/// 購入リクエスト。
/// 購入者の公開鍵と支払うSOL量を指定する。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    /// Base58エンコードされた購入者ウォレットアドレス
    pub buyer_public_key: String,
    /// 支払うSOL量（小数可）
    pub amount_in_sol: f64,
}

/// 購入成功時のレスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    /// Base64エンコードされた部分署名済みトランザクション。
    /// 購入者が署名を追加して送信する。
    pub transaction: String,
}

/// 購入失敗時のレスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 固定メッセージ（`ERROR_MESSAGE`）
    pub message: String,
    /// 失敗原因
    pub error: String,
}

/// `ErrorResponse::message` に入る固定文字列。
pub const ERROR_MESSAGE: &str = "Transaction failed";

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            message: ERROR_MESSAGE.to_string(),
            error: error.into(),
        }
    }
}
