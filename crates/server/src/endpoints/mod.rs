//! # 購入サーバーエンドポイント
//!
//! - `POST /` — 部分署名済み購入トランザクションの発行
//! - `OPTIONS /` — CORSプリフライト
//! - `GET /` はPOSTと同じハンドラで処理し、それ以外のメソッド・パスは
//!   CORSヘッダ付きの500で応答する

pub mod purchase;

use std::sync::Arc;

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderName, Method, Uri};

use crate::config::AppState;
use crate::error::SaleError;

pub use purchase::{handle_preflight, handle_purchase};

/// 成功・失敗を問わず全レスポンスに付与するCORSヘッダ。
pub fn cors_headers() -> [(HeaderName, &'static str); 3] {
    [
        (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        (ACCESS_CONTROL_ALLOW_METHODS, "OPTIONS,POST,GET"),
    ]
}

/// axumルーターを構築する。
pub fn router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route(
            "/",
            axum::routing::post(handle_purchase)
                .get(handle_purchase)
                .options(handle_preflight),
        )
        .method_not_allowed_fallback(handle_unrouted)
        .fallback(handle_unrouted)
        .with_state(state)
}

/// 未定義のメソッド・パス。フレームワーク既定の404/405ではなくCORSヘッダ付きの500を返す。
async fn handle_unrouted(method: Method, uri: Uri) -> SaleError {
    tracing::warn!(%method, %uri, "未対応のリクエストです");
    SaleError::BadRequest(format!("未対応のリクエストです: {method} {uri}"))
}
