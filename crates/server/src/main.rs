//! # Token Sale Server
//!
//! 固定価格でのトークン販売用に、部分署名済みSolanaトランザクションを発行するサーバー。
//!
//! ## 役割
//! - 購入者公開鍵とSOL量から固定価格でトークン量を算出
//! - 購入者・販売者の関連トークンアカウントを取得（なければ作成）
//! - SOL送付（購入者→販売者）とトークン送付（販売者→購入者）を1トランザクションに構築
//! - 販売者の鍵でのみ部分署名し、購入者の署名・送信に委ねる
//!
//! ## API エンドポイント
//! - `POST /` — 購入トランザクション発行
//! - `OPTIONS /` — CORSプリフライト

mod config;
mod endpoints;
mod error;
mod pricing;
mod rpc;
mod sale;
mod solana_tx;
mod token_account;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;

use solana_sdk::signer::Signer;

use crate::config::{load_seller_keypair, AppState, ServerConfig};
use crate::rpc::HttpRpcClient;

/// Base64エンジン（Standard）
pub(crate) fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env()?;

    // 販売者キーペア（起動時に一度だけ読み込み、以降は共有状態として注入）
    let seller_keypair = load_seller_keypair(&config.keys_path)?;
    tracing::info!(
        seller = %seller_keypair.pubkey(),
        token_mint = %config.sale.token_mint,
        price_per_token_sol = config.sale.price.price_per_token_sol(),
        decimals = config.sale.price.decimals(),
        "販売条件を読み込みました"
    );

    let rpc = HttpRpcClient::new(&config.rpc_url, config.sale.confirmation.commitment);
    tracing::info!(rpc_url = %config.rpc_url, "Solana RPCに接続します");

    let state = Arc::new(AppState {
        rpc: Arc::new(rpc),
        seller_keypair,
        sale: config.sale,
    });

    let app = endpoints::router(state);

    tracing::info!("購入サーバーを {} で起動します", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
