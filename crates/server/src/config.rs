//! # 購入サーバー設定・共有状態
//!
//! 環境変数からの設定読み込み、販売者鍵ファイルの読み込み、
//! ハンドラへ注入する共有状態の定義。

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::keypair::Keypair;

use crate::pricing::PriceSchedule;
use crate::rpc::{Commitment, SolanaRpc};

/// デフォルトの販売対象トークンMint
pub const DEFAULT_TOKEN_MINT: &str = "7jbCDk8XPd6Bxb2s2yzWwyq2hUXQBcMgW3yDmdp4FRsC";
/// デフォルトのRPCエンドポイント（devnet）
pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";

/// 購入サーバーの共有状態。
/// 起動時に一度だけ構築され、以降は読み取り専用。
pub struct AppState {
    /// Solana RPC（トレイトで抽象化）
    pub rpc: Arc<dyn SolanaRpc>,
    /// 販売者キーペア。トークン送付の権限者であり、部分署名を行う。
    pub seller_keypair: Keypair,
    /// 販売条件
    pub sale: SaleConfig,
}

/// 販売条件。価格・供給量の唯一の定義元。
#[derive(Debug, Clone)]
pub struct SaleConfig {
    /// 販売対象トークンのMintアドレス
    pub token_mint: Pubkey,
    /// 固定価格スケジュール
    pub price: PriceSchedule,
    /// トークンアカウント作成時の確定待ち条件
    pub confirmation: ConfirmationPolicy,
}

/// 送信したトランザクションの確定待ち条件。
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationPolicy {
    /// 到達を待つコミットメントレベル
    pub commitment: Commitment,
    /// ポーリング間隔
    pub poll_interval: Duration,
    /// ポーリング回数の上限
    pub max_attempts: u32,
}

/// 起動時設定。
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTPサーバーのバインドアドレス
    pub bind_addr: String,
    /// Solana RPC URL
    pub rpc_url: String,
    /// 販売者鍵ファイルのパス
    pub keys_path: PathBuf,
    /// 販売条件
    pub sale: SaleConfig,
}

impl ServerConfig {
    /// 環境変数から設定を読み込む。未設定の項目はデフォルト値を使う。
    pub fn from_env() -> anyhow::Result<Self> {
        let commitment: Commitment = env_or("SOLANA_COMMITMENT", Commitment::Confirmed)?;

        let token_mint: Pubkey = env_or(
            "TOKEN_MINT",
            Pubkey::from_str(DEFAULT_TOKEN_MINT).context("DEFAULT_TOKEN_MINTが不正です")?,
        )?;
        let price = PriceSchedule::new(
            env_or("TOKEN_DECIMALS", 9u8)?,
            env_or("TOKEN_TOTAL_SUPPLY", 355_000_000u64)?,
            env_or("TOKEN_TOTAL_PRICE_SOL", 40.0f64)?,
        )?;

        Ok(Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000".to_string())?,
            rpc_url: env_or("SOLANA_RPC_URL", DEFAULT_RPC_URL.to_string())?,
            keys_path: env_or("SELLER_KEYS_PATH", PathBuf::from("./keys.json"))?,
            sale: SaleConfig {
                token_mint,
                price,
                confirmation: ConfirmationPolicy {
                    commitment,
                    poll_interval: Duration::from_millis(env_or("CONFIRM_POLL_INTERVAL_MS", 500u64)?),
                    max_attempts: env_or("CONFIRM_MAX_ATTEMPTS", 60u32)?,
                },
            },
        })
    }
}

/// 環境変数を読み、未設定ならデフォルト値を返す。
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{key}の値が不正です ({raw}): {e}"))
}

// ---------------------------------------------------------------------------
// 販売者鍵ファイル
// ---------------------------------------------------------------------------

/// 販売者鍵ファイルの形式: `{ "sellerSecretKey": [64バイト] }`
#[derive(Deserialize)]
struct SellerKeysFile {
    #[serde(rename = "sellerSecretKey")]
    seller_secret_key: Vec<u8>,
}

/// 販売者鍵ファイルからキーペアを読み込む。
pub fn load_seller_keypair(path: &Path) -> anyhow::Result<Keypair> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("販売者鍵ファイルの読み込みに失敗: {}", path.display()))?;
    let keys: SellerKeysFile = serde_json::from_str(&raw)
        .with_context(|| format!("販売者鍵ファイルのパースに失敗: {}", path.display()))?;

    Keypair::try_from(keys.seller_secret_key.as_slice())
        .map_err(|e| anyhow::anyhow!("sellerSecretKeyは64バイトの秘密鍵である必要があります: {e}"))
}
