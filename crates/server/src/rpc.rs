//! # Solana RPC
//!
//! 購入処理が必要とするRPC呼び出しの抽象インターフェースと、
//! JSON-RPC 2.0 over HTTP による実装。

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use serde::Deserialize;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

use crate::b64;
use crate::error::SaleError;

// ---------------------------------------------------------------------------
// 型定義
// ---------------------------------------------------------------------------

/// RPCのコミットメントレベル。順序は確定度の低い順。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(format!("不明なコミットメントレベル: {other}")),
        }
    }
}

/// オンチェーンアカウントのうち購入処理が参照する部分。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcAccount {
    /// アカウントを所有するプログラム
    pub owner: Pubkey,
    /// アカウントデータ
    pub data: Vec<u8>,
}

/// 送信済みトランザクションの状態。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStatus {
    /// 到達済みのコミットメントレベル
    pub commitment: Commitment,
    /// 実行エラー（成功時はNone）
    pub err: Option<String>,
}

// ---------------------------------------------------------------------------
// 抽象インターフェース
// ---------------------------------------------------------------------------

/// Solana RPCの抽象インターフェース。
///
/// 本番ではJSON-RPCエンドポイント、テストではモックを差し込む。
#[async_trait::async_trait]
pub trait SolanaRpc: Send + Sync {
    /// 最新のblockhashを取得する。
    async fn get_latest_blockhash(&self) -> Result<Hash, SaleError>;

    /// アカウントを取得する。存在しない場合はNone。
    async fn get_account(&self, address: &Pubkey) -> Result<Option<RpcAccount>, SaleError>;

    /// 署名済みトランザクションを送信し、トランザクション署名を返す。
    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, SaleError>;

    /// トランザクションの状態を取得する。RPCノードが未把握の場合はNone。
    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionStatus>, SaleError>;
}

// ---------------------------------------------------------------------------
// JSON-RPC 実装
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 over HTTP によるSolana RPC実装。
pub struct HttpRpcClient {
    /// RPCエンドポイントURL
    url: String,
    /// HTTPクライアント
    http_client: reqwest::Client,
    /// 問い合わせ・プリフライトに使用するコミットメント
    commitment: Commitment,
}

#[derive(Deserialize)]
struct RpcContextual<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlockhash {
    blockhash: String,
}

#[derive(Deserialize)]
struct RpcAccountInfo {
    /// `[base64データ, "base64"]`
    data: (String, String),
    owner: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcSignatureStatus {
    confirmations: Option<u64>,
    err: Option<serde_json::Value>,
    confirmation_status: Option<String>,
}

impl HttpRpcClient {
    pub fn new(url: impl Into<String>, commitment: Commitment) -> Self {
        Self {
            url: url.into(),
            http_client: reqwest::Client::new(),
            commitment,
        }
    }

    /// JSON-RPCメソッドを呼び出し、`result` をデシリアライズして返す。
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, SaleError> {
        let rpc_request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let rpc_response = self
            .http_client
            .post(&self.url)
            .json(&rpc_request)
            .send()
            .await
            .map_err(|e| SaleError::Solana(format!("{method} の送信に失敗: {e}")))?;

        let status = rpc_response.status();
        let rpc_body: serde_json::Value = rpc_response
            .json()
            .await
            .map_err(|e| SaleError::Solana(format!("{method} のレスポンスのパースに失敗: {e}")))?;

        if let Some(error) = rpc_body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(SaleError::Solana(format!("{method} が失敗: {message}")));
        }
        if !status.is_success() {
            return Err(SaleError::Solana(format!("{method} が HTTP {status} を返しました")));
        }

        let result = rpc_body
            .get("result")
            .cloned()
            .ok_or_else(|| SaleError::Solana(format!("{method} のレスポンスにresultがありません")))?;

        serde_json::from_value(result)
            .map_err(|e| SaleError::Solana(format!("{method} のresultの形式が不正: {e}")))
    }
}

#[async_trait::async_trait]
impl SolanaRpc for HttpRpcClient {
    async fn get_latest_blockhash(&self) -> Result<Hash, SaleError> {
        let result: RpcContextual<RpcBlockhash> = self
            .call(
                "getLatestBlockhash",
                serde_json::json!([{ "commitment": self.commitment.as_str() }]),
            )
            .await?;

        Hash::from_str(&result.value.blockhash)
            .map_err(|e| SaleError::Solana(format!("blockhashのBase58デコードに失敗: {e}")))
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<RpcAccount>, SaleError> {
        let result: RpcContextual<Option<RpcAccountInfo>> = self
            .call(
                "getAccountInfo",
                serde_json::json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": self.commitment.as_str() }
                ]),
            )
            .await?;

        let Some(info) = result.value else {
            return Ok(None);
        };

        let owner = Pubkey::from_str(&info.owner)
            .map_err(|e| SaleError::Solana(format!("ownerのBase58デコードに失敗: {e}")))?;
        let data = b64()
            .decode(&info.data.0)
            .map_err(|e| SaleError::Solana(format!("アカウントデータのBase64デコードに失敗: {e}")))?;

        Ok(Some(RpcAccount { owner, data }))
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, SaleError> {
        let tx_bytes = bincode::serialize(tx)
            .map_err(|e| SaleError::Internal(format!("トランザクションのシリアライズに失敗: {e}")))?;

        let tx_sig: String = self
            .call(
                "sendTransaction",
                serde_json::json!([
                    b64().encode(&tx_bytes),
                    { "encoding": "base64", "preflightCommitment": self.commitment.as_str() }
                ]),
            )
            .await?;

        Signature::from_str(&tx_sig)
            .map_err(|e| SaleError::Solana(format!("トランザクション署名のデコードに失敗: {e}")))
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionStatus>, SaleError> {
        let result: RpcContextual<Vec<Option<RpcSignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                serde_json::json!([[signature.to_string()]]),
            )
            .await?;

        let Some(status) = result.value.into_iter().next().flatten() else {
            return Ok(None);
        };

        // confirmationStatus未対応ノードでは confirmations == null がルート済みを表す
        let commitment = match status.confirmation_status.as_deref() {
            Some(s) => Commitment::from_str(s).map_err(SaleError::Solana)?,
            None if status.confirmations.is_none() => Commitment::Finalized,
            None => Commitment::Processed,
        };

        Ok(Some(TransactionStatus {
            commitment,
            err: status.err.map(|e| e.to_string()),
        }))
    }
}
