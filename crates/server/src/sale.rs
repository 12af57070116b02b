//! # 購入トランザクションの生成
//!
//! ## 処理フロー
//! 1. 購入者公開鍵と支払いSOL量を検証し、固定価格で換算
//! 2. 購入者・販売者のATAを取得（なければ作成）
//! 3. SOL送付命令とトークン送付命令を構築
//! 4. 最新blockhashを取得し、購入者をfee payerとして設定
//! 5. 販売者の鍵でのみ部分署名し、Base64でシリアライズ

use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::Signer;
use tokensale_types::PurchaseRequest;

use crate::config::AppState;
use crate::error::SaleError;
use crate::pricing::Quote;
use crate::solana_tx;
use crate::token_account::get_or_create_associated_token_account;

/// 部分署名済みの購入トランザクション。
#[derive(Debug, Clone)]
pub struct SignedPurchase {
    /// Base64エンコードされたトランザクション
    pub transaction: String,
    /// 購入者
    pub buyer: Pubkey,
    /// 換算結果
    pub quote: Quote,
}

/// 購入者公開鍵をパースする。空文字列は拒否する。
pub fn parse_buyer(buyer_public_key: &str) -> Result<Pubkey, SaleError> {
    let trimmed = buyer_public_key.trim();
    if trimmed.is_empty() {
        return Err(SaleError::BadRequest("buyerPublicKeyが空です".to_string()));
    }
    Pubkey::from_str(trimmed).map_err(|e| {
        SaleError::BadRequest(format!("buyerPublicKeyのBase58デコードに失敗: {e}"))
    })
}

/// 購入トランザクションを構築し、販売者の鍵で部分署名する。
pub async fn create_and_sign_transaction(
    state: &AppState,
    request: &PurchaseRequest,
) -> Result<SignedPurchase, SaleError> {
    let buyer = parse_buyer(&request.buyer_public_key)?;
    let quote = state.sale.price.quote(request.amount_in_sol)?;

    let rpc = state.rpc.as_ref();
    let seller = &state.seller_keypair;
    let mint = &state.sale.token_mint;
    let confirmation = &state.sale.confirmation;

    let buyer_token_account =
        get_or_create_associated_token_account(rpc, seller, mint, &buyer, confirmation).await?;
    let seller_token_account =
        get_or_create_associated_token_account(rpc, seller, mint, &seller.pubkey(), confirmation)
            .await?;

    let blockhash = rpc.get_latest_blockhash().await?;

    let mut tx = solana_tx::build_purchase_tx(
        &buyer,
        &seller.pubkey(),
        &seller_token_account,
        &buyer_token_account,
        &quote,
        &blockhash,
    )?;
    solana_tx::apply_seller_signature(&mut tx, seller)?;

    let transaction = solana_tx::encode_transaction(&tx)?;

    tracing::debug!(
        %buyer,
        tokens = state.sale.price.tokens_for_sol(request.amount_in_sol),
        "購入トランザクションに販売者署名を付与しました"
    );

    Ok(SignedPurchase {
        transaction,
        buyer,
        quote,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use base64::Engine;
    use solana_sdk::signature::{Keypair, Signature};
    use solana_sdk::transaction::Transaction;
    use spl_associated_token_account_client::address::get_associated_token_address;

    use crate::b64;
    use crate::test_helpers::{test_state, token_account, MockRpc};

    fn request(buyer: &Pubkey, amount_in_sol: f64) -> PurchaseRequest {
        PurchaseRequest {
            buyer_public_key: buyer.to_string(),
            amount_in_sol,
        }
    }

    #[test]
    fn test_parse_buyer() {
        let key = Pubkey::new_unique();
        assert_eq!(parse_buyer(&key.to_string()).unwrap(), key);
        assert!(matches!(parse_buyer(""), Err(SaleError::BadRequest(_))));
        assert!(matches!(parse_buyer("   "), Err(SaleError::BadRequest(_))));
        assert!(matches!(parse_buyer("not-a-key"), Err(SaleError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_create_and_sign_with_existing_accounts() {
        let rpc = Arc::new(MockRpc::new());
        let seller = Keypair::new();
        let seller_pubkey = seller.pubkey();
        let state = test_state(rpc.clone(), seller);
        let mint = state.sale.token_mint;
        let buyer = Pubkey::new_unique();

        let buyer_ata = get_associated_token_address(&buyer, &mint);
        let seller_ata = get_associated_token_address(&seller_pubkey, &mint);
        rpc.insert_account(buyer_ata, token_account(&mint, &buyer));
        rpc.insert_account(seller_ata, token_account(&mint, &seller_pubkey));

        let signed = create_and_sign_transaction(&state, &request(&buyer, 1.0))
            .await
            .unwrap();

        assert_eq!(signed.buyer, buyer);
        assert_eq!(signed.quote.lamports, 1_000_000_000);
        assert_eq!(signed.quote.token_base_units, 8_875_000_000_000_000);
        assert!(rpc.sent_transactions().is_empty());

        let bytes = b64().decode(&signed.transaction).unwrap();
        let tx: Transaction = bincode::deserialize(&bytes).unwrap();

        // 購入者がfee payer、blockhashはRPCから取得したもの
        assert_eq!(tx.message.account_keys[0], buyer);
        assert_eq!(tx.message.recent_blockhash, rpc.blockhash());
        assert_eq!(tx.message.instructions.len(), 2);

        // 購入者は未署名、販売者は署名済み
        assert_eq!(tx.signatures.len(), 2);
        assert_eq!(tx.signatures[0], Signature::default());
        assert!(tx.signatures[1].verify(seller_pubkey.as_ref(), &tx.message_data()));
    }

    #[tokio::test]
    async fn test_create_and_sign_creates_missing_accounts() {
        let rpc = Arc::new(MockRpc::new());
        let seller = Keypair::new();
        let state = test_state(rpc.clone(), seller);
        let buyer = Pubkey::new_unique();

        let signed = create_and_sign_transaction(&state, &request(&buyer, 0.5))
            .await
            .unwrap();
        assert!(!signed.transaction.is_empty());

        // 購入者・販売者の2つのATA作成トランザクション
        assert_eq!(rpc.sent_transactions().len(), 2);
    }

    #[tokio::test]
    async fn test_blockhash_failure_is_propagated() {
        let rpc = Arc::new(MockRpc::new());
        rpc.fail_blockhash("node is behind");
        let state = test_state(rpc.clone(), Keypair::new());
        let mint = state.sale.token_mint;
        let buyer = Pubkey::new_unique();
        let seller = state.seller_keypair.pubkey();
        rpc.insert_account(
            get_associated_token_address(&buyer, &mint),
            token_account(&mint, &buyer),
        );
        rpc.insert_account(
            get_associated_token_address(&seller, &mint),
            token_account(&mint, &seller),
        );

        let err = create_and_sign_transaction(&state, &request(&buyer, 1.0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("node is behind"));
    }

    #[tokio::test]
    async fn test_invalid_amount_rejected_before_rpc() {
        let rpc = Arc::new(MockRpc::new());
        let state = test_state(rpc.clone(), Keypair::new());

        let result = create_and_sign_transaction(&state, &request(&Pubkey::new_unique(), 0.0)).await;
        assert!(matches!(result, Err(SaleError::BadRequest(_))));
        assert!(rpc.sent_transactions().is_empty());
    }
}
