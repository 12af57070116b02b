//! # Solanaトランザクション構築ヘルパー
//!
//! 購入トランザクションとトークンアカウント作成トランザクションを構築する。
//! 命令の組み立て・ATA導出・署名・シリアライズはすべて
//! solana-sdk / spl-token / spl-associated-token-account-client に委譲する。

use base64::Engine;
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::keypair::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use spl_associated_token_account_client::instruction::create_associated_token_account_idempotent;

use crate::b64;
use crate::error::SaleError;
use crate::pricing::Quote;

// ---------------------------------------------------------------------------
// トークンアカウント作成トランザクション
// ---------------------------------------------------------------------------

/// ATA作成トランザクションを構築し、payerで完全署名する。
///
/// 冪等版の命令を使うため、同じATAが並行して作成済みでも失敗しない。
pub fn build_create_ata_tx(
    payer: &Keypair,
    owner: &Pubkey,
    mint: &Pubkey,
    blockhash: Hash,
) -> Transaction {
    let create_ata_ix =
        create_associated_token_account_idempotent(&payer.pubkey(), owner, mint, &spl_token::id());

    Transaction::new_signed_with_payer(&[create_ata_ix], Some(&payer.pubkey()), &[payer], blockhash)
}

// ---------------------------------------------------------------------------
// 購入トランザクション
// ---------------------------------------------------------------------------

/// 購入トランザクションを構築する（未署名）。
///
/// トランザクションには2つの命令が含まれる:
/// 1. system_program::transfer — 購入者 → 販売者 (lamports)
/// 2. spl_token::transfer — 販売者ATA → 購入者ATA (トークン最小単位)
///
/// 署名者: buyer (fee payer), seller (トークン送付の権限者)
pub fn build_purchase_tx(
    buyer: &Pubkey,
    seller: &Pubkey,
    seller_token_account: &Pubkey,
    buyer_token_account: &Pubkey,
    quote: &Quote,
    blockhash: &Hash,
) -> Result<Transaction, SaleError> {
    let sol_transfer_ix = solana_sdk::system_instruction::transfer(buyer, seller, quote.lamports);

    let token_transfer_ix = spl_token::instruction::transfer(
        &spl_token::id(),
        seller_token_account,
        buyer_token_account,
        seller,
        &[],
        quote.token_base_units,
    )
    .map_err(|e| SaleError::Internal(format!("トークン送付命令の構築に失敗: {e}")))?;

    let message = Message::new_with_blockhash(
        &[sol_transfer_ix, token_transfer_ix],
        Some(buyer),
        blockhash,
    );

    Ok(Transaction::new_unsigned(message))
}

/// 販売者の署名スロットにのみ署名する。購入者のスロットは空のまま残る。
pub fn apply_seller_signature(tx: &mut Transaction, seller: &Keypair) -> Result<(), SaleError> {
    let blockhash = tx.message.recent_blockhash;
    tx.try_partial_sign(&[seller], blockhash)
        .map_err(|e| SaleError::Internal(format!("販売者署名の適用に失敗: {e}")))
}

/// トランザクションをバイナリにシリアライズする。全署名は要求しない。
pub fn serialize_transaction(tx: &Transaction) -> Result<Vec<u8>, SaleError> {
    bincode::serialize(tx)
        .map_err(|e| SaleError::Internal(format!("トランザクションのシリアライズに失敗: {e}")))
}

/// トランザクションをBase64文字列にエンコードする。
pub fn encode_transaction(tx: &Transaction) -> Result<String, SaleError> {
    Ok(b64().encode(serialize_transaction(tx)?))
}
