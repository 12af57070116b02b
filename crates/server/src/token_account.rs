//! # 関連トークンアカウント（ATA）の解決
//!
//! 所有者とMintからATAを導出し、存在すれば検証、存在しなければ
//! 販売者の支払いで作成して確定を待つ。

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::signer::keypair::Keypair;
use spl_associated_token_account_client::address::get_associated_token_address;
use spl_token::solana_program::program_pack::Pack;

use crate::config::ConfirmationPolicy;
use crate::error::SaleError;
use crate::rpc::{RpcAccount, SolanaRpc};
use crate::solana_tx;

/// ATAを取得し、存在しなければ作成する。ATAのアドレスを返す。
pub async fn get_or_create_associated_token_account(
    rpc: &dyn SolanaRpc,
    payer: &Keypair,
    mint: &Pubkey,
    owner: &Pubkey,
    confirmation: &ConfirmationPolicy,
) -> Result<Pubkey, SaleError> {
    let address = get_associated_token_address(owner, mint);

    if let Some(account) = rpc.get_account(&address).await? {
        validate_token_account(&address, &account, mint, owner)?;
        return Ok(address);
    }

    tracing::info!(%address, %owner, %mint, "トークンアカウントが存在しないため作成します");

    let blockhash = rpc.get_latest_blockhash().await?;
    let tx = solana_tx::build_create_ata_tx(payer, owner, mint, blockhash);
    let tx_sig = rpc.send_transaction(&tx).await?;
    confirm_transaction(rpc, &tx_sig, confirmation).await?;

    tracing::info!(%address, %tx_sig, "トークンアカウントを作成しました");

    let account = rpc.get_account(&address).await?.ok_or_else(|| {
        SaleError::TokenAccount(format!("作成後のトークンアカウント {address} が見つかりません"))
    })?;
    validate_token_account(&address, &account, mint, owner)?;

    Ok(address)
}

/// アカウントがSPL Tokenプログラム所有で、指定のMint・所有者を持つことを確認する。
fn validate_token_account(
    address: &Pubkey,
    account: &RpcAccount,
    mint: &Pubkey,
    owner: &Pubkey,
) -> Result<(), SaleError> {
    if account.owner != spl_token::id() {
        return Err(SaleError::TokenAccount(format!(
            "{address} はSPL Tokenプログラムの所有ではありません (owner: {})",
            account.owner
        )));
    }

    let token_account = spl_token::state::Account::unpack(&account.data).map_err(|e| {
        SaleError::TokenAccount(format!("{address} のトークンアカウントデータが不正: {e}"))
    })?;

    if token_account.mint != *mint {
        return Err(SaleError::TokenAccount(format!(
            "{address} のMintが一致しません (expected: {mint}, actual: {})",
            token_account.mint
        )));
    }
    if token_account.owner != *owner {
        return Err(SaleError::TokenAccount(format!(
            "{address} の所有者が一致しません (expected: {owner}, actual: {})",
            token_account.owner
        )));
    }

    Ok(())
}

/// トランザクションが指定のコミットメントに到達するまでポーリングする。
pub async fn confirm_transaction(
    rpc: &dyn SolanaRpc,
    tx_sig: &Signature,
    policy: &ConfirmationPolicy,
) -> Result<(), SaleError> {
    for attempt in 1..=policy.max_attempts {
        if let Some(status) = rpc.get_signature_status(tx_sig).await? {
            if let Some(err) = status.err {
                return Err(SaleError::Solana(format!(
                    "トランザクション {tx_sig} の実行に失敗: {err}"
                )));
            }
            if status.commitment >= policy.commitment {
                return Ok(());
            }
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.poll_interval).await;
        }
    }

    Err(SaleError::Solana(format!(
        "トランザクション {tx_sig} が {} に到達しませんでした",
        policy.commitment
    )))
}
