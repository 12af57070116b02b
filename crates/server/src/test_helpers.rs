//! # テスト用共通ヘルパー
//!
//! トークンアカウント解決・購入処理・エンドポイントのテストで共有するモック群。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::signer::keypair::Keypair;
use solana_sdk::transaction::Transaction;
use spl_token::solana_program::program_option::COption;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::{Account, AccountState};

use crate::config::{AppState, ConfirmationPolicy, SaleConfig};
use crate::error::SaleError;
use crate::pricing::PriceSchedule;
use crate::rpc::{Commitment, RpcAccount, SolanaRpc, TransactionStatus};

/// SPL Tokenアカウントのデータを生成する。
pub fn token_account(mint: &Pubkey, owner: &Pubkey) -> RpcAccount {
    let account = Account {
        mint: *mint,
        owner: *owner,
        amount: 0,
        delegate: COption::None,
        state: AccountState::Initialized,
        is_native: COption::None,
        delegated_amount: 0,
        close_authority: COption::None,
    };
    let mut data = vec![0u8; Account::LEN];
    Account::pack(account, &mut data).unwrap();

    RpcAccount {
        owner: spl_token::id(),
        data,
    }
}

/// テスト用のモックSolana RPC。
/// 送信されたATA作成命令を適用し、トークンアカウントを生成する。
pub struct MockRpc {
    blockhash: Hash,
    accounts: Mutex<HashMap<Pubkey, RpcAccount>>,
    sent: Mutex<Vec<Transaction>>,
    status: Mutex<TransactionStatus>,
    blockhash_error: Mutex<Option<String>>,
    create_accounts: Mutex<bool>,
}

impl MockRpc {
    pub fn new() -> Self {
        Self {
            blockhash: Hash::new_unique(),
            accounts: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            status: Mutex::new(TransactionStatus {
                commitment: Commitment::Finalized,
                err: None,
            }),
            blockhash_error: Mutex::new(None),
            create_accounts: Mutex::new(true),
        }
    }

    /// 待ち時間なしで数回だけポーリングする確定待ち条件。
    pub fn fast_confirmation() -> ConfirmationPolicy {
        ConfirmationPolicy {
            commitment: Commitment::Confirmed,
            poll_interval: Duration::from_millis(1),
            max_attempts: 3,
        }
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn insert_account(&self, address: Pubkey, account: RpcAccount) {
        self.accounts.lock().unwrap().insert(address, account);
    }

    pub fn set_status(&self, status: TransactionStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn fail_blockhash(&self, message: &str) {
        *self.blockhash_error.lock().unwrap() = Some(message.to_string());
    }

    /// 送信されたATA作成命令を適用しない（確定しても作成されない状態を再現）。
    pub fn ignore_account_creation(&self) {
        *self.create_accounts.lock().unwrap() = false;
    }

    pub fn sent_transactions(&self) -> Vec<Transaction> {
        self.sent.lock().unwrap().clone()
    }

    /// ATA作成命令（accounts: funder, ata, wallet, mint, ...）を適用する。
    fn apply_create_ata(&self, tx: &Transaction) {
        let keys = &tx.message.account_keys;
        for ix in &tx.message.instructions {
            if keys[ix.program_id_index as usize] != spl_associated_token_account_client::program::id()
            {
                continue;
            }
            let ata = keys[ix.accounts[1] as usize];
            let wallet = keys[ix.accounts[2] as usize];
            let mint = keys[ix.accounts[3] as usize];
            self.insert_account(ata, token_account(&mint, &wallet));
        }
    }
}

#[async_trait::async_trait]
impl SolanaRpc for MockRpc {
    async fn get_latest_blockhash(&self) -> Result<Hash, SaleError> {
        match self.blockhash_error.lock().unwrap().as_ref() {
            Some(message) => Err(SaleError::Solana(message.clone())),
            None => Ok(self.blockhash),
        }
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<RpcAccount>, SaleError> {
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, SaleError> {
        if *self.create_accounts.lock().unwrap() {
            self.apply_create_ata(tx);
        }
        self.sent.lock().unwrap().push(tx.clone());
        Ok(tx.signatures[0])
    }

    async fn get_signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<TransactionStatus>, SaleError> {
        Ok(Some(self.status.lock().unwrap().clone()))
    }
}

/// テスト用AppStateを構築するヘルパー。
/// デフォルトの価格条件（9桁、355,000,000供給、40 SOL）を使う。
pub fn test_state(rpc: Arc<MockRpc>, seller_keypair: Keypair) -> Arc<AppState> {
    Arc::new(AppState {
        rpc,
        seller_keypair,
        sale: SaleConfig {
            token_mint: Pubkey::new_unique(),
            price: PriceSchedule::new(9, 355_000_000, 40.0).unwrap(),
            confirmation: MockRpc::fast_confirmation(),
        },
    })
}
