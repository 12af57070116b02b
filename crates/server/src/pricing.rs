//! # 固定価格スケジュール
//!
//! 総供給量と総販売価格から1トークンあたりの価格を起動時に一度だけ導出し、
//! 支払いSOL量をlamportsとトークン最小単位に換算する。

use solana_sdk::native_token::LAMPORTS_PER_SOL;

use crate::error::SaleError;

/// 固定価格スケジュール。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSchedule {
    /// トークンの小数精度
    decimals: u8,
    /// 販売対象の総供給量（整数トークン単位）
    total_supply: u64,
    /// 総供給量に対する販売価格（lamports）
    total_price_lamports: u64,
}

/// 1回の購入に対する換算結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    /// 購入者から販売者へ送るlamports
    pub lamports: u64,
    /// 販売者から購入者へ送るトークン最小単位
    pub token_base_units: u64,
}

impl PriceSchedule {
    /// 価格スケジュールを構築する。
    /// `total_price_sol` はSOL単位、内部ではlamportsで保持する。
    pub fn new(decimals: u8, total_supply: u64, total_price_sol: f64) -> anyhow::Result<Self> {
        if total_supply == 0 {
            anyhow::bail!("総供給量は1以上である必要があります");
        }
        if 10u64.checked_pow(decimals as u32).is_none() {
            anyhow::bail!("小数精度 {decimals} はu64で表現できません");
        }
        if !total_price_sol.is_finite() || total_price_sol <= 0.0 {
            anyhow::bail!("総販売価格は正の数である必要があります: {total_price_sol}");
        }
        let total_price_lamports = (total_price_sol * LAMPORTS_PER_SOL as f64).round();
        if total_price_lamports < 1.0 || total_price_lamports >= u64::MAX as f64 {
            anyhow::bail!("総販売価格がlamportsの範囲外です: {total_price_sol}");
        }

        Ok(Self {
            decimals,
            total_supply,
            total_price_lamports: total_price_lamports as u64,
        })
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// 1トークンあたりの価格（SOL）。
    pub fn price_per_token_sol(&self) -> f64 {
        self.total_price_lamports as f64 / LAMPORTS_PER_SOL as f64 / self.total_supply as f64
    }

    /// 支払いSOL量に対するトークン量（整数トークン単位、小数含む）。
    pub fn tokens_for_sol(&self, amount_in_sol: f64) -> f64 {
        amount_in_sol / self.price_per_token_sol()
    }

    /// 支払いSOL量をlamportsに換算する。
    /// 有限かつ正の値のみ受け付け、最も近いlamportsに丸める。
    pub fn lamports_for_sol(&self, amount_in_sol: f64) -> Result<u64, SaleError> {
        if !amount_in_sol.is_finite() || amount_in_sol <= 0.0 {
            return Err(SaleError::BadRequest(format!(
                "amountInSolは正の数である必要があります: {amount_in_sol}"
            )));
        }
        let lamports = (amount_in_sol * LAMPORTS_PER_SOL as f64).round();
        if lamports < 1.0 {
            return Err(SaleError::BadRequest(format!(
                "amountInSolが1 lamport未満です: {amount_in_sol}"
            )));
        }
        if lamports >= u64::MAX as f64 {
            return Err(SaleError::BadRequest(format!(
                "amountInSolが大きすぎます: {amount_in_sol}"
            )));
        }
        Ok(lamports as u64)
    }

    /// lamportsに対応するトークン最小単位（切り捨て）。
    /// `lamports * total_supply * 10^decimals / total_price_lamports`
    pub fn token_base_units(&self, lamports: u64) -> Result<u64, SaleError> {
        let overflow = || SaleError::BadRequest(format!("トークン量がu64を超えます: {lamports} lamports"));

        let scale = 10u128.pow(self.decimals as u32);
        let numerator = (lamports as u128)
            .checked_mul(self.total_supply as u128)
            .and_then(|v| v.checked_mul(scale))
            .ok_or_else(overflow)?;
        let units = numerator / self.total_price_lamports as u128;

        u64::try_from(units).map_err(|_| overflow())
    }

    /// 支払いSOL量からlamportsとトークン最小単位をまとめて算出する。
    pub fn quote(&self, amount_in_sol: f64) -> Result<Quote, SaleError> {
        let lamports = self.lamports_for_sol(amount_in_sol)?;
        let token_base_units = self.token_base_units(lamports)?;
        Ok(Quote {
            lamports,
            token_base_units,
        })
    }
}
