//! Estado del bracket de flash loan, local al contexto (no vive en la
//! `OutputTable`).

use alloy_primitives::{Address, U256};

use crate::bounds::bps_share;
use crate::errors::ComposerError;

/// `amount * fee_bps / 10_000` redondeado hacia abajo.
pub fn flash_fee(amount: U256, fee_bps: u32) -> U256 {
    bps_share(amount, fee_bps)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashBracket {
    pub asset: Address,
    pub amount: U256,
    pub fee: U256,
}

impl FlashBracket {
    pub fn open(asset: Address, amount: U256, fee_bps: u32) -> Self {
        Self { asset,
               amount,
               fee: flash_fee(amount, fee_bps) }
    }

    /// Monto a devolver: principal + fee.
    pub fn required(&self) -> Result<U256, ComposerError> {
        self.amount.checked_add(self.fee).ok_or(ComposerError::FlashLoanUnpaid { asset: self.asset,
                                                                                  required: U256::MAX,
                                                                                  available: U256::ZERO })
    }

    /// `balance >= amount + fee` o `FlashLoanUnpaid`.
    pub fn check_closure(&self, balance: U256) -> Result<U256, ComposerError> {
        let required = self.required()?;
        if balance < required {
            return Err(ComposerError::FlashLoanUnpaid { asset: self.asset,
                                                        required,
                                                        available: balance });
        }
        Ok(required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_is_floored() {
        assert_eq!(flash_fee(U256::from(1_000u64), 9), U256::ZERO);
        assert_eq!(flash_fee(U256::from(1_000_000u64), 9), U256::from(900u64));
        assert_eq!(flash_fee(U256::from(1_000_000u64), 0), U256::ZERO);
    }

    #[test]
    fn closure_requires_principal_plus_fee() {
        let bracket = FlashBracket::open(Address::ZERO, U256::from(10_000u64), 5);
        assert_eq!(bracket.fee, U256::from(5u64));
        assert_eq!(bracket.check_closure(U256::from(10_005u64)), Ok(U256::from(10_005u64)));
        assert_eq!(bracket.check_closure(U256::from(10_004u64)),
                   Err(ComposerError::FlashLoanUnpaid { asset: Address::ZERO,
                                                        required: U256::from(10_005u64),
                                                        available: U256::from(10_004u64) }));
    }
}
