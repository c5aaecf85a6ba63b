//! Tabla de precios fija compartida por el ledger y el servicio de quotes.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};

/// `sell -> buy` como fracción `num / den`: vender `x` devuelve `x * num / den`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceTable {
    rates: BTreeMap<(Address, Address), (U256, U256)>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra la tasa en ambos sentidos.
    pub fn with_rate(mut self, sell: Address, buy: Address, num: u64, den: u64) -> Self {
        self.set_rate(sell, buy, num, den);
        self
    }

    pub fn set_rate(&mut self, sell: Address, buy: Address, num: u64, den: u64) {
        let (num, den) = (U256::from(num), U256::from(den));
        self.rates.insert((sell, buy), (num, den));
        self.rates.insert((buy, sell), (den, num));
    }

    /// `None` si no hay tasa o el denominador es cero.
    pub fn convert(&self, sell: Address, buy: Address, amount: U256) -> Option<U256> {
        let (num, den) = self.rates.get(&(sell, buy))?;
        if den.is_zero() {
            return None;
        }
        amount.checked_mul(*num).map(|v| v / *den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_are_symmetric() {
        let (a, b) = (Address::repeat_byte(1), Address::repeat_byte(2));
        let table = PriceTable::new().with_rate(a, b, 1, 2);
        assert_eq!(table.convert(a, b, U256::from(1000u64)), Some(U256::from(500u64)));
        assert_eq!(table.convert(b, a, U256::from(500u64)), Some(U256::from(1000u64)));
        assert_eq!(table.convert(a, Address::ZERO, U256::from(1u64)), None);
    }
}
