//! Servicio de quotes determinista sobre una `PriceTable`.
//!
//! Produce un blob estilo agregador:
//!
//! ```text
//! selector(4) sell(32) buy(32) amount(32) min_out(32) route_id(32)
//! ```
//!
//! El amount queda en el offset 68; `min_out` aplica la tolerancia
//! configurada sobre la conversión de la tabla.

use alloy_primitives::{keccak256, Address, U256};
use alloy_sol_types::{sol, SolCall};
use log::debug;
use recipe_core::bounds::lower_bound;
use recipe_core::{ComposerError, Quote, QuoteService};

use crate::prices::PriceTable;

sol! {
    function swap(address sellAsset, address buyAsset, uint256 amount, uint256 minOut, bytes32 routeId);
}

/// Offset del amount dentro del blob.
pub const AMOUNT_OFFSET: usize = 4 + 2 * 32;

#[derive(Debug, Clone)]
pub struct StaticQuoteService {
    prices: PriceTable,
    slippage_bps: u32,
}

impl StaticQuoteService {
    pub fn new(prices: PriceTable, slippage_bps: u32) -> Self {
        Self { prices, slippage_bps }
    }

    pub fn selector() -> [u8; 4] {
        swapCall::SELECTOR
    }
}

impl QuoteService for StaticQuoteService {
    fn get_quote(&self, sell_asset: Address, buy_asset: Address, amount: U256, route: &str)
                 -> Result<Quote, ComposerError> {
        let expected = self.prices
                           .convert(sell_asset, buy_asset, amount)
                           .ok_or_else(|| ComposerError::QuoteUnavailable { sell_asset,
                                                                            buy_asset,
                                                                            reason: "no price configured".into() })?;
        let min_out = lower_bound(expected, self.slippage_bps);

        let template = swapCall { sellAsset: sell_asset,
                                  buyAsset: buy_asset,
                                  amount,
                                  minOut: min_out,
                                  routeId: keccak256(route.as_bytes()) }.abi_encode();
        debug!("quote {sell_asset} -> {buy_asset} via `{route}`: {amount} -> min {min_out}");

        Ok(Quote { sell_asset,
                   buy_asset,
                   template,
                   quoted_amount: amount })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{DAI, WETH};
    use recipe_core::model::slot::encode_amount;

    #[test]
    fn amount_sits_at_fixed_offset() {
        let service = StaticQuoteService::new(PriceTable::new().with_rate(DAI, WETH, 1, 2_000), 50);
        let amount = U256::from(4_000_000u64);
        let quote = service.get_quote(DAI, WETH, amount, "uni-v3").unwrap();
        assert_eq!(quote.template.len(), 4 + 5 * 32);
        assert_eq!(&quote.template[AMOUNT_OFFSET..AMOUNT_OFFSET + 32], &encode_amount(amount)[..]);
        // 2000 * (1 - 0.5%)
        assert_eq!(U256::from_be_slice(&quote.template[AMOUNT_OFFSET + 32..AMOUNT_OFFSET + 64]),
                   U256::from(1_990u64));
        assert_eq!(quote.patch_spec().unwrap().amount_offsets(), &[AMOUNT_OFFSET]);
    }

    #[test]
    fn unknown_pair_is_unavailable() {
        let service = StaticQuoteService::new(PriceTable::new(), 0);
        assert!(matches!(service.get_quote(DAI, WETH, U256::from(1u64), "x"),
                         Err(ComposerError::QuoteUnavailable { .. })));
    }

    #[test]
    fn routes_change_the_blob() {
        let service = StaticQuoteService::new(PriceTable::new().with_rate(DAI, WETH, 1, 1), 0);
        let a = service.get_quote(DAI, WETH, U256::from(7u64), "a").unwrap();
        let b = service.get_quote(DAI, WETH, U256::from(7u64), "b").unwrap();
        assert_ne!(a.template, b.template);
        assert_eq!(a.template[..4], StaticQuoteService::selector());
        assert_eq!(StaticQuoteService::selector(),
                   keccak256("swap(address,address,uint256,uint256,bytes32)".as_bytes())[..4]);
    }
}
