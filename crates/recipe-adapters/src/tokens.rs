//! Direcciones de tokens de mainnet usadas en demos y tests.

use alloy_primitives::{address, Address};

pub const DAI: Address = address!("6B175474E89094C44Da98b954EedeAC495271d0F");
pub const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
pub const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
